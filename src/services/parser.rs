// src/services/parser.rs

//! Forum parsing capability.
//!
//! Every forum family plugs in through [`ForumParser`]. Parsing is purely
//! synchronous and returns owned data, so callers never keep a parsed DOM
//! alive across an `.await`.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use url::Url;

/// Facts read from a story's landing page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryPage {
    /// Story id from page metadata
    pub story_id: Option<String>,
    /// Canonical URL declared by the page
    pub canonical_url: Option<String>,
    pub title: String,
    pub author: String,
    /// Representative image, absolute
    pub image: Option<String>,
    /// Category ids linked from the page, ascending and unique
    pub category_ids: Vec<u32>,
}

/// One page of a category's reader view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaderPage {
    /// Outer HTML of every message, in document order
    pub messages: Vec<String>,
    /// Absolute URL of the next page
    pub next: Option<String>,
}

/// Fields of one message; missing elements are empty or the Unix epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageFields {
    pub post_id: String,
    pub title: String,
    pub author: String,
    pub posted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Absolute permalink
    pub url: String,
}

/// Inputs for rendering one message into a standalone document.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    /// Page the message was found on; relative links resolve against it
    pub page_url: &'a Url,
    pub category_name: &'a str,
    pub story_author: &'a str,
    /// Local path of each absolute image source; `None` is a cache miss
    pub images: &'a HashMap<String, Option<PathBuf>>,
}

/// DOM knowledge for one forum family.
pub trait ForumParser: Send + Sync {
    fn parse_story_page(&self, html: &str, page_url: &Url) -> StoryPage;

    fn parse_reader_page(&self, html: &str, page_url: &Url) -> ReaderPage;

    /// Returns `None` when the fragment has no recognizable post id.
    fn parse_message(&self, fragment: &str, page_url: &Url) -> Option<MessageFields>;

    /// Absolute sources of every image embedded in the message body.
    fn image_sources(&self, fragment: &str, page_url: &Url) -> Vec<String>;

    fn render_message(
        &self,
        fragment: &str,
        fields: &MessageFields,
        ctx: &RenderContext<'_>,
    ) -> String;

    /// First reader page of a category.
    fn reader_url(&self, story_url: &str, category_id: u32) -> String;

    /// Cheap metadata-only resource whose `Last-Modified` tracks the category.
    fn staleness_probe_url(&self, story_url: &str, category_id: u32) -> String;
}

/// Join a path segment onto a story URL that may lack its trailing slash.
pub(crate) fn story_relative(story_url: &str, rest: &str) -> String {
    if story_url.ends_with('/') {
        format!("{story_url}{rest}")
    } else {
        format!("{story_url}/{rest}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_relative() {
        assert_eq!(
            story_relative("https://x/threads/a.1/", "reader/"),
            "https://x/threads/a.1/reader/"
        );
        assert_eq!(
            story_relative("https://x/threads/a.1", "reader/"),
            "https://x/threads/a.1/reader/"
        );
    }
}
