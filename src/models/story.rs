//! Story, category and post data structures.
//!
//! Ownership runs one way: a [`Story`] owns its [`Category`] list and each
//! category owns its posts. Upward lookups use plain identifiers
//! (`Category::story_id`, `Post::category_id`) so the graph serializes
//! without cycles.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One discussion thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
    /// Thread identifier extracted from the page or URL
    pub story_id: String,

    /// Canonical URL of the thread
    pub url: String,

    pub title: String,

    pub author: String,

    /// Representative image source (thread icon, author avatar or page image)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Local image-cache path of `image`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_image: Option<String>,

    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Story {
    /// Create an empty story.
    pub fn new(
        story_id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            story_id: story_id.into(),
            url: url.into(),
            title: title.into(),
            author: author.into(),
            image: None,
            cached_image: None,
            categories: Vec::new(),
        }
    }

    /// Latest `updated_at` over every post in every category.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.categories.iter().filter_map(Category::last_update).max()
    }

    pub fn category(&self, category_id: u32) -> Option<&Category> {
        self.categories.iter().find(|c| c.category_id == category_id)
    }

    pub fn has_category(&self, category_id: u32) -> bool {
        self.category(category_id).is_some()
    }

    /// Total number of posts across all categories.
    pub fn post_count(&self) -> usize {
        self.categories.iter().map(|c| c.posts.len()).sum()
    }

    /// Iterate over every post of the story.
    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.categories.iter().flat_map(|c| c.posts.values())
    }

    pub fn needs_refetch(&self) -> bool {
        self.posts().any(|p| p.refetch)
    }

    /// Whether every category was paginated to its last page.
    pub fn is_complete(&self) -> bool {
        self.categories.iter().all(|c| c.complete)
    }
}

/// One threadmark grouping within a story.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Forum-internal category identifier
    pub category_id: u32,

    /// Display label (e.g. "Threadmarks", "Staff Post")
    pub name: String,

    /// Owning story
    pub story_id: String,

    /// Posts keyed by post id
    #[serde(default)]
    pub posts: BTreeMap<String, Post>,

    /// Whether the last pagination reached the final reader page
    #[serde(default)]
    pub complete: bool,
}

impl Category {
    pub fn new(category_id: u32, name: impl Into<String>, story_id: impl Into<String>) -> Self {
        Self {
            category_id,
            name: name.into(),
            story_id: story_id.into(),
            posts: BTreeMap::new(),
            complete: false,
        }
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.posts.values().map(|p| p.updated_at).max()
    }

    /// Insert or replace a post by id. The incoming entry always wins.
    pub fn merge(&mut self, post: Post) {
        self.posts.insert(post.post_id.clone(), post);
    }

    /// Reader page of the most recently posted entry, if every post is
    /// still backed by the render cache.
    pub fn resume_point(&self) -> Option<&str> {
        if self.posts.is_empty() || self.posts.values().any(|p| p.refetch) {
            return None;
        }
        self.posts
            .values()
            .filter(|p| !p.reader_url.is_empty())
            .max_by_key(|p| (p.posted_at, p.updated_at))
            .map(|p| p.reader_url.as_str())
    }
}

/// One threadmarked message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Identifier parsed from the permalink
    pub post_id: String,

    /// Owning category
    pub category_id: u32,

    pub title: String,

    pub author: String,

    pub posted_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Permalink
    pub url: String,

    /// Reader page the post was discovered on
    pub reader_url: String,

    /// True when the render cache has no entry for `updated_at`.
    /// Never trusted from disk; recomputed on every load.
    #[serde(skip)]
    pub refetch: bool,
}
