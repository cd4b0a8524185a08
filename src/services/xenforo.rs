// src/services/xenforo.rs

//! XenForo 2 threadmark parser.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::ThreadmarkSelectors;
use crate::services::parser::{
    ForumParser, MessageFields, ReaderPage, RenderContext, StoryPage, story_relative,
};
use crate::services::render::{post_heading, raw_image_source, render_document};
use crate::utils::resolve_url;
use crate::utils::url::post_id_from_permalink;

static CANONICAL: LazyLock<Selector> = LazyLock::new(|| fixed("link[rel=\"canonical\"]"));
static OG_URL: LazyLock<Selector> = LazyLock::new(|| fixed("meta[property=\"og:url\"]"));
static OG_IMAGE: LazyLock<Selector> = LazyLock::new(|| fixed("meta[property=\"og:image\"]"));
static IMG: LazyLock<Selector> = LazyLock::new(|| fixed("img"));

static CATEGORY_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"threadmark_category(?:_id)?=(\d+)")
        .unwrap_or_else(|e| panic!("invalid category regex: {e}"))
});

fn fixed(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Compiled form of [`ThreadmarkSelectors`].
#[derive(Debug, Clone)]
struct Compiled {
    title: Selector,
    author: Selector,
    thread_icon: Selector,
    author_avatar: Selector,
    category_link: Selector,
    message: Selector,
    threadmark_label: Selector,
    permalink: Selector,
    message_author: Selector,
    posted_at: Selector,
    updated_at: Selector,
    body: Selector,
    next_page: Selector,
}

/// Parser for XenForo 2 forums with the threadmarks add-on.
#[derive(Debug, Clone)]
pub struct XenForoParser {
    sel: Compiled,
}

impl XenForoParser {
    pub fn new(selectors: &ThreadmarkSelectors) -> Result<Self> {
        Ok(Self {
            sel: Compiled {
                title: parse_selector(&selectors.title)?,
                author: parse_selector(&selectors.author)?,
                thread_icon: parse_selector(&selectors.thread_icon)?,
                author_avatar: parse_selector(&selectors.author_avatar)?,
                category_link: parse_selector(&selectors.category_link)?,
                message: parse_selector(&selectors.message)?,
                threadmark_label: parse_selector(&selectors.threadmark_label)?,
                permalink: parse_selector(&selectors.permalink)?,
                message_author: parse_selector(&selectors.message_author)?,
                posted_at: parse_selector(&selectors.posted_at)?,
                updated_at: parse_selector(&selectors.updated_at)?,
                body: parse_selector(&selectors.body)?,
                next_page: parse_selector(&selectors.next_page)?,
            },
        })
    }

    fn text_of(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
        scope
            .select(selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn attr_of<'a>(scope: ElementRef<'a>, selector: &Selector, attr: &str) -> Option<&'a str> {
        scope
            .select(selector)
            .next()
            .and_then(|el| el.value().attr(attr))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn image_of(&self, root: ElementRef<'_>, page_url: &Url) -> Option<String> {
        [&self.sel.thread_icon, &self.sel.author_avatar]
            .into_iter()
            .find_map(|sel| root.select(sel).find_map(raw_image_source))
            .or_else(|| Self::attr_of(root, &OG_IMAGE, "content"))
            .map(|src| resolve_url(page_url, src))
    }

    fn category_ids(&self, root: ElementRef<'_>) -> Vec<u32> {
        let mut ids = BTreeSet::new();
        for el in root.select(&self.sel.category_link) {
            let element = el.value();
            if let Some(id) = element
                .attr("data-threadmark-category")
                .and_then(|v| v.trim().parse::<u32>().ok())
            {
                ids.insert(id);
            }
            if let Some(id) = element
                .attr("href")
                .and_then(|href| CATEGORY_PARAM.captures(href))
                .and_then(|caps| caps[1].parse::<u32>().ok())
            {
                ids.insert(id);
            }
        }
        ids.into_iter().collect()
    }

    /// The message element of a fragment, or the fragment root.
    fn message_root<'a>(&self, doc: &'a Html) -> ElementRef<'a> {
        doc.select(&self.sel.message)
            .next()
            .unwrap_or_else(|| doc.root_element())
    }

    fn post_id_of(&self, article: ElementRef<'_>) -> Option<String> {
        let element = article.value();
        element
            .attr("data-content")
            .and_then(|v| v.strip_prefix("post-"))
            .or_else(|| element.attr("id").and_then(|v| v.strip_prefix("js-post-")))
            .map(str::to_string)
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .or_else(|| {
                Self::attr_of(article, &self.sel.permalink, "href")
                    .and_then(post_id_from_permalink)
            })
    }
}

impl Default for XenForoParser {
    fn default() -> Self {
        let defaults = ThreadmarkSelectors::default();
        Self::new(&defaults)
            .unwrap_or_else(|e| panic!("default selectors must compile: {e}"))
    }
}

/// Timestamp of a XenForo `<time>` element: `data-time` (unix seconds) first,
/// then the `datetime` attribute.
pub fn parse_time(el: ElementRef<'_>) -> Option<DateTime<Utc>> {
    let element = el.value();
    if let Some(secs) = element
        .attr("data-time")
        .and_then(|v| v.trim().parse::<i64>().ok())
    {
        return DateTime::from_timestamp(secs, 0);
    }

    let raw = element.attr("datetime")?.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl ForumParser for XenForoParser {
    fn parse_story_page(&self, html: &str, page_url: &Url) -> StoryPage {
        let doc = Html::parse_document(html);
        let root = doc.root_element();

        let story_id = root
            .value()
            .attr("data-content-key")
            .and_then(|key| key.strip_prefix("thread-"))
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let canonical_url = Self::attr_of(root, &CANONICAL, "href")
            .or_else(|| Self::attr_of(root, &OG_URL, "content"))
            .map(|href| resolve_url(page_url, href));

        StoryPage {
            story_id,
            canonical_url,
            title: Self::text_of(root, &self.sel.title).unwrap_or_else(|| "Unknown".to_string()),
            author: Self::text_of(root, &self.sel.author)
                .unwrap_or_else(|| "Unknown".to_string()),
            image: self.image_of(root, page_url),
            category_ids: self.category_ids(root),
        }
    }

    fn parse_reader_page(&self, html: &str, page_url: &Url) -> ReaderPage {
        let doc = Html::parse_document(html);
        let root = doc.root_element();

        ReaderPage {
            messages: root.select(&self.sel.message).map(|m| m.html()).collect(),
            next: Self::attr_of(root, &self.sel.next_page, "href")
                .map(|href| resolve_url(page_url, href)),
        }
    }

    fn parse_message(&self, fragment: &str, page_url: &Url) -> Option<MessageFields> {
        let doc = Html::parse_fragment(fragment);
        let article = self.message_root(&doc);

        let post_id = self.post_id_of(article)?;
        let url = Self::attr_of(article, &self.sel.permalink, "href")
            .map(|href| resolve_url(page_url, href))
            .unwrap_or_else(|| resolve_url(page_url, &format!("/posts/{post_id}/")));

        let author = article
            .value()
            .attr("data-author")
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .or_else(|| Self::text_of(article, &self.sel.message_author))
            .unwrap_or_default();

        let posted_at = article
            .select(&self.sel.posted_at)
            .next()
            .and_then(parse_time)
            .unwrap_or(DateTime::UNIX_EPOCH);
        let edited_at = article
            .select(&self.sel.updated_at)
            .next()
            .and_then(parse_time);
        let updated_at = edited_at.map_or(posted_at, |edited| edited.max(posted_at));

        Some(MessageFields {
            post_id,
            title: Self::text_of(article, &self.sel.threadmark_label).unwrap_or_default(),
            author,
            posted_at,
            updated_at,
            url,
        })
    }

    fn image_sources(&self, fragment: &str, page_url: &Url) -> Vec<String> {
        let doc = Html::parse_fragment(fragment);
        let article = self.message_root(&doc);
        let Some(body) = article.select(&self.sel.body).next() else {
            return Vec::new();
        };

        let mut sources: Vec<String> = Vec::new();
        for src in body.select(&IMG).filter_map(raw_image_source) {
            let absolute = resolve_url(page_url, src);
            if !sources.contains(&absolute) {
                sources.push(absolute);
            }
        }
        sources
    }

    fn render_message(
        &self,
        fragment: &str,
        fields: &MessageFields,
        ctx: &RenderContext<'_>,
    ) -> String {
        let doc = Html::parse_fragment(fragment);
        let article = self.message_root(&doc);
        let body = article.select(&self.sel.body).next();
        let heading = post_heading(
            ctx.category_name,
            &fields.title,
            &fields.author,
            ctx.story_author,
        );
        render_document(body, &fields.title, &heading, ctx)
    }

    fn reader_url(&self, story_url: &str, category_id: u32) -> String {
        story_relative(
            story_url,
            &format!("reader/?threadmark_category={category_id}"),
        )
    }

    fn staleness_probe_url(&self, story_url: &str, category_id: u32) -> String {
        story_relative(
            story_url,
            &format!("threadmarks.rss?threadmark_category_id={category_id}"),
        )
    }
}
