//! Mock XenForo forum shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use threadmark_crawler::models::{CrawlerConfig, SiteConfig};
use threadmark_crawler::services::XenForoParser;
use threadmark_crawler::site::Site;
use threadmark_crawler::storage::PostCacheKey;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const STORY_ID: &str = "4567";
pub const STORY_PATH: &str = "/threads/my-story.4567/";
pub const IMAGE_PATH: &str = "/attachments/a.png";

/// 2024-01-01T00:00:00Z
const BASE_TIME: i64 = 1_704_067_200;

pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

/// Unix seconds of midnight on day `n` after 2024-01-01.
pub fn t(day: i64) -> i64 {
    BASE_TIME + day * 86_400
}

pub fn at(day: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(t(day), 0).unwrap()
}

/// One threadmarked message as it appears on a reader page.
pub fn message(id: u32, title: &str, posted: i64, edited: Option<i64>, body: &str) -> String {
    let edit = edited
        .map(|e| {
            format!(
                r#"<div class="message-lastEdit">Last edited: <time class="u-dt" data-time="{e}">later</time></div>"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"<article class="message" data-author="Writer" data-content="post-{id}">
  <div class="message-attribution-main"><a href="/threads/my-story.4567/post-{id}"><time class="u-dt" data-time="{posted}">then</time></a></div>
  <span class="threadmarkLabel">{title}</span>
  <div class="message-body"><div class="bbWrapper">{body}</div></div>
  {edit}
</article>"#
    )
}

pub fn reader_page(messages: &[String], next: Option<&str>) -> String {
    let nav = next
        .map(|href| format!(r#"<a class="pageNav-jump pageNav-jump--next" href="{href}">Next</a>"#))
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html><html><body><div class=\"block-body\">{}</div>{nav}</body></html>",
        messages.concat()
    )
}

/// Relative href of a reader page.
pub fn reader_href(story_path: &str, category: u32, page: u32) -> String {
    if page <= 1 {
        format!("{story_path}reader/?threadmark_category={category}")
    } else {
        format!("{story_path}reader/page-{page}?threadmark_category={category}")
    }
}

fn reader_path(story_path: &str, page: u32) -> String {
    if page <= 1 {
        format!("{story_path}reader/")
    } else {
        format!("{story_path}reader/page-{page}")
    }
}

pub struct MockForum {
    pub server: MockServer,
    pub cache: TempDir,
}

impl MockForum {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            cache: TempDir::new().unwrap(),
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn story_url(&self) -> String {
        format!("{}{STORY_PATH}", self.uri())
    }

    pub fn reader_url(&self, category: u32, page: u32) -> String {
        format!("{}{}", self.uri(), reader_href(STORY_PATH, category, page))
    }

    pub fn site_config(&self) -> SiteConfig {
        let mut categories = BTreeMap::new();
        categories.insert("Threadmarks".to_string(), 1);
        categories.insert("Staff Post".to_string(), 7);
        categories.insert("Sidestory".to_string(), 16);
        SiteConfig {
            name: "Mock".to_string(),
            base_url: self.uri(),
            categories,
        }
    }

    pub fn crawler_config() -> CrawlerConfig {
        CrawlerConfig {
            max_attempts: 5,
            base_delay_ms: 1,
            ..CrawlerConfig::default()
        }
    }

    pub fn site(&self) -> Site {
        Site::new(
            &self.site_config(),
            &Self::crawler_config(),
            self.cache.path(),
            Arc::new(XenForoParser::default()),
        )
        .unwrap()
    }

    pub fn render_path(&self, site: &Site, post_id: &str, updated_day: i64) -> PathBuf {
        site.cache()
            .posts
            .path(&PostCacheKey::new(STORY_ID, post_id, at(updated_day)))
    }

    /// Story landing page at `story_path` declaring `canonical`.
    pub async fn mount_story_at(&self, story_path: &str, canonical: &str, categories: &[u32]) {
        let links: String = categories
            .iter()
            .map(|id| {
                format!(
                    r#"<a href="{story_path}threadmarks?threadmark_category={id}">Category {id}</a>"#
                )
            })
            .collect();
        let html = format!(
            r#"<!DOCTYPE html>
<html data-content-key="thread-{STORY_ID}">
<head><link rel="canonical" href="{canonical}"></head>
<body>
  <h1 class="p-title-value">My Story</h1>
  <div class="p-description"><a class="username u-concealed">Writer</a></div>
  {links}
</body>
</html>"#
        );
        Mock::given(method("GET"))
            .and(path(story_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_story(&self, categories: &[u32]) {
        self.mount_story_at(STORY_PATH, &self.story_url(), categories)
            .await;
    }

    pub async fn mount_reader_at(&self, story_path: &str, category: u32, page: u32, html: String) {
        Mock::given(method("GET"))
            .and(path(reader_path(story_path, page)))
            .and(query_param("threadmark_category", category.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_reader(&self, category: u32, page: u32, html: String) {
        self.mount_reader_at(STORY_PATH, category, page, html).await;
    }

    pub async fn mount_image(&self) {
        Mock::given(method("GET"))
            .and(path(IMAGE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
            .mount(&self.server)
            .await;
    }

    /// Threadmark feed whose `Last-Modified` is midnight of `day`.
    pub async fn mount_feed(&self, day: i64) {
        let modified = at(day).format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        Mock::given(method("HEAD"))
            .and(path(format!("{STORY_PATH}threadmarks.rss")))
            .respond_with(ResponseTemplate::new(200).insert_header("Last-Modified", modified))
            .mount(&self.server)
            .await;
    }

    /// Category 1 over two reader pages: posts 100 and 101 on page one,
    /// post 102 on page two. Post 102 optionally carries an edit time.
    pub async fn mount_main_category(&self, edited_102: Option<i64>) {
        let page_one = reader_page(
            &[
                message(100, "Chapter 1", t(0), None, r#"Hello <img src="/attachments/a.png">"#),
                message(101, "Chapter 2", t(1), None, "<p>Second</p>"),
            ],
            Some(&reader_href(STORY_PATH, 1, 2)),
        );
        let page_two = reader_page(
            &[message(102, "Chapter 3", t(2), edited_102, "<p>Third</p>")],
            None,
        );
        self.mount_reader(1, 1, page_one).await;
        self.mount_reader(1, 2, page_two).await;
    }

    /// Story page, both reader pages and the image.
    pub async fn mount_default(&self) {
        self.mount_story(&[1]).await;
        self.mount_main_category(None).await;
        self.mount_image().await;
    }

    /// GET requests received for a path.
    pub async fn hits(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "GET" && r.url.path() == request_path)
            .count()
    }

    pub async fn reader_hits(&self, page: u32) -> usize {
        self.hits(&reader_path(STORY_PATH, page)).await
    }
}
