// src/services/extractor.rs

//! Post extraction: one message fragment in, one post record out.

use std::collections::HashMap;
use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use url::Url;

use crate::models::Post;
use crate::services::parser::RenderContext;
use crate::site::Site;
use crate::storage::PostCacheKey;

/// Images of one post downloaded at the same time.
const IMAGE_CONCURRENCY: usize = 4;

/// Turns reader-page messages into posts and render-cache entries.
pub struct PostExtractor<'a> {
    site: &'a Site,
    story_id: &'a str,
    story_author: &'a str,
}

impl<'a> PostExtractor<'a> {
    pub fn new(site: &'a Site, story_id: &'a str, story_author: &'a str) -> Self {
        Self {
            site,
            story_id,
            story_author,
        }
    }

    /// Extract one message.
    ///
    /// When the render cache already holds this post at its current
    /// `updated_at`, no image is fetched and nothing is written. Returns
    /// `None` only for fragments without a post id.
    pub async fn extract(
        &self,
        fragment: &str,
        category_id: u32,
        category_name: &str,
        page_url: &Url,
        reader_url: &str,
    ) -> Option<Post> {
        let parser = self.site.parser();
        let Some(fields) = parser.parse_message(fragment, page_url) else {
            log::debug!("Skipping message without post id on {page_url}");
            return None;
        };

        let key = PostCacheKey::new(self.story_id, fields.post_id.as_str(), fields.updated_at);
        let posts = &self.site.cache().posts;
        let mut refetch = false;

        if !posts.is_cached(&key).await {
            let image_cache = &self.site.cache().images;
            let images: HashMap<String, Option<PathBuf>> =
                stream::iter(parser.image_sources(fragment, page_url))
                    .map(|source| async move {
                        let local = image_cache.cache_image(&source).await;
                        (source, local)
                    })
                    .buffer_unordered(IMAGE_CONCURRENCY)
                    .collect()
                    .await;

            let ctx = RenderContext {
                page_url,
                category_name,
                story_author: self.story_author,
                images: &images,
            };
            let html = parser.render_message(fragment, &fields, &ctx);

            match posts.store(&key, &html).await {
                Ok(_) => log::info!("Extracted post {} '{}'", fields.post_id, fields.title),
                Err(e) => {
                    log::warn!("Failed to cache post {}: {e}", fields.post_id);
                    refetch = true;
                }
            }
        }

        Some(Post {
            post_id: fields.post_id,
            category_id,
            title: fields.title,
            author: fields.author,
            posted_at: fields.posted_at,
            updated_at: fields.updated_at,
            url: fields.url,
            reader_url: reader_url.to_string(),
            refetch,
        })
    }
}
