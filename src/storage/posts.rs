//! Render cache for post bodies.
//!
//! A post is stored once per `updated_at` value. An edited post gets a new
//! file; older renders are left in place.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Post;
use crate::storage::LocalStore;
use crate::utils::to_valid_path;

/// Identity of one rendered post version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostCacheKey {
    pub story_id: String,
    pub post_id: String,
    pub updated_at: DateTime<Utc>,
}

impl PostCacheKey {
    pub fn new(
        story_id: impl Into<String>,
        post_id: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            story_id: story_id.into(),
            post_id: post_id.into(),
            updated_at,
        }
    }

    pub fn for_post(story_id: &str, post: &Post) -> Self {
        Self::new(story_id, post.post_id.as_str(), post.updated_at)
    }

    /// Path relative to the site namespace.
    ///
    /// e.g. `posts/story-42/post-100-20240103-120000.html`
    pub fn relative_path(&self) -> String {
        format!(
            "posts/story-{}/post-{}-{}.html",
            to_valid_path(&self.story_id),
            to_valid_path(&self.post_id),
            self.updated_at.format("%Y%m%d-%H%M%S")
        )
    }
}

#[derive(Debug, Clone)]
pub struct PostRenderCache {
    store: LocalStore,
}

impl PostRenderCache {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn path(&self, key: &PostCacheKey) -> std::path::PathBuf {
        self.store.path(&key.relative_path())
    }

    pub async fn is_cached(&self, key: &PostCacheKey) -> bool {
        self.store.exists(&key.relative_path()).await
    }

    /// Store a rendered post. Returns `false` when an entry already existed,
    /// in which case nothing is written.
    pub async fn store(&self, key: &PostCacheKey, html: &str) -> Result<bool> {
        let relative = key.relative_path();
        if self.store.exists(&relative).await {
            return Ok(false);
        }
        self.store.write_bytes(&relative, html.as_bytes()).await?;
        log::debug!("Rendered post {} cached", key.post_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn key(hour: u32) -> PostCacheKey {
        PostCacheKey::new(
            "42",
            "100",
            Utc.with_ymd_and_hms(2024, 1, 3, hour, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_relative_path_layout() {
        assert_eq!(
            key(12).relative_path(),
            "posts/story-42/post-100-20240103-120000.html"
        );
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let cache = PostRenderCache::new(LocalStore::new(tmp.path()));

        assert!(!cache.is_cached(&key(12)).await);
        assert!(cache.store(&key(12), "<p>first</p>").await.unwrap());
        assert!(cache.is_cached(&key(12)).await);

        assert!(!cache.store(&key(12), "<p>second</p>").await.unwrap());
        assert_eq!(
            std::fs::read_to_string(cache.path(&key(12))).unwrap(),
            "<p>first</p>"
        );
    }

    #[tokio::test]
    async fn test_new_timestamp_is_new_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = PostRenderCache::new(LocalStore::new(tmp.path()));

        cache.store(&key(12), "<p>v1</p>").await.unwrap();
        assert!(!cache.is_cached(&key(13)).await);
        cache.store(&key(13), "<p>v2</p>").await.unwrap();

        assert!(cache.path(&key(12)).exists());
        assert!(cache.path(&key(13)).exists());
    }
}
