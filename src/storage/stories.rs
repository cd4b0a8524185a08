//! Story metadata cache.

use crate::error::Result;
use crate::models::Story;
use crate::storage::LocalStore;
use crate::storage::posts::{PostCacheKey, PostRenderCache};
use crate::utils::to_valid_path;

#[derive(Debug, Clone)]
pub struct StoryCache {
    store: LocalStore,
    posts: PostRenderCache,
}

impl StoryCache {
    pub fn new(store: LocalStore, posts: PostRenderCache) -> Self {
        Self { store, posts }
    }

    fn key(story_id: &str) -> String {
        format!("story-{}.json", to_valid_path(story_id))
    }

    pub fn path(&self, story_id: &str) -> std::path::PathBuf {
        self.store.path(&Self::key(story_id))
    }

    /// Load a cached story.
    ///
    /// Missing and unreadable records are both a miss. Every post's
    /// `refetch` flag is recomputed against the render cache.
    pub async fn load(&self, story_id: &str) -> Option<Story> {
        let mut story = match self.store.read_json::<Story>(&Self::key(story_id)).await {
            Ok(Some(story)) => story,
            Ok(None) => {
                log::debug!("No cached record for story {story_id}");
                return None;
            }
            Err(e) => {
                log::warn!("Discarding unreadable cache record for story {story_id}: {e}");
                return None;
            }
        };

        for category in &mut story.categories {
            for post in category.posts.values_mut() {
                let key = PostCacheKey::for_post(&story.story_id, post);
                post.refetch = !self.posts.is_cached(&key).await;
            }
        }

        log::debug!(
            "Loaded story {} from cache ({} posts)",
            story.story_id,
            story.post_count()
        );
        Some(story)
    }

    /// Persist a story, replacing any previous record.
    pub async fn save(&self, story: &Story) -> Result<()> {
        self.store.write_json(&Self::key(&story.story_id), story).await
    }
}
