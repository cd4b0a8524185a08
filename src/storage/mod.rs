//! Tiered on-disk cache.
//!
//! Each site gets its own namespace directory:
//!
//! ```text
//! cache/
//! └── site-Space Battles/
//!     ├── story-12345.json                      # Story record
//!     ├── images/
//!     │   ├── <sha256>.png                      # Image bytes
//!     │   └── <sha256>-meta.json                # Sidecar
//!     └── posts/
//!         └── story-12345/
//!             └── post-678-20240103-120000.html # Rendered post
//! ```

pub mod images;
pub mod local;
pub mod posts;
pub mod stories;

use std::path::{Path, PathBuf};

use crate::utils::http::Fetcher;
use crate::utils::to_valid_path;

// Re-export for convenience
pub use images::{ImageCache, ImageCacheEntry};
pub use local::LocalStore;
pub use posts::{PostCacheKey, PostRenderCache};
pub use stories::StoryCache;

/// Namespace directory of a site below the cache root.
pub fn site_namespace(cache_root: &Path, site_name: &str) -> PathBuf {
    cache_root.join(format!("site-{}", to_valid_path(site_name)))
}

/// The three cache tiers of one site.
#[derive(Clone)]
pub struct SiteCache {
    root: PathBuf,
    pub images: ImageCache,
    pub posts: PostRenderCache,
    pub stories: StoryCache,
}

impl SiteCache {
    pub fn new(root: impl Into<PathBuf>, fetcher: Fetcher) -> Self {
        let root = root.into();
        let store = LocalStore::new(&root);
        let posts = PostRenderCache::new(store.clone());
        Self {
            images: ImageCache::new(store.clone(), fetcher),
            stories: StoryCache::new(store, posts.clone()),
            posts,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
