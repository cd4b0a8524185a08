//! Content-addressed image cache.
//!
//! Entries are keyed by the SHA-256 of the source URL, not of the bytes: the
//! same URL always maps to the same file name. An image replaced upstream
//! under an unchanged URL keeps serving the old bytes until its sidecar is
//! deleted by hand.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::storage::LocalStore;
use crate::utils::http::Fetcher;
use crate::utils::sha256_hex;

/// Sidecar record stored next to each cached image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageCacheEntry {
    /// Extension of the detected format, without the dot
    pub extension: String,
    /// Upstream `Last-Modified`, or capture time
    pub timestamp: String,
    /// Original source URL
    pub source: String,
}

/// Best-effort cache for images embedded in posts.
#[derive(Clone)]
pub struct ImageCache {
    store: LocalStore,
    fetcher: Fetcher,
}

impl ImageCache {
    /// Create an image cache below the given site namespace.
    pub fn new(store: LocalStore, fetcher: Fetcher) -> Self {
        Self { store, fetcher }
    }

    /// Cache key of a source URL.
    pub fn key_for(source: &str) -> String {
        sha256_hex(source)
    }

    fn meta_key(key: &str) -> String {
        format!("images/{key}-meta.json")
    }

    fn image_key(key: &str, extension: &str) -> String {
        format!("images/{key}.{extension}")
    }

    /// Local path of a cache entry.
    pub fn image_path(&self, entry: &ImageCacheEntry) -> PathBuf {
        self.store
            .path(&Self::image_key(&Self::key_for(&entry.source), &entry.extension))
    }

    /// Look up a cached entry without touching the network.
    pub async fn lookup(&self, source: &str) -> Option<ImageCacheEntry> {
        let key = Self::meta_key(&Self::key_for(source));
        match self.store.read_json::<ImageCacheEntry>(&key).await {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Unreadable image sidecar for {source}: {e}");
                None
            }
        }
    }

    /// Return the local path for an image, downloading it on first use.
    ///
    /// Any failure is logged and yields `None`; image caching never aborts
    /// the caller. A present sidecar counts as a hit even if the image file
    /// itself was removed.
    pub async fn cache_image(&self, source: &str) -> Option<PathBuf> {
        if let Some(entry) = self.lookup(source).await {
            return Some(self.image_path(&entry));
        }

        match self.download(source).await {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Failed to cache image {source}: {e}");
                None
            }
        }
    }

    async fn download(&self, source: &str) -> Result<PathBuf> {
        log::debug!("Downloading image from {source}");
        let resource = self.fetcher.get(source).await?;
        if !resource.status.is_success() {
            return Err(AppError::crawl(source, format!("HTTP {}", resource.status)));
        }

        let format = image::guess_format(&resource.body)
            .map_err(|e| AppError::crawl(source, format!("unknown image format: {e}")))?;
        let extension = format
            .extensions_str()
            .first()
            .copied()
            .ok_or_else(|| AppError::crawl(source, "image format has no extension"))?;

        let entry = ImageCacheEntry {
            extension: extension.to_string(),
            timestamp: resource
                .last_modified
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
            source: source.to_string(),
        };

        let key = Self::key_for(source);
        self.store
            .write_bytes(&Self::image_key(&key, &entry.extension), &resource.body)
            .await?;
        self.store.write_json(&Self::meta_key(&key), &entry).await?;

        let path = self.image_path(&entry);
        log::debug!("Image written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrawlerConfig;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_BYTES: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];

    fn cache_in(tmp: &TempDir) -> ImageCache {
        let fetcher = Fetcher::new(&CrawlerConfig::default()).unwrap();
        ImageCache::new(LocalStore::new(tmp.path()), fetcher)
    }

    #[tokio::test]
    async fn test_first_call_writes_image_and_sidecar() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        let source = format!("{}/img.png", server.uri());
        let key = ImageCache::key_for(&source);

        let first = cache.cache_image(&source).await.unwrap();
        assert_eq!(first, tmp.path().join(format!("images/{key}.png")));
        assert!(first.exists());

        let entry = cache.lookup(&source).await.unwrap();
        assert_eq!(entry.extension, "png");
        assert_eq!(entry.source, source);
        assert!(tmp.path().join(format!("images/{key}-meta.json")).exists());

        // Second call is served from the sidecar; `expect(1)` verifies no refetch.
        let second = cache.cache_image(&source).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_format_degrades_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not an image</html>"))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        let source = format!("{}/fake.png", server.uri());

        assert!(cache.cache_image(&source).await.is_none());
        assert!(cache.lookup(&source).await.is_none());
    }

    #[tokio::test]
    async fn test_http_error_degrades_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);

        assert!(
            cache
                .cache_image(&format!("{}/gone.png", server.uri()))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_degrades_to_none() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        assert!(cache.cache_image("http://127.0.0.1:1/x.png").await.is_none());
    }

    #[test]
    fn test_key_is_hash_of_source() {
        assert_eq!(
            ImageCache::key_for("https://x/img.png"),
            sha256_hex("https://x/img.png")
        );
        assert_ne!(
            ImageCache::key_for("https://x/img.png"),
            ImageCache::key_for("https://x/img2.png")
        );
    }
}
