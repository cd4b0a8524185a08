//! Application configuration structures.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ThreadmarkSelectors;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Cache location
    #[serde(default)]
    pub cache: CacheConfig,

    /// E-book hand-off settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Forum definitions
    #[serde(default = "defaults::sites")]
    pub sites: Vec<SiteConfig>,

    /// XenForo DOM selectors
    #[serde(default)]
    pub selectors: ThreadmarkSelectors,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_attempts == 0 {
            return Err(AppError::validation("crawler.max_attempts must be > 0"));
        }
        if self.sites.is_empty() {
            return Err(AppError::validation("No sites defined"));
        }

        let mut hosts = HashSet::new();
        for site in &self.sites {
            let url = url::Url::parse(&site.base_url).map_err(|e| {
                AppError::validation(format!("site '{}' has invalid base_url: {e}", site.name))
            })?;
            let host = url.host_str().unwrap_or_default().to_lowercase();
            if !hosts.insert(host.clone()) {
                return Err(AppError::validation(format!(
                    "host '{host}' is configured more than once"
                )));
            }
            if site.categories.is_empty() {
                return Err(AppError::validation(format!(
                    "site '{}' has no categories",
                    site.name
                )));
            }
        }

        for (name, css) in self.selectors.entries() {
            scraper::Selector::parse(css).map_err(|e| {
                AppError::selector(format!("selectors.{name} = {css}"), format!("{e:?}"))
            })?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            cache: CacheConfig::default(),
            output: OutputConfig::default(),
            sites: defaults::sites(),
            selectors: ThreadmarkSelectors::default(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per request while the server answers 429
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds, doubled per attempt
    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    /// Pre-obtained session cookie sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay(),
            session_cookie: None,
        }
    }
}

/// Cache location settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Root directory; each site gets its own namespace below it
    #[serde(default = "defaults::cache_root")]
    pub root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: defaults::cache_root(),
        }
    }
}

/// E-book hand-off settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Directory for e-book artifacts and manifests
    #[serde(default = "defaults::output_dir")]
    pub dir: PathBuf,

    /// Categories crawled but left out of the e-book
    #[serde(default = "defaults::excluded_categories")]
    pub excluded_categories: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: defaults::output_dir(),
            excluded_categories: defaults::excluded_categories(),
        }
    }
}

/// One forum running XenForo threadmarks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteConfig {
    /// Display name, also used for the cache namespace
    pub name: String,

    /// Origin, e.g. `https://forums.spacebattles.com`
    pub base_url: String,

    /// Category label to forum-internal category id
    pub categories: BTreeMap<String, u32>,
}

mod defaults {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::SiteConfig;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; threadmark-crawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_attempts() -> u32 {
        15
    }
    pub fn base_delay() -> u64 {
        100
    }

    // Storage defaults
    pub fn cache_root() -> PathBuf {
        PathBuf::from("cache")
    }
    pub fn output_dir() -> PathBuf {
        PathBuf::from("out")
    }
    pub fn excluded_categories() -> Vec<String> {
        vec!["Staff Post".into(), "Media".into()]
    }

    fn site(name: &str, base_url: &str, ids: [u32; 6]) -> SiteConfig {
        let labels = [
            "Threadmarks",
            "Staff Post",
            "Media",
            "Apocrypha",
            "Sidestory",
            "Informational",
        ];
        SiteConfig {
            name: name.to_string(),
            base_url: base_url.to_string(),
            categories: labels
                .iter()
                .zip(ids)
                .map(|(label, id)| (label.to_string(), id))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    // Site defaults
    pub fn sites() -> Vec<SiteConfig> {
        vec![
            site(
                "Space Battles",
                "https://forums.spacebattles.com",
                [1, 7, 10, 13, 16, 19],
            ),
            site(
                "Sufficient Velocity",
                "https://forums.sufficientvelocity.com",
                [1, 2, 3, 4, 5, 6],
            ),
        ]
    }
}
