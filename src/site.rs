// src/site.rs

//! Per-forum configuration and collaborators.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlerConfig, SiteConfig};
use crate::services::{ForumParser, XenForoParser};
use crate::storage::{SiteCache, site_namespace};
use crate::utils::get_domain;
use crate::utils::http::Fetcher;

/// One forum: its category labels, its transport and its cache namespace.
pub struct Site {
    name: String,
    base_url: Url,
    categories: BTreeMap<String, u32>,
    fetcher: Fetcher,
    cache: SiteCache,
    parser: Arc<dyn ForumParser>,
}

impl Site {
    /// Build a site with its own rate-limited fetcher.
    pub fn new(
        config: &SiteConfig,
        crawler: &CrawlerConfig,
        cache_root: &Path,
        parser: Arc<dyn ForumParser>,
    ) -> Result<Self> {
        Self::with_fetcher(config, Fetcher::new(crawler)?, cache_root, parser)
    }

    pub fn with_fetcher(
        config: &SiteConfig,
        fetcher: Fetcher,
        cache_root: &Path,
        parser: Arc<dyn ForumParser>,
    ) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.host_str().is_none() {
            return Err(AppError::config(format!(
                "site '{}' has no host in {}",
                config.name, config.base_url
            )));
        }

        let cache = SiteCache::new(site_namespace(cache_root, &config.name), fetcher.clone());
        Ok(Self {
            name: config.name.clone(),
            base_url,
            categories: config.categories.clone(),
            fetcher,
            cache,
            parser,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category label to id.
    pub fn categories(&self) -> &BTreeMap<String, u32> {
        &self.categories
    }

    /// Label of a category id.
    pub fn category_name(&self, category_id: u32) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, id)| **id == category_id)
            .map(|(name, _)| name.as_str())
    }

    /// Lowest configured category id, the forum's main threadmarks.
    pub fn default_category(&self) -> Option<u32> {
        self.categories.values().copied().min()
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn cache(&self) -> &SiteCache {
        &self.cache
    }

    pub fn parser(&self) -> &dyn ForumParser {
        self.parser.as_ref()
    }

    /// Whether a URL belongs to this forum.
    pub fn handles(&self, url: &str) -> bool {
        match (get_domain(url), self.base_url.host_str()) {
            (Some(host), Some(own)) => host.eq_ignore_ascii_case(own),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("categories", &self.categories)
            .field("cache", &self.cache.root())
            .finish()
    }
}

/// All configured forums.
#[derive(Debug, Default)]
pub struct SiteRegistry {
    sites: Vec<Site>,
}

impl SiteRegistry {
    pub fn new(sites: Vec<Site>) -> Self {
        Self { sites }
    }

    /// One site per `[[sites]]` entry, all sharing the XenForo parser.
    pub fn from_config(config: &Config) -> Result<Self> {
        let parser: Arc<dyn ForumParser> = Arc::new(XenForoParser::new(&config.selectors)?);
        let sites = config
            .sites
            .iter()
            .map(|site| Site::new(site, &config.crawler, &config.cache.root, Arc::clone(&parser)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(sites))
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Site whose host matches the URL.
    pub fn site_for(&self, url: &str) -> Result<&Site> {
        self.sites
            .iter()
            .find(|site| site.handles(url))
            .ok_or_else(|| AppError::UnknownSite(get_domain(url).unwrap_or_else(|| url.to_string())))
    }
}
