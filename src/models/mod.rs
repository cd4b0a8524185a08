// src/models/mod.rs

//! Domain models for the crawler.

mod config;
mod selectors;
mod story;

// Re-export all public types
pub use config::{CacheConfig, Config, CrawlerConfig, OutputConfig, SiteConfig};
pub use selectors::ThreadmarkSelectors;
pub use story::{Category, Post, Story};
