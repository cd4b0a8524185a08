//! Pipeline entry points.
//!
//! - `run_crawler`: resolve stories and hand them to the conversion stage
//! - `export`: conversion manifests and rebuild checks

pub mod crawl;
pub mod export;

pub use crawl::{CrawlFailure, CrawlOutcome, crawl_with, run_crawler};
pub use export::{EbookManifest, is_up_to_date};
