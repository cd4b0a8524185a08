// src/pipeline/crawl.rs

//! Story crawling pipeline.

use chrono::Utc;

use crate::error::Result;
use crate::models::{Config, OutputConfig, Story};
use crate::pipeline::export::EbookManifest;
use crate::services::StoryResolver;
use crate::site::{Site, SiteRegistry};

/// A story that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlFailure {
    pub url: String,
    pub error: String,
}

/// Summary of a crawl run.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub stories: Vec<Story>,
    pub failures: Vec<CrawlFailure>,
}

impl CrawlOutcome {
    pub fn total(&self) -> usize {
        self.stories.len() + self.failures.len()
    }
}

/// Run the crawler over every URL with sites built from the configuration.
pub async fn run_crawler(config: &Config, urls: &[String]) -> Result<CrawlOutcome> {
    let registry = SiteRegistry::from_config(config)?;
    Ok(crawl_with(&registry, &config.output, urls).await)
}

/// Resolve each URL in turn. A failing story is logged and recorded; it
/// never stops the run.
pub async fn crawl_with(
    registry: &SiteRegistry,
    output: &OutputConfig,
    urls: &[String],
) -> CrawlOutcome {
    let start_time = Utc::now();
    log::info!("Crawling {} stories", urls.len());

    let mut outcome = CrawlOutcome::default();
    for url in urls {
        let resolved = match registry.site_for(url) {
            Ok(site) => StoryResolver::new(site)
                .resolve(url)
                .await
                .map(|story| (site, story)),
            Err(e) => Err(e),
        };

        match resolved {
            Ok((site, story)) => {
                hand_off(&story, site, output).await;
                outcome.stories.push(story);
            }
            Err(e) => {
                log::error!("Failed to crawl {url}: {e}");
                outcome.failures.push(CrawlFailure {
                    url: url.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let elapsed = Utc::now() - start_time;
    log::info!(
        "Crawl finished in {}s: {} resolved, {} failed",
        elapsed.num_seconds(),
        outcome.stories.len(),
        outcome.failures.len()
    );
    outcome
}

/// Write the conversion manifest of a story and report whether its
/// artifact needs a rebuild.
async fn hand_off(story: &Story, site: &Site, output: &OutputConfig) {
    let Some(manifest) = EbookManifest::for_story(story, site, output) else {
        log::info!("'{}' has no posts to convert", story.title);
        return;
    };

    if manifest.is_up_to_date() {
        log::info!(
            "{} is up to date, skipping rebuild",
            manifest.artifact.display()
        );
        return;
    }

    match manifest.write(&output.dir).await {
        Ok(path) => log::info!(
            "Manifest for '{}' ({} posts) written to {}",
            story.title,
            manifest.inputs.len(),
            path.display()
        ),
        Err(e) => log::warn!("Failed to write manifest for '{}': {e}", story.title),
    }
}
