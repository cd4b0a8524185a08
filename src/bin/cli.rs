//! Threadmark Crawler CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use threadmark_crawler::{
    error::{AppError, Result},
    models::Config,
    pipeline,
};

/// Threadmark Crawler - incremental XenForo story harvester
#[derive(Parser, Debug)]
#[command(
    name = "threadmark-crawler",
    version,
    about = "Harvests threadmarked posts from XenForo forums into a local cache"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl one or more stories
    Crawl {
        /// Story URLs
        urls: Vec<String>,

        /// File with one story URL per line
        #[arg(long)]
        url_file: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Story URLs from a file; blank lines and `#` comments are skipped.
fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Threadmark Crawler starting...");

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Crawl { mut urls, url_file } => {
            if let Some(path) = url_file {
                urls.extend(read_url_file(&path)?);
                log::info!("Loaded story URLs from {}", path.display());
            }
            if urls.is_empty() {
                return Err(AppError::config(
                    "No story URLs given; pass URLs or --url-file",
                ));
            }

            config.validate()?;
            let outcome = pipeline::run_crawler(&config, &urls).await?;

            for failure in &outcome.failures {
                log::error!("  {}: {}", failure.url, failure.error);
            }
            log::info!(
                "Crawl complete: {}/{} stories resolved",
                outcome.stories.len(),
                outcome.total()
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "Config OK ({} sites, cache at {})",
                config.sites.len(),
                config.cache.root.display()
            );
        }
    }

    log::info!("Done!");

    Ok(())
}
