// src/services/resolver.rs

//! Story resolution: identity, cache reconciliation, staleness and crawl.

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Category, Story};
use crate::services::paginator::CategoryPaginator;
use crate::services::parser::StoryPage;
use crate::site::Site;
use crate::utils::url::{same_url, story_id_from_url};

/// Resolves story URLs of one site into up-to-date, persisted stories.
pub struct StoryResolver<'a> {
    site: &'a Site,
}

impl<'a> StoryResolver<'a> {
    pub fn new(site: &'a Site) -> Self {
        Self { site }
    }

    /// Resolve a story URL.
    ///
    /// The story is persisted whenever its identity could be established,
    /// including after a failed category crawl; the crawl error is returned
    /// afterwards.
    pub async fn resolve(&self, url: &str) -> Result<Story> {
        let (story_url, page) = self.resolve_identity(url).await?;

        let story_id = page
            .story_id
            .clone()
            .or_else(|| story_id_from_url(&story_url))
            .or_else(|| story_id_from_url(url))
            .ok_or_else(|| AppError::story_not_found(url, "no thread id in page or URL"))?;

        let discovered = self.discover_categories(&page);

        let (mut story, added) = match self.site.cache().stories.load(&story_id).await {
            Some(mut story) => {
                log::info!("Loaded '{}' from cache", story.title);
                let added = reconcile(&mut story, &discovered, self.site);
                (story, added)
            }
            None => {
                log::info!("No usable cache for story {story_id}, building from page");
                let story = self.new_story(&story_id, &story_url, page, &discovered);
                (story, 0)
            }
        };

        self.cache_cover(&mut story).await;

        if added == 0
            && story.is_complete()
            && !story.needs_refetch()
            && self.is_fresh(&story).await
        {
            log::info!("No new posts for '{}'", story.title);
            self.site.cache().stories.save(&story).await?;
            return Ok(story);
        }

        let crawled = self.crawl_categories(&mut story).await;
        let saved = self.site.cache().stories.save(&story).await;
        crawled?;
        saved?;

        log::info!(
            "Resolved '{}' by {}: {} categories, {} posts",
            story.title,
            story.author,
            story.categories.len(),
            story.post_count()
        );
        Ok(story)
    }

    /// Fetch the story page, following a differing canonical URL once.
    async fn resolve_identity(&self, url: &str) -> Result<(String, StoryPage)> {
        let (final_url, page) = self.load_story_page(url).await?;

        let canonical = match page.canonical_url.clone() {
            Some(c) if !same_url(&c, url) && !same_url(&c, &final_url) => c,
            _ => {
                let story_url = page.canonical_url.clone().unwrap_or(final_url);
                return Ok((story_url, page));
            }
        };

        log::info!("Re-resolving {url} as {canonical}");
        let (_, mut page) = self.load_story_page(&canonical).await?;
        if let Some(again) = page
            .canonical_url
            .as_deref()
            .filter(|again| !same_url(again, &canonical))
        {
            log::warn!("Canonical URL moved again to {again}; keeping {canonical}");
        }
        page.canonical_url = Some(canonical.clone());
        Ok((canonical, page))
    }

    async fn load_story_page(&self, url: &str) -> Result<(String, StoryPage)> {
        let resource = self.site.fetcher().get_page(url).await?;
        let page_url = Url::parse(&resource.url)?;
        let page = self
            .site
            .parser()
            .parse_story_page(&resource.text(), &page_url);
        Ok((resource.url, page))
    }

    /// Configured category ids linked from the page, or the site's main
    /// category when the page names none.
    fn discover_categories(&self, page: &StoryPage) -> Vec<u32> {
        let ids: Vec<u32> = page
            .category_ids
            .iter()
            .copied()
            .filter(|id| self.site.category_name(*id).is_some())
            .collect();

        if ids.is_empty() {
            self.site.default_category().into_iter().collect()
        } else {
            ids
        }
    }

    fn new_story(
        &self,
        story_id: &str,
        story_url: &str,
        page: StoryPage,
        discovered: &[u32],
    ) -> Story {
        let mut story = Story::new(story_id, story_url, page.title, page.author);
        story.image = page.image;
        story.categories = discovered
            .iter()
            .filter_map(|id| {
                self.site
                    .category_name(*id)
                    .map(|name| Category::new(*id, name, story_id))
            })
            .collect();
        story
    }

    /// Route the representative image through the image cache.
    async fn cache_cover(&self, story: &mut Story) {
        if story.cached_image.is_some() {
            return;
        }
        if let Some(source) = story.image.as_deref() {
            story.cached_image = self
                .site
                .cache()
                .images
                .cache_image(source)
                .await
                .map(|path| path.to_string_lossy().into_owned());
        }
    }

    /// Whether the first category's feed reports nothing newer than the
    /// cached snapshot. Any doubt counts as stale.
    async fn is_fresh(&self, story: &Story) -> bool {
        let (Some(first), Some(last_update)) = (story.categories.first(), story.last_update())
        else {
            return false;
        };

        let probe = self
            .site
            .parser()
            .staleness_probe_url(&story.url, first.category_id);
        let resource = match self.site.fetcher().head(&probe).await {
            Ok(resource) if resource.status.is_success() => resource,
            Ok(resource) => {
                log::debug!("Staleness probe {probe} returned {}", resource.status);
                return false;
            }
            Err(e) => {
                log::debug!("Staleness probe {probe} failed: {e}");
                return false;
            }
        };

        let Some(modified) = resource
            .last_modified
            .as_deref()
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
        else {
            log::debug!("Staleness probe {probe} has no usable Last-Modified");
            return false;
        };

        log::debug!("Last cached update {last_update}, feed last modified {modified}");
        modified <= last_update
    }

    async fn crawl_categories(&self, story: &mut Story) -> Result<()> {
        let paginator = CategoryPaginator::new(self.site, story);
        for category in &mut story.categories {
            paginator.get_posts(category).await?;
        }
        Ok(())
    }
}

/// Append an empty category for every discovered id the story lacks.
/// Returns how many were added.
fn reconcile(story: &mut Story, discovered: &[u32], site: &Site) -> usize {
    let mut added = 0;
    for &id in discovered {
        if story.has_category(id) {
            continue;
        }
        if let Some(name) = site.category_name(id) {
            log::info!("New category '{name}' on story {}", story.story_id);
            let category = Category::new(id, name, story.story_id.as_str());
            story.categories.push(category);
            added += 1;
        }
    }
    added
}
