// src/services/paginator.rs

//! Reader-page walking for one threadmark category.

use std::collections::HashSet;

use url::Url;

use crate::error::Result;
use crate::models::{Category, Story};
use crate::services::extractor::PostExtractor;
use crate::site::Site;

/// Walks a category's reader pages and merges every post found.
pub struct CategoryPaginator<'a> {
    site: &'a Site,
    story_id: String,
    story_url: String,
    story_author: String,
}

impl<'a> CategoryPaginator<'a> {
    pub fn new(site: &'a Site, story: &Story) -> Self {
        Self {
            site,
            story_id: story.story_id.clone(),
            story_url: story.url.clone(),
            story_author: story.author.clone(),
        }
    }

    /// First page to fetch: the last known reader page when every cached
    /// post is still rendered, otherwise the category's first page.
    pub fn start_url(&self, category: &Category) -> String {
        match category.resume_point() {
            Some(url) => url.to_string(),
            None => self
                .site
                .parser()
                .reader_url(&self.story_url, category.category_id),
        }
    }

    /// Fetch pages forward from the start URL until no "next" link remains,
    /// merging posts into `category` by id as they are extracted.
    ///
    /// Posts merged before an error stay merged and the category stays
    /// incomplete. Returns the number of pages visited.
    pub async fn get_posts(&self, category: &mut Category) -> Result<usize> {
        let extractor = PostExtractor::new(self.site, &self.story_id, &self.story_author);
        let parser = self.site.parser();
        let fetcher = self.site.fetcher();

        category.complete = false;
        let mut next = Some(self.start_url(category));
        let mut visited = HashSet::new();

        while let Some(reader_url) = next.take() {
            if !visited.insert(reader_url.clone()) {
                log::warn!("Reader page {reader_url} links back to itself, stopping");
                break;
            }

            log::debug!(
                "Fetching {} page {}: {reader_url}",
                category.name,
                visited.len()
            );
            let resource = fetcher.get_page(&reader_url).await?;
            let page_url = Url::parse(&resource.url)?;
            let page = parser.parse_reader_page(&resource.text(), &page_url);

            for fragment in &page.messages {
                if let Some(post) = extractor
                    .extract(
                        fragment,
                        category.category_id,
                        &category.name,
                        &page_url,
                        &reader_url,
                    )
                    .await
                {
                    category.merge(post);
                }
            }

            next = page.next;
        }
        category.complete = true;

        log::info!(
            "Category {} of story {}: {} posts after {} page(s)",
            category.name,
            self.story_id,
            category.posts.len(),
            visited.len()
        );
        Ok(visited.len())
    }
}
