// src/pipeline/export.rs

//! Hand-off to the external e-book toolchain.
//!
//! The crawler does not convert anything itself. It lists the rendered post
//! files of a story in reading order, together with a metadata header and
//! the cover, and decides whether an existing artifact is still current.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{OutputConfig, Story};
use crate::site::Site;
use crate::storage::{LocalStore, PostCacheKey};
use crate::utils::to_valid_path;

/// Inputs of one e-book build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EbookManifest {
    pub title: String,
    pub author: String,
    pub lang: String,
    /// Cover image from the image cache
    pub cover: Option<PathBuf>,
    /// Rendered posts in reading order
    pub inputs: Vec<PathBuf>,
    /// YAML metadata header written next to the manifest
    pub metadata: PathBuf,
    /// Expected output of the toolchain
    pub artifact: PathBuf,
}

impl EbookManifest {
    /// Build the manifest of a story, or `None` when no post survives the
    /// category exclusions.
    pub fn for_story(story: &Story, site: &Site, output: &OutputConfig) -> Option<Self> {
        let mut posts: Vec<_> = story
            .categories
            .iter()
            .filter(|c| !output.excluded_categories.contains(&c.name))
            .flat_map(|c| c.posts.values())
            .collect();
        if posts.is_empty() {
            return None;
        }
        posts.sort_by(|a, b| {
            (a.posted_at, &a.post_id).cmp(&(b.posted_at, &b.post_id))
        });

        let renders = &site.cache().posts;
        let inputs = posts
            .into_iter()
            .map(|post| renders.path(&PostCacheKey::for_post(&story.story_id, post)))
            .collect();

        Some(Self {
            title: story.title.clone(),
            author: story.author.clone(),
            lang: "en-us".to_string(),
            cover: story.cached_image.as_ref().map(PathBuf::from),
            inputs,
            metadata: output.dir.join(metadata_name(&story.title)),
            artifact: output.dir.join(format!("{}.epub", to_valid_path(&story.title))),
        })
    }

    /// YAML metadata block prepended to the toolchain input.
    pub fn metadata_header(&self) -> String {
        fn quoted(s: &str) -> String {
            format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
        }

        let mut header = String::from("---\n");
        header.push_str(&format!("title: {}\n", quoted(&self.title)));
        header.push_str(&format!("author: {}\n", quoted(&self.author)));
        header.push_str(&format!("lang: {}\n", self.lang));
        if let Some(cover) = &self.cover {
            header.push_str(&format!(
                "cover-image: {}\n",
                quoted(&cover.to_string_lossy())
            ));
        }
        header.push_str("---\n");
        header
    }

    /// File name of the manifest next to the artifact.
    pub fn manifest_name(&self) -> String {
        format!("{}.manifest.json", to_valid_path(&self.title))
    }

    /// Write the metadata header and the manifest into the output
    /// directory. Returns the manifest path.
    pub async fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        let store = LocalStore::new(output_dir);
        store
            .write_bytes(&metadata_name(&self.title), self.metadata_header().as_bytes())
            .await?;

        let name = self.manifest_name();
        store.write_json(&name, self).await?;
        Ok(store.path(&name))
    }

    pub fn is_up_to_date(&self) -> bool {
        is_up_to_date(&self.artifact, &self.inputs)
    }
}

fn metadata_name(title: &str) -> String {
    format!("{}.metadata.yaml", to_valid_path(title))
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// True when the artifact exists and every input exists and is older.
pub fn is_up_to_date(artifact: &Path, inputs: &[PathBuf]) -> bool {
    let Some(built) = modified(artifact) else {
        return false;
    };
    inputs
        .iter()
        .all(|input| modified(input).is_some_and(|t| t < built))
}
