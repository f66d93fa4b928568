//! Slug discovery over a content repository
//!
//! Searches each locale's subtree for pages embedding an interactive example
//! and reads the page's front-matter `slug`. The default locale comes from
//! the content root, translated locales from the translated-content root's
//! directory listing.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use exdiff_common::SlugSet;

use super::write_json;

#[derive(Args, Debug)]
pub struct GatherArgs {
    /// Content repository root (contains per-locale directories)
    #[arg(long, env = "CONTENT_ROOT")]
    pub content_root: PathBuf,

    /// Translated-content root; its locales are scanned too
    #[arg(long, env = "CONTENT_TRANSLATED_ROOT")]
    pub translated_root: Option<PathBuf>,

    /// Marker identifying pages with an embedded interactive example
    #[arg(long, default_value = "{{EmbedInteractiveExample")]
    pub term: String,

    /// Subtree under each locale to search
    #[arg(long, default_value = "web/javascript")]
    pub subtree: String,

    /// Output slug file
    #[arg(long, default_value = "compare-slugs.json")]
    pub out: PathBuf,
}

pub async fn execute(args: GatherArgs) -> anyhow::Result<()> {
    let mut slug_set = SlugSet::new();

    let default_dir = args.content_root.join("en-us").join(&args.subtree);
    slug_set.insert("en-US".to_string(), find_slugs(&default_dir, &args.term)?);

    if let Some(root) = &args.translated_root {
        for locale in list_locales(root)? {
            let dir = root.join(&locale).join(&args.subtree);
            if !dir.is_dir() {
                continue;
            }
            let found = find_slugs(&dir, &args.term)?;
            if !found.is_empty() {
                slug_set.insert(locale, found);
            }
        }
    }

    let total: usize = slug_set.values().map(Vec::len).sum();
    info!(
        "Found {} slugs over {} locales. Writing to {}.",
        total,
        slug_set.len(),
        args.out.display()
    );
    write_json(&args.out, &slug_set)
}

/// Locale directories under the translated-content root
fn list_locales(root: &Path) -> anyhow::Result<Vec<String>> {
    let mut locales = Vec::new();
    for entry in std::fs::read_dir(root)
        .with_context(|| format!("failed to list locales in {}", root.display()))?
    {
        let entry = entry?;
        if entry.path().is_dir() {
            locales.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    locales.sort();
    Ok(locales)
}

/// Slugs of all pages under `dir` containing `term`, in traversal order
fn find_slugs(dir: &Path, term: &str) -> anyhow::Result<Vec<String>> {
    let needle = term.to_lowercase();
    let mut slugs = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file()
            || entry.path().extension().map(|e| e != "md").unwrap_or(true)
        {
            continue;
        }

        let markdown = match std::fs::read_to_string(entry.path()) {
            Ok(markdown) => markdown,
            Err(e) => {
                warn!("skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if !markdown.to_lowercase().contains(&needle) {
            continue;
        }

        match front_matter_slug(&markdown) {
            Some(slug) => slugs.push(slug),
            None => debug!("no slug in front matter of {}", entry.path().display()),
        }
    }

    Ok(slugs)
}

/// The `slug` attribute of a page's YAML front matter
fn front_matter_slug(markdown: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct FrontMatter {
        slug: Option<String>,
    }

    let rest = markdown.strip_prefix("---")?;
    let end = rest.find("\n---")?;
    serde_yaml::from_str::<FrontMatter>(&rest[..end]).ok()?.slug
}
