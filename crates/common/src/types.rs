//! Core types for the exdiff comparison pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Mapping from locale to its ordered slug list, as read from the slug file.
/// Slug order is discovery order and is preserved through the pipeline.
pub type SlugSet = BTreeMap<String, Vec<String>>;

/// The two renderer generations being compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Old,
    New,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Old => write!(f, "old"),
            Variant::New => write!(f, "new"),
        }
    }
}

/// What the extractor captures from a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Text,
    Visual,
}

/// One (locale, slug) pair resolved against both deployment origins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonTarget {
    pub slug: String,
    pub locale: String,
    pub old_url: String,
    pub new_url: String,
}

impl ComparisonTarget {
    pub fn new(old_origin: &str, new_origin: &str, locale: &str, slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            locale: locale.to_string(),
            old_url: docs_url(old_origin, locale, slug),
            new_url: docs_url(new_origin, locale, slug),
        }
    }
}

/// Join an origin, locale and slug into a page URL
fn docs_url(origin: &str, locale: &str, slug: &str) -> String {
    format!("{}/{}/docs/{}", origin.trim_end_matches('/'), locale, slug)
}

/// What one side of a comparison yielded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionResult {
    /// Console output of a text-mode example
    Text { text: String },

    /// One screenshot per UI choice variant discovered on the page
    Images { buffers: Vec<Vec<u8>> },

    /// A terminal, recorded failure. Never silently dropped.
    Error { message: String },
}

impl ExtractionResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ExtractionResult::Error { .. })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ExtractionResult::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// One side (old or new) of a completed comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideResult {
    pub url: String,
    pub result: ExtractionResult,
}

/// Outcome of one comparison target. Exactly one of the two shapes is
/// produced per target; `collect` never drops a target or mixes shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComparisonRecord {
    Compared {
        slug: String,
        locale: String,
        old: SideResult,
        new: SideResult,
    },
    Failed {
        slug: String,
        locale: String,
        error: String,
    },
}

impl ComparisonRecord {
    pub fn compared(target: &ComparisonTarget, old: ExtractionResult, new: ExtractionResult) -> Self {
        ComparisonRecord::Compared {
            slug: target.slug.clone(),
            locale: target.locale.clone(),
            old: SideResult {
                url: target.old_url.clone(),
                result: old,
            },
            new: SideResult {
                url: target.new_url.clone(),
                result: new,
            },
        }
    }

    pub fn failed(target: &ComparisonTarget, error: impl Into<String>) -> Self {
        ComparisonRecord::Failed {
            slug: target.slug.clone(),
            locale: target.locale.clone(),
            error: error.into(),
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            ComparisonRecord::Compared { slug, .. } | ComparisonRecord::Failed { slug, .. } => slug,
        }
    }

    pub fn locale(&self) -> &str {
        match self {
            ComparisonRecord::Compared { locale, .. } | ComparisonRecord::Failed { locale, .. } => {
                locale
            }
        }
    }
}

/// One side of a reported text divergence, holding normalized output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSide {
    pub url: String,
    pub text: String,
}

/// A reported text divergence between the old and new rendering of a slug
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRecord {
    pub slug: String,
    pub locale: String,
    pub old: DiffSide,
    pub new: DiffSide,
}

/// Pixel comparison of one UI choice variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantComparison {
    /// Percentage of pixels that differ after equalization (0 = identical)
    pub difference: f64,
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    pub diff_path: PathBuf,
}

/// Visual comparison outcome for one slug, one entry per UI choice variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualDiffRecord {
    pub slug: String,
    pub locale: String,
    pub old_url: String,
    pub new_url: String,
    pub comparisons: Vec<VariantComparison>,
}

impl VisualDiffRecord {
    /// Largest per-variant difference, used for report ranking
    pub fn max_difference(&self) -> f64 {
        self.comparisons
            .iter()
            .map(|c| c.difference)
            .fold(0.0, f64::max)
    }
}
