//! CLI subcommands

pub mod diff;
pub mod fetch;
pub mod gather;
pub mod report;
pub mod visual;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use exdiff_collector::{BrowserKind, CollectorConfig, DriverConfig, ExtractorConfig, RetryPolicy};
use exdiff_common::{Mode, SlugSet};

/// Browser and batching knobs shared by the collecting subcommands
#[derive(Args, Debug, Clone)]
pub struct BrowserOpts {
    /// Concurrent targets per batch
    #[arg(long, default_value_t = 6)]
    pub concurrency: usize,

    /// Run the browser headless
    #[arg(long, default_value = "true")]
    pub headless: bool,

    /// Browser engine (chrome, firefox)
    #[arg(long, default_value = "chrome")]
    pub browser: String,

    /// Navigation timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub nav_timeout_secs: u64,

    /// Settle delay before screenshots, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub settle_ms: u64,
}

impl BrowserOpts {
    pub fn driver_config(&self) -> DriverConfig {
        let browser = match self.browser.as_str() {
            "firefox" => BrowserKind::Firefox,
            _ => BrowserKind::Chrome,
        };
        DriverConfig {
            browser,
            headless: self.headless,
            default_timeout: Duration::from_secs(self.nav_timeout_secs),
            ..DriverConfig::default()
        }
    }

    pub fn collector_config(&self, mode: Mode) -> CollectorConfig {
        CollectorConfig {
            concurrency: self.concurrency,
            mode,
            extractor: ExtractorConfig {
                nav_timeout: Duration::from_secs(self.nav_timeout_secs),
                wait_timeout: Duration::from_secs(self.nav_timeout_secs),
                settle: Duration::from_millis(self.settle_ms),
                retry: RetryPolicy::default(),
            },
        }
    }
}

/// Read a JSON file into a typed value
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

/// Write a value as pretty-printed JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Restrict a slug set to one locale, or keep all
pub fn filter_locales(slug_set: SlugSet, locale: &str) -> anyhow::Result<SlugSet> {
    if locale == "all" {
        return Ok(slug_set);
    }
    match slug_set.get(locale) {
        Some(slugs) => Ok(SlugSet::from([(locale.to_string(), slugs.clone())])),
        None => anyhow::bail!("locale {} not present in the slug file", locale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_locales_keeps_all() {
        let set = SlugSet::from([
            ("en-US".to_string(), vec!["a".to_string()]),
            ("fr".to_string(), vec!["b".to_string()]),
        ]);
        assert_eq!(filter_locales(set.clone(), "all").unwrap(), set);
    }

    #[test]
    fn test_filter_locales_selects_one() {
        let set = SlugSet::from([
            ("en-US".to_string(), vec!["a".to_string()]),
            ("fr".to_string(), vec!["b".to_string()]),
        ]);
        let filtered = filter_locales(set, "fr").unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered["fr"], vec!["b".to_string()]);
    }

    #[test]
    fn test_filter_locales_rejects_unknown() {
        let set = SlugSet::from([("en-US".to_string(), vec!["a".to_string()])]);
        assert!(filter_locales(set, "de").is_err());
    }
}
