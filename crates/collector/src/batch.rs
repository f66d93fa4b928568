//! Batched collection of comparison records
//!
//! Targets are processed in fixed-size batches: all members of one batch run
//! concurrently, the next batch starts only when the previous one has fully
//! completed. Each member owns an isolated browsing context for its lifetime,
//! so the old and new runs of the same slug cannot contaminate each other and
//! parallel slugs cannot interfere. The browser itself is a finite, stateful
//! resource shared by every batch of one run.

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use exdiff_common::{ComparisonRecord, ComparisonTarget, Mode, Variant};

use crate::driver::Browser;
use crate::extract::{Extractor, ExtractorConfig};

/// Configuration for a collection run
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Batch size; members of a batch run concurrently
    pub concurrency: usize,

    /// What to capture from each page
    pub mode: Mode,

    /// Extraction tuning shared by all targets
    pub extractor: ExtractorConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            concurrency: 6,
            mode: Mode::Text,
            extractor: ExtractorConfig::default(),
        }
    }
}

/// Collect one record per slug, preserving slug order in the result.
///
/// Every target yields exactly one record: a completed comparison, or the
/// error shape when its browsing context could not be obtained. Per-target
/// failures never abort the run.
pub async fn collect(
    browser: &dyn Browser,
    config: &CollectorConfig,
    old_origin: &str,
    new_origin: &str,
    locale: &str,
    slugs: &[String],
) -> Vec<ComparisonRecord> {
    let targets: Vec<ComparisonTarget> = slugs
        .iter()
        .map(|slug| ComparisonTarget::new(old_origin, new_origin, locale, slug))
        .collect();

    let batch_size = config.concurrency.max(1);
    let batch_count = targets.len().div_ceil(batch_size);
    let extractor = Extractor::new(config.extractor.clone());

    let mut records = Vec::with_capacity(targets.len());
    for (index, batch) in targets.chunks(batch_size).enumerate() {
        info!(
            "batch {}/{}: {} target(s) in {}",
            index + 1,
            batch_count,
            batch.len(),
            locale
        );
        let members = batch
            .iter()
            .map(|target| fetch_one(browser, &extractor, config.mode, target));
        // Positional assembly: completion order within the batch is irrelevant
        records.extend(join_all(members).await);
    }

    records
}

/// Fetch both sides of one target inside its own browsing context
async fn fetch_one(
    browser: &dyn Browser,
    extractor: &Extractor,
    mode: Mode,
    target: &ComparisonTarget,
) -> ComparisonRecord {
    let mut page = match browser.open_context().await {
        Ok(page) => page,
        Err(e) => {
            error!("could not open context for {}: {}", target.slug, e);
            return ComparisonRecord::failed(target, e.to_string());
        }
    };

    let old = extractor
        .extract(page.as_mut(), &target.old_url, Variant::Old, mode)
        .await;
    let new = extractor
        .extract(page.as_mut(), &target.new_url, Variant::New, mode)
        .await;

    // Release the context no matter how extraction went
    if let Err(e) = page.close().await {
        warn!("failed to close context for {}: {}", target.slug, e);
    }

    debug!("collected {} ({})", target.slug, target.locale);
    ComparisonRecord::compared(target, old, new)
}
