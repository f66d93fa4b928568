//! Text-mode collection
//!
//! Drives both deployments for every slug in the slug file and records the
//! console output of each side. The raw records, including per-slug errors,
//! go to the results file consumed by `diff`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use tracing::info;

use exdiff_collector::{collect, Browser, PuppeteerBrowser};
use exdiff_common::{ComparisonRecord, DiffRecord, Mode, SlugSet};

use super::{filter_locales, read_json, write_json, BrowserOpts};

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Slug file (locale to ordered slug list)
    #[arg(long, default_value = "compare-slugs.json")]
    pub slugs: PathBuf,

    /// Derive the slug set from a previous diff output instead
    #[arg(long)]
    pub from_diff: Option<PathBuf>,

    /// Old deployment origin
    #[arg(long, env = "OLD_URL")]
    pub old_url: String,

    /// New deployment origin
    #[arg(long, env = "NEW_URL")]
    pub new_url: String,

    /// Locale to compare, or "all"
    #[arg(long, default_value = "all")]
    pub locale: String,

    #[command(flatten)]
    pub browser: BrowserOpts,

    /// Output file
    #[arg(long, default_value = "compare-results.json")]
    pub out: PathBuf,
}

pub async fn execute(args: FetchArgs) -> anyhow::Result<()> {
    let slug_set = match &args.from_diff {
        Some(path) => slugs_from_diff(&read_json::<Vec<DiffRecord>>(path)?),
        None => read_json(&args.slugs)?,
    };
    let slug_set = filter_locales(slug_set, &args.locale)?;

    info!("Comparing {} and {}", args.old_url, args.new_url);

    let browser = PuppeteerBrowser::launch(args.browser.driver_config()).await?;
    let config = args.browser.collector_config(Mode::Text);

    let mut results: BTreeMap<String, Vec<ComparisonRecord>> = BTreeMap::new();
    for (locale, slugs) in &slug_set {
        info!("collecting {} slug(s) for {}", slugs.len(), locale);
        let records = collect(
            &browser,
            &config,
            &args.old_url,
            &args.new_url,
            locale,
            slugs,
        )
        .await;
        results.insert(locale.clone(), records);
    }
    browser.close().await?;

    write_json(&args.out, &results)
}

/// Re-fetch flow: the slugs of a previous diff output, grouped per locale in
/// their reported order
fn slugs_from_diff(diffs: &[DiffRecord]) -> SlugSet {
    let mut slug_set = SlugSet::new();
    for diff in diffs {
        slug_set
            .entry(diff.locale.clone())
            .or_default()
            .push(diff.slug.clone());
    }
    slug_set
}
