//! Visual-mode collection and diffing
//!
//! Screenshots both deployments for every slug, equalizes and scores each
//! variant pair, and writes the image artifacts plus per-locale visual
//! records. A missing output directory is a configuration error and aborts
//! before any browser work starts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use tracing::info;

use exdiff_collector::{collect, Browser, PuppeteerBrowser};
use exdiff_common::{ComparisonRecord, Error, Mode, SlugSet, VisualDiffRecord};
use exdiff_compare::{VisualDiffConfig, VisualDiffer};

use super::{filter_locales, read_json, write_json, BrowserOpts};

#[derive(Args, Debug)]
pub struct VisualArgs {
    /// Slug file (locale to ordered slug list)
    #[arg(long, default_value = "compare-slugs.json")]
    pub slugs: PathBuf,

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

    /// Artifact directory
    #[arg(long, env = "VISUAL_COMPARE_OUTPUT_FOLDER")]
    pub out_dir: Option<PathBuf>,

    /// Drop records whose largest difference is at or below this percentage
    #[arg(long, default_value_t = 0.0)]
    pub threshold: f64,

    /// Results file
    #[arg(long, default_value = "compare-results.json")]
    pub out: PathBuf,

    /// Error-record output file
    #[arg(long, default_value = "compare-errors.json")]
    pub errors_out: PathBuf,
}

pub async fn execute(args: VisualArgs) -> anyhow::Result<()> {
    // Fail before any browser work if the artifact directory is unset
    let out_dir = args.out_dir.clone().ok_or_else(|| {
        Error::InvalidConfig(
            "visual mode needs an artifact directory (--out-dir or VISUAL_COMPARE_OUTPUT_FOLDER)"
                .to_string(),
        )
    })?;

    let slug_set: SlugSet = read_json(&args.slugs)?;
    let slug_set = filter_locales(slug_set, &args.locale)?;

    info!("Comparing {} and {}", args.old_url, args.new_url);

    let browser = PuppeteerBrowser::launch(args.browser.driver_config()).await?;
    let config = args.browser.collector_config(Mode::Visual);

    let mut collected: BTreeMap<String, Vec<ComparisonRecord>> = BTreeMap::new();
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
        collected.insert(locale.clone(), records);
    }
    browser.close().await?;

    // Diffing runs strictly after all collection completes
    let differ = VisualDiffer::new(VisualDiffConfig {
        out_dir,
        ..VisualDiffConfig::default()
    });

    let mut results: BTreeMap<String, Vec<VisualDiffRecord>> = BTreeMap::new();
    let mut errors: Vec<ComparisonRecord> = Vec::new();
    for (locale, records) in &collected {
        let (diffed, locale_errors) = differ.diff_records(records);
        let kept: Vec<VisualDiffRecord> = diffed
            .into_iter()
            .filter(|record| record.max_difference() > args.threshold)
            .collect();
        info!(
            "{}: {} record(s) above threshold, {} error(s)",
            locale,
            kept.len(),
            locale_errors.len()
        );
        results.insert(locale.clone(), kept);
        errors.extend(locale_errors);
    }

    write_json(&args.out, &results)?;
    write_json(&args.errors_out, &errors)
}
