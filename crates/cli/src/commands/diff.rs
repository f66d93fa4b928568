//! Text-mode diff reporting
//!
//! Reads the collection output and writes the divergence list. Error records
//! are not divergences; they land in their own file for separate auditing.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use tracing::{info, warn};

use exdiff_common::{ComparisonRecord, DiffRecord};

use super::{read_json, write_json};

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Collection output to diff
    #[arg(long, default_value = "compare-results.json")]
    pub results: PathBuf,

    /// Divergence output file
    #[arg(long, default_value = "compare-diffs.json")]
    pub out: PathBuf,

    /// Error-record output file
    #[arg(long, default_value = "compare-errors.json")]
    pub errors_out: PathBuf,

    /// Additional slugs to exempt from reporting
    #[arg(long)]
    pub allow: Vec<String>,
}

pub async fn execute(args: DiffArgs) -> anyhow::Result<()> {
    let results: BTreeMap<String, Vec<ComparisonRecord>> = read_json(&args.results)?;

    let mut diffs: Vec<DiffRecord> = Vec::new();
    let mut errors: Vec<ComparisonRecord> = Vec::new();
    for records in results.values() {
        let outcome = exdiff_compare::diff_text(records, &args.allow);
        diffs.extend(outcome.diffs);
        errors.extend(outcome.errors);
    }

    info!(
        "{} divergence(s), {} error record(s)",
        diffs.len(),
        errors.len()
    );
    if !errors.is_empty() {
        warn!(
            "{} record(s) carried errors and were not diffed; see {}",
            errors.len(),
            args.errors_out.display()
        );
    }

    write_json(&args.out, &diffs)?;
    write_json(&args.errors_out, &errors)
}
