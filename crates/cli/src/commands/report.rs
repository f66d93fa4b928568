//! HTML report rendering for visual results

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;

use exdiff_common::{Error, VisualDiffRecord};
use exdiff_compare::write_report;

use super::read_json;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Visual results file
    #[arg(long, default_value = "compare-results.json")]
    pub results: PathBuf,

    /// Artifact directory the report is written into
    #[arg(long, env = "VISUAL_COMPARE_OUTPUT_FOLDER")]
    pub out_dir: Option<PathBuf>,
}

pub async fn execute(args: ReportArgs) -> anyhow::Result<()> {
    let out_dir = args.out_dir.clone().ok_or_else(|| {
        Error::InvalidConfig(
            "report needs the artifact directory (--out-dir or VISUAL_COMPARE_OUTPUT_FOLDER)"
                .to_string(),
        )
    })?;

    let results: BTreeMap<String, Vec<VisualDiffRecord>> = read_json(&args.results)?;
    for (locale, records) in &results {
        write_report(&out_dir, locale, records)?;
    }

    Ok(())
}
