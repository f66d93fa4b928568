//! Static HTML report for visual comparisons
//!
//! One page per locale, records ranked by their largest per-variant
//! difference so the worst regressions surface first. Images are referenced
//! by relative path, so the page works from the artifact directory as-is.

use std::path::{Path, PathBuf};

use tracing::info;

use exdiff_common::{Result, VisualDiffRecord};

const STYLE: &str = r#"
    body {
      font-family: sans-serif;
    }
    h3, h4 {
      font-weight: normal;
      margin: 0 0 10px 0;
    }
    .comparison {
      margin: 0 0 20px 0;
      padding: 10px;
      background-color: #cccc;
    }
    .images {
      display: flex;
      gap: 10px;
      margin: 0 0 10px 0;
    }
"#;

/// Render the ranked report for one locale
pub fn render_report(records: &[VisualDiffRecord]) -> String {
    let mut ranked: Vec<&VisualDiffRecord> = records
        .iter()
        .filter(|record| !record.comparisons.is_empty())
        .collect();
    ranked.sort_by(|a, b| {
        b.max_difference()
            .partial_cmp(&a.max_difference())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let body: String = ranked.iter().map(|record| render_record(record)).collect();
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <style>{STYLE}</style>
</head>
<body>
{body}
  <p><small>Generated {generated}</small></p>
</body>
</html>
"#
    )
}

fn render_record(record: &VisualDiffRecord) -> String {
    let comparisons: String = record
        .comparisons
        .iter()
        .enumerate()
        .map(|(i, comparison)| {
            format!(
                r#"      <div class="images">
        <div>
          <h4><small>Example #{number}</small> <a target="_blank" href="{old_url}">Old version</a></h4>
          <img src="{old_path}" loading="lazy" alt="Old version">
        </div>
        <div>
          <h4><a target="_blank" href="{new_url}">New version</a></h4>
          <img src="{new_path}" loading="lazy" alt="New version">
        </div>
        <div>
          <h4>Difference: {difference:.3}%</h4>
          <img src="{diff_path}" loading="lazy" alt="Difference">
        </div>
      </div>
"#,
                number = i + 1,
                old_url = record.old_url,
                new_url = record.new_url,
                old_path = comparison.old_path.display(),
                new_path = comparison.new_path.display(),
                diff_path = comparison.diff_path.display(),
                difference = comparison.difference,
            )
        })
        .collect();

    format!(
        r#"    <div class="comparison">
      <h3>{slug}</h3>
{comparisons}    </div>
"#,
        slug = record.slug,
    )
}

/// Write the report for one locale into its artifact directory
pub fn write_report(
    out_dir: &Path,
    locale: &str,
    records: &[VisualDiffRecord],
) -> Result<PathBuf> {
    let dir = out_dir.join(locale);
    std::fs::create_dir_all(&dir)?;

    let path = dir.join("results.html");
    std::fs::write(&path, render_report(records))?;

    info!("report for {} written to {}", locale, path.display());
    Ok(path)
}
