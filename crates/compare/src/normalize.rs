//! Console output normalization
//!
//! The two renderer generations format console output differently: the old
//! renderer prefixes every line with a `"> "` quoting marker, and the two
//! runtimes emit different error-type prefixes (`RangeError:`, `TypeError:`,
//! ...) for the same logical error. Without rewriting both outputs to a
//! canonical form nearly every comparison would report a false divergence.
//!
//! Normalization is cosmetic only: line count and token order are preserved,
//! and applying it twice changes nothing.

use once_cell::sync::Lazy;
use regex::Regex;

use exdiff_common::Variant;

static ERROR_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w*Error:").expect("valid regex"));

/// Rewrite raw extracted console text into its canonical comparable form
pub fn normalize(raw: &str, side: Variant) -> String {
    raw.lines()
        .map(|line| {
            let line = match side {
                Variant::Old => strip_quote_marker(line),
                Variant::New => line,
            };
            canonical_error_prefix(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop the old renderer's leading quoting marker
fn strip_quote_marker(line: &str) -> &str {
    match line.strip_prefix("> ") {
        Some(rest) => rest,
        None if line == ">" => "",
        None => line,
    }
}

/// Collapse a typed error prefix to the canonical `Error:`
fn canonical_error_prefix(line: &str) -> String {
    ERROR_PREFIX.replace(line, "Error:").into_owned()
}
