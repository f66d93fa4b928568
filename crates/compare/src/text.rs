//! Text-mode diff engine
//!
//! Consumes collected records and keeps only the real divergences: both sides
//! are normalized first, slugs with known-nondeterministic output are
//! exempted, and records carrying errors are passed through on a separate
//! list instead of being diffed — an error is not a divergence, and diffing
//! error text would flood the report whenever one side is systematically
//! down.

use tracing::debug;

use exdiff_common::{ComparisonRecord, DiffRecord, DiffSide, Variant};

use crate::normalize::normalize;

/// Slugs whose example output is nondeterministic by nature (randomness- or
/// timing-based APIs); differing output for these is expected and never
/// reported.
pub const KNOWN_NONDETERMINISTIC: &[&str] = &[
    "Web/JavaScript/Reference/Global_Objects/Math/random",
    "Web/JavaScript/Reference/Global_Objects/Date/now",
    "Web/JavaScript/Reference/Global_Objects/Date/getTime",
    "Web/JavaScript/Reference/Global_Objects/Date/getMilliseconds",
    "Web/JavaScript/Reference/Global_Objects/Promise/race",
    "Web/JavaScript/Reference/Global_Objects/Promise/any",
];

/// Output of a text diff run: reported divergences in input order, plus the
/// error records passed through unchanged for separate auditing
#[derive(Debug, Clone, Default)]
pub struct TextDiffOutcome {
    pub diffs: Vec<DiffRecord>,
    pub errors: Vec<ComparisonRecord>,
}

/// Diff collected text records, reporting only normalized divergences
pub fn diff_text(records: &[ComparisonRecord], extra_allowed: &[String]) -> TextDiffOutcome {
    let mut outcome = TextDiffOutcome::default();

    for record in records {
        let (slug, locale, old, new) = match record {
            ComparisonRecord::Compared {
                slug,
                locale,
                old,
                new,
            } => (slug, locale, old, new),
            ComparisonRecord::Failed { .. } => {
                outcome.errors.push(record.clone());
                continue;
            }
        };

        // Anything that is not clean text on both sides is audited, not diffed
        let (old_text, new_text) = match (old.result.as_text(), new.result.as_text()) {
            (Some(old_text), Some(new_text)) => (old_text, new_text),
            _ => {
                outcome.errors.push(record.clone());
                continue;
            }
        };

        if is_allowed(slug, extra_allowed) {
            debug!("skipping known-nondeterministic slug {}", slug);
            continue;
        }

        let old_norm = normalize(old_text, Variant::Old);
        let new_norm = normalize(new_text, Variant::New);

        if old_norm != new_norm && !old_norm.is_empty() && !new_norm.is_empty() {
            outcome.diffs.push(DiffRecord {
                slug: slug.clone(),
                locale: locale.clone(),
                old: DiffSide {
                    url: old.url.clone(),
                    text: old_norm,
                },
                new: DiffSide {
                    url: new.url.clone(),
                    text: new_norm,
                },
            });
        }
    }

    outcome
}

fn is_allowed(slug: &str, extra: &[String]) -> bool {
    KNOWN_NONDETERMINISTIC.contains(&slug) || extra.iter().any(|s| s == slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exdiff_common::{ComparisonTarget, ExtractionResult};

    fn record(slug: &str, old_text: &str, new_text: &str) -> ComparisonRecord {
        let target = ComparisonTarget::new("http://old", "http://new", "en-US", slug);
        ComparisonRecord::compared(
            &target,
            ExtractionResult::Text {
                text: old_text.to_string(),
            },
            ExtractionResult::Text {
                text: new_text.to_string(),
            },
        )
    }

    #[test]
    fn test_identical_after_normalization_is_not_reported() {
        let records = vec![record("Web/API/Console/log", "> 5\n> 6", "5\n6")];
        let outcome = diff_text(&records, &[]);
        assert!(outcome.diffs.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_typed_error_prefixes_compare_equal() {
        let records = vec![record(
            "Web/JavaScript/Reference/Global_Objects/RangeError",
            "> RangeError: invalid",
            "InternalError: invalid",
        )];
        let outcome = diff_text(&records, &[]);
        assert!(outcome.diffs.is_empty());
    }

    #[test]
    fn test_real_divergence_is_reported_normalized() {
        let records = vec![record("Web/API/Example", "> 5", "7")];
        let outcome = diff_text(&records, &[]);
        assert_eq!(outcome.diffs.len(), 1);
        let diff = &outcome.diffs[0];
        assert_eq!(diff.slug, "Web/API/Example");
        assert_eq!(diff.old.text, "5");
        assert_eq!(diff.new.text, "7");
        assert_eq!(diff.old.url, "http://old/en-US/docs/Web/API/Example");
    }

    #[test]
    fn test_allow_listed_slug_is_never_reported() {
        let records = vec![record(
            "Web/JavaScript/Reference/Global_Objects/Math/random",
            "> 0.12345",
            "0.9876",
        )];
        let outcome = diff_text(&records, &[]);
        assert!(outcome.diffs.is_empty());
    }

    #[test]
    fn test_extra_allow_list_entries_apply() {
        let records = vec![record("Web/API/Crypto/getRandomValues", "> 1", "2")];
        let extra = vec!["Web/API/Crypto/getRandomValues".to_string()];
        assert!(diff_text(&records, &extra).diffs.is_empty());
        assert_eq!(diff_text(&records, &[]).diffs.len(), 1);
    }

    #[test]
    fn test_empty_sides_are_not_a_divergence() {
        let records = vec![
            record("Web/API/A", "", ""),
            record("Web/API/B", "", "output"),
            record("Web/API/C", "output", ""),
        ];
        let outcome = diff_text(&records, &[]);
        assert!(outcome.diffs.is_empty());
    }

    #[test]
    fn test_error_records_pass_through_undiffed() {
        let target = ComparisonTarget::new("http://old", "http://new", "en-US", "Web/API/Down");
        let side_error = ComparisonRecord::compared(
            &target,
            ExtractionResult::Error {
                message: "navigation did not settle".to_string(),
            },
            ExtractionResult::Text {
                text: "fine".to_string(),
            },
        );
        let fetch_error = ComparisonRecord::failed(&target, "context open refused");
        let clean = record("Web/API/Up", "> same", "same");

        let records = vec![side_error.clone(), fetch_error.clone(), clean];
        let outcome = diff_text(&records, &[]);

        assert!(outcome.diffs.is_empty());
        assert_eq!(outcome.errors, vec![side_error, fetch_error]);
    }
}
