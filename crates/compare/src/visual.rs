//! Visual diff engine
//!
//! Equalizes each pair of screenshots, writes the equalized images and a
//! generated diff image under deterministic slug-derived names, and scores
//! the pair by the percentage of differing pixels. Old and new must render
//! the same number of UI choice variants; a mismatch is itself a regression
//! worth surfacing and is never papered over by comparing a subset.

use std::path::{Path, PathBuf};

use image::{Pixel, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use exdiff_common::{
    ComparisonRecord, Error, ExtractionResult, Result, VariantComparison, VisualDiffRecord,
};

use crate::equalize::{decode_rgba, equalize};

/// Per-channel difference below this does not count as a differing pixel
/// (anti-aliasing, compression)
const CHANNEL_TOLERANCE: u8 = 5;

/// Configuration for the visual diff engine
#[derive(Debug, Clone)]
pub struct VisualDiffConfig {
    /// Root directory receiving per-locale image artifacts
    pub out_dir: PathBuf,

    /// Per-channel tolerance before a pixel counts as different
    pub tolerance: u8,
}

impl Default for VisualDiffConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("compare-visual"),
            tolerance: CHANNEL_TOLERANCE,
        }
    }
}

/// Diffs collected screenshot pairs and writes their artifacts
pub struct VisualDiffer {
    config: VisualDiffConfig,
}

impl VisualDiffer {
    pub fn new(config: VisualDiffConfig) -> Self {
        Self { config }
    }

    /// Diff a whole collection run. Returns the visual records in input
    /// order plus the error records passed through for separate auditing.
    pub fn diff_records(
        &self,
        records: &[ComparisonRecord],
    ) -> (Vec<VisualDiffRecord>, Vec<ComparisonRecord>) {
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for record in records {
            let (slug, locale, old, new) = match record {
                ComparisonRecord::Compared {
                    slug,
                    locale,
                    old,
                    new,
                } => (slug, locale, old, new),
                ComparisonRecord::Failed { .. } => {
                    errors.push(record.clone());
                    continue;
                }
            };

            let (old_buffers, new_buffers) = match (&old.result, &new.result) {
                (
                    ExtractionResult::Images { buffers: old },
                    ExtractionResult::Images { buffers: new },
                ) => (old, new),
                _ => {
                    errors.push(record.clone());
                    continue;
                }
            };

            match self.diff_visual(locale, slug, old_buffers, new_buffers) {
                Ok(comparisons) => results.push(VisualDiffRecord {
                    slug: slug.clone(),
                    locale: locale.clone(),
                    old_url: old.url.clone(),
                    new_url: new.url.clone(),
                    comparisons,
                }),
                Err(e) => {
                    warn!("visual diff failed for {}: {}", slug, e);
                    errors.push(ComparisonRecord::Failed {
                        slug: slug.clone(),
                        locale: locale.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        (results, errors)
    }

    /// Diff one slug's screenshot pairs, one comparison per UI choice variant
    pub fn diff_visual(
        &self,
        locale: &str,
        slug: &str,
        old: &[Vec<u8>],
        new: &[Vec<u8>],
    ) -> Result<Vec<VariantComparison>> {
        if old.len() != new.len() {
            return Err(Error::VariantCountMismatch {
                slug: slug.to_string(),
                old: old.len(),
                new: new.len(),
            });
        }

        let dir = self.config.out_dir.join(locale);
        std::fs::create_dir_all(&dir)?;
        let stem = artifact_stem(slug);

        old.iter()
            .zip(new)
            .enumerate()
            .map(|(index, (old_buf, new_buf))| {
                self.compare_variant(&dir, &stem, index, old_buf, new_buf)
            })
            .collect()
    }

    fn compare_variant(
        &self,
        dir: &Path,
        stem: &str,
        index: usize,
        old_buf: &[u8],
        new_buf: &[u8],
    ) -> Result<VariantComparison> {
        // Byte-identical captures cannot differ; one decode suffices
        let (old_img, new_img) = if old_buf == new_buf {
            let img = decode_rgba(old_buf)?;
            (img.clone(), img)
        } else {
            equalize(old_buf, new_buf)?
        };

        let (diff_img, diff_pixels) = diff_image(&old_img, &new_img, self.config.tolerance);
        let total = u64::from(old_img.width()) * u64::from(old_img.height());
        let difference = (diff_pixels as f64 / total as f64) * 100.0;

        let old_name = format!("{}-{}-old.png", stem, index);
        let new_name = format!("{}-{}-new.png", stem, index);
        let diff_name = format!("{}-{}-diff.png", stem, index);

        old_img.save(dir.join(&old_name))?;
        new_img.save(dir.join(&new_name))?;
        diff_img.save(dir.join(&diff_name))?;

        debug!(
            "variant {} of {}: {:.3}% differing pixels",
            index, stem, difference
        );

        // Paths are relative to the locale directory, where the report lives
        Ok(VariantComparison {
            difference,
            old_path: PathBuf::from(old_name),
            new_path: PathBuf::from(new_name),
            diff_path: PathBuf::from(diff_name),
        })
    }
}

/// Differing pixels are marked red, matching pixels keep a dimmed copy of
/// the original for context
fn diff_image(old: &RgbaImage, new: &RgbaImage, tolerance: u8) -> (RgbaImage, u64) {
    let (width, height) = (old.width(), old.height());
    let mut diff = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;

    for y in 0..height {
        for x in 0..width {
            let old_pixel = old.get_pixel(x, y);
            let new_pixel = new.get_pixel(x, y);

            if pixels_differ(old_pixel, new_pixel, tolerance) {
                diff_pixels += 1;
                diff.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            } else {
                let channels = old_pixel.channels();
                diff.put_pixel(
                    x,
                    y,
                    Rgba([channels[0] / 2, channels[1] / 2, channels[2] / 2, 128]),
                );
            }
        }
    }

    (diff, diff_pixels)
}

fn pixels_differ(a: &Rgba<u8>, b: &Rgba<u8>, tolerance: u8) -> bool {
    let a = a.channels();
    let b = b.channels();
    (0..4).any(|i| (i32::from(a[i]) - i32::from(b[i])).unsigned_abs() > u32::from(tolerance))
}

/// Deterministic, filesystem-safe artifact name for a slug. The short digest
/// keeps slugs unique after sanitization collapses path separators.
fn artifact_stem(slug: &str) -> String {
    let safe: String = slug
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let digest = hex::encode(Sha256::digest(slug.as_bytes()));
    format!("{}-{}", safe, &digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn png_bytes(width: u32, height: u32, pixel: Rgba<u8>) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, pixel);
        let mut buffer = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("png encoding");
        buffer.into_inner()
    }

    fn differ(dir: &Path) -> VisualDiffer {
        VisualDiffer::new(VisualDiffConfig {
            out_dir: dir.to_path_buf(),
            tolerance: CHANNEL_TOLERANCE,
        })
    }

    #[test]
    fn test_variant_count_mismatch_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let one = vec![png_bytes(4, 4, Rgba([255, 0, 0, 255]))];
        let three = vec![
            png_bytes(4, 4, Rgba([255, 0, 0, 255])),
            png_bytes(4, 4, Rgba([0, 255, 0, 255])),
            png_bytes(4, 4, Rgba([0, 0, 255, 255])),
        ];

        match differ(tmp.path()).diff_visual("en-US", "Web/CSS/gap", &one, &three) {
            Err(Error::VariantCountMismatch { old, new, .. }) => {
                assert_eq!(old, 1);
                assert_eq!(new, 3);
            }
            other => panic!("expected variant count mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_identical_buffers_score_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let shot = png_bytes(8, 8, Rgba([10, 20, 30, 255]));

        let comparisons = differ(tmp.path())
            .diff_visual("en-US", "Web/CSS/gap", &[shot.clone()], &[shot])
            .unwrap();

        assert_eq!(comparisons.len(), 1);
        assert_eq!(comparisons[0].difference, 0.0);

        // All three artifacts are written to the locale directory
        let locale_dir = tmp.path().join("en-US");
        assert!(locale_dir.join(&comparisons[0].old_path).exists());
        assert!(locale_dir.join(&comparisons[0].new_path).exists());
        assert!(locale_dir.join(&comparisons[0].diff_path).exists());
    }

    #[test]
    fn test_fully_different_buffers_score_one_hundred() {
        let tmp = tempfile::tempdir().unwrap();
        let black = png_bytes(8, 8, Rgba([0, 0, 0, 255]));
        let white = png_bytes(8, 8, Rgba([255, 255, 255, 255]));

        let comparisons = differ(tmp.path())
            .diff_visual("en-US", "Web/CSS/gap", &[black], &[white])
            .unwrap();

        assert_eq!(comparisons[0].difference, 100.0);
    }

    #[test]
    fn test_white_padding_blends_with_white_content() {
        let tmp = tempfile::tempdir().unwrap();
        // Same content where they overlap; the white padding of the smaller
        // image matches the white of the larger one
        let small = png_bytes(4, 2, Rgba([255, 255, 255, 255]));
        let large = png_bytes(4, 4, Rgba([255, 255, 255, 255]));

        let comparisons = differ(tmp.path())
            .diff_visual("en-US", "Web/CSS/gap", &[small], &[large])
            .unwrap();

        assert_eq!(comparisons[0].difference, 0.0);
    }

    #[test]
    fn test_tolerance_absorbs_antialiasing_noise() {
        let tmp = tempfile::tempdir().unwrap();
        let base = png_bytes(8, 8, Rgba([100, 100, 100, 255]));
        let nudged = png_bytes(8, 8, Rgba([103, 100, 98, 255]));

        let comparisons = differ(tmp.path())
            .diff_visual("en-US", "Web/CSS/gap", &[base], &[nudged])
            .unwrap();

        assert_eq!(comparisons[0].difference, 0.0);
    }

    #[test]
    fn test_diff_records_passes_errors_through() {
        let tmp = tempfile::tempdir().unwrap();
        let target =
            exdiff_common::ComparisonTarget::new("http://old", "http://new", "en-US", "Web/CSS/a");
        let shot = png_bytes(4, 4, Rgba([1, 2, 3, 255]));

        let ok = ComparisonRecord::compared(
            &target,
            ExtractionResult::Images {
                buffers: vec![shot.clone()],
            },
            ExtractionResult::Images {
                buffers: vec![shot],
            },
        );
        let failed = ComparisonRecord::failed(&target, "context open refused");
        let side_error = ComparisonRecord::compared(
            &target,
            ExtractionResult::Error {
                message: "surface never appeared".to_string(),
            },
            ExtractionResult::Images { buffers: vec![] },
        );

        let (results, errors) =
            differ(tmp.path()).diff_records(&[ok, failed.clone(), side_error.clone()]);

        assert_eq!(results.len(), 1);
        assert_eq!(errors, vec![failed, side_error]);
    }

    #[test]
    fn test_artifact_stem_is_deterministic_and_safe() {
        let a = artifact_stem("Web/CSS/gap");
        let b = artifact_stem("Web/CSS/gap");
        assert_eq!(a, b);
        assert!(!a.contains('/'));
        // Distinct slugs that sanitize identically stay distinct
        assert_ne!(artifact_stem("Web/CSS/gap"), artifact_stem("Web-CSS-gap"));
    }
}
