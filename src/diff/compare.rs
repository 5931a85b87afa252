//! Directory-to-directory screenshot comparison

use image::RgbImage;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

use crate::runner::AUTO_NAME_PREFIX;

/// Extensions treated as images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "bmp"];

/// Fraction of pixels allowed to differ by default
pub const DEFAULT_TOLERANCE_RATE: f64 = 0.001;

/// Classification of one file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareResult {
    Same,
    Difference,
    LeftOnly,
    RightOnly,
}

impl fmt::Display for CompareResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Same => "SAME",
            Self::Difference => "DIFFERENCE",
            Self::LeftOnly => "LEFT_ONLY",
            Self::RightOnly => "RIGHT_ONLY",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparedFile {
    pub file_name: String,
    pub result: CompareResult,
}

/// Compares screenshot sets with a pixel tolerance
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    tolerance_rate: f64,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_RATE)
    }
}

/// Number of differing pixels still classified as SAME
///
/// A product that lands within rounding error of an integer counts as that
/// integer, so `0.57 * 10 * 10` tolerates 57 pixels rather than 56.
fn tolerated_pixels(rate: f64, width: u32, height: u32) -> u64 {
    let exact = rate * f64::from(width) * f64::from(height);
    let nearest = exact.round();
    let tolerance = if (exact - nearest).abs() <= nearest.abs() * 1e-12 {
        nearest
    } else {
        exact.floor()
    };
    tolerance.max(0.0) as u64
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

/// Names of the image files directly inside `dir`
fn image_file_names(dir: &Path) -> std::io::Result<HashSet<String>> {
    Ok(std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_image_file(path))
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect())
}

impl DiffEngine {
    pub fn new(tolerance_rate: f64) -> Self {
        Self { tolerance_rate }
    }

    pub fn tolerance_rate(&self) -> f64 {
        self.tolerance_rate
    }

    /// Classify every image file found in either directory, sorted by name
    ///
    /// A directory that cannot be listed yields an empty result.
    pub fn compare(&self, left_dir: &Path, right_dir: &Path, diff_only: bool, exclude_auto_named: bool) -> Vec<ComparedFile> {
        let (left, right) = match (image_file_names(left_dir), image_file_names(right_dir)) {
            (Ok(left), Ok(right)) => (left, right),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(
                    left = %left_dir.display(),
                    right = %right_dir.display(),
                    error = %e,
                    "Cannot list screenshot directories"
                );
                return Vec::new();
            }
        };

        let names: BTreeSet<&String> = left
            .iter()
            .chain(right.iter())
            .filter(|name| !(exclude_auto_named && name.starts_with(AUTO_NAME_PREFIX)))
            .collect();

        names
            .into_iter()
            .map(|name| {
                let result = match (left.contains(name), right.contains(name)) {
                    (false, _) => CompareResult::RightOnly,
                    (_, false) => CompareResult::LeftOnly,
                    _ => self.compare_files(&left_dir.join(name), &right_dir.join(name)),
                };
                ComparedFile {
                    file_name: name.clone(),
                    result,
                }
            })
            .filter(|file| !(diff_only && file.result == CompareResult::Same))
            .collect()
    }

    /// Compare two files present on both sides
    pub fn compare_files(&self, left: &Path, right: &Path) -> CompareResult {
        let (left_bytes, right_bytes) = match (std::fs::read(left), std::fs::read(right)) {
            (Ok(l), Ok(r)) => (l, r),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(left = %left.display(), error = %e, "Cannot read screenshot");
                return CompareResult::Difference;
            }
        };

        if left_bytes == right_bytes {
            return CompareResult::Same;
        }

        let decoded = image::load_from_memory(&left_bytes)
            .and_then(|l| image::load_from_memory(&right_bytes).map(|r| (l.to_rgb8(), r.to_rgb8())));
        match decoded {
            Ok((l, r)) => self.compare_images(&l, &r),
            Err(e) => {
                tracing::warn!(left = %left.display(), error = %e, "Cannot decode screenshot");
                CompareResult::Difference
            }
        }
    }

    /// Pixel comparison; a pixel differs when any RGB channel differs
    pub fn compare_images(&self, left: &RgbImage, right: &RgbImage) -> CompareResult {
        if left.dimensions() != right.dimensions() {
            return CompareResult::Difference;
        }

        let (width, height) = left.dimensions();
        let tolerance = tolerated_pixels(self.tolerance_rate, width, height);

        let mut mismatches = 0u64;
        for (l, r) in left.pixels().zip(right.pixels()) {
            if l != r {
                mismatches += 1;
                if mismatches > tolerance {
                    return CompareResult::Difference;
                }
            }
        }
        CompareResult::Same
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([10, 20, 30]))
    }

    fn with_changed_pixels(mut image: RgbImage, count: u32) -> RgbImage {
        let width = image.width();
        for i in 0..count {
            image.put_pixel(i % width, i / width, Rgb([10, 20, 31]));
        }
        image
    }

    fn write(dir: &Path, name: &str, image: &RgbImage) {
        image.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        // 4x4 at 0.25 tolerates exactly 4 pixels
        let engine = DiffEngine::new(0.25);
        let base = solid(4, 4);
        assert_eq!(
            engine.compare_images(&base, &with_changed_pixels(base.clone(), 4)),
            CompareResult::Same
        );
        assert_eq!(
            engine.compare_images(&base, &with_changed_pixels(base.clone(), 5)),
            CompareResult::Difference
        );
    }

    #[test]
    fn test_tolerance_boundary_survives_float_rounding() {
        // 0.57 * 10 * 10 evaluates to 56.99999999999999
        let engine = DiffEngine::new(0.57);
        let base = solid(10, 10);
        assert_eq!(
            engine.compare_images(&base, &with_changed_pixels(base.clone(), 57)),
            CompareResult::Same
        );
        assert_eq!(
            engine.compare_images(&base, &with_changed_pixels(base.clone(), 58)),
            CompareResult::Difference
        );
    }

    #[test]
    fn test_tolerated_pixels_floors_fractions() {
        assert_eq!(tolerated_pixels(0.001, 1080, 2400), 2592);
        assert_eq!(tolerated_pixels(0.001, 100, 100), 10);
        assert_eq!(tolerated_pixels(0.001, 30, 30), 0);
        assert_eq!(tolerated_pixels(0.0, 10, 10), 0);
    }

    #[test]
    fn test_dimension_mismatch_is_difference() {
        let engine = DiffEngine::new(1.0);
        assert_eq!(engine.compare_images(&solid(4, 4), &solid(4, 5)), CompareResult::Difference);
    }

    #[test]
    fn test_diff_only_and_left_only() {
        let left = tempfile::tempdir().unwrap();
        let right = tempfile::tempdir().unwrap();
        write(left.path(), "x.png", &solid(4, 4));
        write(right.path(), "x.png", &solid(4, 4));
        write(left.path(), "y.png", &solid(4, 4));

        let engine = DiffEngine::default();
        assert_eq!(
            engine.compare(left.path(), right.path(), true, true),
            vec![ComparedFile {
                file_name: "y.png".to_string(),
                result: CompareResult::LeftOnly
            }]
        );
    }

    #[test]
    fn test_full_listing_sorted_with_auto_named_filter() {
        let left = tempfile::tempdir().unwrap();
        let right = tempfile::tempdir().unwrap();
        write(left.path(), "b.png", &solid(4, 4));
        write(right.path(), "b.png", &with_changed_pixels(solid(4, 4), 8));
        write(right.path(), "a.PNG", &solid(4, 4));
        write(left.path(), "NO_NAME_00000.png", &solid(4, 4));
        std::fs::write(left.path().join("notes.txt"), "not an image").unwrap();
        std::fs::create_dir(left.path().join("c.png")).unwrap();

        let engine = DiffEngine::new(0.25);
        let all = engine.compare(left.path(), right.path(), false, false);
        let summary: Vec<_> = all.iter().map(|f| (f.file_name.as_str(), f.result)).collect();
        assert_eq!(
            summary,
            vec![
                ("NO_NAME_00000.png", CompareResult::LeftOnly),
                ("a.PNG", CompareResult::RightOnly),
                ("b.png", CompareResult::Difference),
            ]
        );

        let named = engine.compare(left.path(), right.path(), false, true);
        assert_eq!(named.len(), 2);
        assert_eq!(named[0].file_name, "a.PNG");
    }

    #[test]
    fn test_undecodable_files_differ() {
        let left = tempfile::tempdir().unwrap();
        let right = tempfile::tempdir().unwrap();
        std::fs::write(left.path().join("x.png"), b"garbage-1").unwrap();
        std::fs::write(right.path().join("x.png"), b"garbage-2").unwrap();
        std::fs::write(left.path().join("same.png"), b"garbage").unwrap();
        std::fs::write(right.path().join("same.png"), b"garbage").unwrap();

        let results = DiffEngine::default().compare(left.path(), right.path(), false, false);
        assert_eq!(results[0].result, CompareResult::Same);
        assert_eq!(results[1].result, CompareResult::Difference);
    }

    #[test]
    fn test_missing_directory_gives_empty_result() {
        let left = tempfile::tempdir().unwrap();
        write(left.path(), "x.png", &solid(2, 2));
        let missing = left.path().join("missing");
        assert!(DiffEngine::default().compare(left.path(), &missing, false, false).is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let file = ComparedFile {
            file_name: "y.png".to_string(),
            result: CompareResult::RightOnly,
        };
        assert_eq!(
            serde_json::to_string(&file).unwrap(),
            r#"{"fileName":"y.png","result":"RIGHT_ONLY"}"#
        );
    }
}
