//! Difference images for display
//!
//! Each output pixel is the per-channel absolute RGB difference of the
//! inputs, so unchanged areas are black. Not used for classification.

use image::{ImageFormat, Rgb, RgbImage};
use std::path::{Path, PathBuf};

use crate::common::Result;

/// Per-pixel absolute difference; `None` when the dimensions differ
pub fn difference_image(left: &RgbImage, right: &RgbImage) -> Option<RgbImage> {
    if left.dimensions() != right.dimensions() {
        return None;
    }
    let (width, height) = left.dimensions();
    Some(RgbImage::from_fn(width, height, |x, y| {
        let l = left.get_pixel(x, y);
        let r = right.get_pixel(x, y);
        Rgb([l[0].abs_diff(r[0]), l[1].abs_diff(r[1]), l[2].abs_diff(r[2])])
    }))
}

/// Write the difference of two image files to a temporary PNG
///
/// Returns `Ok(None)` when either file is missing or the sizes differ.
pub fn visualize(left: &Path, right: &Path) -> Result<Option<PathBuf>> {
    if !left.exists() || !right.exists() {
        tracing::debug!(left = %left.display(), right = %right.display(), "Nothing to visualize");
        return Ok(None);
    }

    let left_image = image::open(left)?.to_rgb8();
    let right_image = image::open(right)?.to_rgb8();
    let Some(diff) = difference_image(&left_image, &right_image) else {
        return Ok(None);
    };

    let file = tempfile::Builder::new()
        .prefix("screenshot-diff-")
        .suffix(".png")
        .tempfile()?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    diff.save_with_format(&path, ImageFormat::Png)?;

    tracing::debug!(path = %path.display(), "Difference image written");
    Ok(Some(path))
}
