//! Screenshot post-processing

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;

use crate::common::Result;

/// Prefix of screenshots taken by steps without a label
pub const AUTO_NAME_PREFIX: &str = "NO_NAME_";

/// File stem for the `index`-th unlabelled screenshot of a run
pub fn auto_name(index: u32) -> String {
    format!("{}{:05}", AUTO_NAME_PREFIX, index)
}

/// Remove `status_bar_height` rows from the top
///
/// Left untouched when the crop would leave nothing.
pub fn crop_status_bar(image: DynamicImage, status_bar_height: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if status_bar_height == 0 || status_bar_height >= height {
        return image;
    }
    image.crop_imm(0, status_bar_height, width, height - status_bar_height)
}

/// Decode a device screenshot, optionally crop it, and write it as PNG
pub fn save_screenshot(bytes: &[u8], status_bar_height: Option<u32>, path: &Path) -> Result<()> {
    let mut image = image::load_from_memory(bytes)?;
    if let Some(height) = status_bar_height {
        image = crop_status_bar(image, height);
    }
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
