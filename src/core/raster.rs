//! Raster helpers shared by the paginator and the build path

use image::{imageops, DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

/// Bytes per RGB pixel
pub const CHANNELS: usize = 3;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// A row of packed RGB samples is blank when every channel of every pixel
/// reaches `threshold`.
pub fn is_blank_row(row: &[u8], threshold: u8) -> bool {
    row.iter().all(|&sample| sample >= threshold)
}

/// New page filled with white
pub fn blank_page(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, WHITE)
}

/// Convert a decoded page to RGB, compositing any alpha channel over white
pub fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let (width, height) = (image.width(), image.height());
    let mut page = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut page, &image.to_rgba8(), 0, 0);
    DynamicImage::ImageRgba8(page).to_rgb8()
}

/// Rotate a paginated page into its persisted orientation.
///
/// Pages are cut wide and short (800x600 by default) and stored tall and
/// narrow (600x800), turned 90 degrees clockwise. Readers display the stored
/// image unrotated.
pub fn rotate_for_display(page: &RgbImage) -> RgbImage {
    imageops::rotate90(page)
}
