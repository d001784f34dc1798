use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Rgba};

use crate::config::RelativeRect;

/// Tesseract reads small digits poorly; result displays are upscaled by this factor.
const OCR_UPSCALE: u32 = 3;

/// Converts a grayscale region to binary by keeping only bright pixels.
///
/// Pixels brighter than `threshold` become black (text), everything else
/// becomes white (background), which is the polarity Tesseract expects.
pub fn threshold_bright_pixels(
    img: &ImageBuffer<Luma<u8>, Vec<u8>>,
    threshold: u8,
) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y)[0] > threshold {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    })
}

/// Binarizes and upscales a result region for OCR.
pub fn prepare_for_ocr(
    img: &ImageBuffer<Luma<u8>, Vec<u8>>,
    threshold: u8,
) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    let binary = threshold_bright_pixels(img, threshold);
    imageops::resize(
        &binary,
        binary.width() * OCR_UPSCALE,
        binary.height() * OCR_UPSCALE,
        FilterType::Nearest,
    )
}

/// Crops a sub-region from an image using relative coordinates.
///
/// Converts the relative rect (0.0–1.0) to absolute pixel coordinates,
/// clamps to image bounds, and returns the cropped sub-image.
pub fn crop_region(
    img: &ImageBuffer<Rgba<u8>, Vec<u8>>,
    region: &RelativeRect,
) -> ImageBuffer<Rgba<u8>, Vec<u8>> {
    let (w, h) = img.dimensions();

    let x0 = ((region.x.max(0.0) * w as f32) as u32).min(w);
    let y0 = ((region.y.max(0.0) * h as f32) as u32).min(h);
    let rw = ((region.width.max(0.0) * w as f32) as u32).min(w - x0);
    let rh = ((region.height.max(0.0) * h as f32) as u32).min(h - y0);

    imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}
