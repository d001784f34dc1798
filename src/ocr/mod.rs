//! OCR primitive used by the fallback reader.
//!
//! Tesseract runs as an external process on a binarized, upscaled crop of the
//! result display; only the digit words it returns are used.

pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::{OcrLine, TesseractEngine};
pub use extract::extract_pocket;
pub use preprocess::{crop_region, prepare_for_ocr};
pub use setup::find_tesseract;

use anyhow::Result;
use image::{ImageBuffer, Luma};

/// Black-box text recognizer over a preprocessed grayscale image.
pub trait OcrEngine {
    fn recognize(&self, img: &ImageBuffer<Luma<u8>, Vec<u8>>) -> Result<Vec<OcrLine>>;
}
