//! Frame sources for the detection pipeline.
//!
//! The bot only ever pulls frames through [`ImageSource`]; where the pixels
//! come from (a replay directory, a live capture) stays behind the trait.

pub mod replay;

pub use replay::DirectorySource;

use anyhow::Result;
use chrono::{DateTime, Local};
use image::RgbaImage;

/// One captured image of the table.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbaImage,
    pub captured_at: DateTime<Local>,
}

pub trait ImageSource {
    /// Returns the next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
