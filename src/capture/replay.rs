//! Replays previously captured frames from a directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Frame, ImageSource};
use crate::log;

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Yields every image in a directory in file-name order.
///
/// Each frame is timestamped with its file's modification time, so a replay
/// keeps the idle gaps of the original session.
pub struct DirectorySource {
    pending: VecDeque<PathBuf>,
}

impl DirectorySource {
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read frames directory {}", dir.display()))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        files.sort();

        log(&format!(
            "Replaying {} frames from {}",
            files.len(),
            dir.display()
        ));
        Ok(Self {
            pending: files.into(),
        })
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            FRAME_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

impl ImageSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        let image = image::open(&path)
            .with_context(|| format!("Failed to decode frame {}", path.display()))?
            .to_rgba8();
        let captured_at = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());

        Ok(Some(Frame { image, captured_at }))
    }
}
