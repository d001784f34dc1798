use anyhow::{anyhow, Result};
use image::{ImageBuffer, Luma};
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;
use super::OcrEngine;

/// Represents a line of OCR text with confidence score
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub words: Vec<OcrWord>,
    pub confidence: f32,
}

/// Represents a single word from OCR with confidence score
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Tesseract command-line engine restricted to digits.
pub struct TesseractEngine {
    paths: TesseractPaths,
}

impl TesseractEngine {
    pub fn new(paths: TesseractPaths) -> Self {
        Self { paths }
    }

    /// Runs Tesseract in single-line mode on a preprocessed image.
    /// Returns structured output with lines and confidence scores.
    pub fn recognize_line(&self, img: &ImageBuffer<Luma<u8>, Vec<u8>>) -> Result<Vec<OcrLine>> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())?;

        let mut command = Command::new(&self.paths.executable);
        command.arg(temp_input.path()).arg("stdout");
        if let Some(tessdata) = &self.paths.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        let output = command
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg("7") // Single text line
            .arg("-c")
            .arg("tessedit_char_whitelist=0123456789")
            .arg("tsv")
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        Ok(parse_tsv_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, img: &ImageBuffer<Luma<u8>, Vec<u8>>) -> Result<Vec<OcrLine>> {
        self.recognize_line(img)
    }
}

/// Parses Tesseract TSV output into lines of words.
///
/// TSV fields: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Only level-5 (word) rows are used.
pub fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<OcrWord> = Vec::new();

    // Skip header
    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        let text = fields[11].trim();
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        if current_key.is_some_and(|k| k != key) {
            push_line(&mut lines, std::mem::take(&mut current_words));
        }
        current_key = Some(key);

        current_words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
        });
    }
    push_line(&mut lines, current_words);

    lines
}

fn push_line(lines: &mut Vec<OcrLine>, words: Vec<OcrWord>) {
    if words.is_empty() {
        return;
    }
    let confidence = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(OcrLine {
        text,
        words,
        confidence,
    });
}
