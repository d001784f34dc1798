//! Digit templates for the symbol matcher.
//!
//! Each template is a grayscale reference patch of one pocket number. Quality
//! metrics are computed once at load time; patches that are nearly blank or
//! mostly ink would match anything (including empty frames) and are excluded.

use anyhow::{Context, Result};
use image::{GrayImage, ImageBuffer, Luma};
use std::fs;
use std::path::Path;

use crate::config::DetectionConfig;
use crate::roulette;

/// Acceptable range of template quality metrics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplateQuality {
    pub min_fill: f32,
    pub max_fill: f32,
    pub min_variance: f32,
}

impl TemplateQuality {
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            min_fill: config.template_min_fill,
            max_fill: config.template_max_fill,
            min_variance: config.template_min_variance,
        }
    }
}

/// A reference patch of one digit value (0-36).
#[derive(Clone, Debug)]
pub struct DetectionTemplate {
    pub digit: u8,
    pub patch: GrayImage,
    /// Fraction of ink pixels (the minority side of the mid-intensity split)
    pub fill_ratio: f32,
    /// Grayscale intensity variance
    pub variance: f32,
    pub usable: bool,
    /// Zero-mean pixel values, cached for correlation
    centered: Vec<f32>,
    norm: f32,
}

impl DetectionTemplate {
    pub fn new(digit: u8, patch: GrayImage, quality: &TemplateQuality) -> Self {
        let (mean, variance) = mean_and_variance(&patch);
        let fill_ratio = fill_ratio(&patch);
        let usable = roulette::is_pocket(digit)
            && patch.width() > 0
            && patch.height() > 0
            && fill_ratio >= quality.min_fill
            && fill_ratio <= quality.max_fill
            && variance >= quality.min_variance;

        let centered: Vec<f32> = patch.pixels().map(|p| p[0] as f32 - mean).collect();
        let norm = centered.iter().map(|v| v * v).sum::<f32>().sqrt();

        Self {
            digit,
            patch,
            fill_ratio,
            variance,
            usable,
            centered,
            norm,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.patch.dimensions()
    }

    /// Zero-mean normalized cross-correlation against a region of the same size.
    ///
    /// Returns a score in 0.0..=1.0 (anti-correlation is clamped to 0).
    pub fn correlate(&self, region: &GrayImage) -> f32 {
        if region.dimensions() != self.patch.dimensions() || self.norm == 0.0 {
            return 0.0;
        }
        let (mean, _) = mean_and_variance(region);

        let mut dot = 0.0f32;
        let mut region_sq = 0.0f32;
        for (t, p) in self.centered.iter().zip(region.pixels()) {
            let r = p[0] as f32 - mean;
            dot += t * r;
            region_sq += r * r;
        }
        if region_sq == 0.0 {
            return 0.0;
        }
        (dot / (self.norm * region_sq.sqrt())).clamp(0.0, 1.0)
    }
}

/// All loaded templates, usable or not.
#[derive(Clone, Debug, Default)]
pub struct TemplateSet {
    templates: Vec<DetectionTemplate>,
}

impl TemplateSet {
    pub fn new(templates: Vec<DetectionTemplate>) -> Self {
        Self { templates }
    }

    /// Templates that passed the quality check.
    pub fn usable(&self) -> impl Iterator<Item = &DetectionTemplate> {
        self.templates.iter().filter(|t| t.usable)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn usable_count(&self) -> usize {
        self.usable().count()
    }
}

/// Loads templates named `<digit>.png` or `<digit>_<variant>.png` from a directory.
///
/// Files with other names are skipped. Unusable templates are logged and kept
/// out of matching.
pub fn load_templates(dir: &Path, quality: &TemplateQuality) -> Result<TemplateSet> {
    let entries = fs::read_dir(dir)
        .context(format!("Failed to read template directory: {}", dir.display()))?;

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"))
        })
        .collect();
    paths.sort();

    let mut templates = Vec::new();
    for path in paths {
        let Some(digit) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_template_name)
        else {
            crate::log(&format!("Skipping template with unexpected name: {}", path.display()));
            continue;
        };

        let patch = image::open(&path)
            .context(format!("Failed to load template: {}", path.display()))?
            .to_luma8();
        let template = DetectionTemplate::new(digit, patch, quality);

        if !template.usable {
            crate::log(&format!(
                "Template {} unusable (fill={:.3}, variance={:.1})",
                path.display(),
                template.fill_ratio,
                template.variance
            ));
        }
        templates.push(template);
    }

    let set = TemplateSet::new(templates);
    if set.is_empty() {
        crate::log(&format!("Warning: no digit templates found in {}", dir.display()));
    }
    crate::log(&format!(
        "Loaded {} templates ({} usable) from {}",
        set.len(),
        set.usable_count(),
        dir.display()
    ));
    Ok(set)
}

/// "17" and "17_small" both name digit 17.
fn parse_template_name(stem: &str) -> Option<u8> {
    let digits = stem.split('_').next()?;
    if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u8>().ok().filter(|&v| roulette::is_pocket(v))
}

pub(crate) fn mean_and_variance(img: &ImageBuffer<Luma<u8>, Vec<u8>>) -> (f32, f32) {
    let count = (img.width() as usize) * (img.height() as usize);
    if count == 0 {
        return (0.0, 0.0);
    }
    let sum: f64 = img.pixels().map(|p| p[0] as f64).sum();
    let mean = sum / count as f64;
    let variance = img
        .pixels()
        .map(|p| {
            let d = p[0] as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / count as f64;
    (mean as f32, variance as f32)
}

/// Splits pixels at the midpoint of the intensity range and returns the
/// smaller side, so bright-on-dark and dark-on-bright digits compare alike.
fn fill_ratio(img: &ImageBuffer<Luma<u8>, Vec<u8>>) -> f32 {
    let count = (img.width() as usize) * (img.height() as usize);
    if count == 0 {
        return 0.0;
    }
    let (min, max) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if min == max {
        return 0.0;
    }
    let mid = (min as u16 + max as u16) / 2;
    let bright = img.pixels().filter(|p| p[0] as u16 > mid).count();
    let ratio = bright as f32 / count as f32;
    ratio.min(1.0 - ratio)
}
