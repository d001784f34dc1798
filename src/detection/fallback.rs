//! OCR fallback for regions the template matcher could not read.
//!
//! An emptiness pre-check keeps blank frames away from OCR, and a stricter
//! post-check on the same region discards values read from near-blank input.

use image::{GrayImage, ImageBuffer, Luma};

use crate::config::{EmptinessThresholds, FallbackConfig};
use crate::detection::observation::{Candidate, DetectionMethod};
use crate::detection::template::mean_and_variance;
use crate::ocr::{extract_pocket, prepare_for_ocr, OcrEngine};

/// Neighbouring pixels differing by more than this sit on an edge.
const EDGE_STEP: u8 = 48;

/// Two independent emptiness signals of a region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionMetrics {
    pub variance: f32,
    pub edge_density: f32,
}

pub fn region_metrics(img: &ImageBuffer<Luma<u8>, Vec<u8>>) -> RegionMetrics {
    let (w, h) = img.dimensions();
    let count = (w as usize) * (h as usize);
    if count == 0 {
        return RegionMetrics {
            variance: 0.0,
            edge_density: 0.0,
        };
    }
    let (_, variance) = mean_and_variance(img);

    let mut edges = 0usize;
    for y in 0..h {
        for x in 0..w {
            let p = img.get_pixel(x, y)[0];
            let right = (x + 1 < w).then(|| img.get_pixel(x + 1, y)[0].abs_diff(p));
            let down = (y + 1 < h).then(|| img.get_pixel(x, y + 1)[0].abs_diff(p));
            if right.max(down).is_some_and(|d| d > EDGE_STEP) {
                edges += 1;
            }
        }
    }

    RegionMetrics {
        variance,
        edge_density: edges as f32 / count as f32,
    }
}

/// Conservative: empty only when both signals are low.
pub fn is_likely_empty(metrics: &RegionMetrics, thresholds: &EmptinessThresholds) -> bool {
    metrics.variance < thresholds.min_variance && metrics.edge_density < thresholds.min_edge_density
}

/// Strict: passes only when both signals clear their thresholds.
pub fn passes_postcheck(metrics: &RegionMetrics, thresholds: &EmptinessThresholds) -> bool {
    metrics.variance >= thresholds.min_variance && metrics.edge_density >= thresholds.min_edge_density
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FallbackOutcome {
    /// Pre-check judged the region blank; OCR was not run
    LikelyEmpty,
    /// OCR ran but produced no single pocket number
    Unreadable,
    /// OCR read a value but the region failed the strict post-check
    RejectedByPostcheck(u8),
    Accepted(Candidate),
}

pub struct FallbackReader {
    engine: Box<dyn OcrEngine>,
    config: FallbackConfig,
}

impl FallbackReader {
    pub fn new(engine: Box<dyn OcrEngine>, config: FallbackConfig) -> Self {
        Self { engine, config }
    }

    pub fn read(&self, region: &GrayImage) -> FallbackOutcome {
        let metrics = region_metrics(region);
        if is_likely_empty(&metrics, &self.config.precheck) {
            return FallbackOutcome::LikelyEmpty;
        }

        let prepared = prepare_for_ocr(region, self.config.binarize_threshold);
        let lines = match self.engine.recognize(&prepared) {
            Ok(lines) => lines,
            Err(e) => {
                crate::log(&format!("Fallback OCR failed: {}", e));
                return FallbackOutcome::Unreadable;
            }
        };

        let Some(value) = extract_pocket(&lines, self.config.min_word_confidence) else {
            return FallbackOutcome::Unreadable;
        };

        if !passes_postcheck(&metrics, &self.config.postcheck) {
            crate::log(&format!(
                "Fallback OCR read {} but region looks blank (variance={:.1}, edges={:.3}), discarded",
                value, metrics.variance, metrics.edge_density
            ));
            return FallbackOutcome::RejectedByPostcheck(value);
        }

        match Candidate::new(value, self.config.ocr_confidence, DetectionMethod::Ocr) {
            Some(candidate) => {
                crate::log(&format!(
                    "Fallback OCR read {} (confidence {:.2})",
                    candidate.value(),
                    candidate.confidence()
                ));
                FallbackOutcome::Accepted(candidate)
            }
            None => FallbackOutcome::Unreadable,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::detection::template::tests::glyph;
    use crate::ocr::engine::{OcrLine, OcrWord};
    use anyhow::{anyhow, Result};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Returns a fixed text and counts calls.
    pub(crate) struct FixedOcr {
        pub text: Option<&'static str>,
        pub calls: Rc<Cell<u32>>,
    }

    impl OcrEngine for FixedOcr {
        fn recognize(&self, _img: &ImageBuffer<Luma<u8>, Vec<u8>>) -> Result<Vec<OcrLine>> {
            self.calls.set(self.calls.get() + 1);
            let text = self.text.ok_or_else(|| anyhow!("engine unavailable"))?;
            Ok(vec![OcrLine {
                text: text.to_string(),
                words: vec![OcrWord {
                    text: text.to_string(),
                    confidence: 95.0,
                }],
                confidence: 95.0,
            }])
        }
    }

    fn reader(text: Option<&'static str>) -> (FallbackReader, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let engine = FixedOcr {
            text,
            calls: calls.clone(),
        };
        (FallbackReader::new(Box::new(engine), FallbackConfig::default()), calls)
    }

    #[test]
    fn test_blank_region_skips_ocr() {
        let (reader, calls) = reader(Some("17"));
        let blank: GrayImage = ImageBuffer::from_pixel(40, 30, Luma([30]));
        assert_eq!(reader.read(&blank), FallbackOutcome::LikelyEmpty);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_textured_region_accepted_with_low_confidence() {
        let (reader, calls) = reader(Some("17"));
        match reader.read(&glyph(17)) {
            FallbackOutcome::Accepted(c) => {
                assert_eq!(c.value(), 17);
                assert_eq!(c.method(), DetectionMethod::Ocr);
                assert!((c.confidence() - 0.5).abs() < 1e-6);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_faint_region_fails_postcheck() {
        // Faint texture: passes the conservative pre-check, fails the strict post-check
        let faint: GrayImage =
            ImageBuffer::from_fn(40, 30, |x, y| Luma([if (x / 4 + y / 4) % 2 == 0 { 60 } else { 80 }]));
        let metrics = region_metrics(&faint);
        let config = FallbackConfig::default();
        assert!(!is_likely_empty(&metrics, &config.precheck), "{:?}", metrics);
        assert!(!passes_postcheck(&metrics, &config.postcheck));

        let (reader, calls) = reader(Some("8"));
        assert_eq!(reader.read(&faint), FallbackOutcome::RejectedByPostcheck(8));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_engine_error_is_unreadable() {
        let (reader, _) = reader(None);
        assert_eq!(reader.read(&glyph(4)), FallbackOutcome::Unreadable);
    }

    #[test]
    fn test_non_numeric_text_is_unreadable() {
        let (reader, _) = reader(Some("RED"));
        assert_eq!(reader.read(&glyph(4)), FallbackOutcome::Unreadable);
    }

    #[test]
    fn test_region_metrics() {
        let flat: GrayImage = ImageBuffer::from_pixel(10, 10, Luma([100]));
        let m = region_metrics(&flat);
        assert_eq!(m.variance, 0.0);
        assert_eq!(m.edge_density, 0.0);

        let stripes: GrayImage =
            ImageBuffer::from_fn(10, 10, |x, _| Luma([if x % 2 == 0 { 0 } else { 255 }]));
        let m = region_metrics(&stripes);
        assert!(m.variance > 10000.0);
        assert!(m.edge_density > 0.8);
    }
}
