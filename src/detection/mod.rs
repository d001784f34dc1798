//! Result-display detection.
//!
//! A frame is cropped to the result region, matched against the digit
//! templates, and handed to the OCR fallback only when the matcher found no
//! candidate for a reason other than a crowded region.

pub mod fallback;
pub mod matcher;
pub mod observation;
pub mod resolver;
pub mod template;

pub use fallback::{FallbackOutcome, FallbackReader};
pub use matcher::{MatchOutcome, MatchThresholds, RejectReason, SymbolMatcher};
pub use observation::{Candidate, DetectionMethod, SpinObservation};
pub use resolver::{ObservationResolver, Resolution};
pub use template::{load_templates, TemplateQuality};

use image::{imageops, RgbaImage};

use crate::config::RelativeRect;
use crate::ocr::crop_region;

pub struct Detector {
    matcher: SymbolMatcher,
    fallback: Option<FallbackReader>,
    region: RelativeRect,
}

impl Detector {
    pub fn new(
        matcher: SymbolMatcher,
        fallback: Option<FallbackReader>,
        region: RelativeRect,
    ) -> Self {
        if !matcher.has_usable_templates() {
            crate::log("Warning: no usable digit templates, every reading goes through OCR");
        }
        Self {
            matcher,
            fallback,
            region,
        }
    }

    pub fn set_thresholds(&mut self, thresholds: MatchThresholds) {
        self.matcher.set_thresholds(thresholds);
    }

    pub fn set_region(&mut self, region: RelativeRect) {
        self.region = region;
    }

    /// Reads the pocket number shown in the frame, if any.
    pub fn detect(&self, frame: &RgbaImage) -> Option<Candidate> {
        let cropped = crop_region(frame, &self.region);
        let gray = imageops::grayscale(&cropped);

        let reason = match self.matcher.match_region(&gray) {
            MatchOutcome::Accepted(candidate) => return Some(candidate),
            MatchOutcome::NoCandidate(reason) => reason,
        };

        match reason {
            RejectReason::Crowded { .. } => {
                crate::log(&format!("Ignoring frame: {}", reason));
                return None;
            }
            RejectReason::Ambiguous { .. } => {
                crate::log(&format!("Ambiguous reading: {}", reason));
            }
            _ => {}
        }

        match self.fallback.as_ref()?.read(&gray) {
            FallbackOutcome::Accepted(candidate) => Some(candidate),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackConfig;
    use crate::detection::fallback::tests::FixedOcr;
    use crate::detection::template::tests::{glyph, quality};
    use crate::detection::template::{DetectionTemplate, TemplateSet};
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use std::cell::Cell;
    use std::rc::Rc;

    fn all_templates() -> TemplateSet {
        TemplateSet::new(
            (0..=36)
                .map(|d| DetectionTemplate::new(d, glyph(d), &quality()))
                .collect(),
        )
    }

    fn frame(img: GrayImage) -> RgbaImage {
        DynamicImage::ImageLuma8(img).to_rgba8()
    }

    fn detector(templates: TemplateSet, ocr_text: Option<&'static str>) -> (Detector, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let engine = FixedOcr {
            text: ocr_text,
            calls: calls.clone(),
        };
        let fallback = FallbackReader::new(Box::new(engine), FallbackConfig::default());
        let matcher = SymbolMatcher::new(templates, MatchThresholds::default());
        (
            Detector::new(matcher, Some(fallback), RelativeRect::default()),
            calls,
        )
    }

    #[test]
    fn test_template_reading_skips_fallback() {
        let (detector, calls) = detector(all_templates(), Some("5"));
        let candidate = detector.detect(&frame(glyph(17))).unwrap();
        assert_eq!(candidate.value(), 17);
        assert_eq!(candidate.method(), DetectionMethod::Template);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_blank_frame_yields_nothing() {
        let (detector, calls) = detector(all_templates(), Some("5"));
        let blank: GrayImage = ImageBuffer::from_pixel(20, 28, Luma([25]));
        assert!(detector.detect(&frame(blank)).is_none());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_fallback_used_without_templates() {
        let (detector, calls) = detector(TemplateSet::new(Vec::new()), Some("22"));
        let candidate = detector.detect(&frame(glyph(22))).unwrap();
        assert_eq!(candidate.value(), 22);
        assert_eq!(candidate.method(), DetectionMethod::Ocr);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_no_fallback_configured() {
        let matcher = SymbolMatcher::new(TemplateSet::new(Vec::new()), MatchThresholds::default());
        let detector = Detector::new(matcher, None, RelativeRect::default());
        assert!(detector.detect(&frame(glyph(3))).is_none());
    }

    #[test]
    fn test_crowded_region_skips_fallback() {
        let (mut detector, calls) = detector(all_templates(), Some("5"));
        // Every digit clears a near-zero threshold
        detector.set_thresholds(MatchThresholds {
            acceptance_threshold: 0.0,
            ambiguity_margin: 0.10,
            max_simultaneous_hits: 5,
        });
        assert!(detector.detect(&frame(glyph(8))).is_none());
        assert_eq!(calls.get(), 0);
    }
}
