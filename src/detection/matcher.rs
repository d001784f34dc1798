//! Template symbol matcher with ambiguity rejection.
//!
//! A reading is accepted only when the best digit clears the acceptance
//! threshold AND leads the runner-up digit by the ambiguity margin. Regions
//! where many digits clear the threshold at once (the betting grid, a history
//! strip) are rejected outright.

use image::imageops::{self, FilterType};
use image::GrayImage;
use std::collections::HashMap;

use crate::config::BotConfig;
use crate::detection::observation::{Candidate, DetectionMethod};
use crate::detection::template::TemplateSet;

/// Acceptance rules for template scores.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchThresholds {
    pub acceptance_threshold: f32,
    pub ambiguity_margin: f32,
    pub max_simultaneous_hits: usize,
}

impl MatchThresholds {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            acceptance_threshold: config.acceptance_threshold,
            ambiguity_margin: config.ambiguity_margin,
            max_simultaneous_hits: config.detection.max_simultaneous_hits,
        }
    }
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.75,
            ambiguity_margin: 0.10,
            max_simultaneous_hits: 5,
        }
    }
}

/// Best score of one digit over all of its template variants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DigitScore {
    pub digit: u8,
    pub score: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RejectReason {
    NoUsableTemplates,
    BelowThreshold { best: f32 },
    Ambiguous { best: DigitScore, second: DigitScore },
    Crowded { hits: usize },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NoUsableTemplates => write!(f, "no usable templates"),
            RejectReason::BelowThreshold { best } => write!(f, "best score {:.3} below threshold", best),
            RejectReason::Ambiguous { best, second } => write!(
                f,
                "{} ({:.3}) too close to {} ({:.3})",
                best.digit, best.score, second.digit, second.score
            ),
            RejectReason::Crowded { hits } => write!(f, "{} digits matched at once", hits),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MatchOutcome {
    Accepted(Candidate),
    NoCandidate(RejectReason),
}

pub struct SymbolMatcher {
    templates: TemplateSet,
    thresholds: MatchThresholds,
}

impl SymbolMatcher {
    pub fn new(templates: TemplateSet, thresholds: MatchThresholds) -> Self {
        Self {
            templates,
            thresholds,
        }
    }

    pub fn set_thresholds(&mut self, thresholds: MatchThresholds) {
        self.thresholds = thresholds;
    }

    pub fn has_usable_templates(&self) -> bool {
        self.templates.usable_count() > 0
    }

    /// Scores every usable template against the region, best per digit, highest first.
    pub fn score_region(&self, region: &GrayImage) -> Vec<DigitScore> {
        let mut best: HashMap<u8, f32> = HashMap::new();
        let mut resized: HashMap<(u32, u32), GrayImage> = HashMap::new();

        if region.width() == 0 || region.height() == 0 {
            return Vec::new();
        }

        for template in self.templates.usable() {
            let dims = template.dimensions();
            let sample = if region.dimensions() == dims {
                region
            } else {
                &*resized
                    .entry(dims)
                    .or_insert_with(|| imageops::resize(region, dims.0, dims.1, FilterType::Triangle))
            };
            let score = template.correlate(sample);
            let entry = best.entry(template.digit).or_insert(0.0);
            if score > *entry {
                *entry = score;
            }
        }

        let mut scores: Vec<DigitScore> = best
            .into_iter()
            .map(|(digit, score)| DigitScore { digit, score })
            .collect();
        scores.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.digit.cmp(&b.digit)));
        scores
    }

    pub fn match_region(&self, region: &GrayImage) -> MatchOutcome {
        evaluate_scores(&self.score_region(region), &self.thresholds)
    }
}

/// Applies the acceptance rules to per-digit scores sorted highest first.
pub fn evaluate_scores(scores: &[DigitScore], thresholds: &MatchThresholds) -> MatchOutcome {
    let Some(&best) = scores.first() else {
        return MatchOutcome::NoCandidate(RejectReason::NoUsableTemplates);
    };

    let hits = scores
        .iter()
        .filter(|s| s.score >= thresholds.acceptance_threshold)
        .count();
    if hits > thresholds.max_simultaneous_hits {
        return MatchOutcome::NoCandidate(RejectReason::Crowded { hits });
    }

    if best.score < thresholds.acceptance_threshold {
        return MatchOutcome::NoCandidate(RejectReason::BelowThreshold { best: best.score });
    }

    let second = scores.get(1).copied().unwrap_or(DigitScore {
        digit: best.digit,
        score: 0.0,
    });
    if best.score - second.score < thresholds.ambiguity_margin {
        return MatchOutcome::NoCandidate(RejectReason::Ambiguous { best, second });
    }

    match Candidate::new(best.digit, best.score, DetectionMethod::Template) {
        Some(candidate) => MatchOutcome::Accepted(candidate),
        None => MatchOutcome::NoCandidate(RejectReason::NoUsableTemplates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::template::tests::{glyph, quality};
    use crate::detection::template::DetectionTemplate;
    use image::{ImageBuffer, Luma};

    fn scores(pairs: &[(u8, f32)]) -> Vec<DigitScore> {
        pairs
            .iter()
            .map(|&(digit, score)| DigitScore { digit, score })
            .collect()
    }

    fn matcher(digits: &[u8]) -> SymbolMatcher {
        let templates = digits
            .iter()
            .map(|&d| DetectionTemplate::new(d, glyph(d), &quality()))
            .collect();
        SymbolMatcher::new(TemplateSet::new(templates), MatchThresholds::default())
    }

    #[test]
    fn test_clear_winner_accepted() {
        let outcome = evaluate_scores(&scores(&[(17, 0.93), (11, 0.60)]), &MatchThresholds::default());
        match outcome {
            MatchOutcome::Accepted(c) => {
                assert_eq!(c.value(), 17);
                assert_eq!(c.method(), DetectionMethod::Template);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_near_tie_rejected_regardless_of_score() {
        let t = MatchThresholds::default();
        for (a, b) in [(0.99, 0.95), (0.90, 0.85), (0.80, 0.78), (1.0, 0.91)] {
            let outcome = evaluate_scores(&scores(&[(6, a), (8, b)]), &t);
            assert!(
                matches!(outcome, MatchOutcome::NoCandidate(RejectReason::Ambiguous { .. })),
                "{} vs {} should be ambiguous",
                a,
                b
            );
        }
    }

    #[test]
    fn test_below_threshold_rejected() {
        let outcome = evaluate_scores(&scores(&[(3, 0.70), (5, 0.20)]), &MatchThresholds::default());
        assert!(matches!(
            outcome,
            MatchOutcome::NoCandidate(RejectReason::BelowThreshold { .. })
        ));
    }

    #[test]
    fn test_crowded_region_rejected() {
        let pairs: Vec<(u8, f32)> = (1..=6).map(|d| (d, 0.99 - d as f32 * 0.001)).collect();
        let outcome = evaluate_scores(&scores(&pairs), &MatchThresholds::default());
        assert_eq!(outcome, MatchOutcome::NoCandidate(RejectReason::Crowded { hits: 6 }));

        // Exactly five hits is still judged on threshold and margin
        let outcome = evaluate_scores(&scores(&pairs[..5]), &MatchThresholds::default());
        assert!(matches!(
            outcome,
            MatchOutcome::NoCandidate(RejectReason::Ambiguous { .. })
        ));
    }

    #[test]
    fn test_single_template_needs_only_threshold() {
        let outcome = evaluate_scores(&scores(&[(9, 0.80)]), &MatchThresholds::default());
        assert!(matches!(outcome, MatchOutcome::Accepted(_)));
    }

    #[test]
    fn test_no_templates() {
        let outcome = evaluate_scores(&[], &MatchThresholds::default());
        assert_eq!(outcome, MatchOutcome::NoCandidate(RejectReason::NoUsableTemplates));
    }

    #[test]
    fn test_match_region_reads_digit() {
        let m = matcher(&[3, 12, 25, 0]);
        match m.match_region(&glyph(12)) {
            MatchOutcome::Accepted(c) => assert_eq!(c.value(), 12),
            other => panic!("expected 12, got {:?}", other),
        }
    }

    #[test]
    fn test_match_region_resizes_larger_capture() {
        let m = matcher(&[3, 12, 25]);
        let big = imageops::resize(&glyph(25), 40, 56, FilterType::Nearest);
        match m.match_region(&big) {
            MatchOutcome::Accepted(c) => assert_eq!(c.value(), 25),
            other => panic!("expected 25, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_region_not_accepted() {
        let m = matcher(&[3, 12, 25]);
        let blank: GrayImage = ImageBuffer::from_pixel(20, 28, Luma([40]));
        assert!(matches!(m.match_region(&blank), MatchOutcome::NoCandidate(_)));
    }

    #[test]
    fn test_variants_scored_per_digit() {
        // Two identical variants of the same digit must not make it ambiguous with itself
        let templates = vec![
            DetectionTemplate::new(7, glyph(7), &quality()),
            DetectionTemplate::new(7, glyph(7), &quality()),
            DetectionTemplate::new(30, glyph(30), &quality()),
        ];
        let m = SymbolMatcher::new(TemplateSet::new(templates), MatchThresholds::default());
        let scores = m.score_region(&glyph(7));
        assert_eq!(scores.len(), 2);
        assert!(matches!(m.match_region(&glyph(7)), MatchOutcome::Accepted(_)));
    }
}
