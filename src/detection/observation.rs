//! Readings and spin observations.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::roulette::{self, Color};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Template,
    Ocr,
    None,
}

/// An accepted reading from the matcher or the fallback reader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    value: u8,
    confidence: f32,
    method: DetectionMethod,
}

impl Candidate {
    /// Returns `None` for values off the wheel.
    pub fn new(value: u8, confidence: f32, method: DetectionMethod) -> Option<Self> {
        if !roulette::is_pocket(value) {
            return None;
        }
        Some(Self {
            value,
            confidence: confidence.clamp(0.0, 1.0),
            method,
        })
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn method(&self) -> DetectionMethod {
        self.method
    }
}

/// One discrete table result. The color is always derived from the value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpinObservation {
    value: Option<u8>,
    color: Option<Color>,
    confidence: f32,
    method: DetectionMethod,
    observed_at: DateTime<Local>,
}

impl SpinObservation {
    pub fn from_candidate(candidate: Candidate, observed_at: DateTime<Local>) -> Self {
        Self {
            value: Some(candidate.value),
            color: Color::of(candidate.value),
            confidence: candidate.confidence,
            method: candidate.method,
            observed_at,
        }
    }

    /// An observation without a reading.
    pub fn empty(observed_at: DateTime<Local>) -> Self {
        Self {
            value: None,
            color: None,
            confidence: 0.0,
            method: DetectionMethod::None,
            observed_at,
        }
    }

    pub fn value(&self) -> Option<u8> {
        self.value
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn method(&self) -> DetectionMethod {
        self.method
    }

    pub fn observed_at(&self) -> DateTime<Local> {
        self.observed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_derived_from_value() {
        let c = Candidate::new(0, 0.9, DetectionMethod::Template).unwrap();
        let obs = SpinObservation::from_candidate(c, Local::now());
        assert_eq!(obs.color(), Some(Color::Green));

        let c = Candidate::new(32, 0.5, DetectionMethod::Ocr).unwrap();
        let obs = SpinObservation::from_candidate(c, Local::now());
        assert_eq!(obs.value(), Some(32));
        assert_eq!(obs.color(), Some(Color::Red));
        assert_eq!(obs.method(), DetectionMethod::Ocr);
    }

    #[test]
    fn test_empty_observation_invariant() {
        let obs = SpinObservation::empty(Local::now());
        assert_eq!(obs.value(), None);
        assert_eq!(obs.color(), None);
        assert_eq!(obs.confidence(), 0.0);
        assert_eq!(obs.method(), DetectionMethod::None);
    }

    #[test]
    fn test_candidate_rejects_off_wheel_values() {
        assert!(Candidate::new(37, 0.9, DetectionMethod::Template).is_none());
        let c = Candidate::new(5, 1.4, DetectionMethod::Template).unwrap();
        assert_eq!(c.confidence(), 1.0);
    }
}
