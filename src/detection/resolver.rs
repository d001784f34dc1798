//! Turns per-poll readings into discrete spin observations.
//!
//! The result display keeps showing the same number for many polls; only a
//! value different from the last confirmed one (or any value after the display
//! cleared) is a new spin.

use chrono::{DateTime, Local};

use crate::config::DetectionConfig;
use crate::detection::observation::{Candidate, SpinObservation};

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    NewSpin(SpinObservation),
    /// Same value as the last confirmed observation
    Stale,
    /// No trustworthy reading this poll
    NoReading {
        observation: SpinObservation,
        consecutive: u32,
    },
}

pub struct ObservationResolver {
    last_confirmed: Option<u8>,
    misses: u32,
    blank_polls_to_clear: u32,
    degraded_after: u32,
    degraded: bool,
}

impl ObservationResolver {
    pub fn new(blank_polls_to_clear: u32, degraded_after: u32) -> Self {
        Self {
            last_confirmed: None,
            misses: 0,
            blank_polls_to_clear: blank_polls_to_clear.max(1),
            degraded_after,
            degraded: false,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.blank_polls_to_clear, config.degraded_after_misses)
    }

    /// True while unreadable polls have run past the degraded threshold.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn resolve(
        &mut self,
        candidate: Option<Candidate>,
        observed_at: DateTime<Local>,
    ) -> Resolution {
        let Some(candidate) = candidate else {
            return self.record_miss(observed_at);
        };

        if self.degraded {
            crate::log(&format!(
                "Detection recovered after {} unreadable polls",
                self.misses
            ));
            self.degraded = false;
        }
        self.misses = 0;

        if self.last_confirmed == Some(candidate.value()) {
            return Resolution::Stale;
        }
        self.last_confirmed = Some(candidate.value());
        Resolution::NewSpin(SpinObservation::from_candidate(candidate, observed_at))
    }

    fn record_miss(&mut self, observed_at: DateTime<Local>) -> Resolution {
        self.misses = self.misses.saturating_add(1);

        if self.misses >= self.blank_polls_to_clear {
            self.last_confirmed = None;
        }

        if self.degraded_after > 0 && self.misses == self.degraded_after {
            self.degraded = true;
            crate::log(&format!(
                "Warning: detection degraded, {} consecutive polls without a reading",
                self.misses
            ));
        }

        Resolution::NoReading {
            observation: SpinObservation::empty(observed_at),
            consecutive: self.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::observation::DetectionMethod;

    fn reading(value: u8) -> Option<Candidate> {
        Candidate::new(value, 0.9, DetectionMethod::Template)
    }

    fn is_new(r: &Resolution, value: u8) -> bool {
        matches!(r, Resolution::NewSpin(obs) if obs.value() == Some(value))
    }

    #[test]
    fn test_repeated_value_is_stale() {
        let mut resolver = ObservationResolver::new(1, 10);
        let now = Local::now();
        assert!(is_new(&resolver.resolve(reading(14), now), 14));
        assert_eq!(resolver.resolve(reading(14), now), Resolution::Stale);
        assert_eq!(resolver.resolve(reading(14), now), Resolution::Stale);
        assert!(is_new(&resolver.resolve(reading(3), now), 3));
    }

    #[test]
    fn test_blank_then_same_value_is_new_spin() {
        let mut resolver = ObservationResolver::new(1, 10);
        let now = Local::now();
        resolver.resolve(reading(9), now);
        match resolver.resolve(None, now) {
            Resolution::NoReading {
                observation,
                consecutive,
            } => {
                assert_eq!(consecutive, 1);
                assert_eq!(observation.value(), None);
            }
            other => panic!("expected no reading, got {:?}", other),
        }
        assert!(is_new(&resolver.resolve(reading(9), now), 9));
    }

    #[test]
    fn test_blank_hold_keeps_value_through_short_gaps() {
        let mut resolver = ObservationResolver::new(3, 10);
        let now = Local::now();
        resolver.resolve(reading(9), now);
        resolver.resolve(None, now);
        resolver.resolve(None, now);
        assert_eq!(resolver.resolve(reading(9), now), Resolution::Stale);

        for _ in 0..3 {
            resolver.resolve(None, now);
        }
        assert_eq!(resolver.last_confirmed, None);
        assert!(is_new(&resolver.resolve(reading(9), now), 9));
    }

    #[test]
    fn test_degraded_after_consecutive_misses() {
        let mut resolver = ObservationResolver::new(1, 3);
        let now = Local::now();
        resolver.resolve(None, now);
        resolver.resolve(None, now);
        assert!(!resolver.is_degraded());
        resolver.resolve(None, now);
        assert!(resolver.is_degraded());

        resolver.resolve(reading(1), now);
        assert!(!resolver.is_degraded());
    }

    #[test]
    fn test_observation_carries_timestamp_and_method() {
        let mut resolver = ObservationResolver::new(1, 10);
        let at = Local::now();
        let Resolution::NewSpin(obs) = resolver.resolve(Candidate::new(0, 0.5, DetectionMethod::Ocr), at) else {
            panic!("expected new spin");
        };
        assert_eq!(obs.observed_at(), at);
        assert_eq!(obs.method(), DetectionMethod::Ocr);
    }
}
