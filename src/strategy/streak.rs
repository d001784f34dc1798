//! Even/odd streak tracking.

use serde::{Deserialize, Serialize};

use crate::roulette::Parity;

/// What a zero does to a pending wager and to the streaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPolicy {
    /// Zero loses the pending wager and breaks any streak.
    CountAsLoss,
    /// Zero is skipped: the wager stays pending and streaks are untouched.
    Neutral,
    /// Zero voids the pending wager, ends the cycle and clears the streaks.
    Reset,
}

/// Consecutive same-parity results. At most one run is non-zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreakState {
    pub even_run: u32,
    pub odd_run: u32,
}

impl StreakState {
    pub fn record(&mut self, value: u8, zero_policy: ZeroPolicy) {
        match Parity::of(value) {
            Some(Parity::Even) => {
                self.even_run += 1;
                self.odd_run = 0;
            }
            Some(Parity::Odd) => {
                self.odd_run += 1;
                self.even_run = 0;
            }
            None => match zero_policy {
                ZeroPolicy::Neutral => {}
                ZeroPolicy::CountAsLoss | ZeroPolicy::Reset => self.reset(),
            },
        }
    }

    pub fn reset(&mut self) {
        self.even_run = 0;
        self.odd_run = 0;
    }

    /// Parity to bet on once a run reaches `streak_length` (the opposite of the run).
    pub fn entry_signal(&self, streak_length: u32) -> Option<Parity> {
        if self.even_run >= streak_length {
            Some(Parity::Odd)
        } else if self.odd_run >= streak_length {
            Some(Parity::Even)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_parity_resets_run() {
        let mut s = StreakState::default();
        for v in [2, 4, 6] {
            s.record(v, ZeroPolicy::CountAsLoss);
        }
        assert_eq!(s, StreakState { even_run: 3, odd_run: 0 });

        s.record(7, ZeroPolicy::CountAsLoss);
        assert_eq!(s, StreakState { even_run: 0, odd_run: 1 });
    }

    #[test]
    fn test_zero_breaks_streak_unless_neutral() {
        let mut s = StreakState { even_run: 4, odd_run: 0 };
        s.record(0, ZeroPolicy::Neutral);
        assert_eq!(s.even_run, 4);

        s.record(0, ZeroPolicy::Reset);
        assert_eq!(s, StreakState::default());

        let mut s = StreakState { even_run: 0, odd_run: 2 };
        s.record(0, ZeroPolicy::CountAsLoss);
        assert_eq!(s, StreakState::default());
    }

    #[test]
    fn test_entry_signal_targets_opposite_parity() {
        let s = StreakState { even_run: 5, odd_run: 0 };
        assert_eq!(s.entry_signal(5), Some(Parity::Odd));
        assert_eq!(s.entry_signal(6), None);

        let s = StreakState { even_run: 0, odd_run: 7 };
        assert_eq!(s.entry_signal(5), Some(Parity::Even));
    }
}
