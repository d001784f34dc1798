//! Stake progressions for gale steps.

use rust_decimal::Decimal;

/// How the stake grows after each lost wager inside a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakeProgression {
    /// Multiply the previous stake: `base × multiplier^step`.
    Martingale { multiplier: Decimal },
    /// Fibonacci sequence of the base stake: 1, 1, 2, 3, 5, ...
    Fibonacci,
    /// Same stake at every step.
    Flat,
}

impl StakeProgression {
    /// Stake for gale step `step`, given the stake placed at `step - 1`.
    ///
    /// `None` when the stake no longer fits in a `Decimal`.
    pub fn next_stake(&self, previous_amount: Decimal, step: u32) -> Option<Decimal> {
        match self {
            StakeProgression::Martingale { multiplier } => previous_amount.checked_mul(*multiplier),
            StakeProgression::Fibonacci => {
                if step == 0 {
                    return Some(previous_amount);
                }
                // Multiply before dividing so the result stays exact
                previous_amount
                    .checked_mul(Decimal::from(fibonacci(step + 1)?))?
                    .checked_div(Decimal::from(fibonacci(step)?))
            }
            StakeProgression::Flat => Some(previous_amount),
        }
    }

    /// Stake at `step`, walking the progression up from the base stake.
    pub fn stake_at(&self, base: Decimal, step: u32) -> Option<Decimal> {
        (1..=step).try_fold(base, |amount, s| self.next_stake(amount, s))
    }

    /// Total staked by a cycle that loses every step up to `max_gales`.
    pub fn max_exposure(&self, base: Decimal, max_gales: u32) -> Option<Decimal> {
        let mut total = Decimal::ZERO;
        let mut stake = base;
        for step in 0..=max_gales {
            if step > 0 {
                stake = self.next_stake(stake, step)?;
            }
            total = total.checked_add(stake)?;
        }
        Some(total)
    }
}

/// F(1) = F(2) = 1. `None` past the largest value a `u64` holds.
fn fibonacci(n: u32) -> Option<u64> {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a.checked_add(b)?;
        a = b;
        b = next;
    }
    Some(a)
}
