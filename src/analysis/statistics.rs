//! Session statistics from telemetry rows.
//!
//! Covers the table (spin counts, number frequency, parity and color splits,
//! longest runs) and the money (wager results, cycles, balance curve).

use rust_decimal::Decimal;
use serde::Serialize;

use super::csv_reader::TelemetryLog;
use crate::roulette::{Color, Parity, MAX_POCKET};
use crate::strategy::{DecisionKind, WagerOutcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberCount {
    pub number: u8,
    pub count: usize,
}

/// Statistics for one session log.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_spins: usize,
    /// Hits per pocket, 0 through 36
    pub number_frequency: Vec<NumberCount>,
    /// Pockets seen most often (ties included)
    pub most_frequent: Vec<u8>,
    pub even: usize,
    pub odd: usize,
    pub zero: usize,
    pub red: usize,
    pub black: usize,
    pub longest_even_run: usize,
    pub longest_odd_run: usize,
    pub wagers_won: usize,
    pub wagers_lost: usize,
    pub wagers_void: usize,
    /// Won / (won + lost); 0 when nothing was settled
    pub win_rate: f64,
    pub keepalives: usize,
    pub cycles_started: usize,
    pub cycles_completed: usize,
    pub deepest_gale_step: u32,
    pub final_balance: Decimal,
    pub peak_balance: Decimal,
    /// Largest fall from a previous peak balance
    pub max_drawdown: Decimal,
}

impl SessionStats {
    pub fn from_log(log: &TelemetryLog) -> Self {
        let spins = log.spin_values();

        let mut counts = [0usize; MAX_POCKET as usize + 1];
        for &v in &spins {
            if let Some(slot) = counts.get_mut(v as usize) {
                *slot += 1;
            }
        }
        let number_frequency: Vec<NumberCount> = counts
            .iter()
            .enumerate()
            .map(|(number, &count)| NumberCount {
                number: number as u8,
                count,
            })
            .collect();
        let top = counts.iter().copied().max().unwrap_or(0);
        let most_frequent = if top == 0 {
            Vec::new()
        } else {
            number_frequency
                .iter()
                .filter(|n| n.count == top)
                .map(|n| n.number)
                .collect()
        };

        let parity = |p: Parity| spins.iter().filter(|&&v| Parity::of(v) == Some(p)).count();
        let color = |c: Color| spins.iter().filter(|&&v| Color::of(v) == Some(c)).count();
        let (longest_even_run, longest_odd_run) = longest_runs(&spins);

        let settled = |o: WagerOutcome| log.rows.iter().filter(|r| r.outcome == Some(o)).count();
        let wagers_won = settled(WagerOutcome::Win);
        let wagers_lost = settled(WagerOutcome::Loss);
        let decided = wagers_won + wagers_lost;

        let issued = |k: DecisionKind| {
            log.rows
                .iter()
                .filter(|r| r.outcome.is_none() && r.decision_kind == Some(k))
                .count()
        };

        let (final_balance, peak_balance, max_drawdown) = balance_curve(log);

        SessionStats {
            total_spins: spins.len(),
            most_frequent,
            number_frequency,
            even: parity(Parity::Even),
            odd: parity(Parity::Odd),
            zero: spins.iter().filter(|&&v| v == 0).count(),
            red: color(Color::Red),
            black: color(Color::Black),
            longest_even_run,
            longest_odd_run,
            wagers_won,
            wagers_lost,
            wagers_void: settled(WagerOutcome::Void),
            win_rate: if decided == 0 {
                0.0
            } else {
                wagers_won as f64 / decided as f64
            },
            keepalives: issued(DecisionKind::Keepalive),
            cycles_started: issued(DecisionKind::Entry),
            cycles_completed: issued(DecisionKind::CycleComplete),
            deepest_gale_step: log
                .rows
                .iter()
                .filter(|r| r.decision_kind == Some(DecisionKind::GaleProgression))
                .map(|r| r.gale_step)
                .max()
                .unwrap_or(0),
            final_balance,
            peak_balance,
            max_drawdown,
        }
    }
}

/// Longest consecutive even and odd runs. Zero breaks both.
fn longest_runs(values: &[u8]) -> (usize, usize) {
    let (mut even, mut odd) = (0usize, 0usize);
    let (mut best_even, mut best_odd) = (0usize, 0usize);
    for &v in values {
        match Parity::of(v) {
            Some(Parity::Even) => {
                even += 1;
                odd = 0;
            }
            Some(Parity::Odd) => {
                odd += 1;
                even = 0;
            }
            None => {
                even = 0;
                odd = 0;
            }
        }
        best_even = best_even.max(even);
        best_odd = best_odd.max(odd);
    }
    (best_even, best_odd)
}

/// (final, peak, max drawdown) over the `balance_after` column.
fn balance_curve(log: &TelemetryLog) -> (Decimal, Decimal, Decimal) {
    let mut balances = log.rows.iter().map(|r| r.balance_after);
    let Some(first) = balances.next() else {
        return (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
    };

    let (mut last, mut peak, mut drawdown) = (first, first, Decimal::ZERO);
    for balance in balances {
        peak = peak.max(balance);
        drawdown = drawdown.max(peak - balance);
        last = balance;
    }
    (last, peak, drawdown)
}
