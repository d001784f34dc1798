//! Balance tracking and stop conditions.

use chrono::{DateTime, Duration, Local};
use rust_decimal::Decimal;

use crate::config::BotConfig;
use crate::log;
use crate::strategy::{WagerOutcome, WagerResolution};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    StopLossAmount,
    StopLossCount,
    StopWinAmount,
    StopWinCount,
    /// The executor failed to place a wager
    ExecutionFailure,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StopReason::StopLossAmount => "stop-loss amount reached",
            StopReason::StopLossCount => "stop-loss count reached",
            StopReason::StopWinAmount => "stop-win amount reached",
            StopReason::StopWinCount => "stop-win count reached",
            StopReason::ExecutionFailure => "bet execution failed",
        })
    }
}

/// Configured stop conditions. `None` disables a condition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RiskLimits {
    pub stop_loss_amount: Option<Decimal>,
    pub stop_loss_count: Option<u32>,
    pub stop_win_amount: Option<Decimal>,
    pub stop_win_count: Option<u32>,
}

impl RiskLimits {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            stop_loss_amount: config.stop_loss_amount,
            stop_loss_count: config.stop_loss_count,
            stop_win_amount: config.stop_win_amount,
            stop_win_count: config.stop_win_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub balance: Decimal,
    pub initial_balance: Decimal,
    pub peak_profit: Decimal,
    pub loss_count: u32,
    pub win_count: u32,
    halted: bool,
    halt_reason: Option<StopReason>,
    pub last_bet_at: DateTime<Local>,
}

impl SessionState {
    pub fn new(initial_balance: Decimal, started_at: DateTime<Local>) -> Self {
        Self {
            balance: initial_balance,
            initial_balance,
            peak_profit: Decimal::ZERO,
            loss_count: 0,
            win_count: 0,
            halted: false,
            halt_reason: None,
            last_bet_at: started_at,
        }
    }

    pub fn profit(&self) -> Decimal {
        self.balance - self.initial_balance
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn halt_reason(&self) -> Option<StopReason> {
        self.halt_reason
    }

    /// Books a resolved wager.
    pub fn apply(&mut self, resolution: &WagerResolution) {
        self.balance += resolution.profit();
        match resolution.outcome {
            WagerOutcome::Win => self.win_count += 1,
            WagerOutcome::Loss => self.loss_count += 1,
            WagerOutcome::Void => {}
        }
        self.peak_profit = self.peak_profit.max(self.profit());
    }

    /// First stop condition that holds, in order: loss amount, loss count,
    /// win amount, win count.
    pub fn check_stop(&self, limits: &RiskLimits) -> Option<StopReason> {
        let profit = self.profit();
        if limits.stop_loss_amount.is_some_and(|limit| -profit >= limit) {
            return Some(StopReason::StopLossAmount);
        }
        if limits.stop_loss_count.is_some_and(|limit| self.loss_count >= limit) {
            return Some(StopReason::StopLossCount);
        }
        if limits.stop_win_amount.is_some_and(|limit| profit >= limit) {
            return Some(StopReason::StopWinAmount);
        }
        if limits.stop_win_count.is_some_and(|limit| self.win_count >= limit) {
            return Some(StopReason::StopWinCount);
        }
        None
    }

    /// Halts the session if a stop condition holds. Returns the reason when
    /// this call did the halting.
    pub fn evaluate_stop(&mut self, limits: &RiskLimits) -> Option<StopReason> {
        if self.halted {
            return None;
        }
        let reason = self.check_stop(limits)?;
        self.halt(reason);
        Some(reason)
    }

    /// Once halted, a session stays halted.
    pub fn halt(&mut self, reason: StopReason) {
        if self.halted {
            return;
        }
        self.halted = true;
        self.halt_reason = Some(reason);
        log(&format!(
            "Session halted: {} (balance {}, wins {}, losses {})",
            reason, self.balance, self.win_count, self.loss_count
        ));
    }

    pub fn record_bet(&mut self, at: DateTime<Local>) {
        self.last_bet_at = at;
    }

    /// True once more than `interval` has passed since the last wager.
    pub fn keepalive_due(&self, now: DateTime<Local>, interval: Duration) -> bool {
        now - self.last_bet_at > interval
    }
}
