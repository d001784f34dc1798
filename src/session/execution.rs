//! Bet execution seam.

use anyhow::Result;

use crate::log;
use crate::strategy::BetDecision;

/// Places wagers on the table.
///
/// Success means exactly one wager of the decision's parity and amount was
/// placed before the next poll. An error leaves all bot state untouched; the
/// caller decides what happens to the decision.
pub trait BetExecutor {
    fn execute(&mut self, decision: &BetDecision) -> Result<()>;
}

/// Logs decisions instead of placing them.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    placed: Vec<BetDecision>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placed(&self) -> &[BetDecision] {
        &self.placed
    }
}

impl BetExecutor for DryRunExecutor {
    fn execute(&mut self, decision: &BetDecision) -> Result<()> {
        log(&format!(
            "[dry run] {} {} on {} (step {}): {}",
            decision.kind, decision.amount, decision.target_parity, decision.gale_step, decision.reason
        ));
        self.placed.push(decision.clone());
        Ok(())
    }
}
