//! Streak and cycle state machine.
//!
//! Each confirmed result runs three steps in order:
//! 1. resolve the pending wager (zero handled by the zero policy),
//! 2. update the even/odd streaks,
//! 3. open a new cycle if none is active and a streak reached its length.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::BotConfig;
use crate::error::BotError;
use crate::roulette::{self, Parity};
use crate::strategy::cycle::{BetDecision, Cycle, DecisionKind};
use crate::strategy::progression::StakeProgression;
use crate::strategy::streak::{StreakState, ZeroPolicy};

/// Strategy parameters taken from the session configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct StrategyParams {
    pub streak_length: u32,
    pub base_bet: Decimal,
    pub progression: StakeProgression,
    pub max_gales: u32,
    pub zero_policy: ZeroPolicy,
}

impl StrategyParams {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            streak_length: config.streak_length,
            base_bet: config.base_bet,
            progression: config.stake_progression(),
            max_gales: config.max_gales,
            zero_policy: config.zero_policy,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerOutcome {
    #[serde(rename = "won")]
    Win,
    #[serde(rename = "lost")]
    Loss,
    /// Neither won nor lost (zero under the reset policy)
    Void,
}

impl WagerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WagerOutcome::Win => "won",
            WagerOutcome::Loss => "lost",
            WagerOutcome::Void => "void",
        }
    }

    pub fn parse(s: &str) -> Option<WagerOutcome> {
        match s {
            "won" => Some(WagerOutcome::Win),
            "lost" => Some(WagerOutcome::Loss),
            "void" => Some(WagerOutcome::Void),
            _ => None,
        }
    }

    /// Outcome of an even-money parity wager. Zero loses.
    pub fn of_parity_bet(target: Parity, value: u8) -> WagerOutcome {
        if Parity::of(value) == Some(target) {
            WagerOutcome::Win
        } else {
            WagerOutcome::Loss
        }
    }
}

/// A placed wager together with how it ended.
#[derive(Clone, Debug, PartialEq)]
pub struct WagerResolution {
    pub decision: BetDecision,
    pub outcome: WagerOutcome,
}

impl WagerResolution {
    /// Net balance change of an even-money wager.
    pub fn profit(&self) -> Decimal {
        match self.outcome {
            WagerOutcome::Win => self.decision.amount,
            WagerOutcome::Loss => -self.decision.amount,
            WagerOutcome::Void => Decimal::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleEnd {
    Won,
    MaxGalesLost,
    ZeroReset,
    /// Dropped by the caller after an execution failure
    Abandoned,
}

impl CycleEnd {
    fn describe(&self) -> &'static str {
        match self {
            CycleEnd::Won => "won",
            CycleEnd::MaxGalesLost => "lost at max gale",
            CycleEnd::ZeroReset => "reset by zero",
            CycleEnd::Abandoned => "abandoned",
        }
    }
}

/// What one observation did to the strategy.
#[derive(Clone, Debug, Default)]
pub struct StepOutcome {
    pub resolution: Option<WagerResolution>,
    pub cycle_end: Option<CycleEnd>,
    /// Issued in order: `cycle_complete`, then `gale_progression` or `entry`
    pub decisions: Vec<BetDecision>,
    /// Zero under the neutral policy left the pending wager in place
    pub held: bool,
}

pub struct StrategyEngine {
    params: StrategyParams,
    streaks: StreakState,
    cycle: Cycle,
    cycles_started: u64,
}

impl StrategyEngine {
    pub fn new(params: StrategyParams) -> Self {
        Self {
            params,
            streaks: StreakState::default(),
            cycle: Cycle::default(),
            cycles_started: 0,
        }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn streaks(&self) -> StreakState {
        self.streaks
    }

    pub fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    pub fn cycle_active(&self) -> bool {
        self.cycle.is_active()
    }

    pub fn cycles_started(&self) -> u64 {
        self.cycles_started
    }

    /// Replaces the parameters. Only allowed between cycles.
    pub fn reconfigure(&mut self, params: StrategyParams) -> Result<(), BotError> {
        if self.cycle.is_active() {
            return Err(BotError::invariant(format!(
                "cannot reconfigure during active cycle {}",
                self.cycle.cycle_id()
            )));
        }
        self.params = params;
        Ok(())
    }

    /// Step 1: resolves the pending wager against `value`.
    pub fn resolve_pending(&mut self, value: u8) -> Result<StepOutcome, BotError> {
        if !roulette::is_pocket(value) {
            return Err(BotError::invariant(format!("{} is not a pocket", value)));
        }

        let mut outcome = StepOutcome::default();
        let Some(pending) = self.cycle.pending() else {
            return Ok(outcome);
        };
        let target = pending.target_parity;

        match Parity::of(value) {
            None => match self.params.zero_policy {
                ZeroPolicy::Neutral => {
                    crate::log(&format!(
                        "Cycle {}: zero ignored, {} wager at step {} stays pending",
                        self.cycle.cycle_id(),
                        target,
                        self.cycle.gale_step()
                    ));
                    outcome.held = true;
                }
                ZeroPolicy::CountAsLoss => self.settle_loss(&mut outcome)?,
                ZeroPolicy::Reset => {
                    if let Some(decision) = self.cycle.take_pending() {
                        outcome.resolution = Some(WagerResolution {
                            decision,
                            outcome: WagerOutcome::Void,
                        });
                    }
                    self.finish_cycle(CycleEnd::ZeroReset, &mut outcome);
                    self.streaks.reset();
                }
            },
            Some(parity) if parity == target => {
                if let Some(decision) = self.cycle.take_pending() {
                    outcome.resolution = Some(WagerResolution {
                        decision,
                        outcome: WagerOutcome::Win,
                    });
                }
                self.finish_cycle(CycleEnd::Won, &mut outcome);
            }
            Some(_) => self.settle_loss(&mut outcome)?,
        }

        Ok(outcome)
    }

    /// Steps 2 and 3: updates the streaks and opens a cycle when one triggers.
    pub fn evaluate_entry(
        &mut self,
        value: u8,
        outcome: &mut StepOutcome,
        entries_allowed: bool,
    ) -> Result<(), BotError> {
        if outcome.held {
            return Ok(());
        }
        self.streaks.record(value, self.params.zero_policy);

        if self.cycle.is_active() || !entries_allowed {
            return Ok(());
        }
        if let Some(target) = self.streaks.entry_signal(self.params.streak_length) {
            let run = self.streaks.even_run.max(self.streaks.odd_run);
            let reason = format!("{} consecutive {} results", run, target.opposite());
            let entry = self.start_cycle(target, reason)?;
            outcome.decisions.push(entry);
        }
        Ok(())
    }

    /// Opens a new cycle and returns its entry decision.
    pub fn start_cycle(&mut self, target: Parity, reason: String) -> Result<BetDecision, BotError> {
        let cycle_id = self.cycles_started + 1;
        let entry = BetDecision {
            kind: DecisionKind::Entry,
            target_parity: target,
            amount: self.params.base_bet,
            gale_step: 0,
            cycle_id: Some(cycle_id),
            reason,
        };
        self.cycle.start(cycle_id, entry.clone())?;
        self.cycles_started = cycle_id;

        crate::log(&format!(
            "Cycle {}: entry on {} for {} ({})",
            cycle_id, target, entry.amount, entry.reason
        ));
        Ok(entry)
    }

    /// Drops the pending wager after the caller failed to place it.
    ///
    /// Returns the `cycle_complete` decision if `decision` was this cycle's pending wager.
    pub fn abandon(&mut self, decision: &BetDecision) -> Option<BetDecision> {
        if self.cycle.pending() != Some(decision) {
            return None;
        }
        self.cycle.take_pending();
        let mut outcome = StepOutcome::default();
        self.finish_cycle(CycleEnd::Abandoned, &mut outcome);
        outcome.decisions.pop()
    }

    fn settle_loss(&mut self, outcome: &mut StepOutcome) -> Result<(), BotError> {
        let Some(decision) = self.cycle.take_pending() else {
            return Ok(());
        };
        let next_step = decision.gale_step + 1;
        let lost = WagerResolution {
            decision,
            outcome: WagerOutcome::Loss,
        };

        if next_step > self.params.max_gales {
            outcome.resolution = Some(lost);
            self.finish_cycle(CycleEnd::MaxGalesLost, outcome);
            return Ok(());
        }

        let amount = self
            .params
            .progression
            .next_stake(lost.decision.amount, next_step)
            .ok_or_else(|| {
                BotError::invariant(format!("stake for gale {} overflows", next_step))
            })?;
        let progression = BetDecision {
            kind: DecisionKind::GaleProgression,
            target_parity: lost.decision.target_parity,
            amount,
            gale_step: next_step,
            cycle_id: Some(self.cycle.cycle_id()),
            reason: format!("loss at step {}", lost.decision.gale_step),
        };
        self.cycle.advance(progression.clone())?;

        crate::log(&format!(
            "Cycle {}: gale {}/{} on {} for {}",
            self.cycle.cycle_id(),
            next_step,
            self.params.max_gales,
            progression.target_parity,
            progression.amount
        ));

        outcome.resolution = Some(lost);
        outcome.decisions.push(progression);
        Ok(())
    }

    fn finish_cycle(&mut self, end: CycleEnd, outcome: &mut StepOutcome) {
        let cycle_id = self.cycle.cycle_id();
        let complete = BetDecision {
            kind: DecisionKind::CycleComplete,
            target_parity: self.cycle.target_parity(),
            amount: Decimal::ZERO,
            gale_step: self.cycle.gale_step(),
            cycle_id: Some(cycle_id),
            reason: end.describe().to_string(),
        };
        self.cycle.end();

        crate::log(&format!(
            "Cycle {}: {} at step {}",
            cycle_id,
            end.describe(),
            complete.gale_step
        ));

        outcome.cycle_end = Some(end);
        outcome.decisions.push(complete);
    }
}
