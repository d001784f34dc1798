//! Wagering cycle and the decisions it issues.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::roulette::Parity;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Entry,
    GaleProgression,
    CycleComplete,
    Keepalive,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Entry => "entry",
            DecisionKind::GaleProgression => "gale_progression",
            DecisionKind::CycleComplete => "cycle_complete",
            DecisionKind::Keepalive => "keepalive",
        }
    }

    pub fn parse(s: &str) -> Option<DecisionKind> {
        match s {
            "entry" => Some(DecisionKind::Entry),
            "gale_progression" => Some(DecisionKind::GaleProgression),
            "cycle_complete" => Some(DecisionKind::CycleComplete),
            "keepalive" => Some(DecisionKind::Keepalive),
            _ => None,
        }
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision handed to the bet-execution collaborator. Immutable once issued.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BetDecision {
    pub kind: DecisionKind,
    pub target_parity: Parity,
    pub amount: Decimal,
    pub gale_step: u32,
    /// Owning cycle; `None` for keepalive wagers
    pub cycle_id: Option<u64>,
    pub reason: String,
}

impl BetDecision {
    /// `cycle_complete` decisions are informational and never placed.
    pub fn is_wager(&self) -> bool {
        self.kind != DecisionKind::CycleComplete
    }
}

/// The single wagering cycle. Only one may be active at a time.
#[derive(Clone, Debug)]
pub struct Cycle {
    active: bool,
    target_parity: Parity,
    gale_step: u32,
    pending: Option<BetDecision>,
    cycle_id: u64,
}

impl Default for Cycle {
    fn default() -> Self {
        Self {
            active: false,
            target_parity: Parity::Even,
            gale_step: 0,
            pending: None,
            cycle_id: 0,
        }
    }
}

impl Cycle {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn target_parity(&self) -> Parity {
        self.target_parity
    }

    pub fn gale_step(&self) -> u32 {
        self.gale_step
    }

    pub fn cycle_id(&self) -> u64 {
        self.cycle_id
    }

    pub fn pending(&self) -> Option<&BetDecision> {
        self.pending.as_ref()
    }

    /// Starts a cycle with its entry wager pending.
    pub fn start(&mut self, cycle_id: u64, entry: BetDecision) -> Result<(), BotError> {
        if self.active {
            return Err(BotError::invariant(format!(
                "cannot start cycle {} while cycle {} is active",
                cycle_id, self.cycle_id
            )));
        }
        if entry.kind != DecisionKind::Entry || entry.gale_step != 0 {
            return Err(BotError::invariant(format!(
                "cycle must open with an entry at step 0, got {} at step {}",
                entry.kind, entry.gale_step
            )));
        }
        self.active = true;
        self.target_parity = entry.target_parity;
        self.gale_step = 0;
        self.cycle_id = cycle_id;
        self.pending = Some(entry);
        Ok(())
    }

    /// Moves to the next gale step with its wager pending.
    pub fn advance(&mut self, progression: BetDecision) -> Result<(), BotError> {
        if !self.active {
            return Err(BotError::invariant("gale progression without an active cycle"));
        }
        if self.pending.is_some() {
            return Err(BotError::invariant(
                "gale progression issued before the previous wager was resolved",
            ));
        }
        if progression.gale_step != self.gale_step + 1 {
            return Err(BotError::invariant(format!(
                "gale step must advance by one: {} -> {}",
                self.gale_step, progression.gale_step
            )));
        }
        self.gale_step = progression.gale_step;
        self.pending = Some(progression);
        Ok(())
    }

    /// Removes the pending wager for resolution.
    pub fn take_pending(&mut self) -> Option<BetDecision> {
        self.pending.take()
    }

    /// Ends the cycle. The id is kept for reporting.
    pub fn end(&mut self) {
        self.active = false;
        self.gale_step = 0;
        self.pending = None;
    }
}
