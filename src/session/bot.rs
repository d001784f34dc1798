//! Session controller tying the strategy engine to balance, stop conditions
//! and the keepalive timer.
//!
//! All mutable session state lives in one `Bot`, and both entry points
//! (`on_observation` and `on_idle_tick`) are driven from the same polling
//! loop, so a keepalive can never race a cycle that just became active.

use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::BotConfig;
use crate::detection::SpinObservation;
use crate::error::BotError;
use crate::log;
use crate::roulette::Parity;
use crate::session::risk::{RiskLimits, SessionState, StopReason};
use crate::session::telemetry::TransitionRecord;
use crate::strategy::{
    BetDecision, DecisionKind, StrategyEngine, StrategyParams, WagerOutcome, WagerResolution,
};

/// What the caller has to do after one bot step.
#[derive(Clone, Debug, Default)]
pub struct Step {
    /// Wagers to hand to the executor, in order
    pub decisions: Vec<BetDecision>,
    /// Telemetry for every transition of this step
    pub records: Vec<TransitionRecord>,
    /// Set when this step halted the session
    pub halted: Option<StopReason>,
}

pub struct Bot {
    config: BotConfig,
    limits: RiskLimits,
    strategy: StrategyEngine,
    state: SessionState,
    pending_keepalive: Option<BetDecision>,
    pending_reload: Option<BotConfig>,
    rng: StdRng,
}

impl Bot {
    /// Validates `config` and starts a session.
    pub fn new(config: BotConfig, started_at: DateTime<Local>) -> Result<Self, BotError> {
        Self::with_rng(config, started_at, StdRng::from_os_rng())
    }

    pub fn with_rng(
        config: BotConfig,
        started_at: DateTime<Local>,
        rng: StdRng,
    ) -> Result<Self, BotError> {
        let exposure = config.validate()?;
        log(&format!(
            "Session started with balance {}, worst-case cycle exposure {}",
            config.initial_balance, exposure
        ));
        Ok(Self {
            limits: RiskLimits::from_config(&config),
            strategy: StrategyEngine::new(StrategyParams::from_config(&config)),
            state: SessionState::new(config.initial_balance, started_at),
            pending_keepalive: None,
            pending_reload: None,
            rng,
            config,
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn strategy(&self) -> &StrategyEngine {
        &self.strategy
    }

    /// Halted with nothing left to resolve.
    pub fn is_finished(&self) -> bool {
        self.state.is_halted() && !self.strategy.cycle_active() && self.pending_keepalive.is_none()
    }

    /// Processes one new spin.
    ///
    /// Order: settle an outstanding keepalive, resolve the cycle's pending
    /// wager, apply a queued reload if the cycle just ended, check stop
    /// conditions, then update streaks and open a cycle if allowed.
    pub fn on_observation(&mut self, observation: &SpinObservation) -> Result<Step, BotError> {
        let mut step = Step::default();
        let Some(value) = observation.value() else {
            return Ok(step);
        };
        let at = observation.observed_at();

        step.records
            .push(TransitionRecord::observation(observation, self.state.balance));

        if let Some(keepalive) = self.pending_keepalive.take() {
            let resolution = WagerResolution {
                outcome: WagerOutcome::of_parity_bet(keepalive.target_parity, value),
                decision: keepalive,
            };
            self.settle(at, value, &resolution, &mut step);
        }

        let mut outcome = self.strategy.resolve_pending(value)?;
        if let Some(resolution) = &outcome.resolution {
            self.settle(at, value, resolution, &mut step);
        }
        // The cycle_complete decision (if any) is informational
        for decision in outcome.decisions.drain(..) {
            self.issue(at, Some(value), decision, &mut step);
        }

        if !self.strategy.cycle_active() {
            self.apply_pending_reload()?;
        }

        step.halted = self.state.evaluate_stop(&self.limits);

        let entries_allowed = !self.state.is_halted();
        self.strategy
            .evaluate_entry(value, &mut outcome, entries_allowed)?;
        for decision in outcome.decisions {
            self.issue(at, Some(value), decision, &mut step);
        }

        Ok(step)
    }

    /// Issues a keepalive wager when the session has been idle long enough.
    pub fn on_idle_tick(&mut self, now: DateTime<Local>) -> Result<Step, BotError> {
        let mut step = Step::default();
        let Some(interval) = self.config.keepalive_interval() else {
            return Ok(step);
        };
        if self.state.is_halted()
            || self.strategy.cycle_active()
            || self.pending_keepalive.is_some()
            || !self.state.keepalive_due(now, interval)
        {
            return Ok(step);
        }

        step.halted = self.state.evaluate_stop(&self.limits);
        if step.halted.is_some() {
            return Ok(step);
        }

        let target_parity = if self.rng.random_bool(0.5) {
            Parity::Even
        } else {
            Parity::Odd
        };
        let idle = now - self.state.last_bet_at;
        let keepalive = BetDecision {
            kind: DecisionKind::Keepalive,
            target_parity,
            amount: self.config.keepalive_stake,
            gale_step: 0,
            cycle_id: None,
            reason: format!("idle for {}s", idle.num_seconds()),
        };
        log(&format!(
            "Keepalive on {} for {} ({})",
            keepalive.target_parity, keepalive.amount, keepalive.reason
        ));
        self.pending_keepalive = Some(keepalive.clone());
        self.issue(now, None, keepalive, &mut step);
        Ok(step)
    }

    /// Queues a new configuration; applied at once when no cycle is active,
    /// otherwise as soon as the current cycle ends.
    pub fn request_reload(&mut self, config: BotConfig) -> Result<(), BotError> {
        config.validate()?;
        self.pending_reload = Some(config);
        if self.strategy.cycle_active() {
            log("Config reload queued until the current cycle ends");
            return Ok(());
        }
        self.apply_pending_reload()
    }

    /// Drops a wager the executor failed to place. Returns telemetry for the
    /// cycle that ended because of it.
    pub fn abandon_decision(
        &mut self,
        decision: &BetDecision,
        at: DateTime<Local>,
    ) -> Vec<TransitionRecord> {
        if self.pending_keepalive.as_ref() == Some(decision) {
            self.pending_keepalive = None;
            log("Keepalive abandoned");
            return Vec::new();
        }
        self.strategy
            .abandon(decision)
            .map(|complete| {
                vec![TransitionRecord::decision(
                    at,
                    None,
                    &complete,
                    self.state.balance,
                )]
            })
            .unwrap_or_default()
    }

    pub fn halt(&mut self, reason: StopReason) {
        self.state.halt(reason);
    }

    fn settle(
        &mut self,
        at: DateTime<Local>,
        value: u8,
        resolution: &WagerResolution,
        step: &mut Step,
    ) {
        self.state.apply(resolution);
        log(&format!(
            "{} {} on {} for {}: {} (balance {})",
            if resolution.decision.kind == DecisionKind::Keepalive {
                "Keepalive"
            } else {
                "Wager"
            },
            resolution.decision.target_parity,
            value,
            resolution.decision.amount,
            resolution.outcome.as_str(),
            self.state.balance
        ));
        step.records.push(TransitionRecord::resolution(
            at,
            value,
            resolution,
            self.state.balance,
        ));
    }

    fn issue(
        &mut self,
        at: DateTime<Local>,
        observed: Option<u8>,
        decision: BetDecision,
        step: &mut Step,
    ) {
        step.records.push(TransitionRecord::decision(
            at,
            observed,
            &decision,
            self.state.balance,
        ));
        if decision.is_wager() {
            self.state.record_bet(at);
            step.decisions.push(decision);
        }
    }

    fn apply_pending_reload(&mut self) -> Result<(), BotError> {
        let Some(config) = self.pending_reload.take() else {
            return Ok(());
        };
        self.strategy
            .reconfigure(StrategyParams::from_config(&config))?;
        self.limits = RiskLimits::from_config(&config);
        self.config = config;
        let params = self.strategy.params();
        log(&format!(
            "Config reloaded: streak={} base_bet={} progression={:?} max_gales={} zero_policy={:?}",
            params.streak_length,
            params.base_bet,
            params.progression,
            params.max_gales,
            params.zero_policy
        ));
        Ok(())
    }
}
