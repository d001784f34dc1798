//! Error taxonomy for the bot core.
//!
//! Unreadable and repeated frames are not errors; the observation resolver
//! reports them as `Resolution::NoReading` and `Resolution::Stale`.

use thiserror::Error;

use crate::strategy::DecisionKind;

#[derive(Debug, Error)]
pub enum BotError {
    /// Invalid configuration, raised before any observation is processed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A caller broke a state-machine contract (e.g. starting a second cycle).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The bet-execution collaborator could not place a wager.
    #[error("execution of {kind} decision failed: {reason}")]
    ExecutionFailure { kind: DecisionKind, reason: String },

    /// The image source failed to deliver a frame.
    #[error("capture failed: {0:#}")]
    Capture(anyhow::Error),
}

impl BotError {
    pub fn config(msg: impl Into<String>) -> Self {
        BotError::Configuration(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        BotError::InvariantViolation(msg.into())
    }
}
