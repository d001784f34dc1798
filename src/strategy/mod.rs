//! Counter-streak betting strategy.
//!
//! This module provides:
//! - Even/odd streak tracking with a configurable zero policy
//! - The single wagering cycle and the decisions it issues
//! - Stake progressions (Martingale, Fibonacci, flat)
//! - The state machine that ties them together per observed result

pub mod cycle;
pub mod machine;
pub mod progression;
pub mod streak;

pub use cycle::{BetDecision, DecisionKind};
pub use machine::{StrategyEngine, StrategyParams, WagerOutcome, WagerResolution};
pub use progression::StakeProgression;
pub use streak::ZeroPolicy;
