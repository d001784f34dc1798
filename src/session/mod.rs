//! Session control around the strategy engine.
//!
//! This module provides:
//! - Balance tracking and stop conditions
//! - The `Bot`, which owns all per-session state
//! - Transition telemetry
//! - The bet-execution seam
//! - The polling runner

pub mod bot;
pub mod execution;
pub mod risk;
pub mod runner;
pub mod telemetry;

pub use bot::Bot;
pub use execution::DryRunExecutor;
pub use runner::Runner;
pub use telemetry::CsvTelemetry;
