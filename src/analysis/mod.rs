//! Post-session report.
//!
//! This module provides:
//! - CSV reading for session telemetry
//! - Table and wager statistics
//! - JSON export of statistics

pub mod csv_reader;
pub mod export;
pub mod statistics;

pub use csv_reader::TelemetryLog;
pub use statistics::SessionStats;

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

/// Runs the report pipeline: read telemetry CSV, calculate stats, export JSON.
///
/// Returns the statistics and the path of the written JSON file.
pub fn generate_report(csv_path: &Path, json_path: &Path) -> Result<(SessionStats, PathBuf)> {
    let log = TelemetryLog::from_csv(csv_path)?;
    if log.is_empty() {
        return Err(anyhow!("No data in CSV file"));
    }

    crate::log(&format!("Loaded {} transitions from CSV", log.len()));

    let stats = SessionStats::from_log(&log);

    export::export_to_json(&stats, json_path)?;
    crate::log(&format!("Session report saved: {}", json_path.display()));

    Ok((stats, json_path.to_path_buf()))
}
