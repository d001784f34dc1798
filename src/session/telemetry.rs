//! Transition records and the CSV telemetry sink.
//!
//! Every processed spin, resolved wager and issued decision becomes one row.
//! The file is opened in append mode per row so a crash never loses completed rows.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::detection::SpinObservation;
use crate::roulette::{Color, Parity};
use crate::strategy::{BetDecision, DecisionKind, WagerOutcome, WagerResolution};

/// CSV header row. An empty `decision_kind` marks a plain observation row.
pub const CSV_HEADER: &str = "timestamp,observed_value,observed_color,decision_kind,target_parity,amount,gale_step,cycle_id,balance_after,is_keepalive,outcome";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

#[derive(Clone, Debug, PartialEq)]
pub struct TransitionRecord {
    pub timestamp: DateTime<Local>,
    pub observed_value: Option<u8>,
    pub observed_color: Option<Color>,
    pub decision_kind: Option<DecisionKind>,
    pub target_parity: Option<Parity>,
    pub amount: Decimal,
    pub gale_step: u32,
    pub cycle_id: Option<u64>,
    pub balance_after: Decimal,
    pub is_keepalive: bool,
    /// Set on rows that settle a wager
    pub outcome: Option<WagerOutcome>,
}

impl TransitionRecord {
    /// A new spin, before anything was resolved or decided on it.
    pub fn observation(observation: &SpinObservation, balance: Decimal) -> Self {
        Self {
            timestamp: observation.observed_at(),
            observed_value: observation.value(),
            observed_color: observation.color(),
            decision_kind: None,
            target_parity: None,
            amount: Decimal::ZERO,
            gale_step: 0,
            cycle_id: None,
            balance_after: balance,
            is_keepalive: false,
            outcome: None,
        }
    }

    /// An issued decision.
    pub fn decision(
        timestamp: DateTime<Local>,
        observed_value: Option<u8>,
        decision: &BetDecision,
        balance: Decimal,
    ) -> Self {
        Self {
            timestamp,
            observed_value,
            observed_color: observed_value.and_then(Color::of),
            decision_kind: Some(decision.kind),
            target_parity: Some(decision.target_parity),
            amount: decision.amount,
            gale_step: decision.gale_step,
            cycle_id: decision.cycle_id,
            balance_after: balance,
            is_keepalive: decision.kind == DecisionKind::Keepalive,
            outcome: None,
        }
    }

    /// A wager settled by `observed_value`.
    pub fn resolution(
        timestamp: DateTime<Local>,
        observed_value: u8,
        resolution: &WagerResolution,
        balance: Decimal,
    ) -> Self {
        Self {
            outcome: Some(resolution.outcome),
            ..Self::decision(timestamp, Some(observed_value), &resolution.decision, balance)
        }
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            opt(self.observed_value),
            self.observed_color.map(|c| c.as_str()).unwrap_or(""),
            self.decision_kind.map(|k| k.as_str()).unwrap_or(""),
            self.target_parity.map(|p| p.as_str()).unwrap_or(""),
            self.amount,
            self.gale_step,
            opt(self.cycle_id),
            self.balance_after,
            self.is_keepalive,
            self.outcome.map(|o| o.as_str()).unwrap_or(""),
        )
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Receives every transition record the bot produces.
pub trait TelemetrySink {
    fn record(&mut self, record: &TransitionRecord) -> Result<()>;
}

/// Keeps records in memory.
impl TelemetrySink for Vec<TransitionRecord> {
    fn record(&mut self, record: &TransitionRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Append-only CSV file sink.
pub struct CsvTelemetry {
    path: PathBuf,
}

impl CsvTelemetry {
    /// Opens `path`, writing the header if the file is new or empty.
    pub fn open(path: &Path) -> Result<Self> {
        init_csv(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySink for CsvTelemetry {
    fn record(&mut self, record: &TransitionRecord) -> Result<()> {
        append_to_csv(&self.path, record)
    }
}

/// Initializes CSV file with header if it doesn't exist or is empty.
pub fn init_csv(path: &Path) -> Result<()> {
    if path.exists() {
        let file = File::open(path).context("Failed to open existing CSV")?;
        let reader = BufReader::new(file);
        if reader.lines().next().is_some() {
            return Ok(());
        }
    }

    let mut file = File::create(path).context("Failed to create CSV file")?;
    writeln!(file, "{}", CSV_HEADER).context("Failed to write CSV header")?;
    Ok(())
}

/// Appends one record, opening the file for each write.
pub fn append_to_csv(path: &Path, record: &TransitionRecord) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open CSV for append")?;

    writeln!(file, "{}", record.to_csv_row()).context("Failed to write CSV row")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Candidate, DetectionMethod};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, 21, 5, 9).unwrap()
    }

    fn entry() -> BetDecision {
        BetDecision {
            kind: DecisionKind::Entry,
            target_parity: Parity::Odd,
            amount: dec!(10),
            gale_step: 0,
            cycle_id: Some(3),
            reason: "5 consecutive even results".to_string(),
        }
    }

    #[test]
    fn test_observation_row() {
        let candidate = Candidate::new(32, 0.9, DetectionMethod::Template).unwrap();
        let obs = SpinObservation::from_candidate(candidate, at());
        let row = TransitionRecord::observation(&obs, dec!(1000)).to_csv_row();
        assert_eq!(row, "2026-03-14T21:05:09.000,32,red,,,0,0,,1000,false,");
    }

    #[test]
    fn test_resolution_row() {
        let resolution = WagerResolution {
            decision: entry(),
            outcome: WagerOutcome::Loss,
        };
        let record = TransitionRecord::resolution(at(), 0, &resolution, dec!(990));
        assert_eq!(
            record.to_csv_row(),
            "2026-03-14T21:05:09.000,0,green,entry,odd,10,0,3,990,false,lost"
        );
    }

    #[test]
    fn test_keepalive_flag() {
        let mut keepalive = entry();
        keepalive.kind = DecisionKind::Keepalive;
        keepalive.cycle_id = None;
        let record = TransitionRecord::decision(at(), None, &keepalive, dec!(1000));
        assert!(record.is_keepalive);
        assert!(record.to_csv_row().contains(",keepalive,odd,10,0,,1000,true,"));
    }

    #[test]
    fn test_csv_header_written_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transitions.csv");

        let mut sink = CsvTelemetry::open(&path).unwrap();
        sink.record(&TransitionRecord::decision(at(), None, &entry(), dec!(1000)))
            .unwrap();
        let mut sink = CsvTelemetry::open(&path).unwrap();
        sink.record(&TransitionRecord::decision(at(), None, &entry(), dec!(1000)))
            .unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
    }
}
