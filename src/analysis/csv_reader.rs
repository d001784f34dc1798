//! CSV reader for session telemetry.
//!
//! Parses the transitions CSV written by the session runner into structured rows.

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::roulette::Parity;
use crate::strategy::{DecisionKind, WagerOutcome};

/// Column count of a telemetry row.
const COLUMNS: usize = 11;

/// One transition record read back from CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRow {
    /// Timestamp string (ISO format, local time)
    pub timestamp: String,
    pub observed_value: Option<u8>,
    /// `None` on plain observation rows
    pub decision_kind: Option<DecisionKind>,
    pub target_parity: Option<Parity>,
    pub amount: Decimal,
    pub gale_step: u32,
    pub cycle_id: Option<u64>,
    pub balance_after: Decimal,
    pub is_keepalive: bool,
    pub outcome: Option<WagerOutcome>,
}

impl TelemetryRow {
    /// True for the row that records a new spin.
    pub fn is_observation(&self) -> bool {
        self.decision_kind.is_none()
    }
}

/// All rows loaded from a telemetry CSV.
#[derive(Debug, Clone, Default)]
pub struct TelemetryLog {
    pub rows: Vec<TelemetryRow>,
}

impl TelemetryLog {
    /// Load rows from a CSV file.
    ///
    /// Skips the header row and any malformed rows (with warning log).
    pub fn from_csv(path: &Path) -> Result<Self> {
        let file =
            File::open(path).context(format!("Failed to open CSV file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut rows = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result.context("Failed to read line from CSV")?;

            if line_num == 0 || line.trim().is_empty() {
                continue;
            }

            match Self::parse_line(&line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    crate::log(&format!(
                        "Warning: Skipping malformed CSV row {}: {}",
                        line_num + 1,
                        e
                    ));
                }
            }
        }

        Ok(TelemetryLog { rows })
    }

    fn parse_line(line: &str) -> Result<TelemetryRow> {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < COLUMNS {
            return Err(anyhow!("Expected {} columns, got {}", COLUMNS, parts.len()));
        }

        Ok(TelemetryRow {
            timestamp: parts[0].to_string(),
            observed_value: optional(parts[1], "observed_value")?,
            decision_kind: parse_tag(parts[3], DecisionKind::parse, "decision_kind")?,
            target_parity: parse_tag(parts[4], Parity::parse, "target_parity")?,
            amount: parts[5].parse().context("Invalid amount")?,
            gale_step: parts[6].parse().context("Invalid gale_step")?,
            cycle_id: optional(parts[7], "cycle_id")?,
            balance_after: parts[8].parse().context("Invalid balance_after")?,
            is_keepalive: parts[9].parse().context("Invalid is_keepalive")?,
            outcome: parse_tag(parts[10], WagerOutcome::parse, "outcome")?,
        })
    }

    /// Values of every spin, in order.
    pub fn spin_values(&self) -> Vec<u8> {
        self.rows
            .iter()
            .filter(|r| r.is_observation())
            .filter_map(|r| r.observed_value)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn optional<T: std::str::FromStr>(field: &str, name: &str) -> Result<Option<T>> {
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse()
        .map(Some)
        .map_err(|_| anyhow!("Invalid {}: {}", name, field))
}

fn parse_tag<T>(field: &str, parse: fn(&str) -> Option<T>, name: &str) -> Result<Option<T>> {
    if field.is_empty() {
        return Ok(None);
    }
    parse(field)
        .map(Some)
        .ok_or_else(|| anyhow!("Invalid {}: {}", name, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::telemetry::CSV_HEADER;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", CSV_HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file
    }

    #[test]
    fn test_parse_rows() {
        let file = create_test_csv(&[
            "2026-01-15T10:00:00.000,10,black,,,0,0,,1000,false,",
            "2026-01-15T10:00:00.000,10,black,entry,odd,10,0,1,1000,false,",
            "2026-01-15T10:01:00.000,7,red,entry,odd,10,0,1,1010,false,won",
        ]);
        let log = TelemetryLog::from_csv(file.path()).unwrap();

        assert_eq!(log.len(), 3);
        assert!(log.rows[0].is_observation());
        assert_eq!(log.rows[1].decision_kind, Some(DecisionKind::Entry));
        assert_eq!(log.rows[1].target_parity, Some(Parity::Odd));
        assert_eq!(log.rows[2].outcome, Some(WagerOutcome::Win));
        assert_eq!(log.rows[2].balance_after, dec!(1010));
        assert_eq!(log.rows[2].cycle_id, Some(1));
        assert_eq!(log.spin_values(), vec![10]);
    }

    #[test]
    fn test_keepalive_row_without_observation() {
        let file = create_test_csv(&["2026-01-15T10:30:00.000,,,keepalive,even,1,0,,1000,true,"]);
        let log = TelemetryLog::from_csv(file.path()).unwrap();
        assert_eq!(log.rows[0].observed_value, None);
        assert!(log.rows[0].is_keepalive);
        assert!(log.spin_values().is_empty());
    }

    #[test]
    fn test_skip_malformed_and_empty_lines() {
        let file = create_test_csv(&[
            "2026-01-15T10:00:00.000,3,red,,,0,0,,1000,false,",
            "",
            "2026-01-15T10:00:01.000,3,red,bogus,,0,0,,1000,false,",
            "too,short",
            "2026-01-15T10:00:02.000,4,black,,,0,0,,1000,false,",
        ]);
        let log = TelemetryLog::from_csv(file.path()).unwrap();
        assert_eq!(log.spin_values(), vec![3, 4]);
    }

    #[test]
    fn test_header_only() {
        let file = create_test_csv(&[]);
        assert!(TelemetryLog::from_csv(file.path()).unwrap().is_empty());
    }
}
