//! JSON export for session statistics.

use super::statistics::SessionStats;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Export statistics to a JSON file.
///
/// The output is pretty-printed for human readability.
pub fn export_to_json(stats: &SessionStats, output_path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(stats).context("Failed to serialize statistics to JSON")?;

    let mut file = File::create(output_path)
        .context(format!("Failed to create JSON file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;

    Ok(())
}
