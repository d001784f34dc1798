use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::process::Command;

use crate::log;

/// Environment variable pointing at a Tesseract executable.
pub const TESSERACT_ENV: &str = "TESSERACT_PATH";

#[derive(Clone, Debug)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` uses Tesseract's built-in tessdata location
    pub tessdata: Option<PathBuf>,
}

/// Returns the per-user directory for a bundled Tesseract.
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("roulette-streak-bot")
        .join("tesseract")
}

fn executable_name() -> &'static str {
    if cfg!(windows) { "tesseract.exe" } else { "tesseract" }
}

/// Locates a Tesseract installation.
///
/// Search order: `$TESSERACT_PATH`, the per-user bundle directory, common
/// install locations, then `tesseract` on the system PATH.
pub fn find_tesseract() -> Result<TesseractPaths> {
    if let Some(path) = std::env::var_os(TESSERACT_ENV).map(PathBuf::from) {
        if path.exists() {
            log(&format!("Tesseract from {}: {}", TESSERACT_ENV, path.display()));
            return Ok(with_tessdata(path));
        }
        log(&format!(
            "{} points at missing file {}, continuing search",
            TESSERACT_ENV,
            path.display()
        ));
    }

    let bundled = get_tesseract_dir().join(executable_name());
    if bundled.exists() {
        log(&format!("Tesseract found at: {}", bundled.display()));
        return Ok(with_tessdata(bundled));
    }

    let common_paths = [
        r"C:\Program Files\Tesseract-OCR\tesseract.exe",
        r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
        "/usr/bin/tesseract",
        "/usr/local/bin/tesseract",
        "/opt/homebrew/bin/tesseract",
    ];
    for path in common_paths.iter().map(PathBuf::from) {
        if path.exists() {
            log(&format!("Tesseract found at: {}", path.display()));
            return Ok(with_tessdata(path));
        }
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            log("Found Tesseract in system PATH");
            return Ok(TesseractPaths {
                executable: PathBuf::from("tesseract"),
                tessdata: None,
            });
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install it, add it to PATH, or set {}",
        TESSERACT_ENV
    ))
}

/// Uses a `tessdata` directory next to the executable when one exists.
fn with_tessdata(executable: PathBuf) -> TesseractPaths {
    let tessdata = executable
        .parent()
        .map(|dir| dir.join("tessdata"))
        .filter(|dir| dir.join("eng.traineddata").exists());
    TesseractPaths {
        executable,
        tessdata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_with_tessdata_detects_sibling_dir() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join(executable_name());
        std::fs::write(&exe, "").unwrap();

        assert!(with_tessdata(exe.clone()).tessdata.is_none());

        std::fs::create_dir(dir.path().join("tessdata")).unwrap();
        std::fs::write(dir.path().join("tessdata").join("eng.traineddata"), "").unwrap();
        assert_eq!(
            with_tessdata(exe).tessdata,
            Some(dir.path().join("tessdata"))
        );
    }

    #[test]
    fn test_tesseract_dir_is_app_scoped() {
        assert!(get_tesseract_dir().ends_with("roulette-streak-bot/tesseract"));
    }
}
