use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the default frames directory: `<exe_dir>/frames/`
pub fn get_frames_dir() -> PathBuf {
    get_exe_dir().join("frames")
}

/// Returns the digit template directory: `<exe_dir>/resources/templates/`
pub fn get_template_dir() -> PathBuf {
    get_exe_dir().join("resources").join("templates")
}

/// Returns the telemetry CSV path: `<exe_dir>/logs/transitions.csv`
pub fn get_telemetry_path() -> PathBuf {
    get_logs_dir().join("transitions.csv")
}

/// Returns the session report path: `<exe_dir>/session_report.json`
pub fn get_report_path() -> PathBuf {
    get_exe_dir().join("session_report.json")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_template_dir())?;
    Ok(())
}
