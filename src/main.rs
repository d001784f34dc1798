//! Roulette Streak Bot
//!
//! Reads the last result from captured table images, tracks even/odd streaks
//! and bets against a streak once it reaches the configured length, with
//! progressive stakes, stop conditions and idle keepalive wagers.
//!
//! Usage:
//!   roulette-streak-bot run [frames_dir]   replay frames with a dry-run executor
//!   roulette-streak-bot report             write the session report JSON

mod analysis;
mod capture;
mod config;
mod detection;
mod error;
mod ocr;
mod paths;
mod roulette;
mod session;
mod strategy;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::capture::DirectorySource;
use crate::detection::{
    load_templates, Detector, FallbackReader, MatchThresholds, SymbolMatcher, TemplateQuality,
};
use crate::ocr::{find_tesseract, TesseractEngine};
use crate::session::{Bot, CsvTelemetry, DryRunExecutor, Runner};

const LOG_FILE: &str = "roulette_streak_bot.log";

/// Logs a message to both stdout and the log file.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join(LOG_FILE);
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join(LOG_FILE);
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    paths::ensure_directories()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("run") => {
            let frames_dir = args
                .get(1)
                .map(PathBuf::from)
                .unwrap_or_else(paths::get_frames_dir);
            run_session(frames_dir)
        }
        Some("report") => {
            let (stats, path) = analysis::generate_report(
                &paths::get_telemetry_path(),
                &paths::get_report_path(),
            )?;
            log(&format!(
                "{} spins, {} won / {} lost, final balance {} ({})",
                stats.total_spins,
                stats.wagers_won,
                stats.wagers_lost,
                stats.final_balance,
                path.display()
            ));
            Ok(())
        }
        Some(other) => Err(anyhow!(
            "Unknown command '{}'. Usage: roulette-streak-bot [run [frames_dir] | report]",
            other
        )),
    }
}

fn run_session(frames_dir: PathBuf) -> Result<()> {
    let config_path = config::config_path();
    let config = config::load_config(&config_path)?;

    let template_dir = config
        .detection
        .template_dir
        .clone()
        .unwrap_or_else(paths::get_template_dir);
    let templates = load_templates(
        &template_dir,
        &TemplateQuality::from_config(&config.detection),
    )?;

    let fallback = if config.detection.fallback.enabled {
        match find_tesseract() {
            Ok(tesseract) => Some(FallbackReader::new(
                Box::new(TesseractEngine::new(tesseract)),
                config.detection.fallback.clone(),
            )),
            Err(e) => {
                log(&format!("Warning: OCR fallback disabled: {}", e));
                None
            }
        }
    } else {
        None
    };

    let detector = Detector::new(
        SymbolMatcher::new(templates, MatchThresholds::from_config(&config)),
        fallback,
        config.detection.result_region,
    );

    let source = DirectorySource::open(&frames_dir)?;
    let telemetry = CsvTelemetry::open(&paths::get_telemetry_path())
        .context("Failed to open telemetry CSV")?;
    log(&format!("Telemetry: {}", telemetry.path().display()));
    let bot = Bot::new(config, Local::now())?;

    let mut runner = Runner::new(source, detector, bot, DryRunExecutor::new(), telemetry)
        .watch_config(&config_path);
    let summary = runner.run()?;

    log(&format!(
        "Session finished: {} polls, {} spins, {} cycles, {} dry-run wagers, balance {}{}",
        summary.polls,
        summary.spins,
        summary.cycles,
        runner.executor().placed().len(),
        summary.final_balance,
        summary
            .halted
            .map(|reason| format!(" (halted: {})", reason))
            .unwrap_or_default()
    ));
    Ok(())
}
