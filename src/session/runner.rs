//! Polling loop: capture, detect, resolve, decide, execute, wait.
//!
//! Observation processing and the keepalive check run on the same cadence in
//! a single thread.

use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::capture::ImageSource;
use crate::config::{load_config, BotConfig};
use crate::detection::{
    DetectionMethod, Detector, MatchThresholds, ObservationResolver, Resolution,
};
use crate::error::BotError;
use crate::log;
use crate::session::bot::{Bot, Step};
use crate::session::execution::BetExecutor;
use crate::session::risk::StopReason;
use crate::session::telemetry::{TelemetrySink, TransitionRecord};

/// Picks up edits to the config file between polls.
pub struct ConfigWatch {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigWatch {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            last_modified: modified_time(path),
        }
    }

    /// Returns the new config if the file changed and still parses.
    pub fn poll(&mut self) -> Option<BotConfig> {
        let modified = modified_time(&self.path);
        if modified.is_none() || modified == self.last_modified {
            return None;
        }
        self.last_modified = modified;

        match load_config(&self.path) {
            Ok(config) => Some(config),
            Err(e) => {
                log(&format!("Ignoring config change: {}", e));
                None
            }
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollStatus {
    Continue,
    /// The image source has no more frames
    Exhausted,
    /// Halted with nothing left to resolve
    Finished,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub polls: u64,
    pub spins: u64,
    /// Spins read by the OCR fallback
    pub ocr_readings: u64,
    pub wagers: u64,
    pub cycles: u64,
    pub final_balance: Decimal,
    /// Detection was degraded when the run ended
    pub detection_degraded: bool,
    pub halted: Option<StopReason>,
}

pub struct Runner<S, E, T> {
    source: S,
    detector: Detector,
    resolver: ObservationResolver,
    bot: Bot,
    executor: E,
    telemetry: T,
    config_watch: Option<ConfigWatch>,
    poll_interval: Duration,
    polls: u64,
    spins: u64,
    ocr_readings: u64,
    wagers: u64,
}

impl<S: ImageSource, E: BetExecutor, T: TelemetrySink> Runner<S, E, T> {
    pub fn new(source: S, detector: Detector, bot: Bot, executor: E, telemetry: T) -> Self {
        let resolver = ObservationResolver::from_config(&bot.config().detection);
        let poll_interval = Duration::from_millis(bot.config().poll_interval_ms);
        Self {
            resolver,
            poll_interval,
            source,
            detector,
            bot,
            executor,
            telemetry,
            config_watch: None,
            polls: 0,
            spins: 0,
            ocr_readings: 0,
            wagers: 0,
        }
    }

    /// Reloads the config file when it changes on disk.
    pub fn watch_config(mut self, path: &Path) -> Self {
        self.config_watch = Some(ConfigWatch::new(path));
        self
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Polls until the source is exhausted or the halted session has settled.
    pub fn run(&mut self) -> Result<RunSummary, BotError> {
        loop {
            match self.poll_once()? {
                PollStatus::Continue => {}
                PollStatus::Exhausted => {
                    log("Image source exhausted");
                    break;
                }
                PollStatus::Finished => {
                    log("Session halted and settled, stopping");
                    break;
                }
            }
        }
        Ok(self.summary())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            polls: self.polls,
            spins: self.spins,
            ocr_readings: self.ocr_readings,
            wagers: self.wagers,
            cycles: self.bot.strategy().cycles_started(),
            final_balance: self.bot.state().balance,
            detection_degraded: self.resolver.is_degraded(),
            halted: self.bot.state().halt_reason(),
        }
    }

    pub fn poll_once(&mut self) -> Result<PollStatus, BotError> {
        if self.bot.is_finished() {
            return Ok(PollStatus::Finished);
        }
        self.check_reload();

        let Some(frame) = self.source.next_frame().map_err(BotError::Capture)? else {
            return Ok(PollStatus::Exhausted);
        };
        self.polls += 1;

        let candidate = self.detector.detect(&frame.image);
        if let Resolution::NewSpin(observation) = self.resolver.resolve(candidate, frame.captured_at) {
            self.spins += 1;
            if observation.method() == DetectionMethod::Ocr {
                self.ocr_readings += 1;
            }
            let step = self.bot.on_observation(&observation)?;
            let streaks = self.bot.strategy().streaks();
            log(&format!(
                "Spin {}: {} {} via {:?} (confidence {:.2}), even run {}, odd run {}",
                self.spins,
                observation.value().map(|v| v.to_string()).unwrap_or_default(),
                observation.color().map(|c| c.as_str()).unwrap_or(""),
                observation.method(),
                observation.confidence(),
                streaks.even_run,
                streaks.odd_run
            ));
            self.dispatch(step, frame.captured_at)?;
        }

        let step = self.bot.on_idle_tick(frame.captured_at)?;
        self.dispatch(step, frame.captured_at)?;

        if !self.poll_interval.is_zero() {
            std::thread::sleep(self.poll_interval);
        }
        Ok(PollStatus::Continue)
    }

    fn check_reload(&mut self) {
        let Some(config) = self.config_watch.as_mut().and_then(ConfigWatch::poll) else {
            return;
        };
        self.detector
            .set_thresholds(MatchThresholds::from_config(&config));
        self.detector.set_region(config.detection.result_region);
        self.poll_interval = Duration::from_millis(config.poll_interval_ms);
        if let Err(e) = self.bot.request_reload(config) {
            log(&format!("Config reload rejected: {}", e));
        }
    }

    fn dispatch(&mut self, step: Step, at: DateTime<Local>) -> Result<(), BotError> {
        self.write_records(&step.records);
        if let Some(reason) = step.halted {
            log(&format!("Stop condition met: {}", reason));
        }

        for decision in step.decisions {
            if let Err(e) = self.executor.execute(&decision) {
                log(&format!(
                    "Failed to execute {} on {} for {}: {:#}",
                    decision.kind, decision.target_parity, decision.amount, e
                ));
                let records = self.bot.abandon_decision(&decision, at);
                self.write_records(&records);
                self.bot.halt(StopReason::ExecutionFailure);
                return Err(BotError::ExecutionFailure {
                    kind: decision.kind,
                    reason: format!("{:#}", e),
                });
            }
            self.wagers += 1;
        }
        Ok(())
    }

    /// Telemetry failures are logged; they never stop the session.
    fn write_records(&mut self, records: &[TransitionRecord]) {
        for record in records {
            if let Err(e) = self.telemetry.record(record) {
                log(&format!("Failed to write telemetry: {:#}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Frame;
    use crate::config::{test_config, RelativeRect};
    use crate::detection::template::tests::{glyph, quality};
    use crate::detection::template::{DetectionTemplate, TemplateSet};
    use crate::detection::SymbolMatcher;
    use crate::session::execution::DryRunExecutor;
    use crate::strategy::{BetDecision, DecisionKind};
    use anyhow::{anyhow, Result};
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    struct FrameQueue(VecDeque<Frame>);

    impl ImageSource for FrameQueue {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.0.pop_front())
        }
    }

    struct FailingExecutor;

    impl BetExecutor for FailingExecutor {
        fn execute(&mut self, _decision: &BetDecision) -> Result<()> {
            Err(anyhow!("table closed"))
        }
    }

    fn frames(values: &[Option<u8>]) -> FrameQueue {
        let now = Local::now();
        FrameQueue(
            values
                .iter()
                .map(|v| {
                    let img: GrayImage = match v {
                        Some(d) => glyph(*d),
                        None => ImageBuffer::from_pixel(20, 28, Luma([25])),
                    };
                    Frame {
                        image: DynamicImage::ImageLuma8(img).to_rgba8(),
                        captured_at: now,
                    }
                })
                .collect(),
        )
    }

    fn detector() -> Detector {
        let templates = TemplateSet::new(
            (0..=36)
                .map(|d| DetectionTemplate::new(d, glyph(d), &quality()))
                .collect(),
        );
        let matcher = SymbolMatcher::new(templates, MatchThresholds::default());
        Detector::new(matcher, None, RelativeRect::default())
    }

    fn runner<E: BetExecutor>(
        values: &[Option<u8>],
        config: BotConfig,
        executor: E,
    ) -> Runner<FrameQueue, E, Vec<TransitionRecord>> {
        let bot = Bot::with_rng(config, Local::now(), StdRng::seed_from_u64(1)).unwrap();
        Runner::new(frames(values), detector(), bot, executor, Vec::new())
    }

    #[test]
    fn test_replay_places_entry_and_settles() {
        let values = [
            Some(2),
            Some(2),
            Some(4),
            None,
            Some(6),
            Some(8),
            Some(8),
            Some(10),
            Some(10),
            Some(10),
            Some(5),
        ];
        let mut runner = runner(&values, test_config(), DryRunExecutor::new());
        let summary = runner.run().unwrap();

        assert_eq!(summary.polls, 11);
        assert_eq!(summary.spins, 6);
        assert_eq!(summary.ocr_readings, 0);
        assert_eq!(summary.wagers, 1);
        assert_eq!(summary.cycles, 1);
        assert!(!summary.detection_degraded);
        assert_eq!(summary.final_balance, dec!(1010));
        assert_eq!(summary.halted, None);

        let placed = runner.executor().placed();
        assert_eq!(placed[0].kind, DecisionKind::Entry);

        let observations = runner
            .telemetry
            .iter()
            .filter(|r| r.decision_kind.is_none())
            .count();
        assert_eq!(observations, 6);
    }

    #[test]
    fn test_execution_failure_halts_and_abandons() {
        let values: Vec<Option<u8>> = [2, 4, 6, 8, 10, 12].iter().map(|v| Some(*v)).collect();
        let mut runner = runner(&values, test_config(), FailingExecutor);
        let err = runner.run().unwrap_err();

        assert!(matches!(
            err,
            BotError::ExecutionFailure {
                kind: DecisionKind::Entry,
                ..
            }
        ));
        assert!(runner.bot().state().is_halted());
        assert!(!runner.bot().strategy().cycle_active());
        let last = runner.telemetry.last().unwrap();
        assert_eq!(last.decision_kind, Some(DecisionKind::CycleComplete));
    }

    #[test]
    fn test_halted_session_stops_once_settled() {
        let mut config = test_config();
        config.max_gales = 0;
        config.stop_loss_count = Some(1);
        let values: Vec<Option<u8>> = [2, 4, 6, 8, 10, 12, 14, 16]
            .iter()
            .map(|v| Some(*v))
            .collect();
        let mut runner = runner(&values, config, DryRunExecutor::new());
        let summary = runner.run().unwrap();

        assert_eq!(summary.halted, Some(StopReason::StopLossCount));
        assert_eq!(summary.polls, 6);
        assert_eq!(summary.final_balance, dec!(990));
    }

    #[test]
    fn test_config_watch_detects_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let write = |base: u32| {
            let json = format!(
                r#"{{"streak_length": 3, "base_bet": {}, "max_gales": 1,
                    "zero_policy": "reset", "keepalive_interval_secs": 0}}"#,
                base
            );
            fs::write(&path, json).unwrap();
        };
        write(5);
        let mut watch = ConfigWatch::new(&path);
        assert!(watch.poll().is_none());

        // Force a distinct modification time
        std::thread::sleep(std::time::Duration::from_millis(20));
        write(7);
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();
        let config = watch.poll().unwrap();
        assert_eq!(config.base_bet, dec!(7));
        assert!(watch.poll().is_none());
    }
}
