//! Session configuration.
//!
//! Loaded from config.json once per session and validated before the first
//! observation. Fields that decide money flow (`zero_policy`,
//! `keepalive_interval_secs`, the bet sizing) have no defaults and must be
//! written out explicitly.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::BotError;
use crate::strategy::{StakeProgression, ZeroPolicy};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "STREAK_BOT_CONFIG";

/// A rectangle in relative coordinates (0.0 to 1.0).
/// Used for locating the result display so it scales with the capture size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    /// X position of top-left corner (0.0 = left edge, 1.0 = right edge)
    pub x: f32,
    /// Y position of top-left corner (0.0 = top edge, 1.0 = bottom edge)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl Default for RelativeRect {
    fn default() -> Self {
        // Whole frame: sources that already deliver the cropped result display
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

/// Progression family selected in config.json.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionKind {
    #[default]
    Martingale,
    Fibonacci,
    Flat,
}

/// Thresholds for the "is this region empty" heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmptinessThresholds {
    /// Minimum grayscale intensity variance of a region that shows a number
    pub min_variance: f32,
    /// Minimum fraction of pixels sitting on an edge
    pub min_edge_density: f32,
}

/// Fallback (OCR) reader settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    /// Conservative check run before OCR (region is empty only if both signals are low)
    pub precheck: EmptinessThresholds,
    /// Strict check run after OCR (result is discarded if either signal is low)
    pub postcheck: EmptinessThresholds,
    /// Confidence assigned to OCR readings
    pub ocr_confidence: f32,
    /// Pixels brighter than this become text before OCR
    pub binarize_threshold: u8,
    /// Minimum Tesseract word confidence (0-100)
    pub min_word_confidence: f32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            precheck: EmptinessThresholds {
                min_variance: 40.0,
                min_edge_density: 0.01,
            },
            postcheck: EmptinessThresholds {
                min_variance: 150.0,
                min_edge_density: 0.03,
            },
            ocr_confidence: 0.5,
            binarize_threshold: 160,
            min_word_confidence: 60.0,
        }
    }
}

/// Detection pipeline settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Region of the captured frame holding the last result
    pub result_region: RelativeRect,
    /// Directory of digit templates; defaults to `<exe_dir>/resources/templates`
    pub template_dir: Option<PathBuf>,
    /// Templates whose fill ratio falls outside this range are unusable
    pub template_min_fill: f32,
    pub template_max_fill: f32,
    /// Templates with lower intensity variance are unusable
    pub template_min_variance: f32,
    /// More than this many digits above threshold means a crowded region (e.g. the betting grid)
    pub max_simultaneous_hits: usize,
    /// Consecutive unreadable polls before detection is reported as degraded
    pub degraded_after_misses: u32,
    /// Consecutive unreadable polls that clear the last confirmed value
    pub blank_polls_to_clear: u32,
    pub fallback: FallbackConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            result_region: RelativeRect::default(),
            template_dir: None,
            template_min_fill: 0.03,
            template_max_fill: 0.70,
            template_min_variance: 100.0,
            max_simultaneous_hits: 5,
            degraded_after_misses: 20,
            blank_polls_to_clear: 1,
            fallback: FallbackConfig::default(),
        }
    }
}

/// Complete bot configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Consecutive same-parity results that trigger an entry
    pub streak_length: u32,
    /// Stake of the entry wager
    pub base_bet: Decimal,
    /// Martingale multiplier
    #[serde(default = "default_multiplier")]
    pub multiplier: Decimal,
    #[serde(default)]
    pub progression: ProgressionKind,
    /// Progressive stakes allowed after the entry wager
    pub max_gales: u32,
    pub zero_policy: ZeroPolicy,
    /// Idle time before a keepalive wager (0 disables keepalive)
    pub keepalive_interval_secs: u64,
    #[serde(default = "default_keepalive_stake")]
    pub keepalive_stake: Decimal,
    #[serde(default)]
    pub initial_balance: Decimal,
    #[serde(default)]
    pub stop_loss_amount: Option<Decimal>,
    #[serde(default)]
    pub stop_loss_count: Option<u32>,
    #[serde(default)]
    pub stop_win_amount: Option<Decimal>,
    #[serde(default)]
    pub stop_win_count: Option<u32>,
    /// Minimum template score for a reading (0.0-1.0)
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f32,
    /// Minimum gap between the best and second-best digit scores
    #[serde(default = "default_ambiguity_margin")]
    pub ambiguity_margin: f32,
    /// Delay between polls of the image source (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub detection: DetectionConfig,
}

fn default_multiplier() -> Decimal {
    dec!(2)
}

fn default_keepalive_stake() -> Decimal {
    dec!(1)
}

fn default_acceptance_threshold() -> f32 {
    0.75
}

fn default_ambiguity_margin() -> f32 {
    0.10
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl BotConfig {
    /// Checks numeric sanity. Called before any observation is processed.
    ///
    /// Returns the worst-case exposure of one cycle.
    pub fn validate(&self) -> Result<Decimal, BotError> {
        if self.streak_length == 0 {
            return Err(BotError::config("streak_length must be at least 1"));
        }
        if self.base_bet <= Decimal::ZERO {
            return Err(BotError::config(format!(
                "base_bet must be positive, got {}",
                self.base_bet
            )));
        }
        if self.progression == ProgressionKind::Martingale && self.multiplier <= Decimal::ONE {
            return Err(BotError::config(format!(
                "multiplier must be greater than 1, got {}",
                self.multiplier
            )));
        }
        let Some(exposure) = self
            .stake_progression()
            .max_exposure(self.base_bet, self.max_gales)
        else {
            return Err(BotError::config(format!(
                "stakes overflow within {} gales of base_bet {}",
                self.max_gales, self.base_bet
            )));
        };
        if self.keepalive_interval_secs > 0 {
            if self.keepalive_stake <= Decimal::ZERO {
                return Err(BotError::config("keepalive_stake must be positive"));
            }
            if self.keepalive_interval().is_none() {
                return Err(BotError::config(format!(
                    "keepalive_interval_secs {} is out of range",
                    self.keepalive_interval_secs
                )));
            }
        }
        if self.initial_balance < Decimal::ZERO {
            return Err(BotError::config("initial_balance must not be negative"));
        }
        for (name, amount) in [
            ("stop_loss_amount", self.stop_loss_amount),
            ("stop_win_amount", self.stop_win_amount),
        ] {
            if let Some(amount) = amount {
                if amount <= Decimal::ZERO {
                    return Err(BotError::config(format!("{} must be positive", name)));
                }
            }
        }
        for (name, count) in [
            ("stop_loss_count", self.stop_loss_count),
            ("stop_win_count", self.stop_win_count),
        ] {
            if count == Some(0) {
                return Err(BotError::config(format!("{} must be at least 1", name)));
            }
        }
        if !(self.acceptance_threshold > 0.0 && self.acceptance_threshold <= 1.0) {
            return Err(BotError::config(format!(
                "acceptance_threshold must be in (0, 1], got {}",
                self.acceptance_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.ambiguity_margin) {
            return Err(BotError::config(format!(
                "ambiguity_margin must be in [0, 1), got {}",
                self.ambiguity_margin
            )));
        }
        let d = &self.detection;
        if d.template_min_fill >= d.template_max_fill {
            return Err(BotError::config(
                "template_min_fill must be below template_max_fill",
            ));
        }
        if d.max_simultaneous_hits == 0 || d.blank_polls_to_clear == 0 {
            return Err(BotError::config(
                "max_simultaneous_hits and blank_polls_to_clear must be at least 1",
            ));
        }
        let f = &d.fallback;
        if f.postcheck.min_variance < f.precheck.min_variance
            || f.postcheck.min_edge_density < f.precheck.min_edge_density
        {
            return Err(BotError::config(
                "fallback postcheck thresholds must be at least as strict as precheck",
            ));
        }
        Ok(exposure)
    }

    /// The stake progression used by the cycle state machine.
    pub fn stake_progression(&self) -> StakeProgression {
        match self.progression {
            ProgressionKind::Martingale => StakeProgression::Martingale {
                multiplier: self.multiplier,
            },
            ProgressionKind::Fibonacci => StakeProgression::Fibonacci,
            ProgressionKind::Flat => StakeProgression::Flat,
        }
    }

    /// Idle interval before a keepalive wager, or `None` when disabled.
    pub fn keepalive_interval(&self) -> Option<chrono::Duration> {
        if self.keepalive_interval_secs == 0 {
            return None;
        }
        i64::try_from(self.keepalive_interval_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }
}

/// Returns the config path: `$STREAK_BOT_CONFIG`, else `<exe_dir>/config.json`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| crate::paths::get_exe_dir().join("config.json"))
}

/// Loads and validates configuration. Any failure is a configuration error.
pub fn load_config(path: &Path) -> Result<BotConfig, BotError> {
    crate::log(&format!("Loading config from: {}", path.display()));

    let contents = fs::read_to_string(path).map_err(|e| {
        BotError::config(format!("failed to read {}: {}", path.display(), e))
    })?;
    let config: BotConfig = serde_json::from_str(&contents).map_err(|e| {
        BotError::config(format!("failed to parse {}: {}", path.display(), e))
    })?;
    config.validate()?;

    crate::log(&format!(
        "Config loaded: streak={} base_bet={} progression={:?} max_gales={} zero_policy={:?}",
        config.streak_length,
        config.base_bet,
        config.progression,
        config.max_gales,
        config.zero_policy
    ));
    Ok(config)
}

#[cfg(test)]
pub(crate) fn test_config() -> BotConfig {
    BotConfig {
        streak_length: 5,
        base_bet: dec!(10),
        multiplier: dec!(2),
        progression: ProgressionKind::Martingale,
        max_gales: 2,
        zero_policy: ZeroPolicy::CountAsLoss,
        keepalive_interval_secs: 0,
        keepalive_stake: dec!(1),
        initial_balance: dec!(1000),
        stop_loss_amount: None,
        stop_loss_count: None,
        stop_win_amount: None,
        stop_win_count: None,
        acceptance_threshold: 0.75,
        ambiguity_margin: 0.10,
        poll_interval_ms: 0,
        detection: DetectionConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"{
        "streak_length": 5,
        "base_bet": 10,
        "max_gales": 3,
        "zero_policy": "neutral",
        "keepalive_interval_secs": 1800
    }"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: BotConfig = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(config.base_bet, dec!(10));
        assert_eq!(config.multiplier, dec!(2));
        assert_eq!(config.progression, ProgressionKind::Martingale);
        assert_eq!(config.zero_policy, ZeroPolicy::Neutral);
        assert!((config.acceptance_threshold - 0.75).abs() < 1e-6);
        assert!((config.ambiguity_margin - 0.10).abs() < 1e-6);
        assert_eq!(config.detection.max_simultaneous_hits, 5);
        assert!(config.stop_loss_amount.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_policy_is_required() {
        let json = r#"{
            "streak_length": 5,
            "base_bet": 10,
            "max_gales": 3,
            "keepalive_interval_secs": 1800
        }"#;
        assert!(serde_json::from_str::<BotConfig>(json).is_err());
    }

    #[test]
    fn test_keepalive_interval_is_required() {
        let json = r#"{
            "streak_length": 5,
            "base_bet": 10,
            "max_gales": 3,
            "zero_policy": "reset"
        }"#;
        assert!(serde_json::from_str::<BotConfig>(json).is_err());
    }

    #[test]
    fn test_multiplier_must_exceed_one() {
        let mut config = test_config();
        config.multiplier = dec!(1);
        assert!(matches!(config.validate(), Err(BotError::Configuration(_))));
    }

    #[test]
    fn test_flat_progression_ignores_multiplier() {
        let mut config = test_config();
        config.progression = ProgressionKind::Flat;
        config.multiplier = dec!(1);
        config.validate().unwrap();
    }

    #[test]
    fn test_overflowing_gale_stakes_rejected() {
        let mut config = test_config();
        config.max_gales = 100;
        assert!(matches!(config.validate(), Err(BotError::Configuration(_))));

        config.max_gales = 3;
        assert_eq!(config.validate().unwrap(), dec!(150));
    }

    #[test]
    fn test_keepalive_interval_out_of_range_rejected() {
        let mut config = test_config();
        config.keepalive_interval_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(BotError::Configuration(_))));
    }

    #[test]
    fn test_negative_base_bet_rejected() {
        let mut config = test_config();
        config.base_bet = dec!(-5);
        assert!(matches!(config.validate(), Err(BotError::Configuration(_))));
    }

    #[test]
    fn test_postcheck_must_be_stricter() {
        let mut config = test_config();
        config.detection.fallback.postcheck.min_variance = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keepalive_interval_disabled_at_zero() {
        let mut config = test_config();
        assert!(config.keepalive_interval().is_none());
        config.keepalive_interval_secs = 1800;
        assert_eq!(
            config.keepalive_interval(),
            Some(chrono::Duration::seconds(1800))
        );
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let dir = tempdir().unwrap();
        let result = load_config(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(BotError::Configuration(_))));
    }

    #[test]
    fn test_load_config_validates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, MINIMAL.replace("\"base_bet\": 10", "\"base_bet\": 0")).unwrap();
        assert!(matches!(load_config(&path), Err(BotError::Configuration(_))));

        std::fs::write(&path, MINIMAL).unwrap();
        assert_eq!(load_config(&path).unwrap().max_gales, 3);
    }
}
