//! Engine Configuration Module
//!
//! Operator-tunable knobs for the monitoring pipeline, loaded from TOML
//! files with per-field defaults.
//!
//! ## Loading Order
//!
//! 1. `SENTRA_CONFIG` environment variable (path to TOML file)
//! 2. `sentra.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Configuration is passed explicitly into components rather than held in a
//! global, so tests can construct variants freely.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::ml_engine::BlendPolicy;

/// Default samples per scoring window (1 s at 100 Hz).
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Default per-asset history ring capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Default consecutive confirming ticks before a transition event fires.
pub const DEFAULT_DEBOUNCE_TICKS: u32 = 2;

/// Detector hyper-parameters. Fixed seed keeps training deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Expected outlier fraction in the training set
    pub contamination: f64,

    /// Number of isolation trees
    pub n_estimators: usize,

    /// Seed for tree construction
    pub random_state: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            n_estimators: 150,
            random_state: 42,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples per scoring window
    pub window_size: usize,

    /// Per-asset sample ring capacity
    pub history_capacity: usize,

    /// Consecutive confirming ticks before an event fires
    pub debounce_ticks: u32,

    /// Worker stamping threshold during healthy monitoring
    pub healthy_score_threshold: f64,

    /// Worker stamping threshold during fault injection (lower so the
    /// injected fault is biased into the recorded labels)
    pub fault_score_threshold: f64,

    /// Tolerance applied to observed min/max in the ingest range check
    pub baseline_tolerance: f64,

    /// How detector and range scores are combined
    pub blend_policy: BlendPolicy,

    pub detector: DetectorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            debounce_ticks: DEFAULT_DEBOUNCE_TICKS,
            healthy_score_threshold: 0.65,
            fault_score_threshold: 0.5,
            baseline_tolerance: 0.10,
            blend_policy: BlendPolicy::Proportional,
            detector: DetectorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration using the documented precedence order.
    ///
    /// A missing file is not an error; a file that exists but fails to
    /// parse logs a warning and falls back to defaults so a bad edit never
    /// takes the engine down.
    pub fn load() -> Self {
        let candidate = std::env::var("SENTRA_CONFIG")
            .ok()
            .unwrap_or_else(|| "sentra.toml".to_string());

        Self::load_from(Path::new(&candidate))
    }

    /// Load from an explicit path, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded engine config");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Config parse failed, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Config read failed, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.window_size, 100);
        assert_eq!(config.history_capacity, 1000);
        assert_eq!(config.debounce_ticks, 2);
        assert!((config.healthy_score_threshold - 0.65).abs() < f64::EPSILON);
        assert!((config.fault_score_threshold - 0.5).abs() < f64::EPSILON);
        assert!((config.baseline_tolerance - 0.10).abs() < f64::EPSILON);
        assert_eq!(config.detector.n_estimators, 150);
        assert_eq!(config.detector.random_state, 42);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: EngineConfig =
            toml::from_str("window_size = 50\n[detector]\nn_estimators = 10\n")
                .expect("partial config should parse");

        assert_eq!(parsed.window_size, 50);
        assert_eq!(parsed.detector.n_estimators, 10);
        // Unspecified fields keep defaults
        assert_eq!(parsed.history_capacity, 1000);
        assert_eq!(parsed.detector.random_state, 42);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = EngineConfig::load_from(Path::new("/nonexistent/sentra.toml"));
        assert_eq!(config.window_size, DEFAULT_WINDOW_SIZE);
    }
}
