//! Baseline Construction — Statistical Profiling of Healthy Behaviour
//!
//! Learns expected operating ranges from healthy data only. One asset, one
//! profile; profiles are immutable once created.
//!
//! Constraints:
//! - Healthy data means `is_faulty == false`
//! - Non-finite values are treated as missing and ignored
//! - Fails when signal coverage drops below 80 %
//! - min/max are descriptive (what happened), not prescriptive

pub mod validation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::types::{RawSample, SIGNAL_COLUMNS};

/// Minimum valid sample ratio per signal for baseline construction.
pub const MIN_COVERAGE_RATIO: f64 = 0.80;

// ============================================================================
// Profile Types
// ============================================================================

/// Statistical profile for a single signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalProfile {
    /// Mean value over healthy data
    pub mean: f64,

    /// Sample standard deviation (never negative)
    pub std: f64,

    /// Minimum observed value (descriptive)
    pub min: f64,

    /// Maximum observed value (descriptive)
    pub max: f64,

    /// Number of valid samples used
    pub sample_count: usize,
}

/// Training period metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub sample_count: usize,

    /// Average fraction of non-missing values across profiled signals
    pub valid_sample_ratio: f64,
}

/// Complete baseline profile for one asset. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineProfile {
    pub baseline_id: String,
    pub asset_id: String,
    pub created_at: DateTime<Utc>,
    pub training_window: TrainingWindow,

    /// Per-signal profiles, keyed by canonical signal name
    pub signal_profiles: BTreeMap<String, SignalProfile>,
}

impl BaselineProfile {
    /// Serialise to a self-describing JSON file.
    ///
    /// File naming follows `baseline_{asset_id}_{short_id}.json`; the
    /// round-trip preserves every field.
    pub fn save_to_file(&self, directory: &Path) -> Result<std::path::PathBuf> {
        std::fs::create_dir_all(directory)?;

        let short_id: String = self.baseline_id.chars().take(8).collect();
        let path = directory.join(format!("baseline_{}_{}.json", self.asset_id, short_id));

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!(path = %path.display(), asset = %self.asset_id, "Baseline saved");
        Ok(path)
    }

    /// Load a profile previously written by [`save_to_file`](Self::save_to_file).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&json)?;
        Ok(profile)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Constructs baseline profiles from healthy sensor data.
#[derive(Debug, Clone)]
pub struct BaselineBuilder {
    min_coverage: f64,
}

impl Default for BaselineBuilder {
    fn default() -> Self {
        Self::new(MIN_COVERAGE_RATIO)
    }
}

impl BaselineBuilder {
    /// Create a builder with an explicit coverage floor.
    pub fn new(min_coverage: f64) -> Self {
        Self { min_coverage }
    }

    /// Build a baseline profile from one asset's samples.
    ///
    /// Procedure: drop faulty samples, apply the optional training-window
    /// filter, enforce per-signal coverage, then compute mean/std/min/max
    /// per signal ignoring missing (non-finite) values.
    pub fn build(
        &self,
        samples: &[RawSample],
        asset_id: &str,
        training_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<BaselineProfile> {
        if samples.is_empty() {
            return Err(EngineError::InsufficientData { have: 0, need: 1 });
        }

        // Healthy data only
        let mut healthy: Vec<&RawSample> = samples.iter().filter(|s| !s.is_faulty).collect();

        if let Some((start, end)) = training_window {
            healthy.retain(|s| s.timestamp >= start && s.timestamp <= end);
        }

        if healthy.is_empty() {
            return Err(EngineError::InsufficientData {
                have: 0,
                need: 1,
            });
        }

        let total = healthy.len();
        let window_start = healthy
            .iter()
            .map(|s| s.timestamp)
            .min()
            .unwrap_or_else(Utc::now);
        let window_end = healthy
            .iter()
            .map(|s| s.timestamp)
            .max()
            .unwrap_or_else(Utc::now);

        let mut signal_profiles = BTreeMap::new();
        let mut valid_sum = 0usize;

        for signal in SIGNAL_COLUMNS {
            let values: Vec<f64> = healthy
                .iter()
                .filter_map(|s| s.signal(signal))
                .filter(|v| v.is_finite())
                .collect();

            let coverage = values.len() as f64 / total as f64;
            if coverage < self.min_coverage {
                return Err(EngineError::InsufficientCoverage {
                    signal: signal.to_string(),
                    coverage: coverage * 100.0,
                    required: self.min_coverage * 100.0,
                });
            }

            valid_sum += values.len();
            signal_profiles.insert(signal.to_string(), compute_profile(&values));
        }

        let valid_ratio = valid_sum as f64 / (SIGNAL_COLUMNS.len() * total) as f64;

        let profile = BaselineProfile {
            baseline_id: Uuid::new_v4().to_string(),
            asset_id: asset_id.to_string(),
            created_at: Utc::now(),
            training_window: TrainingWindow {
                start: window_start,
                end: window_end,
                sample_count: total,
                valid_sample_ratio: round6(valid_ratio),
            },
            signal_profiles,
        };

        info!(
            asset = %asset_id,
            baseline_id = %profile.baseline_id,
            samples = total,
            valid_ratio = profile.training_window.valid_sample_ratio,
            "Baseline built"
        );

        Ok(profile)
    }
}

/// Compute a signal profile from valid (finite) values.
fn compute_profile(values: &[f64]) -> SignalProfile {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    // Sample standard deviation (ddof = 1); zero for a single sample
    let std = if n < 2 {
        0.0
    } else {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt()
    };

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    SignalProfile {
        mean: round6(mean),
        std: round6(std),
        min: round6(min),
        max: round6(max),
        sample_count: n,
    }
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}
