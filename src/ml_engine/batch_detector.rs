//! Batch Anomaly Detector — Isolation Forest on Window Statistics
//!
//! Trains and scores on the 16-dimensional statistical feature vector
//! extracted from each 1-second window of 100 Hz raw data. A jitter fault
//! whose average vibration is normal but whose variance spikes is invisible
//! to a model trained on 1 Hz averages; this detector catches it because
//! std and peak-to-peak are explicit features.
//!
//! Training contract:
//! - Healthy windows only, one model per asset
//! - Deterministic under the configured seed
//! - Calibration threshold at the 99th percentile of training decisions
//!
//! A detector is fitted exactly once per calibration cycle and replaced
//! atomically on recalibration; there is no partially-trained state.

use chrono::{DateTime, Utc};
use statrs::statistics::{Data, OrderStatistics};
use tracing::info;

use crate::config::DetectorConfig;
use crate::error::{EngineError, Result};
use crate::processing::{extract_batch_features, FeatureVector, FEATURE_COUNT};
use crate::types::RawSample;

use super::isolation_forest::IsolationForest;
use super::scaler::StandardScaler;

/// Reported in health-report metadata as `detector:<version>`.
pub const DETECTOR_VERSION: &str = "3.0.0";

/// Minimum usable training windows.
pub const MIN_TRAINING_WINDOWS: usize = 10;

/// Explainability cut-off: features below this |z| are not reported.
const EXPLAIN_ZSCORE_FLOOR: f64 = 1.5;

/// Maximum contributions returned by [`BatchAnomalyDetector::explain`].
const MAX_CONTRIBUTIONS: usize = 5;

/// One feature's contribution to an anomaly, with a templated narrative.
#[derive(Debug, Clone)]
pub struct FeatureContribution {
    pub feature: &'static str,
    pub value: f64,
    pub healthy_mean: f64,
    pub healthy_std: f64,
    pub zscore: f64,
    pub narrative: String,
}

/// Fitted outlier model for one asset.
#[derive(Debug, Clone)]
pub struct BatchAnomalyDetector {
    asset_id: String,
    forest: IsolationForest,
    scaler: StandardScaler,

    /// 99th percentile of sign-normalised training decisions
    threshold_score: f64,

    training_timestamp: DateTime<Utc>,
    training_window_count: usize,

    /// Healthy per-feature statistics kept for explainability
    healthy_means: [f64; FEATURE_COUNT],
    healthy_stds: [f64; FEATURE_COUNT],
}

impl BatchAnomalyDetector {
    /// Train on healthy window features.
    ///
    /// Rows containing a non-finite feature are dropped; fails with
    /// [`EngineError::InsufficientTraining`] when fewer than
    /// [`MIN_TRAINING_WINDOWS`] usable rows remain.
    pub fn train(
        asset_id: &str,
        feature_rows: &[FeatureVector],
        config: &DetectorConfig,
    ) -> Result<Self> {
        let usable: Vec<&FeatureVector> =
            feature_rows.iter().filter(|row| row.all_finite()).collect();

        if usable.len() < MIN_TRAINING_WINDOWS {
            return Err(EngineError::InsufficientTraining {
                have: usable.len(),
                need: MIN_TRAINING_WINDOWS,
            });
        }

        let matrix: Vec<Vec<f64>> = usable.iter().map(|row| row.as_slice().to_vec()).collect();

        // Healthy stats for explainability (sample std over training rows)
        let n = matrix.len() as f64;
        let mut healthy_means = [0.0f64; FEATURE_COUNT];
        let mut healthy_stds = [0.0f64; FEATURE_COUNT];
        for row in &matrix {
            for (d, v) in row.iter().enumerate() {
                healthy_means[d] += v;
            }
        }
        for mean in &mut healthy_means {
            *mean /= n;
        }
        for row in &matrix {
            for (d, v) in row.iter().enumerate() {
                healthy_stds[d] += (v - healthy_means[d]).powi(2);
            }
        }
        for std in &mut healthy_stds {
            *std = (*std / (n - 1.0)).sqrt();
        }

        let (scaler, scaled) = StandardScaler::fit_transform(&matrix)?;

        let forest = IsolationForest::fit(
            &scaled,
            config.n_estimators,
            config.contamination,
            config.random_state,
        )?;

        // Quantile calibration: 99th percentile of healthy raw decisions
        let raws: Vec<f64> = scaled
            .iter()
            .map(|row| -forest.decision_function(row))
            .collect();
        let mut ordered = Data::new(raws);
        let threshold_score = ordered.percentile(99);

        let detector = Self {
            asset_id: asset_id.to_string(),
            forest,
            scaler,
            threshold_score,
            training_timestamp: Utc::now(),
            training_window_count: matrix.len(),
            healthy_means,
            healthy_stds,
        };

        info!(
            asset = %asset_id,
            windows = detector.training_window_count,
            trees = detector.forest.n_trees(),
            threshold = detector.threshold_score,
            "Batch detector trained"
        );

        Ok(detector)
    }

    // ------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------

    /// Score one feature vector. Calibrated result in [0, 1]:
    /// 0 = matches the healthy distribution, 1 = maximally anomalous.
    pub fn score_batch(&self, features: &FeatureVector) -> Result<f64> {
        if !features.all_finite() {
            let bad: Vec<&str> = features
                .iter()
                .filter(|(_, v)| !v.is_finite())
                .map(|(name, _)| name)
                .collect();
            return Err(EngineError::InvalidFeatures(format!(
                "non-finite features: {}",
                bad.join(", ")
            )));
        }

        let scaled = self.scaler.transform(features.as_slice());
        let raw = -self.forest.decision_function(&scaled);
        Ok(self.calibrated_score(raw))
    }

    /// Convenience: extract features from a raw window and score.
    pub fn score_raw_window(&self, window: &[RawSample]) -> Result<f64> {
        let features = extract_batch_features(window)?;
        self.score_batch(&features)
    }

    /// Map a sign-normalised decision value onto [0, 1].
    fn calibrated_score(&self, raw: f64) -> f64 {
        let factor = self.threshold_score * 1.5;
        let calibrated = if factor > 0.0 { raw / factor } else { raw + 0.5 };
        calibrated.clamp(0.0, 1.0)
    }

    // ------------------------------------------------------------------
    // Explainability
    // ------------------------------------------------------------------

    /// Top contributing features to an anomaly, ranked by |z| against the
    /// healthy training distribution. Returns at most five entries, all
    /// with |z| >= 1.5.
    pub fn explain(&self, features: &FeatureVector) -> Vec<FeatureContribution> {
        let mut contributions: Vec<FeatureContribution> = Vec::new();

        for (i, (name, value)) in features.iter().enumerate() {
            let healthy_mean = self.healthy_means[i];
            let healthy_std = self.healthy_stds[i].max(1e-9);

            let zscore = (value - healthy_mean) / healthy_std;
            if zscore.abs() < EXPLAIN_ZSCORE_FLOOR {
                continue;
            }

            contributions.push(FeatureContribution {
                feature: name,
                value,
                healthy_mean,
                healthy_std,
                zscore,
                narrative: narrate(i, value, healthy_mean, zscore),
            });
        }

        contributions.sort_by(|a, b| {
            b.zscore
                .abs()
                .partial_cmp(&a.zscore.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        contributions.truncate(MAX_CONTRIBUTIONS);
        contributions
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn threshold_score(&self) -> f64 {
        self.threshold_score
    }

    pub fn training_window_count(&self) -> usize {
        self.training_window_count
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.training_timestamp
    }
}

/// Plain-English explanation for one feature deviation.
///
/// Feature index encodes `signal * 4 + stat` in canonical order.
fn narrate(feature_index: usize, value: f64, healthy_mean: f64, zscore: f64) -> String {
    const SIGNAL_LABELS: [&str; 4] = ["Voltage", "Current", "Power Factor", "Vibration"];

    let signal_label = SIGNAL_LABELS[feature_index / 4];
    let direction = if zscore > 0.0 { "above" } else { "below" };
    let abs_z = zscore.abs();

    match feature_index % 4 {
        1 => format!(
            "High {} variance (noise): \u{3c3}={:.4} vs healthy \u{3c3}={:.4} ({:.1}\u{3c3} {} normal)",
            signal_label.to_lowercase(),
            value,
            healthy_mean,
            abs_z,
            direction
        ),
        2 => format!(
            "{} transient spike: peak-to-peak={:.3} vs healthy={:.3} ({:.1}\u{3c3} {} normal)",
            signal_label, value, healthy_mean, abs_z, direction
        ),
        3 => format!(
            "{} energy anomaly: RMS={:.4} vs healthy={:.4} ({:.1}\u{3c3} {} normal)",
            signal_label, value, healthy_mean, abs_z, direction
        ),
        _ => format!(
            "{} mean shift: {:.2} vs healthy={:.2} ({:.1}\u{3c3} {} normal)",
            signal_label, value, healthy_mean, abs_z, direction
        ),
    }
}
