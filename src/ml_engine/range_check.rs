//! Range-Based Fallback Scoring and Score Blending
//!
//! When no trained detector exists for an asset but a baseline does, the
//! latest sample is scored by how far each signal sits outside the observed
//! baseline range. The piecewise mapping is calibrated so graduated
//! deviations land in graduated risk bands rather than saturating.
//!
//! When both detector and range scores are available for the same window,
//! [`blend_scores`] combines them. The forest tends to be bimodal on this
//! task (near 0 or near 1) while the range check is proportional; the
//! blend trusts the proportional signal when the two disagree.

use serde::{Deserialize, Serialize};

use crate::baseline::BaselineProfile;
use crate::types::{RawSample, SIGNAL_COLUMNS};

/// Floor on the observed range to avoid divide-by-zero on flat signals.
const MIN_RANGE: f64 = 1e-3;

/// Upper clamp for any blended score.
const BLEND_CEILING: f64 = 0.98;

/// How detector and range scores are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendPolicy {
    /// Canonical policy: trust the proportional range signal when the
    /// detector disagrees; otherwise 0.6 range + 0.4 detector.
    Proportional,

    /// Alternative weighting that leans on the detector in the agreement
    /// branch (0.4 range + 0.6 detector). Offered for operators who prefer
    /// the model's sensitivity over graduated severity.
    MlFirst,
}

/// Score the latest sample against observed baseline ranges.
///
/// Per signal: `deviation = max(0, (min - x)/range, (x - max)/range)`,
/// averaged across the four signals, then mapped piecewise:
/// - deviation < 0.3  -> [0, 0.15)
/// - [0.3, 1.0)       -> [0.15, 0.36)
/// - [1.0, 2.5)       -> [0.36, 0.66)
/// - >= 2.5           -> [0.66, 0.95]
pub fn range_check_score(profile: &BaselineProfile, sample: &RawSample) -> f64 {
    let mut total_deviation = 0.0;
    let mut checked = 0usize;

    for signal in SIGNAL_COLUMNS {
        let Some(sig_profile) = profile.signal_profiles.get(signal) else {
            continue;
        };
        let Some(value) = sample.signal(signal) else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }

        let range = (sig_profile.max - sig_profile.min).max(MIN_RANGE);

        let deviation = if value < sig_profile.min {
            (sig_profile.min - value) / range
        } else if value > sig_profile.max {
            (value - sig_profile.max) / range
        } else {
            0.0
        };

        total_deviation += deviation;
        checked += 1;
    }

    if checked == 0 {
        return 0.0;
    }

    deviation_to_score(total_deviation / checked as f64)
}

/// Piecewise severity mapping from average deviation to anomaly score.
fn deviation_to_score(avg_deviation: f64) -> f64 {
    if avg_deviation <= 0.0 {
        0.0
    } else if avg_deviation < 0.3 {
        avg_deviation * 0.5
    } else if avg_deviation < 1.0 {
        0.15 + (avg_deviation - 0.3) * 0.30
    } else if avg_deviation < 2.5 {
        0.36 + (avg_deviation - 1.0) * 0.20
    } else {
        (0.66 + (avg_deviation - 2.5) * 0.06).min(0.95)
    }
}

/// Blend detector and range scores into the final anomaly score.
///
/// Clamped to [0, 0.98] so downstream health never bottoms out on a single
/// blended reading.
pub fn blend_scores(ml_score: f64, range_score: f64, policy: BlendPolicy) -> f64 {
    let blended = if ml_score > 0.7 && range_score < 0.4 {
        // Detector says critical, range says mild: weight the
        // proportional signal
        range_score * 0.7 + ml_score * 0.3
    } else if ml_score < 0.2 && range_score > 0.3 {
        // Detector says healthy, range says fault: trust range fully
        range_score
    } else {
        match policy {
            BlendPolicy::Proportional => range_score * 0.6 + ml_score * 0.4,
            BlendPolicy::MlFirst => range_score * 0.4 + ml_score * 0.6,
        }
    };

    blended.clamp(0.0, BLEND_CEILING)
}
