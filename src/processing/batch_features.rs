//! Batch Feature Extraction — 100:1 Reduction from 100 Hz Raw Data
//!
//! For every 1-second window of raw points, computes a compact feature
//! vector capturing the statistical character of each signal, not just the
//! average. A jitter fault can have a normal mean vibration but an abnormal
//! variance; a 1 Hz average model misses it, the window statistics do not.
//!
//! Per signal (4 signals x 4 stats = 16 features):
//! - `mean`: average value (what 1 Hz downsampling would give)
//! - `std`: population standard deviation, captures chatter / noise
//! - `peak_to_peak`: max - min, captures transient spikes inside the window
//! - `rms`: root mean square, energy-based view (critical for vibration)
//!
//! Extraction is a pure function: no I/O, no randomness, same window in,
//! same vector out.

use crate::error::{EngineError, Result};
use crate::types::RawSample;

/// Statistics extracted per signal, in canonical order.
pub const STAT_NAMES: [&str; 4] = ["mean", "std", "peak_to_peak", "rms"];

/// Number of features per vector.
pub const FEATURE_COUNT: usize = 16;

/// Minimum samples per window; smaller windows are rejected.
pub const MIN_WINDOW_SIZE: usize = 10;

/// All feature column names in canonical `{signal}_{stat}` order.
///
/// This ordering is part of the contract: every producer and consumer of
/// feature vectors indexes by it.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "voltage_v_mean",
    "voltage_v_std",
    "voltage_v_peak_to_peak",
    "voltage_v_rms",
    "current_a_mean",
    "current_a_std",
    "current_a_peak_to_peak",
    "current_a_rms",
    "power_factor_mean",
    "power_factor_std",
    "power_factor_peak_to_peak",
    "power_factor_rms",
    "vibration_g_mean",
    "vibration_g_std",
    "vibration_g_peak_to_peak",
    "vibration_g_rms",
];

/// Fixed-dimension window feature vector in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Build from raw values already in canonical order.
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Look up a feature by canonical name.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    /// Values in canonical order.
    pub fn as_slice(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    /// Iterate `(name, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }

    /// True when every feature is finite.
    pub fn all_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

/// Extract a 16-dimensional feature vector from one window of raw samples.
///
/// Uses population statistics (ddof = 0), consistent with detector
/// training. Fails with [`EngineError::WindowTooSmall`] below
/// [`MIN_WINDOW_SIZE`] samples.
pub fn extract_batch_features(window: &[RawSample]) -> Result<FeatureVector> {
    if window.len() < MIN_WINDOW_SIZE {
        return Err(EngineError::WindowTooSmall {
            have: window.len(),
            need: MIN_WINDOW_SIZE,
        });
    }

    let mut values = [0.0f64; FEATURE_COUNT];
    let n = window.len() as f64;

    for (s, signal) in crate::types::SIGNAL_COLUMNS.iter().enumerate() {
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for sample in window {
            let v = sample.signal(signal).unwrap_or(0.0);
            sum += v;
            sum_sq += v * v;
            min = min.min(v);
            max = max.max(v);
        }

        let mean = sum / n;
        // Population variance; guard against tiny negative rounding error
        let variance = (sum_sq / n - mean * mean).max(0.0);

        values[s * 4] = mean;
        values[s * 4 + 1] = variance.sqrt();
        values[s * 4 + 2] = max - min;
        values[s * 4 + 3] = (sum_sq / n).sqrt();
    }

    Ok(FeatureVector::from_values(values))
}

/// Slice a longer stream into contiguous non-overlapping windows and
/// extract one feature vector per complete window.
///
/// Incomplete trailing samples are discarded. Used during calibration to
/// turn a historical stream into detector training rows.
pub fn extract_multi_window_features(
    stream: &[RawSample],
    window_size: usize,
) -> Vec<FeatureVector> {
    if window_size == 0 {
        return Vec::new();
    }

    stream
        .chunks_exact(window_size)
        .filter_map(|window| extract_batch_features(window).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(v: f64, i: f64, pf: f64, vib: f64) -> RawSample {
        RawSample {
            asset_id: "motor-1".to_string(),
            timestamp: Utc::now(),
            voltage_v: v,
            current_a: i,
            power_factor: pf,
            vibration_g: vib,
            is_faulty: false,
        }
    }

    fn constant_window(n: usize) -> Vec<RawSample> {
        (0..n).map(|_| sample(230.0, 15.0, 0.92, 0.15)).collect()
    }

    #[test]
    fn test_canonical_key_order() {
        // Contract: names are exactly {signal}_{stat} in signal-major order
        let mut expected = Vec::new();
        for signal in crate::types::SIGNAL_COLUMNS {
            for stat in STAT_NAMES {
                expected.push(format!("{}_{}", signal, stat));
            }
        }
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
        for (i, name) in FEATURE_NAMES.iter().enumerate() {
            assert_eq!(*name, expected[i], "feature order mismatch at {}", i);
        }
    }

    #[test]
    fn test_constant_signal_statistics() {
        let window = constant_window(100);
        let features = extract_batch_features(&window).expect("window large enough");

        assert!((features.get("voltage_v_mean").unwrap() - 230.0).abs() < 1e-9);
        assert!(features.get("voltage_v_std").unwrap().abs() < 1e-9);
        assert!(features.get("voltage_v_peak_to_peak").unwrap().abs() < 1e-9);
        assert!((features.get("voltage_v_rms").unwrap() - 230.0).abs() < 1e-9);
    }

    #[test]
    fn test_population_std_known_values() {
        // 10-sample ramp with hand-computed statistics
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let window: Vec<RawSample> = values.iter().map(|v| sample(*v, 0.0, 0.0, 0.0)).collect();
        let features = extract_batch_features(&window).expect("window large enough");

        // mean = 5.5, population variance = 8.25
        assert!((features.get("voltage_v_mean").unwrap() - 5.5).abs() < 1e-9);
        assert!((features.get("voltage_v_std").unwrap() - 8.25f64.sqrt()).abs() < 1e-9);
        assert!((features.get("voltage_v_peak_to_peak").unwrap() - 9.0).abs() < 1e-9);

        let expected_rms = (values.iter().map(|v| v * v).sum::<f64>() / 10.0).sqrt();
        assert!((features.get("voltage_v_rms").unwrap() - expected_rms).abs() < 1e-9);
    }

    #[test]
    fn test_window_too_small() {
        let window = constant_window(9);
        let result = extract_batch_features(&window);
        assert!(matches!(
            result,
            Err(EngineError::WindowTooSmall { have: 9, need: 10 })
        ));
    }

    #[test]
    fn test_determinism() {
        let window = constant_window(50);
        let a = extract_batch_features(&window).expect("extract");
        let b = extract_batch_features(&window).expect("extract");
        assert_eq!(a, b);
    }

    #[test]
    fn test_multi_window_discards_incomplete_tail() {
        let stream = constant_window(250);
        let vectors = extract_multi_window_features(&stream, 100);
        // 250 samples / 100 per window = 2 complete windows, 50 discarded
        assert_eq!(vectors.len(), 2);
    }

    #[test]
    fn test_multi_window_empty_and_zero_size() {
        assert!(extract_multi_window_features(&[], 100).is_empty());
        let stream = constant_window(100);
        assert!(extract_multi_window_features(&stream, 0).is_empty());
    }
}
