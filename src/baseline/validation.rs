//! Baseline Validation — Read-Only Verification Against Profiles
//!
//! Checks profile structure and verifies data against the N-sigma rule.
//! All functions are read-only; there is no self-healing and no adaptive
//! baseline here.

use crate::types::RawSample;

use super::{BaselineProfile, SignalProfile};

/// One out-of-bounds observation recorded during a data check.
#[derive(Debug, Clone)]
pub struct Violation {
    pub signal: String,
    pub value: f64,
    pub expected_min: f64,
    pub expected_max: f64,
}

/// Result of checking a batch of samples against a profile.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub total_checks: usize,
    pub failed_checks: usize,
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    /// Fraction of checks that passed; 1.0 when nothing was checked.
    pub fn pass_rate(&self) -> f64 {
        if self.total_checks == 0 {
            return 1.0;
        }
        (self.total_checks - self.failed_checks) as f64 / self.total_checks as f64
    }

    /// True when no violation was recorded.
    pub fn passed(&self) -> bool {
        self.failed_checks == 0
    }
}

/// N-sigma bounds for a signal profile.
pub fn sigma_bounds(profile: &SignalProfile, sigma_multiplier: f64) -> (f64, f64) {
    (
        profile.mean - sigma_multiplier * profile.std,
        profile.mean + sigma_multiplier * profile.std,
    )
}

/// Structural validation of a baseline profile.
///
/// Returns human-readable error messages; empty when the profile is
/// well-formed.
pub fn validate_baseline(profile: &BaselineProfile) -> Vec<String> {
    let mut errors = Vec::new();

    if profile.asset_id.is_empty() {
        errors.push("asset_id is required".to_string());
    }

    if profile.signal_profiles.is_empty() {
        errors.push("At least one signal profile is required".to_string());
    }

    for (name, sig) in &profile.signal_profiles {
        if sig.std < 0.0 {
            errors.push(format!("Signal '{}' has negative std: {}", name, sig.std));
        }
        if sig.sample_count == 0 {
            errors.push(format!("Signal '{}' has zero samples", name));
        }
        if sig.min > sig.max {
            errors.push(format!("Signal '{}' has min > max", name));
        }
    }

    if profile.training_window.sample_count == 0 {
        errors.push("Training window has zero samples".to_string());
    }

    errors
}

/// Check each sample's signals against `mean ± k·std`.
///
/// Non-finite values are skipped as missing. Read-only: neither profile
/// nor data is modified.
pub fn check_data_against_baseline(
    samples: &[RawSample],
    profile: &BaselineProfile,
    sigma_multiplier: f64,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (signal, sig_profile) in &profile.signal_profiles {
        let (lower, upper) = sigma_bounds(sig_profile, sigma_multiplier);

        for sample in samples {
            let Some(value) = sample.signal(signal) else {
                continue;
            };
            if !value.is_finite() {
                continue;
            }

            result.total_checks += 1;
            if value < lower || value > upper {
                result.failed_checks += 1;
                result.violations.push(Violation {
                    signal: signal.clone(),
                    value,
                    expected_min: lower,
                    expected_max: upper,
                });
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::TrainingWindow;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn test_profile() -> BaselineProfile {
        let mut signal_profiles = BTreeMap::new();
        signal_profiles.insert(
            "voltage_v".to_string(),
            SignalProfile {
                mean: 230.0,
                std: 2.0,
                min: 224.0,
                max: 236.0,
                sample_count: 100,
            },
        );

        BaselineProfile {
            baseline_id: "b-1".to_string(),
            asset_id: "motor-1".to_string(),
            created_at: Utc::now(),
            training_window: TrainingWindow {
                start: Utc::now(),
                end: Utc::now(),
                sample_count: 100,
                valid_sample_ratio: 1.0,
            },
            signal_profiles,
        }
    }

    fn sample(voltage: f64) -> RawSample {
        RawSample {
            asset_id: "motor-1".to_string(),
            timestamp: Utc::now(),
            voltage_v: voltage,
            current_a: 15.0,
            power_factor: 0.92,
            vibration_g: 0.15,
            is_faulty: false,
        }
    }

    #[test]
    fn test_valid_profile_passes() {
        assert!(validate_baseline(&test_profile()).is_empty());
    }

    #[test]
    fn test_structural_errors_reported() {
        let mut profile = test_profile();
        profile.asset_id = String::new();
        if let Some(sig) = profile.signal_profiles.get_mut("voltage_v") {
            sig.std = -1.0;
            sig.min = 300.0; // min > max
        }

        let errors = validate_baseline(&profile);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_three_sigma_bounds() {
        let profile = test_profile();
        let (lower, upper) = sigma_bounds(&profile.signal_profiles["voltage_v"], 3.0);
        assert!((lower - 224.0).abs() < 1e-9);
        assert!((upper - 236.0).abs() < 1e-9);
    }

    #[test]
    fn test_data_check_flags_outliers() {
        let profile = test_profile();
        let samples = vec![sample(230.0), sample(231.0), sample(280.0)];

        let result = check_data_against_baseline(&samples, &profile, 3.0);

        assert_eq!(result.total_checks, 3);
        assert_eq!(result.failed_checks, 1);
        assert_eq!(result.violations[0].signal, "voltage_v");
        assert!((result.pass_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert!(!result.passed());
    }

    #[test]
    fn test_missing_values_skipped() {
        let profile = test_profile();
        let samples = vec![sample(f64::NAN), sample(230.0)];

        let result = check_data_against_baseline(&samples, &profile, 3.0);
        assert_eq!(result.total_checks, 1);
        assert!(result.passed());
        assert!((result.pass_rate() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_data_passes_trivially() {
        let result = check_data_against_baseline(&[], &test_profile(), 3.0);
        assert_eq!(result.total_checks, 0);
        assert!((result.pass_rate() - 1.0).abs() < 1e-9);
    }
}
