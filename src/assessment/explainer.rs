//! Explainability Engine — Surface Understandable Reasoning
//!
//! Generates human-readable explanations for assessment results:
//! "Why is risk high?" -> "Vibration at 0.45g exceeds observed maximum (0.21g)".
//!
//! Constraints:
//! - std = 0 never divides (z forced to 0)
//! - Epsilon rule: deviations under 1% of the baseline mean are ignored
//! - Fixed string templates only, no free-form generation
//! - Top 3 contributors, ranked by |z|
//! - LOW risk produces no explanations

use crate::baseline::{BaselineProfile, SignalProfile};
use crate::types::{Explanation, RawSample, RiskLevel, SIGNAL_COLUMNS};

/// Relative deviation below which a signal is too small to matter.
pub const EPSILON_RELATIVE: f64 = 0.01;

/// Z-score magnitude beyond which a value is called out.
const ZSCORE_SIGNIFICANT: f64 = 2.0;

/// Maximum explanations returned.
const MAX_EXPLANATIONS: usize = 3;

/// Which fixed template fired for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Template {
    ExceedsMax,
    BelowMin,
    HighValue,
    LowValue,
}

/// Explanation generator bound to one baseline profile.
#[derive(Debug, Clone)]
pub struct ExplanationGenerator<'a> {
    baseline: &'a BaselineProfile,
}

impl<'a> ExplanationGenerator<'a> {
    pub fn new(baseline: &'a BaselineProfile) -> Self {
        Self { baseline }
    }

    /// Generate ranked explanations for the latest reading.
    ///
    /// Returns an empty list for LOW risk; otherwise the top contributors
    /// by |z| that trip one of the fixed templates.
    pub fn generate(&self, sample: &RawSample, risk: RiskLevel) -> Vec<Explanation> {
        if risk == RiskLevel::Low {
            return Vec::new();
        }

        let mut candidates: Vec<(f64, Explanation)> = Vec::new();

        for signal in SIGNAL_COLUMNS {
            let Some(profile) = self.baseline.signal_profiles.get(signal) else {
                continue;
            };
            let Some(value) = sample.signal(signal) else {
                continue;
            };
            if !value.is_finite() {
                continue;
            }

            // Epsilon rule: too small to matter
            if profile.mean != 0.0
                && (value - profile.mean).abs() / profile.mean.abs() < EPSILON_RELATIVE
            {
                continue;
            }

            let z = if profile.std > 0.0 {
                (value - profile.mean) / profile.std
            } else {
                0.0
            };

            let template = if value > profile.max {
                Some(Template::ExceedsMax)
            } else if value < profile.min {
                Some(Template::BelowMin)
            } else if z > ZSCORE_SIGNIFICANT {
                Some(Template::HighValue)
            } else if z < -ZSCORE_SIGNIFICANT {
                Some(Template::LowValue)
            } else {
                None
            };

            if let Some(template) = template {
                candidates.push((
                    z.abs(),
                    Explanation {
                        reason: render(template, signal, value, profile, z),
                        related_features: vec![signal.to_string()],
                        confidence_score: confidence(z),
                    },
                ));
            }
        }

        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        candidates
            .into_iter()
            .take(MAX_EXPLANATIONS)
            .map(|(_, e)| e)
            .collect()
    }
}

/// Canned all-clear explanation for consumers that want one.
pub fn systems_nominal() -> Explanation {
    Explanation {
        reason: "Systems nominal".to_string(),
        related_features: Vec::new(),
        confidence_score: 0.99,
    }
}

fn confidence(z: f64) -> f64 {
    (0.5 + 0.1 * z.abs()).min(0.99)
}

fn signal_label(signal: &str) -> &'static str {
    match signal {
        "voltage_v" => "Voltage",
        "current_a" => "Current",
        "power_factor" => "Power factor",
        "vibration_g" => "Vibration",
        _ => "Signal",
    }
}

fn signal_unit(signal: &str) -> &'static str {
    match signal {
        "voltage_v" => "V",
        "current_a" => "A",
        "vibration_g" => "g",
        _ => "",
    }
}

fn render(template: Template, signal: &str, value: f64, profile: &SignalProfile, z: f64) -> String {
    let label = signal_label(signal);
    let unit = signal_unit(signal);

    match template {
        Template::ExceedsMax => format!(
            "{} at {:.3}{} exceeds observed maximum ({:.3}{})",
            label, value, unit, profile.max, unit
        ),
        Template::BelowMin => format!(
            "{} at {:.3}{} below observed minimum ({:.3}{})",
            label, value, unit, profile.min, unit
        ),
        Template::HighValue => format!(
            "{} at {:.3}{} is {:.1}\u{3c3} above baseline mean ({:.3}{})",
            label,
            value,
            unit,
            z.abs(),
            profile.mean,
            unit
        ),
        Template::LowValue => format!(
            "{} at {:.3}{} is {:.1}\u{3c3} below baseline mean ({:.3}{})",
            label,
            value,
            unit,
            z.abs(),
            profile.mean,
            unit
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::TrainingWindow;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn baseline() -> BaselineProfile {
        let mut signal_profiles = BTreeMap::new();
        for (name, mean, std, min, max) in [
            ("voltage_v", 230.0, 2.0, 224.0, 236.0),
            ("current_a", 15.0, 1.0, 12.0, 18.0),
            ("power_factor", 0.92, 0.02, 0.86, 0.98),
            ("vibration_g", 0.15, 0.03, 0.06, 0.21),
        ] {
            signal_profiles.insert(
                name.to_string(),
                SignalProfile {
                    mean,
                    std,
                    min,
                    max,
                    sample_count: 1000,
                },
            );
        }

        BaselineProfile {
            baseline_id: "b-1".to_string(),
            asset_id: "motor-1".to_string(),
            created_at: Utc::now(),
            training_window: TrainingWindow {
                start: Utc::now(),
                end: Utc::now(),
                sample_count: 1000,
                valid_sample_ratio: 1.0,
            },
            signal_profiles,
        }
    }

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

    #[test]
    fn test_low_risk_no_explanations() {
        let baseline = baseline();
        let generator = ExplanationGenerator::new(&baseline);

        // Clearly anomalous reading, but LOW risk suppresses output
        let result = generator.generate(&sample(300.0, 30.0, 0.5, 1.0), RiskLevel::Low);
        assert!(result.is_empty());
    }

    #[test]
    fn test_exceeds_max_template() {
        let baseline = baseline();
        let generator = ExplanationGenerator::new(&baseline);

        let result = generator.generate(&sample(230.0, 15.0, 0.92, 0.45), RiskLevel::High);
        assert_eq!(result.len(), 1);
        assert!(result[0].reason.contains("exceeds observed maximum"));
        assert_eq!(result[0].related_features, vec!["vibration_g".to_string()]);
    }

    #[test]
    fn test_below_min_template() {
        let baseline = baseline();
        let generator = ExplanationGenerator::new(&baseline);

        let result = generator.generate(&sample(210.0, 15.0, 0.92, 0.15), RiskLevel::High);
        assert_eq!(result.len(), 1);
        assert!(result[0].reason.contains("below observed minimum"));
    }

    #[test]
    fn test_high_value_template_inside_range() {
        let baseline = baseline();
        let generator = ExplanationGenerator::new(&baseline);

        // 235 V: z = 2.5, still below observed max of 236
        let result = generator.generate(&sample(235.0, 15.0, 0.92, 0.15), RiskLevel::Moderate);
        assert_eq!(result.len(), 1);
        assert!(result[0].reason.contains("above baseline mean"));
    }

    #[test]
    fn test_epsilon_rule_suppresses_tiny_deviation() {
        let mut baseline = baseline();
        // Tight std so z would be large without the epsilon rule
        if let Some(p) = baseline.signal_profiles.get_mut("voltage_v") {
            p.std = 0.1;
        }
        let generator = ExplanationGenerator::new(&baseline);

        // value = 1.005 * mean: within 1% of mean, ignored
        let result = generator.generate(&sample(230.0 * 1.005, 15.0, 0.92, 0.15), RiskLevel::High);
        assert!(result.is_empty());
    }

    #[test]
    fn test_zero_std_never_divides() {
        let mut baseline = baseline();
        if let Some(p) = baseline.signal_profiles.get_mut("voltage_v") {
            p.std = 0.0;
        }
        let generator = ExplanationGenerator::new(&baseline);

        // Inside observed range with std 0: z forced to 0, no template fires
        let result = generator.generate(&sample(233.0, 15.0, 0.92, 0.15), RiskLevel::High);
        assert!(result.is_empty());
    }

    #[test]
    fn test_top_three_ranked_by_zscore() {
        let baseline = baseline();
        let generator = ExplanationGenerator::new(&baseline);

        // All four signals far out of range
        let result = generator.generate(&sample(300.0, 40.0, 0.4, 2.5), RiskLevel::Critical);
        assert_eq!(result.len(), 3);

        // Vibration (z ≈ 78) must rank first
        assert_eq!(result[0].related_features, vec!["vibration_g".to_string()]);
    }

    #[test]
    fn test_confidence_capped() {
        let baseline = baseline();
        let generator = ExplanationGenerator::new(&baseline);

        let result = generator.generate(&sample(230.0, 15.0, 0.92, 2.5), RiskLevel::Critical);
        assert!(!result.is_empty());
        assert!(result[0].confidence_score <= 0.99);
        assert!(result[0].confidence_score >= 0.5);
    }

    #[test]
    fn test_systems_nominal() {
        let nominal = systems_nominal();
        assert_eq!(nominal.reason, "Systems nominal");
    }
}
