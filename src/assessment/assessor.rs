//! Health & Risk Assessment — Convert Anomaly Scores to Decisions
//!
//! This is where the rules live. The detector outputs scores; this module
//! assigns meaning: health score, risk level, and a heuristic maintenance
//! window. Everything here is deterministic and built on named threshold
//! constants.

use chrono::Utc;
use uuid::Uuid;

use crate::types::{Explanation, HealthReport, ReportMetadata, RiskLevel};

// ============================================================================
// Named Thresholds
// ============================================================================

/// Health below this is CRITICAL.
pub const THRESHOLD_CRITICAL: u8 = 25;

/// Health below this (and >= critical) is HIGH.
pub const THRESHOLD_HIGH: u8 = 50;

/// Health below this (and >= high) is MODERATE; at or above is LOW.
pub const THRESHOLD_MODERATE: u8 = 75;

/// Heuristic remaining-useful-life bands in days, per risk level.
/// Reported value is the band midpoint. A lookup, not a physics model.
pub const RUL_BY_RISK: [(RiskLevel, (f64, f64)); 4] = [
    (RiskLevel::Critical, (0.0, 1.0)),
    (RiskLevel::High, (1.0, 7.0)),
    (RiskLevel::Moderate, (7.0, 30.0)),
    (RiskLevel::Low, (30.0, 90.0)),
];

// ============================================================================
// Assessor
// ============================================================================

/// Deterministic score-to-health mapper for one detector/baseline pairing.
#[derive(Debug, Clone)]
pub struct HealthAssessor {
    detector_version: String,
    baseline_id: String,
}

impl Default for HealthAssessor {
    fn default() -> Self {
        Self::new("unknown", "unknown")
    }
}

impl HealthAssessor {
    pub fn new(detector_version: &str, baseline_id: &str) -> Self {
        Self {
            detector_version: detector_version.to_string(),
            baseline_id: baseline_id.to_string(),
        }
    }

    /// Map anomaly score a in [0, 1] to health h in [0, 100].
    ///
    /// Piecewise with a confidence boost in the healthy band, monotonically
    /// non-increasing in a:
    /// - [0, 0.15):   100 -> 80
    /// - [0.15, 0.35): 80 -> 50
    /// - [0.35, 1.0]:  50 -> 0
    pub fn compute_health_score(&self, anomaly_score: f64) -> u8 {
        let a = anomaly_score.clamp(0.0, 1.0);

        let h = if a < 0.15 {
            100.0 - (a / 0.15) * 20.0
        } else if a < 0.35 {
            80.0 - ((a - 0.15) / 0.20) * 30.0
        } else {
            50.0 - ((a - 0.35) / 0.65) * 50.0
        };

        h.round().clamp(0.0, 100.0) as u8
    }

    /// Classify health into the ordered risk scale.
    pub fn classify_risk_level(&self, health_score: u8) -> RiskLevel {
        if health_score < THRESHOLD_CRITICAL {
            RiskLevel::Critical
        } else if health_score < THRESHOLD_HIGH {
            RiskLevel::High
        } else if health_score < THRESHOLD_MODERATE {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    /// Midpoint of the RUL band for a risk level, in days.
    pub fn estimate_rul(&self, risk: RiskLevel) -> f64 {
        RUL_BY_RISK
            .iter()
            .find(|(level, _)| *level == risk)
            .map(|(_, (lo, hi))| (lo + hi) / 2.0)
            .unwrap_or(0.0)
    }

    /// Slope of a series of anomaly scores: `(last - first) / (n - 1)`.
    /// Positive means worsening. Undefined below two points.
    pub fn calculate_trend(&self, scores: &[f64]) -> Option<f64> {
        if scores.len() < 2 {
            return None;
        }
        let first = scores[0];
        let last = scores[scores.len() - 1];
        Some((last - first) / (scores.len() - 1) as f64)
    }

    /// Produce a complete health report.
    ///
    /// CRITICAL reports always carry at least one explanation; when the
    /// caller supplies none, a generic one is synthesised from the score.
    /// Explanations are capped at three.
    pub fn assess(
        &self,
        asset_id: &str,
        anomaly_score: f64,
        mut explanations: Vec<Explanation>,
    ) -> HealthReport {
        let health_score = self.compute_health_score(anomaly_score);
        let risk_level = self.classify_risk_level(health_score);

        if risk_level == RiskLevel::Critical && explanations.is_empty() {
            explanations.push(Explanation {
                reason: format!(
                    "Anomaly score {:.2} far outside the healthy operating envelope",
                    anomaly_score.clamp(0.0, 1.0)
                ),
                related_features: Vec::new(),
                confidence_score: 0.9,
            });
        }
        explanations.truncate(3);

        HealthReport {
            report_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            asset_id: asset_id.to_string(),
            health_score,
            risk_level,
            maintenance_window_days: self.estimate_rul(risk_level),
            explanations,
            metadata: ReportMetadata {
                model_version: format!(
                    "detector:{}|baseline:{}",
                    self.detector_version, self.baseline_id
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_boundary_values() {
        let assessor = HealthAssessor::default();

        assert_eq!(assessor.compute_health_score(0.0), 100);
        assert_eq!(assessor.compute_health_score(0.15), 80);
        assert_eq!(assessor.compute_health_score(0.35), 50);
        assert_eq!(assessor.compute_health_score(1.0), 0);
    }

    #[test]
    fn test_health_clamps_out_of_range_scores() {
        let assessor = HealthAssessor::default();

        assert_eq!(assessor.compute_health_score(-0.5), 100);
        assert_eq!(assessor.compute_health_score(1.5), 0);
    }

    #[test]
    fn test_health_monotonic_non_increasing() {
        let assessor = HealthAssessor::default();

        let mut prev = 101i32;
        for i in 0..=100 {
            let a = i as f64 / 100.0;
            let h = assessor.compute_health_score(a) as i32;
            assert!(h <= prev, "health({}) = {} > previous {}", a, h, prev);
            prev = h;
        }
    }

    #[test]
    fn test_risk_classification_thresholds() {
        let assessor = HealthAssessor::default();

        assert_eq!(assessor.classify_risk_level(0), RiskLevel::Critical);
        assert_eq!(
            assessor.classify_risk_level(THRESHOLD_CRITICAL - 1),
            RiskLevel::Critical
        );
        assert_eq!(assessor.classify_risk_level(THRESHOLD_CRITICAL), RiskLevel::High);
        assert_eq!(assessor.classify_risk_level(THRESHOLD_HIGH - 1), RiskLevel::High);
        assert_eq!(assessor.classify_risk_level(THRESHOLD_HIGH), RiskLevel::Moderate);
        assert_eq!(
            assessor.classify_risk_level(THRESHOLD_MODERATE - 1),
            RiskLevel::Moderate
        );
        assert_eq!(assessor.classify_risk_level(THRESHOLD_MODERATE), RiskLevel::Low);
        assert_eq!(assessor.classify_risk_level(100), RiskLevel::Low);
    }

    #[test]
    fn test_risk_monotonic_in_anomaly() {
        let assessor = HealthAssessor::default();

        let mut prev = RiskLevel::Low;
        for i in 0..=20 {
            let a = i as f64 / 20.0;
            let risk = assessor.classify_risk_level(assessor.compute_health_score(a));
            assert!(risk >= prev, "risk regressed at anomaly {}", a);
            prev = risk;
        }
    }

    #[test]
    fn test_rul_ordering_and_midpoints() {
        let assessor = HealthAssessor::default();

        let critical = assessor.estimate_rul(RiskLevel::Critical);
        let high = assessor.estimate_rul(RiskLevel::High);
        let moderate = assessor.estimate_rul(RiskLevel::Moderate);
        let low = assessor.estimate_rul(RiskLevel::Low);

        assert!(critical < high && high < moderate && moderate < low);
        assert!((critical - 0.5).abs() < 1e-9);
        assert!((high - 4.0).abs() < 1e-9);
        assert!((moderate - 18.5).abs() < 1e-9);
        assert!((low - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_is_slope() {
        let assessor = HealthAssessor::default();

        let worsening = [0.2, 0.3, 0.4, 0.5, 0.6];
        let trend = assessor.calculate_trend(&worsening).expect("trend");
        assert!((trend - 0.1).abs() < 1e-9);

        let improving = [0.5, 0.3, 0.1];
        assert!(assessor.calculate_trend(&improving).expect("trend") < 0.0);

        assert!(assessor.calculate_trend(&[]).is_none());
        assert!(assessor.calculate_trend(&[0.5]).is_none());
    }

    #[test]
    fn test_critical_always_has_explanation() {
        let assessor = HealthAssessor::default();

        let report = assessor.assess("motor-1", 0.95, Vec::new());
        assert_eq!(report.risk_level, RiskLevel::Critical);
        assert!(!report.explanations.is_empty());
    }

    #[test]
    fn test_low_risk_may_omit_explanations() {
        let assessor = HealthAssessor::default();

        let report = assessor.assess("motor-1", 0.05, Vec::new());
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert!(report.explanations.is_empty());
    }

    #[test]
    fn test_explanations_capped_at_three() {
        let assessor = HealthAssessor::default();
        let many: Vec<Explanation> = (0..5)
            .map(|i| Explanation {
                reason: format!("reason {}", i),
                related_features: Vec::new(),
                confidence_score: 0.8,
            })
            .collect();

        let report = assessor.assess("motor-1", 0.9, many);
        assert_eq!(report.explanations.len(), 3);
    }

    #[test]
    fn test_assessment_deterministic() {
        let assessor = HealthAssessor::new("3.0.0", "b-123");

        let a = assessor.assess("motor-1", 0.42, Vec::new());
        let b = assessor.assess("motor-1", 0.42, Vec::new());

        assert_eq!(a.health_score, b.health_score);
        assert_eq!(a.risk_level, b.risk_level);
        assert_eq!(a.maintenance_window_days, b.maintenance_window_days);
    }

    #[test]
    fn test_metadata_includes_versions() {
        let assessor = HealthAssessor::new("2.1.0", "abc123");
        let report = assessor.assess("motor-1", 0.5, Vec::new());

        assert!(report.metadata.model_version.contains("detector:2.1.0"));
        assert!(report.metadata.model_version.contains("baseline:abc123"));
    }
}
