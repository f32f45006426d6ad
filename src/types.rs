//! Core Domain Types
//!
//! Shared types for the condition-monitoring pipeline: raw samples, health
//! reports, risk levels, transition events, and the lifecycle state machine.
//! Component-specific types (profiles, detectors, feature vectors) live in
//! their own modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signals captured from a rotating asset, in canonical column order.
pub const SIGNAL_COLUMNS: [&str; 4] = ["voltage_v", "current_a", "power_factor", "vibration_g"];

// ============================================================================
// Raw Samples
// ============================================================================

/// One reading from a monitored asset at ~100 Hz.
///
/// All four signals are `f64`; a non-finite value is treated as *missing*
/// by the baseline builder. Ingestion rejects non-finite values at the
/// boundary, so non-finite signals only appear in replayed or synthetic
/// histories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSample {
    /// Asset identifier (short string, low cardinality)
    pub asset_id: String,

    /// Reading timestamp (UTC)
    pub timestamp: DateTime<Utc>,

    /// Supply voltage (V)
    pub voltage_v: f64,

    /// Phase current (A)
    pub current_a: f64,

    /// Power factor, bounded [0, 1]
    pub power_factor: f64,

    /// Vibration acceleration (g)
    pub vibration_g: f64,

    /// Fault label. Ground truth during generation and training only;
    /// never authoritative at scoring time.
    pub is_faulty: bool,
}

impl RawSample {
    /// Read a signal by canonical column name.
    pub fn signal(&self, name: &str) -> Option<f64> {
        match name {
            "voltage_v" => Some(self.voltage_v),
            "current_a" => Some(self.current_a),
            "power_factor" => Some(self.power_factor),
            "vibration_g" => Some(self.vibration_g),
            _ => None,
        }
    }

    /// True when all four signals are finite.
    pub fn signals_finite(&self) -> bool {
        self.voltage_v.is_finite()
            && self.current_a.is_finite()
            && self.power_factor.is_finite()
            && self.vibration_g.is_finite()
    }
}

// ============================================================================
// Risk & Health
// ============================================================================

/// Ordered risk scale. `LOW < MODERATE < HIGH < CRITICAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Moderate => write!(f, "MODERATE"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Human-readable reasoning attached to a health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Narrative built from a fixed template set
    pub reason: String,

    /// Feature or signal keys this explanation refers to
    pub related_features: Vec<String>,

    /// Confidence in [0, 1]
    pub confidence_score: f64,
}

/// Audit metadata carried on every report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// "detector:<version>|baseline:<id>"
    pub model_version: String,
}

/// Complete health assessment for one asset at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub report_id: String,
    pub timestamp: DateTime<Utc>,
    pub asset_id: String,

    /// Integer health score, 0 (failed) to 100 (perfect)
    pub health_score: u8,

    pub risk_level: RiskLevel,

    /// Heuristic remaining-useful-life estimate in days
    pub maintenance_window_days: f64,

    /// Ranked explanations, at most three
    pub explanations: Vec<Explanation>,

    pub metadata: ReportMetadata,
}

// ============================================================================
// Transition Events
// ============================================================================

/// Event categories emitted by the transition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    AnomalyDetected,
    AnomalyCleared,
    Heartbeat,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::AnomalyDetected => write!(f, "ANOMALY_DETECTED"),
            EventKind::AnomalyCleared => write!(f, "ANOMALY_CLEARED"),
            EventKind::Heartbeat => write!(f, "HEARTBEAT"),
        }
    }
}

/// Event severity for downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

/// Notification emitted on a confirmed healthy/faulty transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub asset_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub severity: EventSeverity,
    pub message: String,
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Process-wide lifecycle state driving background workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    Idle,
    Calibrating,
    MonitoringHealthy,
    FaultInjection,
}

impl std::fmt::Display for SystemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemState::Idle => write!(f, "IDLE"),
            SystemState::Calibrating => write!(f, "CALIBRATING"),
            SystemState::MonitoringHealthy => write!(f, "MONITORING_HEALTHY"),
            SystemState::FaultInjection => write!(f, "FAULT_INJECTION"),
        }
    }
}

/// Fault classes the injection worker can synthesise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    /// Abrupt offset on all signal means
    Spike,
    /// Slow mean displacement
    Drift,
    /// Healthy means with inflated per-sample variance
    Jitter,
    /// Generic degradation profile
    Default,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Spike => write!(f, "SPIKE"),
            FaultKind::Drift => write!(f, "DRIFT"),
            FaultKind::Jitter => write!(f, "JITTER"),
            FaultKind::Default => write!(f, "DEFAULT"),
        }
    }
}

/// How hard the injected fault pushes the signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultSeverity {
    Mild,
    Medium,
    Severe,
}

impl FaultSeverity {
    /// Scale factor applied to fault displacement amplitudes.
    pub fn scale(&self) -> f64 {
        match self {
            FaultSeverity::Mild => 0.4,
            FaultSeverity::Medium => 1.0,
            FaultSeverity::Severe => 2.5,
        }
    }
}

impl std::fmt::Display for FaultSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultSeverity::Mild => write!(f, "MILD"),
            FaultSeverity::Medium => write!(f, "MEDIUM"),
            FaultSeverity::Severe => write!(f, "SEVERE"),
        }
    }
}
