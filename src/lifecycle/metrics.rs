//! Validation Metrics — Classification Counters for the Demo Loop
//!
//! Tracks how well scoring tracks ground truth while the lifecycle workers
//! drive the pipeline: low-risk classifications under healthy monitoring,
//! high-risk classifications under fault injection.

use serde::Serialize;

/// Counters maintained by the lifecycle controller.
///
/// Reset on stop, purge, and at the start of a new calibration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationMetrics {
    /// Samples synthesised during calibration bursts
    pub training_samples: u64,

    /// Windows evaluated under healthy monitoring
    pub healthy_total: u64,

    /// Healthy windows classified low-risk
    pub healthy_correct: u64,

    /// Windows evaluated under fault injection
    pub faulty_total: u64,

    /// Fault windows classified high-risk
    pub faulty_correct: u64,
}

impl ValidationMetrics {
    /// Fraction of healthy windows classified low-risk; 1.0 before any
    /// healthy window has been evaluated.
    pub fn healthy_stability(&self) -> f64 {
        if self.healthy_total == 0 {
            return 1.0;
        }
        self.healthy_correct as f64 / self.healthy_total as f64
    }

    /// Fraction of injected-fault windows classified high-risk; 1.0 before
    /// any fault window has been evaluated.
    pub fn fault_capture_rate(&self) -> f64 {
        if self.faulty_total == 0 {
            return 1.0;
        }
        self.faulty_correct as f64 / self.faulty_total as f64
    }

    pub fn record_healthy(&mut self, classified_low_risk: bool) {
        self.healthy_total += 1;
        if classified_low_risk {
            self.healthy_correct += 1;
        }
    }

    pub fn record_faulty(&mut self, classified_high_risk: bool) {
        self.faulty_total += 1;
        if classified_high_risk {
            self.faulty_correct += 1;
        }
    }

    pub fn add_training_samples(&mut self, count: u64) {
        self.training_samples += count;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
