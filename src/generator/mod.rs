//! Synthetic Signal Generator — Rotating-Asset Digital Twin
//!
//! Produces raw sensor samples for calibration bursts, healthy monitoring
//! ticks, and fault injection. This is a simulator: it does not claim to
//! have real sensors attached.
//!
//! Healthy centre (per-sample Gaussian noise around nominal operation):
//! 230 V ± 2, 15 A ± 1, PF 0.92 ± 0.02, vibration 0.15 g ± 0.03.
//!
//! Fault profiles displace the means (SPIKE / DRIFT / DEFAULT) or inflate
//! the per-sample variance while keeping the means healthy (JITTER), scaled
//! by severity. Output is deterministic under a fixed seed.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::types::{FaultKind, FaultSeverity, RawSample};

// ============================================================================
// Profiles
// ============================================================================

/// Healthy operating centre for the four signals.
#[derive(Debug, Clone, Copy)]
pub struct HealthyProfile {
    pub voltage_mean: f64,
    pub voltage_std: f64,
    pub current_mean: f64,
    pub current_std: f64,
    pub pf_mean: f64,
    pub pf_std: f64,
    pub vibration_mean: f64,
    pub vibration_std: f64,
}

impl Default for HealthyProfile {
    fn default() -> Self {
        Self {
            voltage_mean: 230.0,
            voltage_std: 2.0,
            current_mean: 15.0,
            current_std: 1.0,
            pf_mean: 0.92,
            pf_std: 0.02,
            vibration_mean: 0.15,
            vibration_std: 0.03,
        }
    }
}

impl HealthyProfile {
    /// Healthy profile with displaced means (noise unchanged).
    pub fn shifted(&self, dv: f64, di: f64, dpf: f64, dvib: f64) -> SyntheticProfile {
        SyntheticProfile {
            voltage: (self.voltage_mean + dv, self.voltage_std),
            current: (self.current_mean + di, self.current_std),
            power_factor: (self.pf_mean + dpf, self.pf_std),
            vibration: (self.vibration_mean + dvib, self.vibration_std),
            labelled_faulty: true,
        }
    }

    fn as_profile(&self) -> SyntheticProfile {
        SyntheticProfile {
            voltage: (self.voltage_mean, self.voltage_std),
            current: (self.current_mean, self.current_std),
            power_factor: (self.pf_mean, self.pf_std),
            vibration: (self.vibration_mean, self.vibration_std),
            labelled_faulty: false,
        }
    }
}

/// Per-signal (mean, std) pairs driving sample synthesis.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticProfile {
    pub voltage: (f64, f64),
    pub current: (f64, f64),
    pub power_factor: (f64, f64),
    pub vibration: (f64, f64),

    /// Ground-truth label stamped on generated samples
    pub labelled_faulty: bool,
}

impl SyntheticProfile {
    /// Healthy nominal profile.
    pub fn healthy() -> Self {
        HealthyProfile::default().as_profile()
    }

    /// Fault profile for the given kind and severity.
    ///
    /// Mean-displacement base deltas are calibrated so a severe spike lands
    /// on 280 V / 25 A / 0.70 PF / 1.5 g; jitter keeps the healthy means and
    /// widens the noise so only the window statistics deviate.
    pub fn for_fault(kind: FaultKind, severity: FaultSeverity) -> Self {
        let healthy = HealthyProfile::default();
        let scale = severity.scale();

        match kind {
            FaultKind::Spike => healthy.shifted(
                20.0 * scale,
                4.0 * scale,
                -0.088 * scale,
                0.54 * scale,
            ),
            FaultKind::Drift => healthy.shifted(
                8.0 * scale,
                1.6 * scale,
                -0.04 * scale,
                0.2 * scale,
            ),
            FaultKind::Default => healthy.shifted(
                12.0 * scale,
                2.5 * scale,
                -0.06 * scale,
                0.35 * scale,
            ),
            FaultKind::Jitter => Self {
                voltage: (healthy.voltage_mean, healthy.voltage_std + 6.0 * scale),
                current: (healthy.current_mean, healthy.current_std + 0.8 * scale),
                power_factor: (healthy.pf_mean, healthy.pf_std + 0.01 * scale),
                vibration: (healthy.vibration_mean, healthy.vibration_std + 0.05 * scale),
                labelled_faulty: true,
            },
        }
    }
}

// ============================================================================
// Synthesizer
// ============================================================================

/// Deterministic sample synthesizer for one asset.
#[derive(Debug, Clone)]
pub struct SignalSynthesizer {
    asset_id: String,
    profile: SyntheticProfile,
    rng: StdRng,
}

impl SignalSynthesizer {
    /// Healthy synthesizer with a fixed seed.
    pub fn healthy(asset_id: &str, seed: u64) -> Self {
        Self::with_profile(asset_id, seed, SyntheticProfile::healthy())
    }

    /// Synthesizer with an explicit profile.
    pub fn with_profile(asset_id: &str, seed: u64, profile: SyntheticProfile) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            profile,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Swap the active profile (keeps the RNG stream).
    pub fn set_profile(&mut self, profile: SyntheticProfile) {
        self.profile = profile;
    }

    /// Generate one sample at the given timestamp.
    pub fn generate_sample(&mut self, timestamp: DateTime<Utc>) -> RawSample {
        let voltage = self.gauss(self.profile.voltage).max(0.0);
        let current = self.gauss(self.profile.current).max(0.0);
        let power_factor = self.gauss(self.profile.power_factor).clamp(0.0, 1.0);
        let vibration = self.gauss(self.profile.vibration).max(0.0);

        RawSample {
            asset_id: self.asset_id.clone(),
            timestamp,
            voltage_v: voltage,
            current_a: current,
            power_factor,
            vibration_g: vibration,
            is_faulty: self.profile.labelled_faulty,
        }
    }

    /// Generate `count` samples with evenly spaced, strictly increasing
    /// timestamps starting at `start`.
    pub fn generate_stream(
        &mut self,
        count: usize,
        start: DateTime<Utc>,
        spacing_ms: i64,
    ) -> Vec<RawSample> {
        (0..count)
            .map(|i| {
                let ts = start + Duration::milliseconds(spacing_ms * i as i64);
                self.generate_sample(ts)
            })
            .collect()
    }

    fn gauss(&mut self, (mean, std): (f64, f64)) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        mean + std * z
    }
}
