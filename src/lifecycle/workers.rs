//! Background Workers — Calibration, Healthy Monitoring, Fault Injection
//!
//! One worker runs at a time, driven by the lifecycle controller. Every
//! worker polls its cancellation token at least once per tick and performs
//! a best-effort flush before exiting; a worker failure parks the system in
//! IDLE with a readable status message and installs nothing partial.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::baseline::BaselineBuilder;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::EventEngine;
use crate::generator::{SignalSynthesizer, SyntheticProfile};
use crate::ml_engine::{range_check_score, BatchAnomalyDetector};
use crate::processing::{extract_batch_features, extract_multi_window_features};
use crate::storage::{PointWriter, SensorPoint, StateStore};
use crate::types::{RawSample, SystemState};

use super::metrics::ValidationMetrics;
use super::ControlState;

/// Asset type tag on persisted points.
const ASSET_TYPE: &str = "induction_motor";

/// Samples synthesised during the calibration burst.
const CALIBRATION_SAMPLES: usize = 1000;

/// Every Nth burst sample is persisted for durability.
const PERSIST_EVERY: usize = 10;

/// Progress log cadence during the burst.
const PROGRESS_EVERY: usize = 100;

/// What the shared monitoring loop is validating against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MonitorMode {
    Healthy,
    FaultInjection,
}

/// Everything a worker needs, cloned in at spawn time.
pub(crate) struct WorkerContext {
    pub store: Arc<StateStore>,
    pub writer: Arc<dyn PointWriter>,
    pub config: EngineConfig,
    pub metrics: Arc<Mutex<ValidationMetrics>>,
    pub control: Arc<RwLock<ControlState>>,
    pub events: Arc<EventEngine>,
    pub cancel: CancellationToken,
    pub asset_id: String,
    pub seed: u64,
}

impl WorkerContext {
    fn record_metric(&self, mode: MonitorMode, is_faulty: bool) {
        let mut metrics = match self.metrics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match mode {
            MonitorMode::Healthy => metrics.record_healthy(!is_faulty),
            MonitorMode::FaultInjection => metrics.record_faulty(is_faulty),
        }
    }

    async fn fail_to_idle(&self, error: &EngineError) {
        let mut control = self.control.write().await;
        control.state = SystemState::Idle;
        control.fault = None;
        control.status = format!("Worker failed: {}", error);
        warn!(asset = %self.asset_id, error = %error, "Worker failed, returning to IDLE");
    }
}

// ============================================================================
// Calibration
// ============================================================================

/// Full calibration worker: burst generation, baseline build, detector
/// training, then the continuous healthy monitoring loop.
pub(crate) async fn run_calibration(ctx: WorkerContext) {
    if let Err(e) = calibration_phases(&ctx).await {
        ctx.fail_to_idle(&e).await;
    }
}

async fn calibration_phases(ctx: &WorkerContext) -> Result<()> {
    // ---- Phase A: burst generation --------------------------------------
    // 1000 healthy samples spread across the last hour so downstream
    // windowing sees plausible timestamps.
    let mut synth = SignalSynthesizer::healthy(&ctx.asset_id, ctx.seed);
    let burst_start = Utc::now() - ChronoDuration::hours(1);
    let spacing_ms = 3_600_000 / CALIBRATION_SAMPLES as i64;

    for i in 0..CALIBRATION_SAMPLES {
        if ctx.cancel.is_cancelled() {
            info!(asset = %ctx.asset_id, generated = i, "Calibration cancelled during burst");
            return Ok(());
        }

        let sample =
            synth.generate_sample(burst_start + ChronoDuration::milliseconds(spacing_ms * i as i64));
        ctx.store
            .append_samples(&ctx.asset_id, std::iter::once(sample.clone()));

        if i % PERSIST_EVERY == 0 {
            let point = SensorPoint::from_sample(&sample, ASSET_TYPE);
            if let Err(e) = ctx.writer.write_point(&point).await {
                warn!(asset = %ctx.asset_id, error = %e, "Burst persist failed, continuing");
            }
        }

        if (i + 1) % PROGRESS_EVERY == 0 {
            info!(
                asset = %ctx.asset_id,
                generated = i + 1,
                total = CALIBRATION_SAMPLES,
                "Calibration burst progress"
            );
        }
    }

    {
        let mut metrics = match ctx.metrics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        metrics.add_training_samples(CALIBRATION_SAMPLES as u64);
    }

    // ---- Phase B: baseline ----------------------------------------------
    let samples = ctx.store.all_samples(&ctx.asset_id);
    let baseline = BaselineBuilder::default().build(&samples, &ctx.asset_id, None)?;

    let check = crate::baseline::validation::check_data_against_baseline(&samples, &baseline, 3.0);
    info!(
        asset = %ctx.asset_id,
        pass_rate = check.pass_rate(),
        violations = check.violations.len(),
        "Baseline self-check"
    );

    ctx.store.set_baseline(&ctx.asset_id, baseline);

    // ---- Phase C: detector training -------------------------------------
    // Too few windows is not fatal: monitoring falls back to range checks.
    let healthy: Vec<RawSample> = samples.into_iter().filter(|s| !s.is_faulty).collect();
    let features = extract_multi_window_features(&healthy, ctx.config.window_size);

    match BatchAnomalyDetector::train(&ctx.asset_id, &features, &ctx.config.detector) {
        Ok(detector) => ctx.store.set_detector(&ctx.asset_id, detector),
        Err(EngineError::InsufficientTraining { have, need }) => {
            warn!(
                asset = %ctx.asset_id,
                have, need,
                "Not enough windows for detector training, monitoring uses range fallback"
            );
        }
        Err(e) => return Err(e),
    }

    // ---- Phase D: monitoring --------------------------------------------
    {
        let mut control = ctx.control.write().await;
        control.state = SystemState::MonitoringHealthy;
        control.status = format!("Calibration complete for {}; monitoring", ctx.asset_id);
    }
    info!(asset = %ctx.asset_id, "Calibration complete, entering MONITORING_HEALTHY");

    monitoring_loop(ctx, SyntheticProfile::healthy(), MonitorMode::Healthy).await
}

// ============================================================================
// Monitoring / Fault Injection
// ============================================================================

/// Healthy monitoring worker without the calibration phases (reset path).
pub(crate) async fn run_monitoring(ctx: WorkerContext) {
    if let Err(e) = monitoring_loop(&ctx, SyntheticProfile::healthy(), MonitorMode::Healthy).await {
        ctx.fail_to_idle(&e).await;
    }
}

/// Fault-injection worker: same loop shape, fault-configured synthesiser
/// and a lower stamping threshold.
pub(crate) async fn run_fault_injection(ctx: WorkerContext, profile: SyntheticProfile) {
    if let Err(e) = monitoring_loop(&ctx, profile, MonitorMode::FaultInjection).await {
        ctx.fail_to_idle(&e).await;
    }
}

/// Shared 1-second tick loop.
///
/// Each tick: synthesise a full window (10 ms spacing), extract features,
/// score with the installed detector (range fallback otherwise), stamp the
/// batch verdict on every sample, append, persist, and record the
/// classification outcome.
async fn monitoring_loop(
    ctx: &WorkerContext,
    profile: SyntheticProfile,
    mode: MonitorMode,
) -> Result<()> {
    let threshold = match mode {
        MonitorMode::Healthy => ctx.config.healthy_score_threshold,
        MonitorMode::FaultInjection => ctx.config.fault_score_threshold,
    };

    // Distinct stream from the calibration burst
    let mut synth = SignalSynthesizer::with_profile(&ctx.asset_id, ctx.seed.wrapping_add(1), profile);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                info!(asset = %ctx.asset_id, "Monitoring loop cancelled");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let window_start = Utc::now() - ChronoDuration::seconds(1);
        let mut window = synth.generate_stream(ctx.config.window_size, window_start, 10);

        let features = extract_batch_features(&window)?;

        // Look up, score, release: never cache a detector across ticks
        let score = match ctx.store.get_detector(&ctx.asset_id) {
            Some(detector) => match detector.score_batch(&features) {
                Ok(score) => score,
                Err(_) => self_range_score(ctx, &window),
            },
            None => self_range_score(ctx, &window),
        };

        let is_faulty = score >= threshold;
        for sample in &mut window {
            sample.is_faulty = is_faulty;
        }

        ctx.store.append_samples(&ctx.asset_id, window.iter().cloned());

        let points: Vec<SensorPoint> = window
            .iter()
            .map(|s| SensorPoint::from_sample(s, ASSET_TYPE))
            .collect();
        if let Err(e) = ctx.writer.write_batch(&points).await {
            warn!(asset = %ctx.asset_id, error = %e, "Batch persist failed, continuing");
        }

        // Every tick also feeds the transition engine
        if let Some(event) = ctx
            .events
            .evaluate(&ctx.asset_id, is_faulty, Utc::now(), Some(&features))
        {
            info!(asset = %ctx.asset_id, kind = %event.kind, "Worker tick emitted event");
        }

        ctx.record_metric(mode, is_faulty);
    }
}

/// Range-fallback score for the tick's window, 0.0 without a baseline.
fn self_range_score(ctx: &WorkerContext, window: &[RawSample]) -> f64 {
    match (ctx.store.get_baseline(&ctx.asset_id), window.last()) {
        (Some(baseline), Some(latest)) => range_check_score(&baseline, latest),
        _ => 0.0,
    }
}
