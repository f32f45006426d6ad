//! Ingestion Facade — Single Entry Point for the External API
//!
//! Couples the per-asset pipeline to the state store, the external point
//! writer, and the event engine. All operations are safe to invoke
//! concurrently with a background worker.
//!
//! Durability policy: store failures during ingestion are logged and
//! counted, and the in-memory path proceeds. Degraded durability, full
//! availability.

use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assessment::{ExplanationGenerator, HealthAssessor};
use crate::baseline::BaselineBuilder;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::EventEngine;
use crate::ml_engine::{
    blend_scores, range_check_score, BatchAnomalyDetector, DETECTOR_VERSION,
};
use crate::processing::{
    extract_batch_features, extract_multi_window_features, MIN_WINDOW_SIZE,
};
use crate::storage::{PointWriter, SensorPoint, StateStore};
use crate::types::{
    Event, Explanation, HealthReport, RawSample, ReportMetadata, RiskLevel,
};

/// Asset type tag stamped on every persisted point.
const ASSET_TYPE: &str = "induction_motor";

/// Health score reported while a baseline is still being collected.
const PENDING_HEALTH_SCORE: u8 = 85;

/// One ingestion payload from the external API.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub asset_id: String,
    pub voltage_v: f64,
    pub current_a: f64,
    pub power_factor: f64,
    pub vibration_g: f64,

    /// Client-supplied fault flag; honoured only until a baseline exists
    pub is_faulty: bool,

    /// Derived power is computed server-side; a client-supplied value is
    /// rejected outright
    pub power_kw: Option<f64>,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub sample_count: usize,
    pub power_kw: f64,
    pub is_faulty: bool,
    pub events: Vec<Event>,
}

/// Result of a baseline build.
#[derive(Debug, Clone)]
pub struct BaselineBuildOutcome {
    pub baseline_id: String,
    pub sample_count: usize,
    pub detector_trained: bool,
}

/// Facade gluing state store, scorers, assessor, explainer, events, and the
/// external point writer.
pub struct IngestionFacade {
    store: Arc<StateStore>,
    writer: Arc<dyn PointWriter>,
    events: Arc<EventEngine>,
    config: EngineConfig,
    store_failures: AtomicU64,
}

impl IngestionFacade {
    pub fn new(
        store: Arc<StateStore>,
        writer: Arc<dyn PointWriter>,
        events: Arc<EventEngine>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            writer,
            events,
            config,
            store_failures: AtomicU64::new(0),
        }
    }

    /// Shared state store.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Count of persistence failures absorbed so far.
    pub fn store_failure_count(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // ingest_sample
    // ------------------------------------------------------------------

    /// Validate, derive, label, persist, and evaluate one sample.
    pub async fn ingest_sample(&self, request: IngestRequest) -> Result<IngestOutcome> {
        validate_request(&request)?;

        let power_kw = round3(
            request.voltage_v * request.current_a * request.power_factor / 1000.0,
        );

        // Range check against the baseline decides the stored label once a
        // baseline exists; the client flag only counts before that.
        let is_faulty = match self.store.get_baseline(&request.asset_id) {
            Some(baseline) => {
                let mut out_of_range = false;
                for signal in crate::types::SIGNAL_COLUMNS {
                    let Some(profile) = baseline.signal_profiles.get(signal) else {
                        continue;
                    };
                    let value = match signal {
                        "voltage_v" => request.voltage_v,
                        "current_a" => request.current_a,
                        "power_factor" => request.power_factor,
                        _ => request.vibration_g,
                    };
                    let tolerance = (profile.max - profile.min) * self.config.baseline_tolerance;
                    if value < profile.min - tolerance || value > profile.max + tolerance {
                        out_of_range = true;
                        break;
                    }
                }
                out_of_range
            }
            None => request.is_faulty,
        };

        let sample = RawSample {
            asset_id: request.asset_id.clone(),
            timestamp: Utc::now(),
            voltage_v: request.voltage_v,
            current_a: request.current_a,
            power_factor: request.power_factor,
            vibration_g: request.vibration_g,
            is_faulty,
        };

        self.store
            .append_samples(&request.asset_id, std::iter::once(sample.clone()));

        // Persistence is best-effort; a store outage never rejects the sample
        let point = SensorPoint::from_sample(&sample, ASSET_TYPE);
        if let Err(e) = self.writer.write_point(&point).await {
            self.store_failures.fetch_add(1, Ordering::Relaxed);
            warn!(asset = %request.asset_id, error = %e, "Point write failed, continuing");
        }

        // Transition evaluation with the freshest window snapshot available
        let window = self
            .store
            .recent_samples(&request.asset_id, self.config.window_size);
        let snapshot = if window.len() >= MIN_WINDOW_SIZE {
            extract_batch_features(&window).ok()
        } else {
            None
        };

        let events: Vec<Event> = self
            .events
            .evaluate(&request.asset_id, is_faulty, sample.timestamp, snapshot.as_ref())
            .into_iter()
            .collect();

        Ok(IngestOutcome {
            sample_count: self.store.sample_count(&request.asset_id),
            power_kw,
            is_faulty,
            events,
        })
    }

    // ------------------------------------------------------------------
    // assess_current
    // ------------------------------------------------------------------

    /// Assess the asset's current condition from its latest window.
    pub async fn assess_current(&self, asset_id: &str) -> Result<HealthReport> {
        let history = self.store.recent_samples(asset_id, self.config.window_size);
        let Some(latest) = history.last().cloned() else {
            return Err(EngineError::NotFound(format!(
                "no data for asset '{}'",
                asset_id
            )));
        };

        let Some(baseline) = self.store.get_baseline(asset_id) else {
            return Ok(pending_report(asset_id));
        };

        let range_score = range_check_score(&baseline, &latest);

        let detector = self.store.get_detector(asset_id);
        let ml_score = match (&detector, history.len() >= MIN_WINDOW_SIZE) {
            (Some(detector), true) => match extract_batch_features(&history)
                .and_then(|features| detector.score_batch(&features))
            {
                Ok(score) => score,
                Err(e) => {
                    // Scoring failures fall back to the range check silently
                    debug!(asset = %asset_id, error = %e, "Detector scoring fell back to range check");
                    range_score
                }
            },
            _ => range_score,
        };

        let anomaly_score = blend_scores(ml_score, range_score, self.config.blend_policy);

        let detector_version = if detector.is_some() {
            DETECTOR_VERSION
        } else {
            "range-check"
        };
        let assessor = HealthAssessor::new(detector_version, &baseline.baseline_id);

        let health = assessor.compute_health_score(anomaly_score);
        let risk = assessor.classify_risk_level(health);
        let explanations = ExplanationGenerator::new(&baseline).generate(&latest, risk);

        let report = assessor.assess(asset_id, anomaly_score, explanations);
        self.store.set_latest_report(asset_id, report.clone());

        debug!(
            asset = %asset_id,
            ml = ml_score,
            range = range_score,
            blended = anomaly_score,
            health = report.health_score,
            risk = %report.risk_level,
            "Assessment complete"
        );

        Ok(report)
    }

    // ------------------------------------------------------------------
    // build_baseline
    // ------------------------------------------------------------------

    /// Build and install a baseline (and detector, when enough windows
    /// exist) from recent healthy history.
    pub async fn build_baseline(
        &self,
        asset_id: &str,
        hours: u32,
    ) -> Result<BaselineBuildOutcome> {
        if !(1..=168).contains(&hours) {
            return Err(EngineError::Validation(format!(
                "training_hours must be within [1, 168], got {}",
                hours
            )));
        }

        let samples = self.store.all_samples(asset_id);
        let healthy: Vec<RawSample> = samples.iter().filter(|s| !s.is_faulty).cloned().collect();
        if healthy.len() < 10 {
            return Err(EngineError::InsufficientData {
                have: healthy.len(),
                need: 10,
            });
        }

        let now = Utc::now();
        let window = (now - Duration::hours(hours as i64), now);

        let baseline = BaselineBuilder::default().build(&samples, asset_id, Some(window))?;
        let baseline_id = baseline.baseline_id.clone();
        let sample_count = baseline.training_window.sample_count;
        self.store.set_baseline(asset_id, baseline);

        // Detector training rides on the same healthy history; too few
        // windows is not an error, scoring just uses the range fallback.
        let features = extract_multi_window_features(&healthy, self.config.window_size);
        let detector_trained =
            match BatchAnomalyDetector::train(asset_id, &features, &self.config.detector) {
                Ok(detector) => {
                    self.store.set_detector(asset_id, detector);
                    true
                }
                Err(EngineError::InsufficientTraining { have, need }) => {
                    info!(
                        asset = %asset_id,
                        have, need,
                        "Too few windows for detector training, range fallback stays active"
                    );
                    false
                }
                Err(e) => return Err(e),
            };

        Ok(BaselineBuildOutcome {
            baseline_id,
            sample_count,
            detector_trained,
        })
    }

    // ------------------------------------------------------------------
    // get_history
    // ------------------------------------------------------------------

    /// Recent samples for charting, oldest first.
    pub fn get_history(&self, asset_id: &str, limit: usize) -> Result<Vec<RawSample>> {
        if !(1..=1000).contains(&limit) {
            return Err(EngineError::Validation(format!(
                "limit must be within [1, 1000], got {}",
                limit
            )));
        }
        Ok(self.store.recent_samples(asset_id, limit))
    }
}

/// Report returned before any baseline exists.
fn pending_report(asset_id: &str) -> HealthReport {
    HealthReport {
        report_id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        asset_id: asset_id.to_string(),
        health_score: PENDING_HEALTH_SCORE,
        risk_level: RiskLevel::Low,
        maintenance_window_days: 30.0,
        explanations: vec![Explanation {
            reason: "Baseline not yet established. Collecting data...".to_string(),
            related_features: Vec::new(),
            confidence_score: 0.5,
        }],
        metadata: ReportMetadata {
            model_version: "pending".to_string(),
        },
    }
}

fn validate_request(request: &IngestRequest) -> Result<()> {
    if request.asset_id.trim().is_empty() {
        return Err(EngineError::Validation("asset_id must not be empty".to_string()));
    }

    if request.power_kw.is_some() {
        return Err(EngineError::Validation(
            "power_kw is derived server-side and must not be supplied".to_string(),
        ));
    }

    for (name, value) in [
        ("voltage_v", request.voltage_v),
        ("current_a", request.current_a),
        ("power_factor", request.power_factor),
        ("vibration_g", request.vibration_g),
    ] {
        if !value.is_finite() {
            return Err(EngineError::Validation(format!(
                "{} must be a finite number",
                name
            )));
        }
    }

    if !(0.0..=1.0).contains(&request.power_factor) {
        return Err(EngineError::Validation(format!(
            "power_factor must be within [0, 1], got {}",
            request.power_factor
        )));
    }

    Ok(())
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
