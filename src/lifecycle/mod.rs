//! Lifecycle Controller — Demo Orchestration State Machine
//!
//! Process-wide system state with the transitions:
//!
//! ```text
//! IDLE ── calibrate(asset) ──────────────→ CALIBRATING
//! CALIBRATING ── internal completion ────→ MONITORING_HEALTHY
//! MONITORING_HEALTHY ── inject_fault ────→ FAULT_INJECTION
//! FAULT_INJECTION ── reset ──────────────→ MONITORING_HEALTHY
//! MONITORING_HEALTHY / FAULT_INJECTION ── stop ──→ IDLE
//! any ── purge ──────────────────────────→ IDLE  (wipes all state)
//! ```
//!
//! Each transition starts at most one background worker; any prior worker
//! is signalled to stop and joined with a bounded timeout before the next
//! one starts. The controller never forcibly interrupts a worker.

pub mod metrics;
pub(crate) mod workers;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::EventEngine;
use crate::generator::SyntheticProfile;
use crate::storage::{PointWriter, StateStore};
use crate::types::{FaultKind, FaultSeverity, SystemState};

pub use metrics::ValidationMetrics;
use workers::WorkerContext;

/// Bound on waiting for a cancelled worker to exit.
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Mutable control surface shared with workers.
#[derive(Debug, Clone)]
pub struct ControlState {
    pub state: SystemState,
    pub status: String,
    pub fault: Option<(FaultKind, FaultSeverity)>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            state: SystemState::Idle,
            status: "Idle".to_string(),
            fault: None,
        }
    }
}

/// Observable system snapshot for `get_state`.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    pub state: SystemState,
    pub status: String,
    pub fault: Option<(FaultKind, FaultSeverity)>,
    pub metrics: ValidationMetrics,
    pub healthy_stability: f64,
    pub fault_capture_rate: f64,
}

/// Handle to the single active background worker.
#[derive(Default)]
struct WorkerSlot {
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

/// Drives calibration, monitoring, and fault-injection workers against a
/// shared state store and external point writer.
pub struct LifecycleController {
    control: Arc<RwLock<ControlState>>,
    worker: tokio::sync::Mutex<WorkerSlot>,
    metrics: Arc<Mutex<ValidationMetrics>>,

    store: Arc<StateStore>,
    writer: Arc<dyn PointWriter>,
    events: Arc<EventEngine>,
    config: EngineConfig,
    seed: u64,
}

impl LifecycleController {
    pub fn new(
        store: Arc<StateStore>,
        writer: Arc<dyn PointWriter>,
        events: Arc<EventEngine>,
        config: EngineConfig,
        seed: u64,
    ) -> Self {
        Self {
            control: Arc::new(RwLock::new(ControlState::default())),
            worker: tokio::sync::Mutex::new(WorkerSlot::default()),
            metrics: Arc::new(Mutex::new(ValidationMetrics::default())),
            store,
            writer,
            events,
            config,
            seed,
        }
    }

    /// Current system state.
    pub async fn state(&self) -> SystemState {
        self.control.read().await.state
    }

    /// Full observable snapshot: state, status message, fault config, and
    /// validation metrics.
    pub async fn snapshot(&self) -> SystemSnapshot {
        let control = self.control.read().await.clone();
        let metrics = self.metrics_snapshot();
        SystemSnapshot {
            state: control.state,
            status: control.status,
            fault: control.fault,
            healthy_stability: metrics.healthy_stability(),
            fault_capture_rate: metrics.fault_capture_rate(),
            metrics,
        }
    }

    fn metrics_snapshot(&self) -> ValidationMetrics {
        match self.metrics.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn reset_metrics(&self) {
        let mut metrics = match self.metrics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        metrics.reset();
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// IDLE -> CALIBRATING. Starts the calibration worker, which flips the
    /// state to MONITORING_HEALTHY on completion.
    pub async fn calibrate(&self, asset_id: &str) -> Result<SystemState> {
        let mut slot = self.worker.lock().await;

        let current = self.control.read().await.state;
        if current != SystemState::Idle {
            return Err(EngineError::InvalidTransition {
                from: current.to_string(),
                action: "calibrate".to_string(),
            });
        }

        Self::stop_worker(&mut slot).await;
        self.reset_metrics();

        {
            let mut control = self.control.write().await;
            control.state = SystemState::Calibrating;
            control.fault = None;
            control.status = format!("Calibrating {}", asset_id);
        }

        let ctx = self.worker_context(asset_id, &mut slot);
        slot.handle = Some(tokio::spawn(workers::run_calibration(ctx)));

        info!(asset = %asset_id, "Calibration started");
        Ok(SystemState::Calibrating)
    }

    /// MONITORING_HEALTHY -> FAULT_INJECTION.
    pub async fn inject_fault(
        &self,
        asset_id: &str,
        kind: FaultKind,
        severity: FaultSeverity,
    ) -> Result<SystemState> {
        let mut slot = self.worker.lock().await;

        let current = self.control.read().await.state;
        if current != SystemState::MonitoringHealthy {
            return Err(EngineError::InvalidTransition {
                from: current.to_string(),
                action: "inject_fault".to_string(),
            });
        }

        Self::stop_worker(&mut slot).await;

        {
            let mut control = self.control.write().await;
            control.state = SystemState::FaultInjection;
            control.fault = Some((kind, severity));
            control.status = format!("Injecting {} fault ({}) on {}", kind, severity, asset_id);
        }

        let ctx = self.worker_context(asset_id, &mut slot);
        let profile = SyntheticProfile::for_fault(kind, severity);
        slot.handle = Some(tokio::spawn(workers::run_fault_injection(ctx, profile)));

        info!(asset = %asset_id, kind = %kind, severity = %severity, "Fault injection started");
        Ok(SystemState::FaultInjection)
    }

    /// FAULT_INJECTION / MONITORING_HEALTHY -> MONITORING_HEALTHY.
    pub async fn reset(&self, asset_id: &str) -> Result<SystemState> {
        let mut slot = self.worker.lock().await;

        let current = self.control.read().await.state;
        if !matches!(
            current,
            SystemState::FaultInjection | SystemState::MonitoringHealthy
        ) {
            return Err(EngineError::InvalidTransition {
                from: current.to_string(),
                action: "reset".to_string(),
            });
        }

        Self::stop_worker(&mut slot).await;

        {
            let mut control = self.control.write().await;
            control.state = SystemState::MonitoringHealthy;
            control.fault = None;
            control.status = format!("Monitoring {} after reset", asset_id);
        }

        let ctx = self.worker_context(asset_id, &mut slot);
        slot.handle = Some(tokio::spawn(workers::run_monitoring(ctx)));

        info!(asset = %asset_id, "Reset to healthy monitoring");
        Ok(SystemState::MonitoringHealthy)
    }

    /// MONITORING_HEALTHY / FAULT_INJECTION -> IDLE. Rejected while
    /// calibrating; idempotent from IDLE.
    pub async fn stop(&self) -> Result<SystemState> {
        let mut slot = self.worker.lock().await;

        let current = self.control.read().await.state;
        if current == SystemState::Calibrating {
            return Err(EngineError::InvalidTransition {
                from: current.to_string(),
                action: "stop".to_string(),
            });
        }

        Self::stop_worker(&mut slot).await;
        self.reset_metrics();

        {
            let mut control = self.control.write().await;
            control.state = SystemState::Idle;
            control.fault = None;
            control.status = "Stopped".to_string();
        }

        info!("Lifecycle stopped");
        Ok(SystemState::Idle)
    }

    /// any -> IDLE. Also wipes the external store, the state store, and
    /// per-asset event trackers.
    pub async fn purge(&self) -> Result<SystemState> {
        let mut slot = self.worker.lock().await;

        Self::stop_worker(&mut slot).await;
        self.reset_metrics();

        if let Err(e) = self.writer.delete_all().await {
            warn!(error = %e, "External store purge failed");
        }
        self.store.clear_all();
        self.events.clear();

        {
            let mut control = self.control.write().await;
            control.state = SystemState::Idle;
            control.fault = None;
            control.status = "Purged".to_string();
        }

        info!("Lifecycle purged");
        Ok(SystemState::Idle)
    }

    // ------------------------------------------------------------------
    // Worker plumbing
    // ------------------------------------------------------------------

    fn worker_context(&self, asset_id: &str, slot: &mut WorkerSlot) -> WorkerContext {
        let cancel = CancellationToken::new();
        slot.cancel = Some(cancel.clone());

        WorkerContext {
            store: Arc::clone(&self.store),
            writer: Arc::clone(&self.writer),
            config: self.config.clone(),
            metrics: Arc::clone(&self.metrics),
            control: Arc::clone(&self.control),
            events: Arc::clone(&self.events),
            cancel,
            asset_id: asset_id.to_string(),
            seed: self.seed,
        }
    }

    /// Signal the active worker and wait for it to exit (bounded).
    async fn stop_worker(slot: &mut WorkerSlot) {
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = slot.handle.take() {
            match tokio::time::timeout(WORKER_JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Worker task join error"),
                Err(_) => warn!("Worker join timed out, abandoning handle"),
            }
        }
    }
}
