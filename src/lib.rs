//! SENTRA-OS: Rotating Asset Condition Monitoring
//!
//! Online condition-monitoring engine for motor-like industrial assets.
//! Consumes high-rate multi-signal sensor streams, learns per-asset
//! statistical baselines from healthy data, detects anomalies on sliding
//! 1-second windows, classifies health into an ordered risk scale, and
//! emits transition-based event notifications.
//!
//! ## Architecture
//!
//! - **Processing**: window-level statistical feature extraction (16-dim)
//! - **Baseline**: per-asset healthy signal profiles with coverage checks
//! - **ML Engine**: seeded isolation forest per asset plus range fallback
//! - **Assessment**: deterministic score -> health -> risk -> RUL mapping
//!   with template-based explanations
//! - **Events**: debounced healthy/faulty transition notifications
//! - **Lifecycle**: calibration, monitoring, and fault-injection workers
//! - **Storage**: per-asset state registry and the time-series boundary
//! - **Ingest**: the single facade used by the external API

pub mod assessment;
pub mod baseline;
pub mod config;
pub mod error;
pub mod events;
pub mod generator;
pub mod ingest;
pub mod lifecycle;
pub mod ml_engine;
pub mod processing;
pub mod storage;
pub mod types;

// Re-export the core surface
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use types::{
    Event, EventKind, EventSeverity, Explanation, FaultKind, FaultSeverity, HealthReport,
    RawSample, RiskLevel, SystemState,
};

pub use assessment::{ExplanationGenerator, HealthAssessor};
pub use baseline::{BaselineBuilder, BaselineProfile};
pub use events::EventEngine;
pub use ingest::{IngestRequest, IngestionFacade};
pub use lifecycle::{LifecycleController, ValidationMetrics};
pub use ml_engine::{BatchAnomalyDetector, BlendPolicy};
pub use processing::FeatureVector;
pub use storage::{MemoryPointWriter, PointWriter, SledPointWriter, StateStore};
