//! Engine Error Types
//!
//! Single error enum shared across the pipeline. Validation and bounds
//! errors surface synchronously to the caller; store failures downgrade to
//! warnings and never abort ingestion.

use thiserror::Error;

/// Errors produced by the condition-monitoring engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient data: have {have} samples, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("Insufficient coverage for '{signal}': {coverage:.1}% < {required:.0}% required")]
    InsufficientCoverage {
        signal: String,
        coverage: f64,
        required: f64,
    },

    #[error("Insufficient training windows: have {have}, need {need}")]
    InsufficientTraining { have: usize, need: usize },

    #[error("Window too small: {have} samples, need at least {need}")]
    WindowTooSmall { have: usize, need: usize },

    #[error("Invalid features: {0}")]
    InvalidFeatures(String),

    #[error("Invalid transition: cannot {action} while {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
