//! Assessment — Health Scoring, Risk Classification, Explainability
//!
//! Deterministic rule layer sitting downstream of the ML engine.

pub mod assessor;
pub mod explainer;

pub use assessor::{
    HealthAssessor, RUL_BY_RISK, THRESHOLD_CRITICAL, THRESHOLD_HIGH, THRESHOLD_MODERATE,
};
pub use explainer::{systems_nominal, ExplanationGenerator};
