//! ML Engine — Outlier Model, Fallback Scoring, Blending
//!
//! One detector per asset, trained on healthy window features only, with a
//! range-based fallback for assets that have a baseline but no model yet.

pub mod batch_detector;
pub mod isolation_forest;
pub mod range_check;
pub mod scaler;

pub use batch_detector::{
    BatchAnomalyDetector, FeatureContribution, DETECTOR_VERSION, MIN_TRAINING_WINDOWS,
};
pub use isolation_forest::IsolationForest;
pub use range_check::{blend_scores, range_check_score, BlendPolicy};
pub use scaler::StandardScaler;
