//! Signal Processing
//!
//! Window-level statistical feature extraction feeding the anomaly
//! detection pipeline.

pub mod batch_features;

pub use batch_features::{
    extract_batch_features, extract_multi_window_features, FeatureVector, FEATURE_COUNT,
    FEATURE_NAMES, MIN_WINDOW_SIZE, STAT_NAMES,
};
