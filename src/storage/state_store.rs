//! State Store — Per-Asset In-Memory Registry
//!
//! Owns all per-asset mutable state: the bounded sample ring, the current
//! baseline and detector, and the latest health report. Other components
//! look state up, use it, and release it; nothing caches a detector across
//! ticks.
//!
//! Locking: the asset map has its own lock for insertion; each asset record
//! has its own sample lock; baseline/detector/report slots are lock-free
//! `ArcSwap` cells so installation is a single pointer swap and readers
//! never observe a half-built model. No operation holds two asset locks at
//! once.

use arc_swap::ArcSwapOption;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::baseline::BaselineProfile;
use crate::ml_engine::BatchAnomalyDetector;
use crate::types::{HealthReport, RawSample};

/// Per-asset record. Created on first touch, owned by the store.
pub struct AssetState {
    samples: RwLock<VecDeque<RawSample>>,
    baseline: ArcSwapOption<BaselineProfile>,
    detector: ArcSwapOption<BatchAnomalyDetector>,
    latest_report: ArcSwapOption<HealthReport>,
}

impl AssetState {
    fn new(capacity: usize) -> Self {
        Self {
            samples: RwLock::new(VecDeque::with_capacity(capacity)),
            baseline: ArcSwapOption::empty(),
            detector: ArcSwapOption::empty(),
            latest_report: ArcSwapOption::empty(),
        }
    }
}

/// Registry of asset records keyed by `asset_id`.
pub struct StateStore {
    assets: RwLock<HashMap<String, Arc<AssetState>>>,
    history_capacity: usize,
}

impl StateStore {
    /// Store whose sample rings hold at most `history_capacity` readings.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            assets: RwLock::new(HashMap::new()),
            history_capacity: history_capacity.max(1),
        }
    }

    /// Get or create the record for an asset.
    fn asset(&self, asset_id: &str) -> Arc<AssetState> {
        if let Ok(assets) = self.assets.read() {
            if let Some(state) = assets.get(asset_id) {
                return Arc::clone(state);
            }
        }

        let mut assets = match self.assets.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            assets
                .entry(asset_id.to_string())
                .or_insert_with(|| Arc::new(AssetState::new(self.history_capacity))),
        )
    }

    /// Record for an asset that already exists.
    fn try_asset(&self, asset_id: &str) -> Option<Arc<AssetState>> {
        self.assets
            .read()
            .ok()
            .and_then(|assets| assets.get(asset_id).cloned())
    }

    // ------------------------------------------------------------------
    // Samples
    // ------------------------------------------------------------------

    /// Append samples to the asset's ring, evicting the oldest beyond
    /// capacity. Samples appended by one writer are observable in order.
    pub fn append_samples(&self, asset_id: &str, new_samples: impl IntoIterator<Item = RawSample>) {
        let state = self.asset(asset_id);
        let mut samples = match state.samples.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        for sample in new_samples {
            if samples.len() >= self.history_capacity {
                samples.pop_front();
            }
            samples.push_back(sample);
        }
    }

    /// Number of buffered samples for an asset.
    pub fn sample_count(&self, asset_id: &str) -> usize {
        self.try_asset(asset_id)
            .and_then(|state| state.samples.read().ok().map(|s| s.len()))
            .unwrap_or(0)
    }

    /// Most recent `limit` samples in chronological order.
    pub fn recent_samples(&self, asset_id: &str, limit: usize) -> Vec<RawSample> {
        let Some(state) = self.try_asset(asset_id) else {
            return Vec::new();
        };
        let samples = match state.samples.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let skip = samples.len().saturating_sub(limit);
        samples.iter().skip(skip).cloned().collect()
    }

    /// All buffered samples in chronological order.
    pub fn all_samples(&self, asset_id: &str) -> Vec<RawSample> {
        self.recent_samples(asset_id, usize::MAX)
    }

    // ------------------------------------------------------------------
    // Model slots
    // ------------------------------------------------------------------

    /// Install a baseline (single pointer swap).
    pub fn set_baseline(&self, asset_id: &str, baseline: BaselineProfile) {
        let state = self.asset(asset_id);
        info!(asset = %asset_id, baseline_id = %baseline.baseline_id, "Baseline installed");
        state.baseline.store(Some(Arc::new(baseline)));
    }

    pub fn get_baseline(&self, asset_id: &str) -> Option<Arc<BaselineProfile>> {
        self.try_asset(asset_id)?.baseline.load_full()
    }

    /// Install a detector atomically; replaces any previous model.
    pub fn set_detector(&self, asset_id: &str, detector: BatchAnomalyDetector) {
        let state = self.asset(asset_id);
        info!(
            asset = %asset_id,
            windows = detector.training_window_count(),
            "Detector installed"
        );
        state.detector.store(Some(Arc::new(detector)));
    }

    pub fn get_detector(&self, asset_id: &str) -> Option<Arc<BatchAnomalyDetector>> {
        self.try_asset(asset_id)?.detector.load_full()
    }

    /// Cache the latest health report.
    pub fn set_latest_report(&self, asset_id: &str, report: HealthReport) {
        let state = self.asset(asset_id);
        state.latest_report.store(Some(Arc::new(report)));
    }

    pub fn get_latest_report(&self, asset_id: &str) -> Option<Arc<HealthReport>> {
        self.try_asset(asset_id)?.latest_report.load_full()
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Known asset ids.
    pub fn asset_ids(&self) -> Vec<String> {
        self.assets
            .read()
            .map(|assets| assets.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every asset record (purge).
    pub fn clear_all(&self) {
        let mut assets = match self.assets.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = assets.len();
        assets.clear();
        info!(assets = count, "State store cleared");
    }
}
