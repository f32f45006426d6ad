//! Event Engine — Transition-Based Event Generator
//!
//! Core rule: events are transitions, not states. Exactly one event is
//! emitted when an asset's faulty flag flips and the flip has been
//! sustained for the debounce interval; a sustained state never repeats an
//! event.
//!
//! Each asset gets its own tracker behind its own lock; `evaluate` never
//! calls back into shared stores while a tracker lock is held.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

use crate::processing::FeatureVector;
use crate::types::{Event, EventKind, EventSeverity};

/// Default consecutive confirming ticks before a transition fires.
pub const DEFAULT_DEBOUNCE_TICKS: u32 = 2;

/// Per-asset transition state.
#[derive(Debug, Default)]
struct TransitionTracker {
    /// None until the first observation seeds it
    previous_is_faulty: Option<bool>,
    consecutive_faulty_ticks: u32,
    consecutive_healthy_ticks: u32,
}

/// Converts a stream of per-asset faulty evaluations into a sparse series
/// of debounced transition events.
#[derive(Debug)]
pub struct EventEngine {
    trackers: RwLock<HashMap<String, Arc<Mutex<TransitionTracker>>>>,
    debounce_ticks: u32,
}

impl Default for EventEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_TICKS)
    }
}

impl EventEngine {
    /// Engine with an explicit debounce. At `debounce_ticks = 1` the engine
    /// emits immediately on a transition.
    pub fn new(debounce_ticks: u32) -> Self {
        Self {
            trackers: RwLock::new(HashMap::new()),
            debounce_ticks: debounce_ticks.max(1),
        }
    }

    /// Evaluate one observation; returns the emitted event, if any.
    ///
    /// Invariants: the first observation of an asset never emits; any two
    /// successive events for one asset have opposite kinds; nothing emits
    /// until a transition has been sustained for the debounce interval.
    pub fn evaluate(
        &self,
        asset_id: &str,
        is_faulty: bool,
        timestamp: DateTime<Utc>,
        snapshot: Option<&FeatureVector>,
    ) -> Option<Event> {
        let tracker = self.tracker_for(asset_id);
        let mut tracker = match tracker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let Some(previous) = tracker.previous_is_faulty else {
            // First observation seeds the state, no event
            tracker.previous_is_faulty = Some(is_faulty);
            debug!(asset = %asset_id, is_faulty, "Transition tracker seeded");
            return None;
        };

        if is_faulty == previous {
            // Sustained state: reset the opposite counter
            if is_faulty {
                tracker.consecutive_healthy_ticks = 0;
            } else {
                tracker.consecutive_faulty_ticks = 0;
            }
            return None;
        }

        // Candidate transition: count confirming ticks
        let confirmed = if is_faulty {
            tracker.consecutive_faulty_ticks += 1;
            tracker.consecutive_faulty_ticks >= self.debounce_ticks
        } else {
            tracker.consecutive_healthy_ticks += 1;
            tracker.consecutive_healthy_ticks >= self.debounce_ticks
        };

        if !confirmed {
            return None;
        }

        tracker.consecutive_faulty_ticks = 0;
        tracker.consecutive_healthy_ticks = 0;
        tracker.previous_is_faulty = Some(is_faulty);
        drop(tracker);

        let event = if is_faulty {
            Event {
                timestamp,
                asset_id: asset_id.to_string(),
                kind: EventKind::AnomalyDetected,
                severity: EventSeverity::Critical,
                message: detected_message(snapshot),
            }
        } else {
            Event {
                timestamp,
                asset_id: asset_id.to_string(),
                kind: EventKind::AnomalyCleared,
                severity: EventSeverity::Info,
                message: "Signals returned to healthy operating range".to_string(),
            }
        };

        info!(
            asset = %asset_id,
            kind = %event.kind,
            message = %event.message,
            "Transition event emitted"
        );
        Some(event)
    }

    /// Forget all trackers (used by purge).
    pub fn clear(&self) {
        if let Ok(mut trackers) = self.trackers.write() {
            trackers.clear();
        }
    }

    fn tracker_for(&self, asset_id: &str) -> Arc<Mutex<TransitionTracker>> {
        if let Ok(trackers) = self.trackers.read() {
            if let Some(tracker) = trackers.get(asset_id) {
                return Arc::clone(tracker);
            }
        }

        let mut trackers = match self.trackers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            trackers
                .entry(asset_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(TransitionTracker::default()))),
        )
    }
}

/// Build the detection narrative from the window snapshot.
///
/// Fixed pattern rules over the feature vector; up to four deviation
/// phrases joined with "; ".
fn detected_message(snapshot: Option<&FeatureVector>) -> String {
    let Some(features) = snapshot else {
        return "Anomalous signal pattern detected".to_string();
    };

    let mut phrases: Vec<String> = Vec::new();

    if let Some(vib_std) = features.get("vibration_g_std") {
        if vib_std > 0.05 {
            phrases.push(format!("high vibration variance (\u{3c3}={:.3}g)", vib_std));
        }
    }
    if let Some(v_p2p) = features.get("voltage_v_peak_to_peak") {
        if v_p2p > 20.0 {
            phrases.push(format!("voltage transient peak-to-peak={:.1}V", v_p2p));
        }
    }
    if let Some(current) = features.get("current_a_mean") {
        if current > 20.0 {
            phrases.push(format!("elevated current draw ({:.1}A)", current));
        }
    }
    if let Some(pf) = features.get("power_factor_mean") {
        if pf < 0.80 {
            phrases.push(format!("depressed power factor ({:.2})", pf));
        }
    }

    if phrases.is_empty() {
        "Anomalous signal pattern detected".to_string()
    } else {
        phrases.truncate(4);
        phrases.join("; ")
    }
}
