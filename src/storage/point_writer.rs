//! Point Writer — Time-Series Persistence Boundary
//!
//! The pipeline treats the time-series database as an external collaborator
//! behind this trait. The canonical persisted schema keeps `asset_id` and
//! `asset_type` as low-cardinality tags and everything else as fields;
//! `is_faulty` is a boolean field, never a tag, to avoid series-cardinality
//! blow-up.
//!
//! Two implementations ship: a sled-backed writer for durable local runs
//! and an in-memory writer mirroring mock mode for tests and demos. Store
//! failures are surfaced as [`EngineError::StoreUnavailable`] and the
//! in-memory pipeline always proceeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::types::RawSample;

/// Measurement-style record written for every sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPoint {
    /// UTC timestamp, nanosecond precision on the wire
    pub timestamp: DateTime<Utc>,

    // Tags (low cardinality)
    pub asset_id: String,
    pub asset_type: String,

    // Fields
    pub voltage_v: f64,
    pub current_a: f64,
    pub power_factor: f64,
    pub vibration_g: f64,
    pub is_faulty: bool,
}

impl SensorPoint {
    /// Build a point from a raw sample.
    pub fn from_sample(sample: &RawSample, asset_type: &str) -> Self {
        Self {
            timestamp: sample.timestamp,
            asset_id: sample.asset_id.clone(),
            asset_type: asset_type.to_string(),
            voltage_v: sample.voltage_v,
            current_a: sample.current_a,
            power_factor: sample.power_factor,
            vibration_g: sample.vibration_g,
            is_faulty: sample.is_faulty,
        }
    }
}

/// External time-series sink used by ingestion and background workers.
#[async_trait]
pub trait PointWriter: Send + Sync {
    /// Persist one point.
    async fn write_point(&self, point: &SensorPoint) -> Result<()>;

    /// Persist a batch of points.
    async fn write_batch(&self, points: &[SensorPoint]) -> Result<()>;

    /// Read back all points for an asset inside a time window, oldest first.
    async fn query_window(
        &self,
        asset_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorPoint>>;

    /// Wipe everything (purge).
    async fn delete_all(&self) -> Result<()>;
}

// ============================================================================
// Sled Writer
// ============================================================================

/// Durable point sink on sled, keyed by timestamp for natural chronological
/// ordering. A per-process counter disambiguates points sharing one
/// nanosecond.
pub struct SledPointWriter {
    db: sled::Db,
    sequence: AtomicU64,
}

impl SledPointWriter {
    /// Open or create the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path).map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        info!(path = %path.display(), "Point store opened");
        Ok(Self {
            db,
            sequence: AtomicU64::new(0),
        })
    }

    fn key_for(&self, point: &SensorPoint) -> [u8; 16] {
        let ts = point.timestamp.timestamp_nanos_opt().unwrap_or(0).max(0) as u64;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);

        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&ts.to_be_bytes());
        key[8..].copy_from_slice(&seq.to_be_bytes());
        key
    }

    fn insert(&self, point: &SensorPoint) -> Result<()> {
        let key = self.key_for(point);
        let value = serde_json::to_vec(point)?;
        self.db
            .insert(key, value)
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl PointWriter for SledPointWriter {
    async fn write_point(&self, point: &SensorPoint) -> Result<()> {
        self.insert(point)?;
        debug!(asset = %point.asset_id, "Point written");
        Ok(())
    }

    async fn write_batch(&self, points: &[SensorPoint]) -> Result<()> {
        for point in points {
            self.insert(point)?;
        }
        debug!(count = points.len(), "Point batch written");
        Ok(())
    }

    async fn query_window(
        &self,
        asset_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorPoint>> {
        let start_ns = start.timestamp_nanos_opt().unwrap_or(0).max(0) as u64;
        let end_ns = end.timestamp_nanos_opt().unwrap_or(i64::MAX).max(0) as u64;

        let mut start_key = [0u8; 16];
        start_key[..8].copy_from_slice(&start_ns.to_be_bytes());
        let mut end_key = [0xffu8; 16];
        end_key[..8].copy_from_slice(&end_ns.to_be_bytes());

        let mut points = Vec::new();
        for item in self.db.range(start_key..=end_key) {
            let (_, value) = item.map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
            if let Ok(point) = serde_json::from_slice::<SensorPoint>(&value) {
                if point.asset_id == asset_id {
                    points.push(point);
                }
            }
        }
        Ok(points)
    }

    async fn delete_all(&self) -> Result<()> {
        self.db
            .clear()
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        self.db
            .flush_async()
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        info!("Point store cleared");
        Ok(())
    }
}

// ============================================================================
// Memory Writer
// ============================================================================

/// Buffer capacity for the in-memory writer.
const MEMORY_BUFFER_CAP: usize = 10_000;

/// In-memory point sink used by tests and the demo default.
///
/// Failure injection (`set_failing`) lets tests exercise the degraded
/// durability path without a real database outage.
#[derive(Debug, Default)]
pub struct MemoryPointWriter {
    points: Mutex<Vec<SensorPoint>>,
    failing: AtomicBool,
}

impl MemoryPointWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated store outage.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Snapshot of everything written so far.
    pub fn points(&self) -> Vec<SensorPoint> {
        match self.points.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of points currently buffered.
    pub fn len(&self) -> usize {
        match self.points.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_all(&self, new_points: &[SensorPoint]) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(EngineError::StoreUnavailable(
                "simulated store outage".to_string(),
            ));
        }

        let mut points = match self.points.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        points.extend_from_slice(new_points);

        // Keep the buffer bounded
        let len = points.len();
        if len > MEMORY_BUFFER_CAP {
            points.drain(..len - MEMORY_BUFFER_CAP);
        }
        Ok(())
    }
}

#[async_trait]
impl PointWriter for MemoryPointWriter {
    async fn write_point(&self, point: &SensorPoint) -> Result<()> {
        self.push_all(std::slice::from_ref(point))
    }

    async fn write_batch(&self, points: &[SensorPoint]) -> Result<()> {
        self.push_all(points)
    }

    async fn query_window(
        &self,
        asset_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorPoint>> {
        Ok(self
            .points()
            .into_iter()
            .filter(|p| p.asset_id == asset_id && p.timestamp >= start && p.timestamp <= end)
            .collect())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut points = match self.points.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        points.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn point_at(secs: i64, asset: &str) -> SensorPoint {
        SensorPoint {
            timestamp: Utc::now() - Duration::seconds(100 - secs),
            asset_id: asset.to_string(),
            asset_type: "motor".to_string(),
            voltage_v: 230.0,
            current_a: 15.0,
            power_factor: 0.92,
            vibration_g: 0.15,
            is_faulty: false,
        }
    }

    #[tokio::test]
    async fn test_memory_writer_roundtrip() {
        let writer = MemoryPointWriter::new();

        writer.write_point(&point_at(1, "motor-1")).await.expect("write");
        writer
            .write_batch(&[point_at(2, "motor-1"), point_at(3, "motor-2")])
            .await
            .expect("write batch");

        assert_eq!(writer.len(), 3);

        let window = writer
            .query_window(
                "motor-1",
                Utc::now() - Duration::seconds(200),
                Utc::now(),
            )
            .await
            .expect("query");
        assert_eq!(window.len(), 2);

        writer.delete_all().await.expect("delete");
        assert!(writer.is_empty());
    }

    #[tokio::test]
    async fn test_memory_writer_failure_injection() {
        let writer = MemoryPointWriter::new();
        writer.set_failing(true);

        let result = writer.write_point(&point_at(1, "motor-1")).await;
        assert!(matches!(result, Err(EngineError::StoreUnavailable(_))));

        writer.set_failing(false);
        assert!(writer.write_point(&point_at(1, "motor-1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_sled_writer_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = SledPointWriter::open(dir.path()).expect("open");

        let points: Vec<SensorPoint> = (0..10).map(|i| point_at(i, "motor-1")).collect();
        writer.write_batch(&points).await.expect("write");

        let window = writer
            .query_window(
                "motor-1",
                Utc::now() - Duration::seconds(200),
                Utc::now(),
            )
            .await
            .expect("query");
        assert_eq!(window.len(), 10);

        // Chronological order preserved by the key encoding
        for pair in window.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }

        writer.delete_all().await.expect("delete");
        let empty = writer
            .query_window(
                "motor-1",
                Utc::now() - Duration::seconds(200),
                Utc::now(),
            )
            .await
            .expect("query");
        assert!(empty.is_empty());
    }
}
