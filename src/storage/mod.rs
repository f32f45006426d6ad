//! Storage — State Registry and Time-Series Boundary
//!
//! In-memory per-asset state plus the trait boundary to the external
//! time-series store.

pub mod point_writer;
pub mod state_store;

pub use point_writer::{MemoryPointWriter, PointWriter, SensorPoint, SledPointWriter};
pub use state_store::StateStore;
