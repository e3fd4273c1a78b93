//! # geoprox
//!
//! Exact spatiotemporal proximity join over large vehicle GPS archives.
//!
//! Given a stream of timestamped GPS fixes, this library finds every pair of
//! distinct vehicles that ever came within a small distance (meters) and a
//! small time gap (seconds) of each other, without the O(n²) all-pairs
//! blowup and without holding the archive in memory.
//!
//! The pipeline:
//! - **Coarse trip filter** (optional): rejects trip pairs whose bounding
//!   circles cannot overlap in space or time before any point is loaded.
//! - **Spatial grid + sliding time window**: buckets live points into
//!   geographic cells so candidates come from a 3×3 neighborhood instead of
//!   a full scan; points older than the time threshold are evicted as the
//!   stream advances.
//! - **Exact matcher**: haversine distance plus exact time-difference check;
//!   the single source of truth for a proximity event.
//! - **Pair aggregator**: per-pair event counts and min/avg distance and
//!   time gap, with an order-independent merge for multi-chunk runs.
//! - **Chunk orchestrator**: splits the time range into bounded, padded
//!   chunks and checkpoints after each one so interrupted runs resume.
//!
//! ## Quick start
//!
//! ```rust
//! use geoprox::{detect, DetectorConfig, GeoPoint};
//!
//! let points = vec![
//!     GeoPoint::new(10, 1000, 41.1500, -8.6100),
//!     GeoPoint::new(20, 1002, 41.1500, -8.61003),
//! ];
//!
//! let config = DetectorConfig::default();
//! let (pairs, counters) = detect(points, &config).unwrap();
//!
//! assert_eq!(pairs.len(), 1);
//! assert_eq!(counters.events, 1);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{ProximityError, Result};

// Geographic utilities (haversine distance, cell sizing)
pub mod geo_utils;

// Spatial hash grid with sliding time window
pub mod grid;
pub use grid::{GridCell, SlidingGrid};

// Per-pair event accumulation
pub mod aggregator;
pub use aggregator::{PairAggregator, PairKey, PairReport, PairStats};

// Streaming per-chunk detector
pub mod detector;
pub use detector::{detect, DetectorCounters, ProximityDetector};

// Coarse trip-level pre-filter
pub mod coarse;
pub use coarse::{must_compare, select_candidates, CoarseSelection, Trip};

// Point/trip sources and bounded retry
pub mod source;
pub use source::{
    CsvPointSource, InMemorySource, InMemoryTripSource, PointSource, RetryPolicy, TripSource,
};

// Chunk orchestration, checkpoint/resume
pub mod runner;
#[cfg(feature = "parallel")]
pub use runner::detect_parallel;
pub use runner::{Checkpoint, ProximityRun, RunReport};

// Synthetic fleet generation for tests and benchmarks
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// A single timestamped GPS fix for one vehicle.
///
/// Immutable once produced by a source. Streams consumed by the pipeline
/// must be ordered by (timestamp ascending, vehicle_id ascending).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub vehicle_id: u32,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new GPS fix.
    pub fn new(vehicle_id: u32, timestamp: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            vehicle_id,
            timestamp,
            latitude,
            longitude,
        }
    }

    /// Check that the coordinates are finite and within WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Detection thresholds and run shape.
///
/// Defaults match the archive this was built for: 5 m / 5 s thresholds,
/// 12 m grid cells, daily chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Maximum great-circle distance for a proximity event, in meters.
    pub distance_threshold_m: f64,
    /// Maximum timestamp difference for a proximity event, in seconds.
    pub time_threshold_s: i64,
    /// Target grid cell size in meters. Must exceed `distance_threshold_m`,
    /// otherwise the 3×3 neighborhood scan can miss true matches.
    pub grid_cell_size_m: f64,
    /// Chunk length in seconds for the orchestrator.
    pub chunk_size_s: i64,
    /// Resume from an existing checkpoint instead of starting fresh.
    pub resume: bool,
    /// Upper bound on vehicle speed, used only by the coarse trip filter.
    /// Must be a true upper bound for the filter to stay false-negative free.
    pub max_speed_mps: f64,
    /// Stream-time interval between proactive sweeps of stale cell entries.
    pub compaction_interval_s: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            distance_threshold_m: 5.0,
            time_threshold_s: 5,
            grid_cell_size_m: 12.0,
            chunk_size_s: 24 * 3600,
            resume: false,
            max_speed_mps: 30.0,
            compaction_interval_s: 60,
        }
    }
}

impl DetectorConfig {
    /// Validate the configuration. Called once at the start of a run;
    /// a failure here is a logic error, not a runtime condition.
    pub fn validate(&self) -> Result<()> {
        if !(self.distance_threshold_m > 0.0) {
            return Err(ProximityError::InvalidConfig {
                reason: format!(
                    "distance_threshold_m must be positive, got {}",
                    self.distance_threshold_m
                ),
            });
        }
        if self.time_threshold_s <= 0 {
            return Err(ProximityError::InvalidConfig {
                reason: format!(
                    "time_threshold_s must be positive, got {}",
                    self.time_threshold_s
                ),
            });
        }
        if !(self.grid_cell_size_m > self.distance_threshold_m) {
            return Err(ProximityError::InvalidConfig {
                reason: format!(
                    "grid_cell_size_m ({}) must exceed distance_threshold_m ({})",
                    self.grid_cell_size_m, self.distance_threshold_m
                ),
            });
        }
        if self.chunk_size_s <= 0 {
            return Err(ProximityError::InvalidConfig {
                reason: format!("chunk_size_s must be positive, got {}", self.chunk_size_s),
            });
        }
        if !(self.max_speed_mps > 0.0) {
            return Err(ProximityError::InvalidConfig {
                reason: format!("max_speed_mps must be positive, got {}", self.max_speed_mps),
            });
        }
        if self.compaction_interval_s <= 0 {
            return Err(ProximityError::InvalidConfig {
                reason: format!(
                    "compaction_interval_s must be positive, got {}",
                    self.compaction_interval_s
                ),
            });
        }
        Ok(())
    }
}
