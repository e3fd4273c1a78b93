//! Streaming proximity detector for one time-ordered stream.
//!
//! Consumes points in (timestamp, vehicle_id) order, maintains the sliding
//! grid, and hands every grid-adjacent candidate pair to the exact matcher.
//! The matcher — exact time difference plus haversine distance — is the
//! single source of truth for a proximity event; the grid and the coarse
//! trip filter exist only to avoid invoking it on the full cross product.

use log::trace;

use crate::aggregator::PairAggregator;
use crate::error::Result;
use crate::geo_utils::haversine_distance;
use crate::grid::SlidingGrid;
use crate::{DetectorConfig, GeoPoint};

/// Throughput and filter counters for one detector instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorCounters {
    /// Points fed into the grid (padding included).
    pub points_processed: u64,
    /// Candidate pairs handed to the exact matcher.
    pub comparisons: u64,
    /// Exact-matcher-accepted proximity events.
    pub events: u64,
    /// Points dropped for invalid coordinates.
    pub skipped_points: u64,
}

impl DetectorCounters {
    /// Fold counters from another detector into this one.
    pub fn merge(&mut self, other: DetectorCounters) {
        self.points_processed += other.points_processed;
        self.comparisons += other.comparisons;
        self.events += other.events;
        self.skipped_points += other.skipped_points;
    }
}

/// Per-chunk detector: sliding grid, exact matcher, and pair aggregator.
///
/// The emit window `[emit_start, emit_end)` controls which events are
/// recorded: an event belongs to the chunk whose emit window contains the
/// later of its two timestamps. Padding points outside the window still
/// enter the grid, so pairs straddling a chunk boundary are found exactly
/// once across adjacent chunks.
#[derive(Debug)]
pub struct ProximityDetector {
    distance_threshold_m: f64,
    time_threshold_s: i64,
    emit_start: i64,
    emit_end: i64,
    grid: SlidingGrid,
    aggregator: PairAggregator,
    counters: DetectorCounters,
}

impl ProximityDetector {
    /// Create a detector emitting events whose later timestamp falls in
    /// `[emit_start, emit_end)`. The configuration must already be
    /// validated.
    pub fn new(config: &DetectorConfig, emit_start: i64, emit_end: i64) -> Self {
        Self {
            distance_threshold_m: config.distance_threshold_m,
            time_threshold_s: config.time_threshold_s,
            emit_start,
            emit_end,
            grid: SlidingGrid::new(
                config.grid_cell_size_m,
                config.time_threshold_s,
                config.compaction_interval_s,
            ),
            aggregator: PairAggregator::new(),
            counters: DetectorCounters::default(),
        }
    }

    /// Detector covering an unbounded emit window (single-pass runs).
    pub fn unbounded(config: &DetectorConfig) -> Self {
        Self::new(config, i64::MIN, i64::MAX)
    }

    /// Process the next point of the time-ordered stream.
    ///
    /// Eviction happens before candidate generation, so every candidate
    /// already sits within the time threshold up to bucket staleness, which
    /// the exact check below re-validates.
    pub fn process_point(&mut self, point: GeoPoint) {
        if !point.is_valid() {
            self.counters.skipped_points += 1;
            trace!(
                "skipping invalid fix for vehicle {} at t={}",
                point.vehicle_id,
                point.timestamp
            );
            return;
        }
        self.counters.points_processed += 1;

        self.grid.evict_older_than(point.timestamp - self.time_threshold_s);
        let cell = self.grid.cell_for(&point);

        // The incoming point is the later of any candidate pair, so the
        // emit window test on it alone attributes each event to one chunk.
        if point.timestamp >= self.emit_start && point.timestamp < self.emit_end {
            for candidate in self.grid.candidates(&point, cell) {
                self.counters.comparisons += 1;

                let time_diff = (point.timestamp - candidate.timestamp).abs();
                if time_diff > self.time_threshold_s {
                    continue;
                }

                let distance = haversine_distance(
                    point.latitude,
                    point.longitude,
                    candidate.latitude,
                    candidate.longitude,
                );
                if distance <= self.distance_threshold_m {
                    self.aggregator
                        .record(point.vehicle_id, candidate.vehicle_id, distance, time_diff);
                    self.counters.events += 1;
                }
            }
        }

        self.grid.insert(point, cell);
        self.grid.maybe_compact(point.timestamp);
    }

    /// Counters so far.
    pub fn counters(&self) -> DetectorCounters {
        self.counters
    }

    /// Number of live points currently in the window.
    pub fn live_points(&self) -> usize {
        self.grid.len()
    }

    /// Consume the detector, returning its aggregator and counters.
    pub fn finish(self) -> (PairAggregator, DetectorCounters) {
        (self.aggregator, self.counters)
    }
}

/// Run the detector over an in-memory, time-ordered point collection.
///
/// Convenience for tests and small one-shot jobs; large archives should go
/// through [`crate::ProximityRun`] so they stream chunk by chunk.
pub fn detect<I>(points: I, config: &DetectorConfig) -> Result<(PairAggregator, DetectorCounters)>
where
    I: IntoIterator<Item = GeoPoint>,
{
    config.validate()?;
    let mut detector = ProximityDetector::unbounded(config);
    for point in points {
        detector.process_point(point);
    }
    Ok(detector.finish())
}
