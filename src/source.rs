//! Point and trip sources, plus the bounded retry policy applied at chunk
//! boundaries.
//!
//! A source delivers fixes as a lazy stream ordered by (timestamp,
//! vehicle_id); the orchestrator never materializes a whole chunk. Sources
//! are restartable per call but need not support mid-stream seeking.
//! Malformed rows come back as `Err` items so callers can skip and count
//! them without aborting the stream.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::warn;
use serde::Deserialize;

use crate::coarse::Trip;
use crate::error::{ProximityError, Result};
use crate::GeoPoint;

/// A lazily-evaluated stream of fixes; `Err` items are malformed records.
pub type PointStream<'a> = Box<dyn Iterator<Item = Result<GeoPoint>> + 'a>;

/// Supplier of timestamp-ordered fixes for a half-open time range,
/// optionally restricted to a vehicle set.
pub trait PointSource {
    /// Stream fixes with `start <= timestamp < end`, ordered by
    /// (timestamp ascending, vehicle_id ascending).
    fn query(
        &mut self,
        start: i64,
        end: i64,
        vehicles: Option<&HashSet<u32>>,
    ) -> Result<PointStream<'_>>;
}

/// Supplier of trip metadata for the coarse filter.
pub trait TripSource {
    /// Trips whose interval intersects `[start, end)`.
    fn trips_in_range(&mut self, start: i64, end: i64) -> Result<Vec<Trip>>;
}

/// Bounded retry with a fixed backoff, applied to source queries at chunk
/// boundaries. Exhaustion is fatal to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying recoverable failures up to the attempt budget.
    pub fn run<T, F>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut last_message = String::new();
        for attempt in 1..=self.max_attempts.max(1) {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_recoverable() && attempt < self.max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}",
                        operation, attempt, self.max_attempts, err
                    );
                    last_message = err.to_string();
                    thread::sleep(self.backoff);
                }
                Err(err) if err.is_recoverable() => {
                    last_message = err.to_string();
                }
                Err(err) => return Err(err),
            }
        }
        Err(ProximityError::SourceExhausted {
            operation: operation.to_string(),
            attempts: self.max_attempts,
            message: last_message,
        })
    }
}

// ============================================================================
// In-memory source
// ============================================================================

/// Point source over an owned, pre-sorted vector. Used by tests and small
/// in-process jobs.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    points: Vec<GeoPoint>,
}

impl InMemorySource {
    /// Build a source, sorting the fixes into stream order.
    pub fn new(mut points: Vec<GeoPoint>) -> Self {
        points.sort_by_key(|p| (p.timestamp, p.vehicle_id));
        Self { points }
    }

    /// Inclusive-min/exclusive-max timestamp coverage, if non-empty.
    pub fn time_range(&self) -> Option<(i64, i64)> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        Some((first.timestamp, last.timestamp + 1))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl PointSource for InMemorySource {
    fn query(
        &mut self,
        start: i64,
        end: i64,
        vehicles: Option<&HashSet<u32>>,
    ) -> Result<PointStream<'_>> {
        let lo = self.points.partition_point(|p| p.timestamp < start);
        let hi = self.points.partition_point(|p| p.timestamp < end);
        let wanted = vehicles.cloned();
        let iter = self.points[lo..hi]
            .iter()
            .copied()
            .filter(move |p| wanted.as_ref().map_or(true, |set| set.contains(&p.vehicle_id)))
            .map(Ok);
        Ok(Box::new(iter))
    }
}

// ============================================================================
// CSV archive source
// ============================================================================

#[derive(Debug, Deserialize)]
struct CsvPointRow {
    vehicle_id: u32,
    timestamp: i64,
    latitude: f64,
    longitude: f64,
}

/// Point source over a CSV archive with header
/// `vehicle_id,timestamp,latitude,longitude`, sorted by
/// (timestamp, vehicle_id).
///
/// Each query re-opens the file and scans it lazily; rows that fail to
/// parse are yielded as `Err` items.
#[derive(Debug, Clone)]
pub struct CsvPointSource {
    path: PathBuf,
}

impl CsvPointSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Scan the archive for its min/max timestamps. Malformed rows are
    /// ignored here; they resurface as skips during detection.
    pub fn time_range(&self) -> Result<Option<(i64, i64)>> {
        let mut reader = self.open()?;
        let mut range: Option<(i64, i64)> = None;
        for row in reader.deserialize::<CsvPointRow>() {
            let Ok(row) = row else { continue };
            range = Some(match range {
                None => (row.timestamp, row.timestamp + 1),
                Some((lo, hi)) => (lo.min(row.timestamp), hi.max(row.timestamp + 1)),
            });
        }
        Ok(range)
    }

    fn open(&self) -> Result<csv::Reader<File>> {
        let file = File::open(&self.path).map_err(|e| ProximityError::Source {
            message: format!("cannot open {}: {}", self.path.display(), e),
        })?;
        Ok(csv::ReaderBuilder::new().has_headers(true).from_reader(file))
    }
}

impl PointSource for CsvPointSource {
    fn query(
        &mut self,
        start: i64,
        end: i64,
        vehicles: Option<&HashSet<u32>>,
    ) -> Result<PointStream<'_>> {
        let reader = self.open()?;
        let wanted = vehicles.cloned();
        let iter = reader
            .into_deserialize::<CsvPointRow>()
            .filter_map(move |row| match row {
                Ok(row) => {
                    if row.timestamp < start || row.timestamp >= end {
                        return None;
                    }
                    if let Some(set) = &wanted {
                        if !set.contains(&row.vehicle_id) {
                            return None;
                        }
                    }
                    Some(Ok(GeoPoint::new(
                        row.vehicle_id,
                        row.timestamp,
                        row.latitude,
                        row.longitude,
                    )))
                }
                Err(e) => Some(Err(ProximityError::MalformedRecord {
                    reason: e.to_string(),
                })),
            });
        Ok(Box::new(iter))
    }
}

/// Trip source over an owned vector, for tests and in-process jobs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTripSource {
    trips: Vec<Trip>,
}

impl InMemoryTripSource {
    pub fn new(trips: Vec<Trip>) -> Self {
        Self { trips }
    }
}

impl TripSource for InMemoryTripSource {
    fn trips_in_range(&mut self, start: i64, end: i64) -> Result<Vec<Trip>> {
        Ok(self
            .trips
            .iter()
            .filter(|t| t.end_timestamp() >= start && t.start_timestamp < end)
            .cloned()
            .collect())
    }
}
