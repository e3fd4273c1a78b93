//! Spatial hash grid with a sliding time window over live points.
//!
//! Live points are bucketed into fixed-size geographic cells so that
//! proximity candidates for a new point come from its own cell plus the 8
//! neighbors, instead of a scan over every live point. A deque in arrival
//! order drives eviction: because the stream is time-ordered, any point
//! older than the time threshold can never again satisfy the time
//! constraint and is dropped before candidates are generated.
//!
//! Bucket entries are filtered for staleness on read and swept proactively
//! on a coarse stream-time interval; the sweep bounds bucket growth in
//! busy cells but is not needed for correctness, since every candidate is
//! re-validated by the exact matcher.

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::geo_utils::{lat_degrees, lon_degrees};
use crate::GeoPoint;

/// Integer grid cell key: (row from latitude, column from longitude).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub row: i32,
    pub col: i32,
}

/// Spatial grid plus sliding time window over the currently-live points.
#[derive(Debug)]
pub struct SlidingGrid {
    cell_size_m: f64,
    time_threshold_s: i64,
    compaction_interval_s: i64,
    lat_cell_deg: f64,
    /// Live points in arrival order; the front drives eviction.
    window: VecDeque<GeoPoint>,
    cells: HashMap<GridCell, Vec<GeoPoint>>,
    last_compaction: i64,
}

impl SlidingGrid {
    /// Create an empty grid.
    ///
    /// `cell_size_m` must exceed the distance threshold the caller matches
    /// against; [`crate::DetectorConfig::validate`] enforces this.
    pub fn new(cell_size_m: f64, time_threshold_s: i64, compaction_interval_s: i64) -> Self {
        Self {
            cell_size_m,
            time_threshold_s,
            compaction_interval_s,
            lat_cell_deg: lat_degrees(cell_size_m),
            window: VecDeque::new(),
            cells: HashMap::new(),
            last_compaction: i64::MIN,
        }
    }

    /// Compute the cell for a point, with a cos(latitude)-corrected
    /// longitude cell width.
    pub fn cell_for(&self, point: &GeoPoint) -> GridCell {
        let lon_cell_deg = lon_degrees(self.cell_size_m, point.latitude);
        GridCell {
            row: (point.latitude / self.lat_cell_deg).floor() as i32,
            col: (point.longitude / lon_cell_deg).floor() as i32,
        }
    }

    /// Drop every live point strictly older than `cutoff` from the window.
    ///
    /// Bucket entries are left in place and filtered on read; the periodic
    /// sweep reclaims them in bulk.
    pub fn evict_older_than(&mut self, cutoff: i64) {
        while let Some(front) = self.window.front() {
            if front.timestamp >= cutoff {
                break;
            }
            self.window.pop_front();
        }
    }

    /// Collect candidate partners for `point` from its 3×3 cell
    /// neighborhood: live (non-stale) points from other vehicles.
    ///
    /// Time adjacency is only guaranteed up to staleness filtering; the
    /// exact matcher re-checks the time difference.
    pub fn candidates(&self, point: &GeoPoint, cell: GridCell) -> Vec<GeoPoint> {
        let min_live = point.timestamp - self.time_threshold_s;
        let mut out = Vec::new();

        for d_row in -1..=1 {
            for d_col in -1..=1 {
                let neighbor = GridCell {
                    row: cell.row + d_row,
                    col: cell.col + d_col,
                };
                let Some(bucket) = self.cells.get(&neighbor) else {
                    continue;
                };
                for q in bucket {
                    if q.timestamp < min_live {
                        continue; // stale bucket entry, not yet swept
                    }
                    if q.vehicle_id == point.vehicle_id {
                        continue; // no self-pairs
                    }
                    out.push(*q);
                }
            }
        }

        out
    }

    /// Insert a point into the window and its cell bucket.
    pub fn insert(&mut self, point: GeoPoint, cell: GridCell) {
        self.window.push_back(point);
        self.cells.entry(cell).or_default().push(point);
    }

    /// Sweep stale entries out of all cell buckets if the compaction
    /// interval has elapsed in stream time.
    pub fn maybe_compact(&mut self, now: i64) {
        // Saturating: last_compaction starts at i64::MIN.
        if now.saturating_sub(self.last_compaction) < self.compaction_interval_s {
            return;
        }
        self.last_compaction = now;

        let min_keep = now - self.time_threshold_s;
        let before = self.cells.len();
        self.cells.retain(|_, bucket| {
            bucket.retain(|p| p.timestamp >= min_keep);
            !bucket.is_empty()
        });

        debug!(
            "grid compaction at t={}: {} -> {} cells, {} live points",
            now,
            before,
            self.cells.len(),
            self.window.len()
        );
    }

    /// Number of points in the sliding window.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Number of non-empty cell buckets (stale entries included until swept).
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
