//! Per-pair accumulation of proximity events.
//!
//! One [`PairStats`] entry exists per unordered vehicle pair that produced
//! at least one exact-matcher-accepted event. Entries update monotonically
//! (count only grows, minimums only shrink) and are never removed within a
//! run. Averages are derived from sums at read time so they cannot drift
//! from the count.

use std::collections::HashMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Canonicalized unordered vehicle pair: `a < b` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub a: u32,
    pub b: u32,
}

impl PairKey {
    /// Build a key from two vehicle ids in either order.
    pub fn new(v1: u32, v2: u32) -> Self {
        debug_assert_ne!(v1, v2, "pair key from a single vehicle");
        if v1 < v2 {
            Self { a: v1, b: v2 }
        } else {
            Self { a: v2, b: v1 }
        }
    }
}

/// Accumulated statistics for one vehicle pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairStats {
    pub count: u64,
    pub min_distance_m: f64,
    pub sum_distance_m: f64,
    pub min_time_diff_s: i64,
    pub sum_time_diff_s: i64,
}

impl PairStats {
    fn from_event(distance_m: f64, time_diff_s: i64) -> Self {
        Self {
            count: 1,
            min_distance_m: distance_m,
            sum_distance_m: distance_m,
            min_time_diff_s: time_diff_s,
            sum_time_diff_s: time_diff_s,
        }
    }

    fn record(&mut self, distance_m: f64, time_diff_s: i64) {
        self.count += 1;
        self.sum_distance_m += distance_m;
        self.sum_time_diff_s += time_diff_s;
        if distance_m < self.min_distance_m {
            self.min_distance_m = distance_m;
        }
        if time_diff_s < self.min_time_diff_s {
            self.min_time_diff_s = time_diff_s;
        }
    }

    /// Mean event distance in meters.
    pub fn avg_distance_m(&self) -> f64 {
        self.sum_distance_m / self.count as f64
    }

    /// Mean event time difference in seconds.
    pub fn avg_time_diff_s(&self) -> f64 {
        self.sum_time_diff_s as f64 / self.count as f64
    }

    /// Fold another accumulation for the same pair into this one.
    pub fn merge(&mut self, other: &PairStats) {
        self.count += other.count;
        self.sum_distance_m += other.sum_distance_m;
        self.sum_time_diff_s += other.sum_time_diff_s;
        self.min_distance_m = self.min_distance_m.min(other.min_distance_m);
        self.min_time_diff_s = self.min_time_diff_s.min(other.min_time_diff_s);
    }
}

/// One row of the final result set.
///
/// Field order matches the published CSV header:
/// `vehicle_a,vehicle_b,proximity_count,min_distance_m,avg_distance_m,min_time_diff_s,avg_time_diff_s`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    pub vehicle_a: u32,
    pub vehicle_b: u32,
    pub proximity_count: u64,
    pub min_distance_m: f64,
    pub avg_distance_m: f64,
    pub min_time_diff_s: i64,
    pub avg_time_diff_s: f64,
}

/// Accumulator for proximity events, keyed by canonical pair.
///
/// Owned by a single chunk worker; multi-chunk and multi-worker runs merge
/// aggregators afterwards. The merge is associative and order-independent,
/// so the final result does not depend on chunk processing order.
#[derive(Debug, Clone, Default)]
pub struct PairAggregator {
    stats: HashMap<PairKey, PairStats>,
}

impl PairAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one accepted proximity event between two distinct vehicles.
    pub fn record(&mut self, v1: u32, v2: u32, distance_m: f64, time_diff_s: i64) {
        let key = PairKey::new(v1, v2);
        self.stats
            .entry(key)
            .and_modify(|st| st.record(distance_m, time_diff_s))
            .or_insert_with(|| PairStats::from_event(distance_m, time_diff_s));
    }

    /// Number of unique pairs seen so far.
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Whether any pair has been recorded.
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Look up the stats for one pair.
    pub fn get(&self, key: &PairKey) -> Option<&PairStats> {
        self.stats.get(key)
    }

    /// Fold another aggregator into this one.
    pub fn merge(&mut self, other: PairAggregator) {
        for (key, st) in other.stats {
            self.stats
                .entry(key)
                .and_modify(|mine| mine.merge(&st))
                .or_insert(st);
        }
    }

    /// Key-ordered snapshot of the accumulated state, for checkpointing.
    pub fn snapshot(&self) -> Vec<(PairKey, PairStats)> {
        let mut entries: Vec<_> = self
            .stats
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }

    /// Rebuild an aggregator from a checkpoint snapshot.
    pub fn restore(entries: Vec<(PairKey, PairStats)>) -> Self {
        Self {
            stats: entries.into_iter().collect(),
        }
    }

    /// Final ordered result set.
    ///
    /// Ordering is a contract: count descending, then min distance
    /// ascending, then min time difference ascending, then pair key for
    /// full determinism.
    pub fn results(&self) -> Vec<PairReport> {
        let mut rows: Vec<PairReport> = self
            .stats
            .iter()
            .map(|(key, st)| PairReport {
                vehicle_a: key.a,
                vehicle_b: key.b,
                proximity_count: st.count,
                min_distance_m: st.min_distance_m,
                avg_distance_m: st.avg_distance_m(),
                min_time_diff_s: st.min_time_diff_s,
                avg_time_diff_s: st.avg_time_diff_s(),
            })
            .collect();

        rows.sort_by(|x, y| {
            y.proximity_count
                .cmp(&x.proximity_count)
                .then(x.min_distance_m.total_cmp(&y.min_distance_m))
                .then(x.min_time_diff_s.cmp(&y.min_time_diff_s))
                .then((x.vehicle_a, x.vehicle_b).cmp(&(y.vehicle_a, y.vehicle_b)))
        });
        rows
    }

    /// Write the ordered result set as CSV, header included.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        for row in self.results() {
            out.serialize(row)?;
        }
        out.flush()?;
        Ok(())
    }
}
