//! Coarse trip-level pre-filter.
//!
//! Each trip gets a bounding circle built from only its first/last fix and
//! an assumed maximum speed: center at the midpoint, radius equal to trip
//! duration times `max_speed_mps`. As long as the speed bound is a true
//! upper bound, no point of the real path can lie outside the circle, so a
//! rejection here is always safe. Acceptance only means the pair must be
//! compared at point level; this filter is never the final verdict.
//!
//! Candidate selection bulk-loads the circle envelopes into an R-tree and
//! intersects padded envelopes, shrinking the set of vehicles whose raw
//! points need to be streamed and grid-indexed at all.

use std::collections::HashSet;

use log::{debug, warn};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{haversine_distance, lat_degrees, lon_degrees};
use crate::DetectorConfig;

/// Trip metadata consumed by the coarse filter.
///
/// `center_lat`/`center_lon` is the midpoint of the trip's first and last
/// fix; the full path is never loaded here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: u64,
    pub vehicle_id: u32,
    /// Seconds since the Unix epoch.
    pub start_timestamp: i64,
    pub point_count: u32,
    /// Sampling interval between consecutive fixes of this trip.
    pub seconds_per_point: i64,
    pub center_lat: f64,
    pub center_lon: f64,
}

impl Trip {
    /// Trip end derived from the fix count and sampling interval.
    pub fn end_timestamp(&self) -> i64 {
        self.start_timestamp + self.point_count as i64 * self.seconds_per_point
    }

    /// Bounding circle radius in meters: a deliberately loose but provable
    /// upper bound on how far any fix can sit from the center.
    pub fn bounding_radius_m(&self, max_speed_mps: f64) -> f64 {
        (self.end_timestamp() - self.start_timestamp) as f64 * max_speed_mps
    }

    /// Check the record is usable: positive fix count and interval, finite
    /// in-range center coordinates.
    pub fn is_valid(&self) -> bool {
        self.point_count > 0
            && self.seconds_per_point > 0
            && self.center_lat.is_finite()
            && self.center_lon.is_finite()
            && self.center_lat.abs() <= 90.0
            && self.center_lon.abs() <= 180.0
    }
}

/// Decide whether two trips must be compared at point level.
///
/// Accepts iff the trip intervals overlap once padded by the time
/// threshold, and the circle centers sit within the sum of both radii plus
/// the distance threshold. Rejection is exact (no false negatives);
/// acceptance is only a candidate.
pub fn must_compare(a: &Trip, b: &Trip, config: &DetectorConfig) -> bool {
    let pad = config.time_threshold_s;
    if a.end_timestamp() + pad < b.start_timestamp || b.end_timestamp() + pad < a.start_timestamp {
        return false;
    }

    let center_distance = haversine_distance(a.center_lat, a.center_lon, b.center_lat, b.center_lon);
    center_distance
        <= a.bounding_radius_m(config.max_speed_mps)
            + b.bounding_radius_m(config.max_speed_mps)
            + config.distance_threshold_m
}

/// Outcome of coarse candidate selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoarseSelection {
    /// Vehicles with at least one trip pairing that survived the filter.
    pub vehicles: HashSet<u32>,
    pub trips_considered: usize,
    /// Trip records dropped for invalid metadata.
    pub trips_skipped: usize,
}

struct TripEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for TripEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

fn envelope_for(trip: &Trip, config: &DetectorConfig) -> AABB<[f64; 2]> {
    // Padding by the full threshold on each side keeps the envelope a
    // superset of the circle; must_compare re-checks exactly.
    let reach_m = trip.bounding_radius_m(config.max_speed_mps) + config.distance_threshold_m;
    let d_lat = lat_degrees(reach_m);
    let d_lon = lon_degrees(reach_m, trip.center_lat);
    AABB::from_corners(
        [trip.center_lon - d_lon, trip.center_lat - d_lat],
        [trip.center_lon + d_lon, trip.center_lat + d_lat],
    )
}

/// Select the vehicles whose trips may produce proximity events.
///
/// Invalid trip records are skipped and counted, never fatal.
pub fn select_candidates(trips: &[Trip], config: &DetectorConfig) -> CoarseSelection {
    let mut skipped = 0usize;
    let valid: Vec<&Trip> = trips
        .iter()
        .filter(|t| {
            if t.is_valid() {
                true
            } else {
                skipped += 1;
                warn!("skipping invalid trip record {}", t.trip_id);
                false
            }
        })
        .collect();

    let envelopes: Vec<AABB<[f64; 2]>> = valid.iter().map(|t| envelope_for(t, config)).collect();
    let tree = RTree::bulk_load(
        envelopes
            .iter()
            .enumerate()
            .map(|(index, aabb)| TripEnvelope { index, aabb: *aabb })
            .collect(),
    );

    let mut vehicles = HashSet::new();
    for (index, aabb) in envelopes.iter().enumerate() {
        let trip = valid[index];
        for hit in tree.locate_in_envelope_intersecting(aabb) {
            if hit.index <= index {
                continue; // each unordered trip pair once
            }
            let other = valid[hit.index];
            if other.vehicle_id == trip.vehicle_id {
                continue;
            }
            if must_compare(trip, other, config) {
                vehicles.insert(trip.vehicle_id);
                vehicles.insert(other.vehicle_id);
            }
        }
    }

    debug!(
        "coarse filter: {} trips -> {} candidate vehicles ({} skipped)",
        valid.len(),
        vehicles.len(),
        skipped
    );

    CoarseSelection {
        vehicles,
        trips_considered: valid.len(),
        trips_skipped: skipped,
    }
}
