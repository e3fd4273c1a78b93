//! Synthetic GPS fleet generator for tests and benchmarks.
//!
//! Generates a seeded fleet of wandering vehicles whose home areas are
//! spaced far apart, then plants a configurable number of close encounters
//! with known pairs, providing ground truth for validating the detector.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::aggregator::PairKey;
use crate::geo_utils::{lat_degrees, lon_degrees};
use crate::GeoPoint;

/// Scenario parameters for a synthetic fleet.
#[derive(Debug, Clone)]
pub struct FleetScenario {
    /// Latitude of the fleet's operating area.
    pub origin_lat: f64,
    /// Longitude of the fleet's operating area.
    pub origin_lon: f64,
    pub vehicle_count: u32,
    pub points_per_vehicle: u32,
    /// Timestamp of each vehicle's first fix.
    pub start_timestamp: i64,
    /// Seconds between consecutive fixes of one vehicle.
    pub sample_interval_s: i64,
    /// Spacing between vehicle home positions in meters. Keep this well
    /// above the detection threshold so only planted encounters match.
    pub vehicle_spacing_m: f64,
    /// Per-step wander in meters.
    pub step_m: f64,
    /// Number of encounters to plant between distinct vehicle pairs.
    pub planted_encounters: u32,
    /// How close the planted fixes sit, in meters.
    pub encounter_distance_m: f64,
    pub seed: u64,
}

impl Default for FleetScenario {
    fn default() -> Self {
        Self {
            origin_lat: 41.15,
            origin_lon: -8.61,
            vehicle_count: 20,
            points_per_vehicle: 200,
            start_timestamp: 1_372_636_800, // 2013-07-01
            sample_interval_s: 15,
            vehicle_spacing_m: 500.0,
            step_m: 3.0,
            planted_encounters: 3,
            encounter_distance_m: 2.0,
            seed: 42,
        }
    }
}

/// A generated fleet with ground truth.
#[derive(Debug, Clone)]
pub struct SyntheticFleet {
    /// All fixes, sorted by (timestamp, vehicle_id).
    pub points: Vec<GeoPoint>,
    /// Pairs with a planted encounter; the detector must find at least
    /// these.
    pub expected_pairs: Vec<PairKey>,
}

impl FleetScenario {
    /// Generate the fleet deterministically from the seed.
    pub fn generate(&self) -> SyntheticFleet {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut points = Vec::new();

        // Wandering track per vehicle, each around a well-separated home.
        for vehicle in 0..self.vehicle_count {
            let home_lat = self.origin_lat
                + lat_degrees(self.vehicle_spacing_m) * (vehicle / 8) as f64;
            let home_lon = self.origin_lon
                + lon_degrees(self.vehicle_spacing_m, self.origin_lat) * (vehicle % 8) as f64;

            let mut lat = home_lat;
            let mut lon = home_lon;
            for i in 0..self.points_per_vehicle {
                lat += lat_degrees(self.step_m) * rng.gen_range(-1.0..1.0);
                lon += lon_degrees(self.step_m, lat) * rng.gen_range(-1.0..1.0);
                points.push(GeoPoint::new(
                    vehicle,
                    self.start_timestamp + i as i64 * self.sample_interval_s,
                    lat,
                    lon,
                ));
            }
        }

        // Plant encounters by co-locating one fix of each chosen pair.
        let mut expected_pairs = Vec::new();
        let max_pairs = self.vehicle_count / 2;
        for k in 0..self.planted_encounters.min(max_pairs) {
            let a = 2 * k;
            let b = 2 * k + 1;
            let slot = rng.gen_range(0..self.points_per_vehicle) as usize;
            let meet_ts = self.start_timestamp + slot as i64 * self.sample_interval_s;
            let meet_lat = self.origin_lat + lat_degrees(50.0 + 200.0 * k as f64);
            let meet_lon = self.origin_lon - lon_degrees(300.0, self.origin_lat);
            let offset = lat_degrees(self.encounter_distance_m);

            let idx_a = (a * self.points_per_vehicle) as usize + slot;
            let idx_b = (b * self.points_per_vehicle) as usize + slot;
            points[idx_a] = GeoPoint::new(a, meet_ts, meet_lat, meet_lon);
            points[idx_b] = GeoPoint::new(b, meet_ts, meet_lat + offset, meet_lon);
            expected_pairs.push(PairKey::new(a, b));
        }

        points.sort_by_key(|p| (p.timestamp, p.vehicle_id));
        SyntheticFleet {
            points,
            expected_pairs,
        }
    }
}
