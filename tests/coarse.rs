//! Integration tests for the coarse trip filter

use geoprox::geo_utils::lat_degrees;
use geoprox::{must_compare, select_candidates, DetectorConfig, Trip};

const LAT: f64 = 41.15;
const LON: f64 = -8.61;

fn trip(trip_id: u64, vehicle_id: u32, start: i64, lat: f64, lon: f64) -> Trip {
    Trip {
        trip_id,
        vehicle_id,
        start_timestamp: start,
        point_count: 20,
        seconds_per_point: 15, // 300 s duration
        center_lat: lat,
        center_lon: lon,
    }
}

fn config() -> DetectorConfig {
    DetectorConfig {
        max_speed_mps: 30.0,
        ..DetectorConfig::default()
    }
}

#[test]
fn test_derived_quantities() {
    let t = trip(1, 10, 1000, LAT, LON);
    assert_eq!(t.end_timestamp(), 1300);
    assert_eq!(t.bounding_radius_m(30.0), 9000.0);
}

#[test]
fn test_overlapping_trips_must_compare() {
    let a = trip(1, 10, 1000, LAT, LON);
    let b = trip(2, 20, 1100, LAT, LON);
    assert!(must_compare(&a, &b, &config()));
}

#[test]
fn test_disjoint_times_rejected() {
    let a = trip(1, 10, 1000, LAT, LON); // ends at 1300
    let b = trip(2, 20, 2000, LAT, LON);
    assert!(!must_compare(&a, &b, &config()));
}

#[test]
fn test_time_padding_respected() {
    // b starts exactly time_threshold after a ends: still a candidate
    let a = trip(1, 10, 1000, LAT, LON);
    let b = trip(2, 20, 1305, LAT, LON);
    assert!(must_compare(&a, &b, &config()));
    let c = trip(3, 30, 1306, LAT, LON);
    assert!(!must_compare(&a, &c, &config()));
}

#[test]
fn test_distant_circles_rejected() {
    // Radii are 9 km each; 50 km of separation cannot overlap
    let a = trip(1, 10, 1000, LAT, LON);
    let b = trip(2, 20, 1000, LAT + lat_degrees(50_000.0), LON);
    assert!(!must_compare(&a, &b, &config()));
}

#[test]
fn test_rejection_is_symmetric() {
    let a = trip(1, 10, 1000, LAT, LON);
    let b = trip(2, 20, 1000, LAT + lat_degrees(50_000.0), LON);
    assert_eq!(must_compare(&a, &b, &config()), must_compare(&b, &a, &config()));
}

#[test]
fn test_select_candidates_drops_lone_vehicles() {
    let trips = vec![
        trip(1, 10, 1000, LAT, LON),
        trip(2, 20, 1100, LAT, LON),
        // Far away in space
        trip(3, 30, 1000, LAT + lat_degrees(100_000.0), LON),
    ];
    let selection = select_candidates(&trips, &config());
    assert!(selection.vehicles.contains(&10));
    assert!(selection.vehicles.contains(&20));
    assert!(!selection.vehicles.contains(&30));
    assert_eq!(selection.trips_considered, 3);
    assert_eq!(selection.trips_skipped, 0);
}

#[test]
fn test_same_vehicle_trips_do_not_pair() {
    let trips = vec![trip(1, 10, 1000, LAT, LON), trip(2, 10, 1100, LAT, LON)];
    let selection = select_candidates(&trips, &config());
    assert!(selection.vehicles.is_empty());
}

#[test]
fn test_invalid_trips_skipped_not_fatal() {
    let mut bad = trip(9, 90, 1000, LAT, LON);
    bad.point_count = 0;
    let trips = vec![trip(1, 10, 1000, LAT, LON), trip(2, 20, 1100, LAT, LON), bad];
    let selection = select_candidates(&trips, &config());
    assert_eq!(selection.trips_skipped, 1);
    assert_eq!(selection.trips_considered, 2);
    assert_eq!(selection.vehicles.len(), 2);
}
