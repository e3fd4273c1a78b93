//! Tests for geographic utilities

use geoprox::geo_utils::{haversine_distance, lat_degrees, lon_degrees};

#[test]
fn test_zero_distance() {
    assert_eq!(haversine_distance(41.15, -8.61, 41.15, -8.61), 0.0);
}

#[test]
fn test_one_degree_latitude() {
    // One degree of latitude is roughly 111.2 km everywhere
    let d = haversine_distance(41.0, -8.61, 42.0, -8.61);
    assert!((d - 111_195.0).abs() < 200.0, "got {}", d);
}

#[test]
fn test_small_offsets_are_meters() {
    // ~4.5e-5 degrees of latitude is ~5 m
    let d = haversine_distance(41.15, -8.61, 41.15 + lat_degrees(5.0), -8.61);
    assert!((d - 5.0).abs() < 0.05, "got {}", d);
}

#[test]
fn test_symmetry() {
    let d1 = haversine_distance(41.15, -8.61, 41.16, -8.60);
    let d2 = haversine_distance(41.16, -8.60, 41.15, -8.61);
    assert!((d1 - d2).abs() < 1e-9);
}

#[test]
fn test_lon_degrees_widens_with_latitude() {
    // A fixed-meter cell spans more degrees of longitude away from the
    // equator
    let at_equator = lon_degrees(12.0, 0.0);
    let at_60 = lon_degrees(12.0, 60.0);
    assert!(at_60 > at_equator * 1.9);
}

#[test]
fn test_lon_degrees_finite_near_pole() {
    let near_pole = lon_degrees(12.0, 89.9);
    assert!(near_pole.is_finite());
    assert!(near_pole > 0.0);
}

#[test]
fn test_lon_offset_distance_round_trip() {
    // Moving by lon_degrees(10 m) at latitude 41 should measure ~10 m
    let lat = 41.15;
    let d = haversine_distance(lat, -8.61, lat, -8.61 + lon_degrees(10.0, lat));
    assert!((d - 10.0).abs() < 0.2, "got {}", d);
}
