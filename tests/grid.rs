//! Integration tests for the sliding spatial grid

use geoprox::geo_utils::{lat_degrees, lon_degrees};
use geoprox::{GeoPoint, SlidingGrid};

const LAT: f64 = 41.15;
const LON: f64 = -8.61;

fn grid() -> SlidingGrid {
    // 12 m cells, 5 s window, 60 s compaction
    SlidingGrid::new(12.0, 5, 60)
}

#[test]
fn test_adjacent_points_are_candidates() {
    let mut g = grid();
    let p1 = GeoPoint::new(1, 100, LAT, LON);
    let p2 = GeoPoint::new(2, 101, LAT + lat_degrees(3.0), LON);

    let c1 = g.cell_for(&p1);
    g.insert(p1, c1);

    let c2 = g.cell_for(&p2);
    let candidates = g.candidates(&p2, c2);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].vehicle_id, 1);
}

#[test]
fn test_same_vehicle_is_never_a_candidate() {
    let mut g = grid();
    let p1 = GeoPoint::new(7, 100, LAT, LON);
    let p2 = GeoPoint::new(7, 101, LAT, LON);

    let c1 = g.cell_for(&p1);
    g.insert(p1, c1);

    let c2 = g.cell_for(&p2);
    assert!(g.candidates(&p2, c2).is_empty());
}

#[test]
fn test_neighbor_cell_candidates_found() {
    // ~10 m apart straddles a 12 m cell boundary often enough; force it by
    // placing the second point one full cell east
    let mut g = grid();
    let p1 = GeoPoint::new(1, 100, LAT, LON);
    let p2 = GeoPoint::new(2, 100, LAT, LON + lon_degrees(12.0, LAT));

    let c1 = g.cell_for(&p1);
    let c2 = g.cell_for(&p2);
    assert_ne!(c1, c2);

    g.insert(p1, c1);
    let candidates = g.candidates(&p2, c2);
    assert_eq!(candidates.len(), 1);
}

#[test]
fn test_distant_points_are_not_candidates() {
    let mut g = grid();
    let p1 = GeoPoint::new(1, 100, LAT, LON);
    let p2 = GeoPoint::new(2, 100, LAT + lat_degrees(500.0), LON);

    let c1 = g.cell_for(&p1);
    g.insert(p1, c1);

    let c2 = g.cell_for(&p2);
    assert!(g.candidates(&p2, c2).is_empty());
}

#[test]
fn test_eviction_removes_old_points() {
    let mut g = grid();
    let p1 = GeoPoint::new(1, 100, LAT, LON);
    let c1 = g.cell_for(&p1);
    g.insert(p1, c1);
    assert_eq!(g.len(), 1);

    g.evict_older_than(106);
    assert!(g.is_empty());
}

#[test]
fn test_stale_bucket_entries_filtered_on_read() {
    let mut g = grid();
    let p1 = GeoPoint::new(1, 100, LAT, LON);
    let c1 = g.cell_for(&p1);
    g.insert(p1, c1);

    // Evicted from the window but still sitting in its bucket
    g.evict_older_than(200);

    let p2 = GeoPoint::new(2, 200, LAT, LON);
    let c2 = g.cell_for(&p2);
    assert!(g.candidates(&p2, c2).is_empty());
}

#[test]
fn test_compaction_drops_stale_buckets() {
    let mut g = grid();
    let p1 = GeoPoint::new(1, 100, LAT, LON);
    let c1 = g.cell_for(&p1);
    g.insert(p1, c1);
    g.maybe_compact(100);
    assert_eq!(g.cell_count(), 1);

    // 200 s later the bucket only holds a stale point
    g.evict_older_than(195);
    g.maybe_compact(200);
    assert_eq!(g.cell_count(), 0);
}

#[test]
fn test_cell_width_corrected_for_latitude() {
    let g = grid();
    // The same metric east offset must stay within one cell column at
    // high latitude, where a degree of longitude is shorter
    let p1 = GeoPoint::new(1, 100, 60.0, 10.0);
    let p2 = GeoPoint::new(2, 100, 60.0, 10.0 + lon_degrees(11.0, 60.0));
    let c1 = g.cell_for(&p1);
    let c2 = g.cell_for(&p2);
    assert!((c2.col - c1.col).abs() <= 1);
}
