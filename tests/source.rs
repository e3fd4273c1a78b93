//! Integration tests for point sources and the retry policy

use std::collections::HashSet;
use std::io::Write as _;
use std::time::Duration;

use geoprox::{
    CsvPointSource, GeoPoint, InMemorySource, PointSource, ProximityError, RetryPolicy,
};

#[test]
fn test_in_memory_source_sorts_and_slices() {
    let mut source = InMemorySource::new(vec![
        GeoPoint::new(2, 30, 41.0, -8.0),
        GeoPoint::new(1, 10, 41.0, -8.0),
        GeoPoint::new(1, 20, 41.0, -8.0),
    ]);
    assert_eq!(source.time_range(), Some((10, 31)));

    let points: Vec<GeoPoint> = source
        .query(10, 30, None)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(points.len(), 2);
    assert!(points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_in_memory_source_vehicle_filter() {
    let mut source = InMemorySource::new(vec![
        GeoPoint::new(1, 10, 41.0, -8.0),
        GeoPoint::new(2, 10, 41.0, -8.0),
        GeoPoint::new(3, 11, 41.0, -8.0),
    ]);
    let wanted: HashSet<u32> = [1, 3].into_iter().collect();
    let points: Vec<GeoPoint> = source
        .query(0, 100, Some(&wanted))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(points.len(), 2);
    assert!(points.iter().all(|p| p.vehicle_id != 2));
}

#[test]
fn test_csv_source_streams_and_flags_bad_rows() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "vehicle_id,timestamp,latitude,longitude").unwrap();
    writeln!(file, "1,100,41.15,-8.61").unwrap();
    writeln!(file, "2,101,not-a-number,-8.61").unwrap();
    writeln!(file, "3,102,41.15,-8.61").unwrap();
    file.flush().unwrap();

    let mut source = CsvPointSource::new(file.path());
    assert_eq!(source.time_range().unwrap(), Some((100, 103)));

    let items: Vec<_> = source.query(0, 1000, None).unwrap().collect();
    assert_eq!(items.len(), 3);
    assert_eq!(items.iter().filter(|r| r.is_err()).count(), 1);
    assert!(matches!(
        items[1],
        Err(ProximityError::MalformedRecord { .. })
    ));
}

#[test]
fn test_csv_source_range_is_half_open() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "vehicle_id,timestamp,latitude,longitude").unwrap();
    writeln!(file, "1,100,41.15,-8.61").unwrap();
    writeln!(file, "2,200,41.15,-8.61").unwrap();
    file.flush().unwrap();

    let mut source = CsvPointSource::new(file.path());
    let points: Vec<GeoPoint> = source
        .query(100, 200, None)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].vehicle_id, 1);
}

#[test]
fn test_retry_succeeds_after_transient_failures() {
    let policy = RetryPolicy {
        max_attempts: 3,
        backoff: Duration::from_millis(0),
    };
    let mut failures_left = 2;
    let value = policy
        .run("flaky op", || {
            if failures_left > 0 {
                failures_left -= 1;
                Err(ProximityError::Source {
                    message: "connection lost".into(),
                })
            } else {
                Ok(99)
            }
        })
        .unwrap();
    assert_eq!(value, 99);
}

#[test]
fn test_retry_exhaustion_is_fatal() {
    let policy = RetryPolicy {
        max_attempts: 2,
        backoff: Duration::from_millis(0),
    };
    let result: geoprox::Result<()> = policy.run("always down", || {
        Err(ProximityError::Source {
            message: "connection refused".into(),
        })
    });
    assert!(matches!(
        result,
        Err(ProximityError::SourceExhausted { attempts: 2, .. })
    ));
}

#[test]
fn test_retry_does_not_mask_non_source_errors() {
    let policy = RetryPolicy::default();
    let mut calls = 0;
    let result: geoprox::Result<()> = policy.run("config op", || {
        calls += 1;
        Err(ProximityError::InvalidConfig {
            reason: "bad".into(),
        })
    });
    assert_eq!(calls, 1);
    assert!(matches!(result, Err(ProximityError::InvalidConfig { .. })));
}
