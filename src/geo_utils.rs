//! Geographic utilities: great-circle distance and cell sizing.

/// Mean Earth radius in meters (WGS84 sphere approximation).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters spanned by one degree of latitude.
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Great-circle distance between two WGS84 coordinates in meters,
/// using the haversine formula.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Degrees of latitude spanning `meters`.
pub fn lat_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE_LAT
}

/// Degrees of longitude spanning `meters` at latitude `lat_deg`.
///
/// A fixed-degree cell is not fixed-distance away from the equator, so the
/// width carries a cos(latitude) correction. The cosine is clamped to keep
/// the width finite near the poles.
pub fn lon_degrees(meters: f64, lat_deg: f64) -> f64 {
    meters / (METERS_PER_DEGREE_LAT * lat_deg.to_radians().cos().max(0.1))
}
