//! Query points and longitude normalization.

use serde::{Deserialize, Serialize};

/// Shift a longitude into [0, 360). Negative values get +360, others pass through.
pub fn normalize_longitude(lon: f64) -> f64 {
    if lon < 0.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// A geographic point requested by a caller, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryPoint {
    pub lat: f64,
    pub lon: f64,
}

impl QueryPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// The same point with its longitude shifted into the grid's [0, 360) space.
    pub fn normalized(&self) -> Self {
        Self {
            lat: self.lat,
            lon: normalize_longitude(self.lon),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_longitude() {
        assert_eq!(normalize_longitude(-5.0), 355.0);
        assert_eq!(normalize_longitude(-180.0), 180.0);
        assert_eq!(normalize_longitude(0.0), 0.0);
        assert_eq!(normalize_longitude(45.5), 45.5);
        assert_eq!(normalize_longitude(359.75), 359.75);
    }

    #[test]
    fn test_normalized_point_keeps_latitude() {
        let p = QueryPoint::new(-33.9, -70.6).normalized();
        assert_eq!(p.lat, -33.9);
        assert!((p.lon - 289.4).abs() < 1e-9);
    }

    #[test]
    fn test_normalized_range_for_sampled_longitudes() {
        let mut lon = -359.5;
        while lon < 360.0 {
            let n = normalize_longitude(lon);
            assert!((0.0..360.0).contains(&n), "{} normalized to {}", lon, n);
            lon += 0.5;
        }
    }
}
