//! Bounding boxes in normalized longitude space.

use serde::{Deserialize, Serialize};

use crate::point::normalize_longitude;

/// A latitude/longitude box with inclusive bounds.
///
/// Longitudes are stored normalized into [0, 360). When `min_lon > max_lon`
/// after normalization the box wraps across the prime meridian, so a request
/// for -10..10 covers both 350..360 and 0..10.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Create a box from caller-supplied bounds, normalizing both longitudes.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon: normalize_longitude(min_lon),
            max_lon: normalize_longitude(max_lon),
        }
    }

    /// Whether the longitude range crosses 0/360.
    pub fn wraps(&self) -> bool {
        self.min_lon > self.max_lon
    }

    /// Check if a point (already in normalized longitude space) is inside the box.
    pub fn contains_point(&self, lat: f64, lon: f64) -> bool {
        if lat < self.min_lat || lat > self.max_lat {
            return false;
        }
        if self.wraps() {
            lon >= self.min_lon || lon <= self.max_lon
        } else {
            lon >= self.min_lon && lon <= self.max_lon
        }
    }
}
