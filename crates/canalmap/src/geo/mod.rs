mod polygon;
mod transform;

use serde::{Deserialize, Serialize};

pub use polygon::{point_in_ring, point_on_segment, ring_centroid, GeoBounds};
pub use transform::{
    geo_to_screen, geo_to_world, screen_to_geo, screen_to_world, world_to_geo, world_to_screen,
    ViewTransform, ISOMETRIC_Y_COMPRESSION, PLANAR_SCALE, ZOOM_DEFAULT, ZOOM_MAX, ZOOM_MIN,
    ZOOM_STEP_FACTOR,
};

/// Geographic anchor of the local planar approximation.
pub const REFERENCE_POINT: GeoPoint = GeoPoint {
    lat: 45.4371,
    lng: 12.3326,
};
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Component-wise equality within `tolerance` degrees.
    pub fn approx_eq(&self, other: GeoPoint, tolerance: f64) -> bool {
        (self.lat - other.lat).abs() <= tolerance && (self.lng - other.lng).abs() <= tolerance
    }

    /// Straight-line distance measured in raw degrees.
    pub fn degree_distance(&self, other: GeoPoint) -> f64 {
        let d_lat = self.lat - other.lat;
        let d_lng = self.lng - other.lng;
        (d_lat * d_lat + d_lng * d_lng).sqrt()
    }

    pub fn lerp(self, other: GeoPoint, t: f64) -> GeoPoint {
        GeoPoint {
            lat: self.lat + (other.lat - self.lat) * t,
            lng: self.lng + (other.lng - self.lng) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: ScreenPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

pub fn meters_per_degree_lng() -> f64 {
    METERS_PER_DEGREE_LAT * REFERENCE_POINT.lat.to_radians().cos()
}

/// Planar distance in metres, equirectangular about [`REFERENCE_POINT`].
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let dx = (b.lng - a.lng) * meters_per_degree_lng();
    let dy = (b.lat - a.lat) * METERS_PER_DEGREE_LAT;
    (dx * dx + dy * dy).sqrt()
}

pub fn polyline_length_m(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| distance_m(pair[0], pair[1]))
        .sum()
}

/// Maps any finite angle into `[0, 2π)`.
pub fn normalize_angle(radians: f64) -> f64 {
    if !radians.is_finite() {
        return 0.0;
    }
    let wrapped = radians.rem_euclid(std::f64::consts::TAU);
    if wrapped >= std::f64::consts::TAU {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{PI, TAU};

    use super::*;

    #[test]
    fn distance_matches_degree_scale_on_meridian() {
        let a = GeoPoint::new(45.0, 12.0);
        let b = GeoPoint::new(45.001, 12.0);
        assert!((distance_m(a, b) - 111.32).abs() < 1e-6);
    }

    #[test]
    fn longitude_metres_shrink_with_anchor_latitude() {
        let a = GeoPoint::new(45.0, 12.0);
        let b = GeoPoint::new(45.0, 12.001);
        let d = distance_m(a, b);
        assert!(d < 111.32);
        assert!(d > 75.0);
    }

    #[test]
    fn polyline_length_sums_segments() {
        let points = [
            GeoPoint::new(45.0, 12.0),
            GeoPoint::new(45.001, 12.0),
            GeoPoint::new(45.002, 12.0),
        ];
        assert!((polyline_length_m(&points) - 222.64).abs() < 1e-6);
        assert_eq!(polyline_length_m(&points[..1]), 0.0);
    }

    #[test]
    fn normalize_angle_wraps_into_unit_turn() {
        assert!((normalize_angle(-PI / 2.0) - 1.5 * PI).abs() < 1e-12);
        assert!((normalize_angle(TAU + 0.25) - 0.25).abs() < 1e-12);
        assert_eq!(normalize_angle(TAU), 0.0);
        assert_eq!(normalize_angle(f64::NAN), 0.0);
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        assert!(GeoPoint::new(45.4, 12.3).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 12.3).is_valid());
        assert!(!GeoPoint::new(95.0, 12.3).is_valid());
        assert!(!GeoPoint::new(45.0, f64::INFINITY).is_valid());
    }
}
