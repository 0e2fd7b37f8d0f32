use super::GeoPoint;

const ON_SEGMENT_EPSILON: f64 = 1e-12;
const DEGENERATE_AREA_EPSILON: f64 = 1e-18;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl GeoBounds {
    pub fn point(point: GeoPoint) -> Self {
        Self {
            min_lat: point.lat,
            max_lat: point.lat,
            min_lng: point.lng,
            max_lng: point.lng,
        }
    }

    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::point(*first);
        for point in rest {
            bounds.include(*point);
        }
        Some(bounds)
    }

    pub fn include(&mut self, point: GeoPoint) {
        self.min_lat = self.min_lat.min(point.lat);
        self.max_lat = self.max_lat.max(point.lat);
        self.min_lng = self.min_lng.min(point.lng);
        self.max_lng = self.max_lng.max(point.lng);
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }

    pub fn expanded(&self, margin_degrees: f64) -> Self {
        Self {
            min_lat: self.min_lat - margin_degrees,
            max_lat: self.max_lat + margin_degrees,
            min_lng: self.min_lng - margin_degrees,
            max_lng: self.max_lng + margin_degrees,
        }
    }

    pub fn intersects(&self, other: &GeoBounds) -> bool {
        self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
            && self.min_lng <= other.max_lng
            && self.max_lng >= other.min_lng
    }
}

/// Even-odd containment test against a ring given as lat/lng vertices.
///
/// The ring may be open or closed (first vertex repeated). Points lying on an
/// edge count as inside.
pub fn point_in_ring(point: GeoPoint, ring: &[GeoPoint]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];
        if point_on_segment(point, a, b) {
            return true;
        }
        let crosses = (a.lat > point.lat) != (b.lat > point.lat);
        if crosses {
            let intersect_lng = (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng;
            if point.lng < intersect_lng {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

pub fn point_on_segment(point: GeoPoint, a: GeoPoint, b: GeoPoint) -> bool {
    let cross = (b.lng - a.lng) * (point.lat - a.lat) - (b.lat - a.lat) * (point.lng - a.lng);
    let scale = (b.lng - a.lng).abs().max((b.lat - a.lat).abs()).max(1.0);
    if cross.abs() > ON_SEGMENT_EPSILON * scale {
        return false;
    }
    point.lng >= a.lng.min(b.lng) - ON_SEGMENT_EPSILON
        && point.lng <= a.lng.max(b.lng) + ON_SEGMENT_EPSILON
        && point.lat >= a.lat.min(b.lat) - ON_SEGMENT_EPSILON
        && point.lat <= a.lat.max(b.lat) + ON_SEGMENT_EPSILON
}

/// Area centroid of a ring; falls back to the vertex mean for degenerate rings.
pub fn ring_centroid(ring: &[GeoPoint]) -> Option<GeoPoint> {
    let origin = *ring.first()?;

    // Accumulate relative to the first vertex; absolute degrees lose too much
    // precision for parcels a few metres across.
    let mut twice_area = 0.0;
    let mut c_lat = 0.0;
    let mut c_lng = 0.0;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = GeoPoint::new(ring[j].lat - origin.lat, ring[j].lng - origin.lng);
        let b = GeoPoint::new(ring[i].lat - origin.lat, ring[i].lng - origin.lng);
        let cross = a.lng * b.lat - b.lng * a.lat;
        twice_area += cross;
        c_lng += (a.lng + b.lng) * cross;
        c_lat += (a.lat + b.lat) * cross;
        j = i;
    }

    if twice_area.abs() <= DEGENERATE_AREA_EPSILON {
        let count = ring.len() as f64;
        let (sum_lat, sum_lng) = ring
            .iter()
            .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
        return Some(GeoPoint::new(sum_lat / count, sum_lng / count));
    }

    let factor = 1.0 / (3.0 * twice_area);
    Some(GeoPoint::new(
        origin.lat + c_lat * factor,
        origin.lng + c_lng * factor,
    ))
}
