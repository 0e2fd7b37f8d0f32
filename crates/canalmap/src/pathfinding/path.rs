use std::fmt;

use crate::geo::{distance_m, GeoPoint};
use crate::graph::{NodeKind, TransportMode};

const FNV1A_OFFSET_BASIS_64: u64 = 0xcbf2_9ce4_8422_2325;
const FNV1A_PRIME_64: u64 = 0x0000_0100_0000_01b3;

/// Content-derived identity; equal waypoint sequences share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathId(u64);

impl PathId {
    pub fn of(waypoints: &[Waypoint], water_only: bool) -> Self {
        let mut hash = FNV1A_OFFSET_BASIS_64;
        hash = fnv1a_update(hash, &[u8::from(water_only)]);
        for waypoint in waypoints {
            hash = fnv1a_update(hash, &waypoint.position.lat.to_bits().to_le_bytes());
            hash = fnv1a_update(hash, &waypoint.position.lng.to_bits().to_le_bytes());
            hash = fnv1a_update(
                hash,
                &[
                    waypoint.kind as u8,
                    waypoint.mode as u8,
                    u8::from(waypoint.is_intermediate),
                ],
            );
        }
        Self(hash)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

fn fnv1a_update(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV1A_PRIME_64);
    }
    hash
}

/// One path element. `mode` is the mode used to leave this waypoint; the last
/// waypoint repeats the mode it was reached with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub position: GeoPoint,
    pub kind: NodeKind,
    pub mode: TransportMode,
    /// Cosmetic bend point that does not correspond to a graph node.
    pub is_intermediate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    id: PathId,
    waypoints: Vec<Waypoint>,
    total_distance_m: f64,
    estimated_duration_s: f64,
    transitions: u32,
    water_only: bool,
}

impl Path {
    pub fn new(
        waypoints: Vec<Waypoint>,
        total_distance_m: f64,
        estimated_duration_s: f64,
        transitions: u32,
        water_only: bool,
    ) -> Self {
        Self {
            id: PathId::of(&waypoints, water_only),
            waypoints,
            total_distance_m,
            estimated_duration_s,
            transitions,
            water_only,
        }
    }

    /// Derives distance, duration and transitions from the waypoints alone.
    pub fn from_waypoints(waypoints: Vec<Waypoint>, water_only: bool) -> Self {
        let mut total_distance_m = 0.0;
        let mut estimated_duration_s = 0.0;
        let mut transitions = 0;
        for pair in waypoints.windows(2) {
            let segment = distance_m(pair[0].position, pair[1].position);
            total_distance_m += segment;
            estimated_duration_s += segment / pair[0].mode.speed_mps();
        }
        let segment_count = waypoints.len().saturating_sub(1);
        for pair in waypoints[..segment_count].windows(2) {
            if pair[0].mode != pair[1].mode {
                transitions += 1;
            }
        }
        Self::new(
            waypoints,
            total_distance_m,
            estimated_duration_s,
            transitions,
            water_only,
        )
    }

    pub fn id(&self) -> PathId {
        self.id
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    pub fn estimated_duration_s(&self) -> f64 {
        self.estimated_duration_s
    }

    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    pub fn water_only(&self) -> bool {
        self.water_only
    }

    pub fn start(&self) -> Option<GeoPoint> {
        self.waypoints.first().map(|waypoint| waypoint.position)
    }

    pub fn end(&self) -> Option<GeoPoint> {
        self.waypoints.last().map(|waypoint| waypoint.position)
    }

    /// Waypoints that correspond to graph nodes.
    pub fn node_waypoints(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.iter().filter(|waypoint| !waypoint.is_intermediate)
    }

    /// Straight-line length through every waypoint, intermediates included.
    pub fn polyline_length_m(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|pair| distance_m(pair[0].position, pair[1].position))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waypoint(lat: f64, mode: TransportMode) -> Waypoint {
        Waypoint {
            position: GeoPoint::new(lat, 12.33),
            kind: NodeKind::Centroid,
            mode,
            is_intermediate: false,
        }
    }

    #[test]
    fn identical_waypoints_share_an_id() {
        let a = Path::from_waypoints(
            vec![
                waypoint(45.43, TransportMode::Walking),
                waypoint(45.44, TransportMode::Walking),
            ],
            false,
        );
        let b = Path::from_waypoints(a.waypoints().to_vec(), false);
        let c = Path::from_waypoints(a.waypoints().to_vec(), true);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id().to_string().len(), 16);
    }

    #[test]
    fn from_waypoints_counts_transitions_between_segments() {
        let path = Path::from_waypoints(
            vec![
                waypoint(45.430, TransportMode::Walking),
                waypoint(45.431, TransportMode::Water),
                waypoint(45.432, TransportMode::Water),
                waypoint(45.433, TransportMode::Walking),
                waypoint(45.434, TransportMode::Walking),
            ],
            false,
        );
        assert_eq!(path.transitions(), 2);
        assert!((path.total_distance_m() - 4.0 * 111.32).abs() < 1e-6);
        assert!((path.total_distance_m() - path.polyline_length_m()).abs() < 1e-9);
    }
}
