use crate::geo::{distance_m, GeoPoint};
use crate::pathfinding::Path;

/// Position at `progress` (0..=1) along the path, measured by distance.
///
/// Zero-length paths stay on their first waypoint.
pub fn interpolate_path(path: &Path, progress: f64) -> Option<GeoPoint> {
    let waypoints = path.waypoints();
    let first = waypoints.first()?.position;
    let progress = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let segment_lengths: Vec<f64> = waypoints
        .windows(2)
        .map(|pair| distance_m(pair[0].position, pair[1].position))
        .collect();
    let total: f64 = segment_lengths.iter().sum();
    if total <= 0.0 {
        return Some(first);
    }

    let target = total * progress;
    let mut travelled = 0.0;
    for (pair, length) in waypoints.windows(2).zip(&segment_lengths) {
        if *length > 0.0 && travelled + length >= target {
            let t = ((target - travelled) / length).clamp(0.0, 1.0);
            return Some(pair[0].position.lerp(pair[1].position, t));
        }
        travelled += length;
    }
    waypoints.last().map(|waypoint| waypoint.position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, TransportMode};
    use crate::pathfinding::Waypoint;
    use crate::test_support::assert_geo_close;

    fn path_through(points: &[GeoPoint]) -> Path {
        Path::from_waypoints(
            points
                .iter()
                .map(|position| Waypoint {
                    position: *position,
                    kind: NodeKind::Centroid,
                    mode: TransportMode::Walking,
                    is_intermediate: false,
                })
                .collect(),
            false,
        )
    }

    #[test]
    fn progress_follows_distance_not_waypoint_count() {
        // First leg is three times longer than the second.
        let path = path_through(&[
            GeoPoint::new(45.0, 12.0),
            GeoPoint::new(45.003, 12.0),
            GeoPoint::new(45.004, 12.0),
        ]);
        let at_three_quarters = interpolate_path(&path, 0.75).expect("position");
        assert_geo_close(at_three_quarters, GeoPoint::new(45.003, 12.0), 1e-9);
        let early = interpolate_path(&path, 0.25).expect("position");
        assert_geo_close(early, GeoPoint::new(45.001, 12.0), 1e-9);
    }

    #[test]
    fn progress_is_clamped_to_path_ends() {
        let path = path_through(&[GeoPoint::new(45.0, 12.0), GeoPoint::new(45.001, 12.001)]);
        assert_eq!(interpolate_path(&path, -1.0), Some(GeoPoint::new(45.0, 12.0)));
        assert_eq!(interpolate_path(&path, 7.0), Some(GeoPoint::new(45.001, 12.001)));
        assert_eq!(interpolate_path(&path, f64::NAN), Some(GeoPoint::new(45.0, 12.0)));
    }

    #[test]
    fn degenerate_paths_do_not_divide_by_zero() {
        let still = path_through(&[GeoPoint::new(45.0, 12.0), GeoPoint::new(45.0, 12.0)]);
        assert_eq!(interpolate_path(&still, 0.5), Some(GeoPoint::new(45.0, 12.0)));
        let empty = path_through(&[]);
        assert_eq!(interpolate_path(&empty, 0.5), None);
    }
}
