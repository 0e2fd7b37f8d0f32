use tracing::debug;

use crate::geo::{geo_to_screen, screen_to_geo, GeoPoint, ScreenPoint, ViewTransform, PLANAR_SCALE};
use crate::map::{EntityCategory, EntityId, OccupancyQuery, ParcelId, PointKind};

use super::index::SpatialIndex;

/// Upper bound for the point-hit radius, whatever the zoom level.
pub const MAX_POINT_HIT_DEG: f64 = 1e-4;
pub const DEFAULT_HIT_TOLERANCE_PX: f64 = 8.0;

/// Clickable marker drawn by the caller for a placed entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMarker {
    pub entity_id: EntityId,
    pub category: EntityCategory,
    pub position: GeoPoint,
    pub radius_px: f64,
    /// Current orientation for bridge markers.
    pub orientation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectedEntity {
    Marker {
        entity_id: EntityId,
        category: EntityCategory,
    },
    Point {
        parcel_id: ParcelId,
        point_id: String,
        kind: PointKind,
        position: GeoPoint,
    },
    Parcel(ParcelId),
}

impl SelectedEntity {
    pub fn parcel_id(&self) -> Option<&ParcelId> {
        match self {
            SelectedEntity::Marker { .. } => None,
            SelectedEntity::Point { parcel_id, .. } | SelectedEntity::Parcel(parcel_id) => {
                Some(parcel_id)
            }
        }
    }
}

/// Converts a pixel tolerance into degrees at the current zoom.
pub fn hit_threshold_deg(tolerance_px: f64, scale: f64) -> f64 {
    if !tolerance_px.is_finite() || tolerance_px <= 0.0 || !scale.is_finite() || scale <= 0.0 {
        return MAX_POINT_HIT_DEG;
    }
    (tolerance_px / (scale * PLANAR_SCALE)).min(MAX_POINT_HIT_DEG)
}

/// Resolves a screen pixel into the most specific entity under it.
///
/// Priority: marker, unoccupied building slot, unoccupied canal slot, bridge
/// slot, containing parcel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTester {
    tolerance_px: f64,
}

impl Default for HitTester {
    fn default() -> Self {
        Self::new(DEFAULT_HIT_TOLERANCE_PX)
    }
}

impl HitTester {
    pub fn new(tolerance_px: f64) -> Self {
        Self { tolerance_px }
    }

    pub fn tolerance_px(&self) -> f64 {
        self.tolerance_px
    }

    pub fn resolve(
        &self,
        screen: ScreenPoint,
        view: &ViewTransform,
        index: &SpatialIndex,
        occupancy: &dyn OccupancyQuery,
        markers: &[EntityMarker],
    ) -> Option<SelectedEntity> {
        if let Some(marker) = nearest_marker(screen, view, occupancy, markers) {
            return Some(SelectedEntity::Marker {
                entity_id: marker.entity_id.clone(),
                category: marker.category,
            });
        }

        let geo = screen_to_geo(screen, view);
        if !geo.is_valid() {
            return None;
        }
        let threshold = hit_threshold_deg(self.tolerance_px, view.scale());
        for kind in [PointKind::Building, PointKind::Canal, PointKind::Bridge] {
            if let Some(slot) = index.nearest_point(geo, threshold, kind, occupancy) {
                return Some(SelectedEntity::Point {
                    parcel_id: slot.parcel_id.clone(),
                    point_id: slot.point_id.clone(),
                    kind: slot.kind,
                    position: slot.position,
                });
            }
        }

        index
            .parcel_at(geo)
            .map(|parcel| SelectedEntity::Parcel(parcel.id.clone()))
    }
}

fn nearest_marker<'a>(
    screen: ScreenPoint,
    view: &ViewTransform,
    occupancy: &dyn OccupancyQuery,
    markers: &'a [EntityMarker],
) -> Option<&'a EntityMarker> {
    let mut best: Option<(f64, &EntityMarker)> = None;
    for marker in markers {
        let distance = geo_to_screen(marker.position, view).distance(screen);
        if distance > marker.radius_px {
            continue;
        }
        if best.is_some_and(|(best_distance, _)| distance >= best_distance) {
            continue;
        }
        if !occupancy.is_present(&marker.entity_id) {
            debug!(entity = %marker.entity_id, "stale_marker_ignored");
            continue;
        }
        best = Some((distance, marker));
    }
    best.map(|(_, marker)| marker)
}
