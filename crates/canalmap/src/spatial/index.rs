use std::collections::HashMap;

use tracing::{info, warn};

use crate::geo::{point_in_ring, GeoBounds, GeoPoint};
use crate::map::{
    EntityCategory, MalformedRecord, OccupancyFilter, OccupancyQuery, Parcel, ParcelId, PointKind,
    RecordKind, OCCUPANCY_TOLERANCE_DEG,
};

use super::hit_test::MAX_POINT_HIT_DEG;

/// Grid cell edge in degrees (roughly 110 m north-south).
const GRID_CELL_DEG: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GridCell {
    lat: i64,
    lng: i64,
}

impl GridCell {
    fn of(point: GeoPoint) -> Self {
        Self {
            lat: (point.lat / GRID_CELL_DEG).floor() as i64,
            lng: (point.lng / GRID_CELL_DEG).floor() as i64,
        }
    }
}

/// One building, canal or bridge slot, referenced back to its parcel.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotPoint {
    pub parcel_index: usize,
    pub parcel_id: ParcelId,
    pub point_id: String,
    pub kind: PointKind,
    pub position: GeoPoint,
}

#[derive(Debug, Clone)]
struct IndexedParcel {
    parcel: Parcel,
    bounds: GeoBounds,
}

/// Read-only lookup structure over validated parcels.
///
/// Slot points live in a uniform lat/lng grid so nearest-point queries only
/// visit the cells the threshold can reach. Parcel containment first filters
/// by bounding box, then runs the even-odd ring test.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    parcels: Vec<IndexedParcel>,
    slots: Vec<SlotPoint>,
    grid: HashMap<GridCell, Vec<usize>>,
    bounds: Option<GeoBounds>,
    skipped: Vec<MalformedRecord>,
}

impl SpatialIndex {
    pub fn build(parcels: &[Parcel]) -> Self {
        let mut index = Self::default();
        for parcel in parcels {
            match validate_parcel(parcel) {
                Ok(bounds) => index.insert_parcel(parcel, bounds),
                Err(record) => {
                    warn!(
                        kind = record.kind.label(),
                        id = %record.id,
                        reason = %record.reason,
                        "malformed_record_skipped"
                    );
                    index.skipped.push(record);
                }
            }
        }
        info!(
            parcels = index.parcels.len(),
            slots = index.slots.len(),
            grid_cells = index.grid.len(),
            skipped = index.skipped.len(),
            "spatial_index_built"
        );
        index
    }

    fn insert_parcel(&mut self, parcel: &Parcel, bounds: GeoBounds) {
        let parcel_index = self.parcels.len();
        let slots = parcel
            .building_points
            .iter()
            .map(|point| (point.id.as_str(), PointKind::Building, point.position))
            .chain(
                parcel
                    .canal_points
                    .iter()
                    .map(|point| (point.id.as_str(), PointKind::Canal, point.edge)),
            )
            .chain(
                parcel
                    .bridge_points
                    .iter()
                    .map(|point| (point.id.as_str(), PointKind::Bridge, point.edge)),
            );

        for (point_id, kind, position) in slots {
            if !position.is_valid() {
                let record = MalformedRecord::new(
                    slot_record_kind(kind),
                    format!("{}/{point_id}", parcel.id),
                    "invalid coordinate",
                );
                warn!(
                    kind = record.kind.label(),
                    id = %record.id,
                    reason = %record.reason,
                    "malformed_record_skipped"
                );
                self.skipped.push(record);
                continue;
            }
            let slot_index = self.slots.len();
            self.slots.push(SlotPoint {
                parcel_index,
                parcel_id: parcel.id.clone(),
                point_id: point_id.to_string(),
                kind,
                position,
            });
            self.grid
                .entry(GridCell::of(position))
                .or_default()
                .push(slot_index);
        }

        match self.bounds.as_mut() {
            Some(all) => {
                all.include(GeoPoint::new(bounds.min_lat, bounds.min_lng));
                all.include(GeoPoint::new(bounds.max_lat, bounds.max_lng));
            }
            None => self.bounds = Some(bounds),
        }
        self.parcels.push(IndexedParcel {
            parcel: parcel.clone(),
            bounds,
        });
    }

    pub fn parcel_count(&self) -> usize {
        self.parcels.len()
    }

    pub fn parcels(&self) -> impl Iterator<Item = &Parcel> {
        self.parcels.iter().map(|indexed| &indexed.parcel)
    }

    pub fn slots(&self) -> &[SlotPoint] {
        &self.slots
    }

    /// Records excluded while building the index.
    pub fn skipped(&self) -> &[MalformedRecord] {
        &self.skipped
    }

    /// Bounding box of every indexed parcel.
    pub fn bounds(&self) -> Option<GeoBounds> {
        self.bounds
    }

    /// First parcel (in input order) whose ring contains `point`.
    pub fn parcel_at(&self, point: GeoPoint) -> Option<&Parcel> {
        self.parcels
            .iter()
            .filter(|indexed| indexed.bounds.contains(point))
            .find(|indexed| point_in_ring(point, &indexed.parcel.boundary))
            .map(|indexed| &indexed.parcel)
    }

    /// Nearest slot of `kind` within `threshold_deg`, skipping occupied slots.
    /// The threshold is capped at [`MAX_POINT_HIT_DEG`].
    ///
    /// Building slots are skipped when any constructed entity sits on them,
    /// canal slots only when a constructed dock does. Bridge slots are never
    /// skipped. Equal distances keep the slot that appears first in parcel
    /// order.
    pub fn nearest_point(
        &self,
        point: GeoPoint,
        threshold_deg: f64,
        kind: PointKind,
        occupancy: &dyn OccupancyQuery,
    ) -> Option<&SlotPoint> {
        if !point.is_valid() || !threshold_deg.is_finite() || threshold_deg < 0.0 {
            return None;
        }
        let threshold_deg = threshold_deg.min(MAX_POINT_HIT_DEG);

        let mut candidates = self.candidates_near(point, threshold_deg);
        candidates.sort_unstable();

        let mut best: Option<(f64, &SlotPoint)> = None;
        for slot_index in candidates {
            let slot = &self.slots[slot_index];
            if slot.kind != kind {
                continue;
            }
            let distance = slot.position.degree_distance(point);
            if distance > threshold_deg {
                continue;
            }
            if best.is_some_and(|(best_distance, _)| distance >= best_distance) {
                continue;
            }
            if is_slot_occupied(slot, occupancy) {
                continue;
            }
            best = Some((distance, slot));
        }
        best.map(|(_, slot)| slot)
    }

    fn candidates_near(&self, point: GeoPoint, radius_deg: f64) -> Vec<usize> {
        let low = GridCell::of(GeoPoint::new(point.lat - radius_deg, point.lng - radius_deg));
        let high = GridCell::of(GeoPoint::new(point.lat + radius_deg, point.lng + radius_deg));
        let mut candidates = Vec::new();
        for lat in low.lat..=high.lat {
            for lng in low.lng..=high.lng {
                if let Some(bucket) = self.grid.get(&GridCell { lat, lng }) {
                    candidates.extend_from_slice(bucket);
                }
            }
        }
        candidates
    }
}

fn is_slot_occupied(slot: &SlotPoint, occupancy: &dyn OccupancyQuery) -> bool {
    let filter = match slot.kind {
        PointKind::Building => OccupancyFilter::AnyConstructed,
        PointKind::Canal => OccupancyFilter::Constructed(EntityCategory::Dock),
        PointKind::Bridge => return false,
    };
    occupancy.is_occupied(slot.position, OCCUPANCY_TOLERANCE_DEG, filter)
}

fn slot_record_kind(kind: PointKind) -> RecordKind {
    match kind {
        PointKind::Building => RecordKind::BuildingPoint,
        PointKind::Canal => RecordKind::CanalPoint,
        PointKind::Bridge => RecordKind::BridgePoint,
    }
}

fn validate_parcel(parcel: &Parcel) -> Result<GeoBounds, MalformedRecord> {
    let malformed =
        |reason: &str| MalformedRecord::new(RecordKind::Parcel, parcel.id.as_str(), reason);
    if parcel.boundary.len() < 3 {
        return Err(malformed("boundary ring needs at least 3 points"));
    }
    if parcel.boundary.iter().any(|point| !point.is_valid()) {
        return Err(malformed("boundary ring has an invalid coordinate"));
    }
    if !parcel.center.is_valid() {
        return Err(malformed("center has an invalid coordinate"));
    }
    GeoBounds::from_points(&parcel.boundary).ok_or_else(|| malformed("empty boundary ring"))
}
