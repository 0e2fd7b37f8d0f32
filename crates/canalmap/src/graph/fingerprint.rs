use sha2::{Digest, Sha256};

use crate::geo::GeoPoint;
use crate::map::{Parcel, PlacedEntity, WaterNode};

use super::model::PathfindingMode;

/// Content hash of everything graph construction reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapFingerprint(String);

impl MapFingerprint {
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

pub fn map_fingerprint<'a>(
    parcels: impl IntoIterator<Item = &'a Parcel>,
    entities: impl IntoIterator<Item = &'a PlacedEntity>,
    water_nodes: &[WaterNode],
    mode: PathfindingMode,
) -> MapFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(mode.as_str().as_bytes());
    hasher.update([0u8]);

    for parcel in parcels {
        hasher.update(parcel.id.as_str().as_bytes());
        hasher.update([0u8]);
        update_points(&mut hasher, &parcel.boundary);
        update_point(&mut hasher, parcel.center);
        for point in &parcel.building_points {
            hasher.update(point.id.as_bytes());
            update_point(&mut hasher, point.position);
        }
        for point in &parcel.canal_points {
            hasher.update(point.id.as_bytes());
            update_point(&mut hasher, point.edge);
        }
        for point in &parcel.bridge_points {
            hasher.update(point.id.as_bytes());
            update_point(&mut hasher, point.edge);
            if let Some(connection) = &point.connection {
                hasher.update(connection.target_parcel_id.as_str().as_bytes());
                update_point(&mut hasher, connection.target_point);
                hasher.update(connection.distance_m.unwrap_or(f64::NAN).to_le_bytes());
            }
        }
        hasher.update([1u8]);
    }

    // Only construction state and position influence routing.
    for entity in entities {
        hasher.update(entity.id.as_str().as_bytes());
        hasher.update([entity.category as u8, u8::from(entity.constructed)]);
        update_point(&mut hasher, entity.position);
    }
    hasher.update([2u8]);

    for node in water_nodes {
        hasher.update(node.id.as_str().as_bytes());
        hasher.update([0u8]);
        update_point(&mut hasher, node.position);
        for connection in &node.connections {
            hasher.update(connection.target_id.as_str().as_bytes());
            hasher.update([0u8]);
            update_points(&mut hasher, &connection.intermediate_points);
        }
        hasher.update([1u8]);
    }

    MapFingerprint(to_hex_lower(&hasher.finalize()))
}

fn update_point(hasher: &mut Sha256, point: GeoPoint) {
    hasher.update(point.lat.to_bits().to_le_bytes());
    hasher.update(point.lng.to_bits().to_le_bytes());
}

fn update_points(hasher: &mut Sha256, points: &[GeoPoint]) {
    hasher.update((points.len() as u64).to_le_bytes());
    for point in points {
        update_point(hasher, *point);
    }
}

fn to_hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::EntityCategory;
    use crate::test_support::{placed, square_parcel};

    #[test]
    fn fingerprint_tracks_construction_state_and_mode() {
        let parcels = vec![square_parcel("p", 45.437, 12.332, 0.001)];
        let planned = vec![placed(
            "bridge",
            EntityCategory::Bridge,
            GeoPoint::new(45.437, 12.332),
            false,
        )];
        let mut built = planned.clone();
        built[0].constructed = true;

        let base = map_fingerprint(&parcels, &planned, &[], PathfindingMode::Real);
        assert_eq!(base, map_fingerprint(&parcels, &planned, &[], PathfindingMode::Real));
        assert_ne!(base, map_fingerprint(&parcels, &built, &[], PathfindingMode::Real));
        assert_ne!(base, map_fingerprint(&parcels, &planned, &[], PathfindingMode::All));
        assert_eq!(base.as_hex().len(), 64);
    }

    #[test]
    fn entity_orientation_does_not_change_fingerprint() {
        let parcels = vec![square_parcel("p", 45.437, 12.332, 0.001)];
        let mut entities = vec![placed(
            "bridge",
            EntityCategory::Bridge,
            GeoPoint::new(45.437, 12.332),
            true,
        )];
        let before = map_fingerprint(&parcels, &entities, &[], PathfindingMode::Real);
        entities[0].orientation = Some(1.0);
        assert_eq!(
            before,
            map_fingerprint(&parcels, &entities, &[], PathfindingMode::Real)
        );
    }
}
