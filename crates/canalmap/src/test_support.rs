use crate::geo::GeoPoint;
use crate::map::{
    BridgeConnection, BridgePoint, BuildingPoint, CanalPoint, EntityCategory, EntityId, Parcel,
    ParcelId, PlacedEntity,
};

pub(crate) fn square_parcel(id: &str, south: f64, west: f64, size: f64) -> Parcel {
    Parcel {
        id: ParcelId::new(id),
        name: None,
        boundary: vec![
            GeoPoint::new(south, west),
            GeoPoint::new(south, west + size),
            GeoPoint::new(south + size, west + size),
            GeoPoint::new(south + size, west),
        ],
        center: GeoPoint::new(south + size * 0.5, west + size * 0.5),
        building_points: Vec::new(),
        canal_points: Vec::new(),
        bridge_points: Vec::new(),
    }
}

pub(crate) fn with_building(mut parcel: Parcel, id: &str, position: GeoPoint) -> Parcel {
    parcel.building_points.push(BuildingPoint {
        id: id.to_string(),
        position,
    });
    parcel
}

pub(crate) fn with_canal(mut parcel: Parcel, id: &str, edge: GeoPoint) -> Parcel {
    parcel.canal_points.push(CanalPoint {
        id: id.to_string(),
        edge,
    });
    parcel
}

pub(crate) fn with_bridge(
    mut parcel: Parcel,
    id: &str,
    edge: GeoPoint,
    target: Option<(&str, GeoPoint)>,
) -> Parcel {
    parcel.bridge_points.push(BridgePoint {
        id: id.to_string(),
        edge,
        connection: target.map(|(target_parcel, target_point)| BridgeConnection {
            target_parcel_id: ParcelId::new(target_parcel),
            target_point,
            distance_m: None,
        }),
    });
    parcel
}

pub(crate) fn placed(
    id: &str,
    category: EntityCategory,
    position: GeoPoint,
    constructed: bool,
) -> PlacedEntity {
    PlacedEntity {
        id: EntityId::new(id),
        parcel_id: None,
        point_id: None,
        category,
        entity_type: match category {
            EntityCategory::Building => "house",
            EntityCategory::Dock => "public-dock",
            EntityCategory::Bridge => "footbridge",
        }
        .to_string(),
        position,
        constructed,
        orientation: None,
    }
}

pub(crate) fn assert_close(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() <= epsilon,
        "expected {expected} +/- {epsilon}, got {actual}"
    );
}

pub(crate) fn assert_geo_close(actual: GeoPoint, expected: GeoPoint, epsilon: f64) {
    assert!(
        actual.approx_eq(expected, epsilon),
        "expected ({}, {}), got ({}, {})",
        expected.lat,
        expected.lng,
        actual.lat,
        actual.lng
    );
}
