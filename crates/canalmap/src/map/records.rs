use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::geo::{normalize_angle, ring_centroid, GeoPoint};

use super::atomic_io::write_text_atomic;
use super::types::{
    BridgeConnection, BridgePoint, BuildingPoint, CanalPoint, EntityCategory, EntityId, MapData,
    Parcel, ParcelId, PlacedEntity, WaterConnection, WaterNode, WaterNodeId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Parcel,
    BuildingPoint,
    CanalPoint,
    BridgePoint,
    Entity,
    WaterNode,
    WaterConnection,
}

impl RecordKind {
    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Parcel => "parcel",
            RecordKind::BuildingPoint => "building point",
            RecordKind::CanalPoint => "canal point",
            RecordKind::BridgePoint => "bridge point",
            RecordKind::Entity => "entity",
            RecordKind::WaterNode => "water node",
            RecordKind::WaterConnection => "water connection",
        }
    }
}

/// A record that failed validation and was left out of the map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {} '{id}': {reason}", kind.label())]
pub struct MalformedRecord {
    pub kind: RecordKind,
    pub id: String,
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(kind: RecordKind, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("failed to read map file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse map JSON at '{json_path}': {source}")]
    Parse {
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode map JSON: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write map file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MapLoadError {
    pub fn user_message(&self) -> String {
        match self {
            MapLoadError::Read { path, .. } => {
                format!("Could not open the map file at {}.", path.display())
            }
            MapLoadError::Parse { json_path, .. } => {
                format!("The map file is not valid (problem near '{json_path}').")
            }
            MapLoadError::Encode(_) | MapLoadError::Write { .. } => {
                "The map could not be saved.".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadedMap {
    pub data: MapData,
    pub skipped: Vec<MalformedRecord>,
}

pub fn load_map_file(path: &Path) -> Result<LoadedMap, MapLoadError> {
    let text = fs::read_to_string(path).map_err(|source| MapLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = parse_map_json(&text)?;
    info!(
        path = %path.display(),
        parcels = loaded.data.parcels.len(),
        entities = loaded.data.entities.len(),
        water_nodes = loaded.data.water_nodes.len(),
        skipped = loaded.skipped.len(),
        "map_loaded"
    );
    Ok(loaded)
}

pub fn parse_map_json(text: &str) -> Result<LoadedMap, MapLoadError> {
    let deserializer = &mut serde_json::Deserializer::from_str(text);
    let document: MapDocument =
        serde_path_to_error::deserialize(deserializer).map_err(|error| {
            let json_path = error.path().to_string();
            MapLoadError::Parse {
                json_path,
                source: error.into_inner(),
            }
        })?;
    Ok(document.validate())
}

pub fn save_map_file(path: &Path, data: &MapData) -> Result<(), MapLoadError> {
    let document = MapDocument::from(data);
    let text = serde_json::to_string_pretty(&document).map_err(MapLoadError::Encode)?;
    write_text_atomic(path, &text).map_err(|source| MapLoadError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct RawLatLng {
    lat: Option<f64>,
    lng: Option<f64>,
}

impl RawLatLng {
    fn to_geo(self) -> Option<GeoPoint> {
        let point = GeoPoint::new(self.lat?, self.lng?);
        point.is_valid().then_some(point)
    }
}

impl From<GeoPoint> for RawLatLng {
    fn from(point: GeoPoint) -> Self {
        Self {
            lat: Some(point.lat),
            lng: Some(point.lng),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuildingPoint {
    #[serde(default)]
    id: Option<String>,
    #[serde(flatten)]
    position: RawLatLng,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCanalPoint {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    edge: Option<RawLatLng>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBridgeConnection {
    #[serde(alias = "targetPolygonId")]
    target_parcel_id: Option<String>,
    #[serde(default)]
    target_point: Option<RawLatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    distance: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBridgePoint {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    edge: Option<RawLatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connection: Option<RawBridgeConnection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParcel {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, alias = "boundary")]
    coordinates: Vec<RawLatLng>,
    #[serde(default, alias = "centroid", skip_serializing_if = "Option::is_none")]
    center: Option<RawLatLng>,
    #[serde(default)]
    building_points: Vec<RawBuildingPoint>,
    #[serde(default)]
    canal_points: Vec<RawCanalPoint>,
    #[serde(default)]
    bridge_points: Vec<RawBridgePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntity {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parcel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    point_id: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    entity_type: String,
    #[serde(default)]
    position: Option<RawLatLng>,
    #[serde(default)]
    constructed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    orientation: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWaterConnection {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    target_id: Option<String>,
    #[serde(default)]
    intermediate_points: Vec<RawLatLng>,
    #[serde(default)]
    distance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWaterNode {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    position: Option<RawLatLng>,
    #[serde(default)]
    connections: Vec<RawWaterConnection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapDocument {
    #[serde(default, alias = "polygons")]
    parcels: Vec<RawParcel>,
    #[serde(default, alias = "buildings")]
    entities: Vec<RawEntity>,
    #[serde(default)]
    water_nodes: Vec<RawWaterNode>,
}

#[derive(Default)]
struct Validation {
    skipped: Vec<MalformedRecord>,
}

impl Validation {
    fn skip(&mut self, record: MalformedRecord) {
        warn!(
            kind = record.kind.label(),
            id = record.id.as_str(),
            reason = record.reason.as_str(),
            "malformed_record_skipped"
        );
        self.skipped.push(record);
    }
}

impl MapDocument {
    fn validate(self) -> LoadedMap {
        let mut validation = Validation::default();

        let parcels = self
            .parcels
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| validate_parcel(index, raw, &mut validation))
            .collect();
        let entities = self
            .entities
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| validate_entity(index, raw, &mut validation))
            .collect();
        let water_nodes = self
            .water_nodes
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| validate_water_node(index, raw, &mut validation))
            .collect();

        LoadedMap {
            data: MapData {
                parcels,
                entities,
                water_nodes,
            },
            skipped: validation.skipped,
        }
    }
}

fn validate_parcel(index: usize, raw: RawParcel, validation: &mut Validation) -> Option<Parcel> {
    let id = raw.id.unwrap_or_else(|| format!("parcel#{index}"));

    let mut boundary = Vec::with_capacity(raw.coordinates.len());
    for vertex in &raw.coordinates {
        let Some(point) = vertex.to_geo() else {
            validation.skip(MalformedRecord::new(
                RecordKind::Parcel,
                &id,
                "boundary vertex has missing or invalid coordinates",
            ));
            return None;
        };
        boundary.push(point);
    }
    if boundary.len() >= 2 && boundary.first() == boundary.last() {
        boundary.pop();
    }
    if boundary.len() < 3 {
        validation.skip(MalformedRecord::new(
            RecordKind::Parcel,
            &id,
            format!("boundary ring has {} distinct points, need 3", boundary.len()),
        ));
        return None;
    }

    let center = match raw.center.and_then(RawLatLng::to_geo) {
        Some(center) => center,
        None => ring_centroid(&boundary)?,
    };

    let mut building_points = Vec::with_capacity(raw.building_points.len());
    for (point_index, point) in raw.building_points.into_iter().enumerate() {
        let point_id = point
            .id
            .unwrap_or_else(|| format!("{id}/building#{point_index}"));
        match point.position.to_geo() {
            Some(position) => building_points.push(BuildingPoint {
                id: point_id,
                position,
            }),
            None => validation.skip(MalformedRecord::new(
                RecordKind::BuildingPoint,
                point_id,
                "missing or invalid coordinates",
            )),
        }
    }

    let mut canal_points = Vec::with_capacity(raw.canal_points.len());
    for (point_index, point) in raw.canal_points.into_iter().enumerate() {
        let point_id = point.id.unwrap_or_else(|| format!("{id}/canal#{point_index}"));
        match point.edge.and_then(RawLatLng::to_geo) {
            Some(edge) => canal_points.push(CanalPoint { id: point_id, edge }),
            None => validation.skip(MalformedRecord::new(
                RecordKind::CanalPoint,
                point_id,
                "missing or invalid edge coordinates",
            )),
        }
    }

    let mut bridge_points = Vec::with_capacity(raw.bridge_points.len());
    for (point_index, point) in raw.bridge_points.into_iter().enumerate() {
        let point_id = point
            .id
            .unwrap_or_else(|| format!("{id}/bridge#{point_index}"));
        let Some(edge) = point.edge.and_then(RawLatLng::to_geo) else {
            validation.skip(MalformedRecord::new(
                RecordKind::BridgePoint,
                point_id,
                "missing or invalid edge coordinates",
            ));
            continue;
        };
        let connection = point.connection.and_then(|connection| {
            let target_point = connection.target_point.and_then(RawLatLng::to_geo)?;
            Some(BridgeConnection {
                target_parcel_id: ParcelId(connection.target_parcel_id?),
                target_point,
                distance_m: connection
                    .distance
                    .filter(|distance| distance.is_finite() && *distance >= 0.0),
            })
        });
        bridge_points.push(BridgePoint {
            id: point_id,
            edge,
            connection,
        });
    }

    Some(Parcel {
        id: ParcelId(id),
        name: raw.name,
        boundary,
        center,
        building_points,
        canal_points,
        bridge_points,
    })
}

fn validate_entity(
    index: usize,
    raw: RawEntity,
    validation: &mut Validation,
) -> Option<PlacedEntity> {
    let id = raw.id.unwrap_or_else(|| format!("entity#{index}"));
    let Some(category) = raw.category.as_deref().and_then(EntityCategory::from_label) else {
        let reason = match raw.category {
            Some(label) => format!("unknown category '{label}'"),
            None => "missing category".to_string(),
        };
        validation.skip(MalformedRecord::new(RecordKind::Entity, id, reason));
        return None;
    };
    let Some(position) = raw.position.and_then(RawLatLng::to_geo) else {
        validation.skip(MalformedRecord::new(
            RecordKind::Entity,
            id,
            "missing or invalid position",
        ));
        return None;
    };
    Some(PlacedEntity {
        id: EntityId(id),
        parcel_id: raw.parcel_id.map(ParcelId),
        point_id: raw.point_id,
        category,
        entity_type: raw.entity_type,
        position,
        constructed: raw.constructed,
        orientation: raw.orientation.map(normalize_angle),
    })
}

fn validate_water_node(
    index: usize,
    raw: RawWaterNode,
    validation: &mut Validation,
) -> Option<WaterNode> {
    let id = raw.id.unwrap_or_else(|| format!("water#{index}"));
    let Some(position) = raw.position.and_then(RawLatLng::to_geo) else {
        validation.skip(MalformedRecord::new(
            RecordKind::WaterNode,
            id,
            "missing or invalid position",
        ));
        return None;
    };

    let mut connections = Vec::with_capacity(raw.connections.len());
    for (connection_index, connection) in raw.connections.into_iter().enumerate() {
        let connection_id = connection
            .id
            .unwrap_or_else(|| format!("{id}/connection#{connection_index}"));
        let Some(target_id) = connection.target_id else {
            validation.skip(MalformedRecord::new(
                RecordKind::WaterConnection,
                connection_id,
                "missing target id",
            ));
            continue;
        };
        let intermediate_points: Option<Vec<GeoPoint>> = connection
            .intermediate_points
            .iter()
            .map(|point| point.to_geo())
            .collect();
        let Some(intermediate_points) = intermediate_points else {
            validation.skip(MalformedRecord::new(
                RecordKind::WaterConnection,
                connection_id,
                "intermediate point has missing or invalid coordinates",
            ));
            continue;
        };
        connections.push(WaterConnection {
            target_id: WaterNodeId(target_id),
            intermediate_points,
            distance: connection
                .distance
                .filter(|distance| distance.is_finite() && *distance >= 0.0)
                .unwrap_or(0.0),
            id: connection_id,
        });
    }

    Some(WaterNode {
        id: WaterNodeId(id),
        position,
        connections,
    })
}

impl From<&MapData> for MapDocument {
    fn from(data: &MapData) -> Self {
        let parcels = data
            .parcels
            .iter()
            .map(|parcel| RawParcel {
                id: Some(parcel.id.0.clone()),
                name: parcel.name.clone(),
                coordinates: parcel.boundary.iter().copied().map(RawLatLng::from).collect(),
                center: Some(parcel.center.into()),
                building_points: parcel
                    .building_points
                    .iter()
                    .map(|point| RawBuildingPoint {
                        id: Some(point.id.clone()),
                        position: point.position.into(),
                    })
                    .collect(),
                canal_points: parcel
                    .canal_points
                    .iter()
                    .map(|point| RawCanalPoint {
                        id: Some(point.id.clone()),
                        edge: Some(point.edge.into()),
                    })
                    .collect(),
                bridge_points: parcel
                    .bridge_points
                    .iter()
                    .map(|point| RawBridgePoint {
                        id: Some(point.id.clone()),
                        edge: Some(point.edge.into()),
                        connection: point.connection.as_ref().map(|connection| {
                            RawBridgeConnection {
                                target_parcel_id: Some(connection.target_parcel_id.0.clone()),
                                target_point: Some(connection.target_point.into()),
                                distance: connection.distance_m,
                            }
                        }),
                    })
                    .collect(),
            })
            .collect();

        let entities = data
            .entities
            .iter()
            .map(|entity| RawEntity {
                id: Some(entity.id.0.clone()),
                parcel_id: entity.parcel_id.as_ref().map(|id| id.0.clone()),
                point_id: entity.point_id.clone(),
                category: Some(entity.category.as_str().to_string()),
                entity_type: entity.entity_type.clone(),
                position: Some(entity.position.into()),
                constructed: entity.constructed,
                orientation: entity.orientation,
            })
            .collect();

        let water_nodes = data
            .water_nodes
            .iter()
            .map(|node| RawWaterNode {
                id: Some(node.id.0.clone()),
                position: Some(node.position.into()),
                connections: node
                    .connections
                    .iter()
                    .map(|connection| RawWaterConnection {
                        id: Some(connection.id.clone()),
                        target_id: Some(connection.target_id.0.clone()),
                        intermediate_points: connection
                            .intermediate_points
                            .iter()
                            .copied()
                            .map(RawLatLng::from)
                            .collect(),
                        distance: Some(connection.distance),
                    })
                    .collect(),
            })
            .collect();

        MapDocument {
            parcels,
            entities,
            water_nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "parcels": [
            {
                "id": "p1",
                "name": "Campo",
                "coordinates": [
                    {"lat": 45.0, "lng": 12.0},
                    {"lat": 45.0, "lng": 12.001},
                    {"lat": 45.001, "lng": 12.001},
                    {"lat": 45.001, "lng": 12.0},
                    {"lat": 45.0, "lng": 12.0}
                ],
                "buildingPoints": [
                    {"id": "b1", "lat": 45.0005, "lng": 12.0005},
                    {"id": "b2", "lat": null, "lng": 12.0}
                ],
                "canalPoints": [{"id": "c1", "edge": {"lat": 45.0, "lng": 12.0005}}],
                "bridgePoints": [{
                    "id": "br1",
                    "edge": {"lat": 45.001, "lng": 12.0005},
                    "connection": {
                        "targetPolygonId": "p2",
                        "targetPoint": {"lat": 45.0012, "lng": 12.0005},
                        "distance": 22.0
                    }
                }]
            },
            {"id": "broken", "coordinates": [
                {"lat": 45.0, "lng": 12.0},
                {"lat": 45.1, "lng": 12.0}
            ]}
        ],
        "entities": [
            {
                "id": "e1",
                "category": "bridge",
                "entityType": "wooden_bridge",
                "position": {"lat": 45.001, "lng": 12.0005},
                "constructed": true,
                "orientation": -1.5707963267948966
            },
            {"id": "e2", "category": "dock", "position": {"lng": 12.0}}
        ],
        "waterNodes": [
            {"id": "w1", "position": {"lat": 44.999, "lng": 12.0005}, "connections": [
                {
                    "id": "w1-w2",
                    "targetId": "w2",
                    "intermediatePoints": [{"lat": 44.9985, "lng": 12.001}],
                    "distance": 80.0
                }
            ]},
            {"id": "w2", "position": {"lat": 44.999, "lng": 12.002}}
        ]
    }"#;

    #[test]
    fn parse_keeps_valid_records_and_reports_malformed_ones() {
        let loaded = parse_map_json(SAMPLE).expect("parse");
        assert_eq!(loaded.data.parcels.len(), 1);
        assert_eq!(loaded.data.entities.len(), 1);
        assert_eq!(loaded.data.water_nodes.len(), 2);

        let kinds = loaded
            .skipped
            .iter()
            .map(|record| (record.kind, record.id.as_str()))
            .collect::<Vec<_>>();
        assert!(kinds.contains(&(RecordKind::BuildingPoint, "b2")));
        assert!(kinds.contains(&(RecordKind::Parcel, "broken")));
        assert!(kinds.contains(&(RecordKind::Entity, "e2")));
    }

    #[test]
    fn closing_vertex_is_dropped_and_center_derived() {
        let loaded = parse_map_json(SAMPLE).expect("parse");
        let parcel = &loaded.data.parcels[0];
        assert_eq!(parcel.boundary.len(), 4);
        assert!((parcel.center.lat - 45.0005).abs() < 1e-9);
        assert!((parcel.center.lng - 12.0005).abs() < 1e-9);
        assert_eq!(parcel.name.as_deref(), Some("Campo"));
    }

    #[test]
    fn bridge_connection_accepts_polygon_alias() {
        let loaded = parse_map_json(SAMPLE).expect("parse");
        let bridge = &loaded.data.parcels[0].bridge_points[0];
        let connection = bridge.connection.as_ref().expect("connection");
        assert_eq!(connection.target_parcel_id, ParcelId::new("p2"));
        assert_eq!(connection.distance_m, Some(22.0));
    }

    #[test]
    fn entity_orientation_is_normalized_on_load() {
        let loaded = parse_map_json(SAMPLE).expect("parse");
        let orientation = loaded.data.entities[0].orientation.expect("orientation");
        assert!((orientation - 1.5 * std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn parse_error_reports_json_path() {
        let error = parse_map_json(r#"{"entities": [{"id": "x", "constructed": "yes"}]}"#)
            .expect_err("string flag must fail");
        match error {
            MapLoadError::Parse { json_path, .. } => {
                assert_eq!(json_path, "entities[0].constructed");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            parse_map_json(r#"{"parcels": [{"id": "p1""#),
            Err(MapLoadError::Parse { .. })
        ));
    }

    const CASTLE_MAP: &str = r#"{
        "parcels": [{
            "id": "square",
            "coordinates": [
                {"lat": 45.4360, "lng": 12.3310},
                {"lat": 45.4360, "lng": 12.3330},
                {"lat": 45.4380, "lng": 12.3330},
                {"lat": 45.4380, "lng": 12.3310}
            ]
        }],
        "entities": [
            {"id": "x", "category": "castle", "position": {"lat": 45.437, "lng": 12.332}},
            {"id": "nameless", "position": {"lat": 45.437, "lng": 12.332}},
            {"id": "house", "category": "Building", "position": {"lat": 45.437, "lng": 12.332}}
        ]
    }"#;

    #[test]
    fn unknown_or_missing_entity_category_skips_only_that_entity() {
        let loaded = parse_map_json(CASTLE_MAP).expect("map still loads");
        assert_eq!(loaded.data.parcels.len(), 1);
        assert_eq!(loaded.data.entities.len(), 1);
        assert_eq!(loaded.data.entities[0].category, EntityCategory::Building);

        let skipped = loaded
            .skipped
            .iter()
            .map(|record| (record.kind, record.id.as_str(), record.reason.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            skipped,
            vec![
                (RecordKind::Entity, "x", "unknown category 'castle'"),
                (RecordKind::Entity, "nameless", "missing category"),
            ]
        );
    }

    #[test]
    fn route_request_succeeds_on_a_map_with_a_malformed_entity() {
        use std::sync::Arc;

        use crate::graph::PathfindingMode;
        use crate::map::EntityRegistry;
        use crate::pathfinding::RoutePlanner;
        use crate::spatial::SpatialIndex;

        let loaded = parse_map_json(CASTLE_MAP).expect("map");
        assert_eq!(loaded.skipped.len(), 2);
        let index = Arc::new(SpatialIndex::build(&loaded.data.parcels));
        let registry = EntityRegistry::new(loaded.data.entities.iter().cloned());
        let planner = RoutePlanner::new(
            index,
            &loaded.data.water_nodes,
            &registry,
            PathfindingMode::Real,
        );

        let start = GeoPoint::new(45.4362, 12.3312);
        let end = GeoPoint::new(45.4378, 12.3328);
        let path = planner.plan(start, end).expect("route");
        assert_eq!(path.start(), Some(start));
        assert_eq!(path.end(), Some(end));
    }

    #[test]
    fn saved_map_loads_back_identically() {
        let loaded = parse_map_json(SAMPLE).expect("parse");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("map.json");
        save_map_file(&path, &loaded.data).expect("save");
        let reloaded = load_map_file(&path).expect("reload");
        assert!(reloaded.skipped.is_empty());
        assert_eq!(reloaded.data, loaded.data);
    }

    #[test]
    fn missing_file_reports_read_error_with_user_message() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = load_map_file(&dir.path().join("absent.json")).expect_err("missing file");
        assert!(matches!(error, MapLoadError::Read { .. }));
        assert!(error.user_message().starts_with("Could not open the map file"));
    }
}
