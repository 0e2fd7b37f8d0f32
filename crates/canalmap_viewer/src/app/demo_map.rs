//! Procedural archipelago used when no map file exists yet.

use canalmap::geo::{GeoPoint, REFERENCE_POINT};
use canalmap::map::{
    BridgeConnection, BridgePoint, BuildingPoint, CanalPoint, EntityCategory, EntityId, MapData,
    Parcel, ParcelId, PlacedEntity, WaterConnection, WaterNode, WaterNodeId,
};

const ROWS: usize = 3;
const COLS: usize = 3;
const ISLAND_SIZE_DEG: f64 = 0.0008;
const CANAL_WIDTH_DEG: f64 = 0.0002;
/// Corner cut that keeps islands from looking like a chessboard.
const CHAMFER_DEG: f64 = 0.00012;
const PITCH_DEG: f64 = ISLAND_SIZE_DEG + CANAL_WIDTH_DEG;

fn island_id(row: usize, col: usize) -> ParcelId {
    ParcelId::new(format!("island-{row}-{col}"))
}

fn south_west(row: usize, col: usize) -> GeoPoint {
    let total_lat = ROWS as f64 * PITCH_DEG - CANAL_WIDTH_DEG;
    let total_lng = COLS as f64 * PITCH_DEG - CANAL_WIDTH_DEG;
    GeoPoint::new(
        REFERENCE_POINT.lat - total_lat * 0.5 + row as f64 * PITCH_DEG,
        REFERENCE_POINT.lng - total_lng * 0.5 + col as f64 * PITCH_DEG,
    )
}

fn offset(origin: GeoPoint, d_lat: f64, d_lng: f64) -> GeoPoint {
    GeoPoint::new(origin.lat + d_lat, origin.lng + d_lng)
}

fn island(row: usize, col: usize) -> Parcel {
    let sw = south_west(row, col);
    let s = ISLAND_SIZE_DEG;
    let half = s * 0.5;
    // Alternate which corner is cut so neighbouring islands differ.
    let chamfered = (row + col) % 4;
    let mut boundary = Vec::with_capacity(5);
    let corners = [(0.0, 0.0), (0.0, s), (s, s), (s, 0.0)];
    for (corner, (d_lat, d_lng)) in corners.into_iter().enumerate() {
        if corner == chamfered {
            let toward_lat = if d_lat == 0.0 { CHAMFER_DEG } else { -CHAMFER_DEG };
            let toward_lng = if d_lng == 0.0 { CHAMFER_DEG } else { -CHAMFER_DEG };
            let (first, second) = if corner % 2 == 0 {
                ((toward_lat, 0.0), (0.0, toward_lng))
            } else {
                ((0.0, toward_lng), (toward_lat, 0.0))
            };
            boundary.push(offset(sw, d_lat + first.0, d_lng + first.1));
            boundary.push(offset(sw, d_lat + second.0, d_lng + second.1));
        } else {
            boundary.push(offset(sw, d_lat, d_lng));
        }
    }

    let building_points = [(0.3, 0.3), (0.3, 0.7), (0.7, 0.3), (0.7, 0.7)]
        .into_iter()
        .enumerate()
        .map(|(index, (f_lat, f_lng))| BuildingPoint {
            id: format!("b{index}"),
            position: offset(sw, s * f_lat, s * f_lng),
        })
        .collect();

    let canal_points = vec![
        CanalPoint {
            id: "south-quay".to_string(),
            edge: offset(sw, 0.0, s * 0.25),
        },
        CanalPoint {
            id: "north-quay".to_string(),
            edge: offset(sw, s, s * 0.75),
        },
    ];

    let mut bridge_points = Vec::new();
    if col + 1 < COLS {
        bridge_points.push(bridge(
            "east",
            offset(sw, half, s),
            row,
            col + 1,
            west_edge(row, col + 1),
        ));
    }
    if col > 0 {
        bridge_points.push(bridge(
            "west",
            west_edge(row, col),
            row,
            col - 1,
            east_edge(row, col - 1),
        ));
    }
    if row + 1 < ROWS {
        bridge_points.push(bridge(
            "north",
            offset(sw, s, half),
            row + 1,
            col,
            south_edge(row + 1, col),
        ));
    }
    if row > 0 {
        bridge_points.push(bridge(
            "south",
            south_edge(row, col),
            row - 1,
            col,
            north_edge(row - 1, col),
        ));
    }

    Parcel {
        id: island_id(row, col),
        name: Some(format!("Isola {}", row * COLS + col + 1)),
        center: offset(sw, half, half),
        boundary,
        building_points,
        canal_points,
        bridge_points,
    }
}

fn east_edge(row: usize, col: usize) -> GeoPoint {
    offset(south_west(row, col), ISLAND_SIZE_DEG * 0.5, ISLAND_SIZE_DEG)
}

fn west_edge(row: usize, col: usize) -> GeoPoint {
    offset(south_west(row, col), ISLAND_SIZE_DEG * 0.5, 0.0)
}

fn north_edge(row: usize, col: usize) -> GeoPoint {
    offset(south_west(row, col), ISLAND_SIZE_DEG, ISLAND_SIZE_DEG * 0.5)
}

fn south_edge(row: usize, col: usize) -> GeoPoint {
    offset(south_west(row, col), 0.0, ISLAND_SIZE_DEG * 0.5)
}

fn bridge(id: &str, edge: GeoPoint, row: usize, col: usize, target_point: GeoPoint) -> BridgePoint {
    BridgePoint {
        id: id.to_string(),
        edge,
        connection: Some(BridgeConnection {
            target_parcel_id: island_id(row, col),
            target_point,
            distance_m: None,
        }),
    }
}

fn entity(
    id: String,
    parcel: &Parcel,
    point_id: &str,
    category: EntityCategory,
    entity_type: &str,
    position: GeoPoint,
) -> PlacedEntity {
    PlacedEntity {
        id: EntityId::new(id),
        parcel_id: Some(parcel.id.clone()),
        point_id: Some(point_id.to_string()),
        category,
        entity_type: entity_type.to_string(),
        position,
        constructed: true,
        orientation: None,
    }
}

/// One node per island column in every east-west canal, chained west to east.
fn water_network() -> Vec<WaterNode> {
    let mut nodes = Vec::new();
    for gap in 0..=ROWS {
        let lat = south_west(0, 0).lat + gap as f64 * PITCH_DEG - CANAL_WIDTH_DEG * 0.5;
        for col in 0..COLS {
            let lng = south_west(0, col).lng + ISLAND_SIZE_DEG * 0.5;
            nodes.push(WaterNode {
                id: WaterNodeId::new(format!("canal-{gap}-{col}")),
                position: GeoPoint::new(lat, lng),
                connections: Vec::new(),
            });
        }
    }
    for gap in 0..=ROWS {
        for col in 0..COLS - 1 {
            let from = gap * COLS + col;
            let target = nodes[from + 1].id.clone();
            let distance =
                canalmap::geo::distance_m(nodes[from].position, nodes[from + 1].position);
            let id = format!("{}-{}", nodes[from].id, target);
            nodes[from].connections.push(WaterConnection {
                target_id: target,
                intermediate_points: Vec::new(),
                distance,
                id,
            });
        }
    }
    nodes
}

pub(crate) fn demo_map() -> MapData {
    let parcels: Vec<Parcel> = (0..ROWS)
        .flat_map(|row| (0..COLS).map(move |col| island(row, col)))
        .collect();

    let mut entities = Vec::new();
    for (index, parcel) in parcels.iter().enumerate() {
        for point in parcel.building_points.iter().step_by(2) {
            entities.push(entity(
                format!("house-{index}-{}", point.id),
                parcel,
                &point.id,
                EntityCategory::Building,
                "house",
                point.position,
            ));
        }
        if let Some(quay) = parcel.canal_points.first() {
            entities.push(entity(
                format!("dock-{index}"),
                parcel,
                &quay.id,
                EntityCategory::Dock,
                "public-dock",
                quay.edge,
            ));
        }
        // Only east and north spans are built, so each crossing has one owner.
        for point in &parcel.bridge_points {
            if point.id == "east" || point.id == "north" {
                entities.push(entity(
                    format!("bridge-{index}-{}", point.id),
                    parcel,
                    &point.id,
                    EntityCategory::Bridge,
                    "stone-bridge",
                    point.edge,
                ));
            }
        }
    }

    MapData {
        parcels,
        entities,
        water_nodes: water_network(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use canalmap::graph::PathfindingMode;
    use canalmap::map::{load_map_file, save_map_file, EntityRegistry};
    use canalmap::spatial::SpatialIndex;
    use canalmap::RoutePlanner;

    use super::*;

    #[test]
    fn every_island_is_valid_and_indexed() {
        let map = demo_map();
        let index = SpatialIndex::build(&map.parcels);
        assert_eq!(index.parcel_count(), ROWS * COLS);
        assert!(index.skipped().is_empty());
        for parcel in &map.parcels {
            assert_eq!(
                index.parcel_at(parcel.center).map(|found| &found.id),
                Some(&parcel.id)
            );
        }
    }

    #[test]
    fn opposite_corners_are_connected_by_built_bridges() {
        let map = demo_map();
        let index = Arc::new(SpatialIndex::build(&map.parcels));
        let registry = EntityRegistry::new(map.entities.clone());
        let planner = RoutePlanner::new(index, &map.water_nodes, &registry, PathfindingMode::Real);

        let start = map.parcels[0].building_points[0].position;
        let end = map.parcels[ROWS * COLS - 1].building_points[3].position;
        let path = planner.plan(start, end).expect("route across the archipelago");
        assert_eq!(path.start(), Some(start));
        assert_eq!(path.end(), Some(end));
        assert!(path.total_distance_m() > 0.0);
    }

    #[test]
    fn saved_demo_map_loads_back_without_skips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("map.json");
        let map = demo_map();
        save_map_file(&path, &map).expect("save");

        let loaded = load_map_file(&path).expect("load");
        assert!(loaded.skipped.is_empty());
        assert_eq!(loaded.data.parcels.len(), map.parcels.len());
        assert_eq!(loaded.data.entities.len(), map.entities.len());
        let ids = |nodes: &[WaterNode]| {
            nodes
                .iter()
                .map(|node| (node.id.clone(), node.connections.len()))
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&loaded.data.water_nodes), ids(&map.water_nodes));
    }
}
