use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::geo::{distance_m, polyline_length_m, GeoPoint};
use crate::map::{
    EntityCategory, OccupancyFilter, OccupancyQuery, Parcel, WaterNode, OCCUPANCY_TOLERANCE_DEG,
};

use super::model::{Edge, Graph, NodeIndex, NodeKind, PathfindingMode};

/// Undeclared bridge points pair with the facing bank within this range.
pub const BRIDGE_PAIRING_RADIUS_M: f64 = 60.0;
pub const DOCK_WATER_LINK_RADIUS_M: f64 = 120.0;
/// Docks with nothing inside the link radius still reach the nearest node this close.
pub const DOCK_WATER_FALLBACK_RADIUS_M: f64 = 400.0;
/// Dock-to-dock water links, used only when the map has no water nodes.
pub const DOCK_DOCK_LINK_RADIUS_M: f64 = 250.0;
/// Declared bridge targets are matched to a bridge slot this close (degrees).
const BRIDGE_TARGET_MATCH_DEG: f64 = 1e-4;

pub fn centroid_node_id(parcel: &Parcel) -> String {
    format!("centroid:{}", parcel.id)
}

pub fn water_node_id(node: &WaterNode) -> String {
    format!("water:{}", node.id)
}

struct ParcelNodes {
    centroid: NodeIndex,
    bridges: Vec<(NodeIndex, GeoPoint)>,
}

/// Builds the walking/water graph for one pathfinding mode.
///
/// In `Real` mode bridge crossings and dock landings only exist where the
/// occupancy registry reports a constructed bridge or dock; in `All` mode
/// every potential point is traversable.
pub fn build_graph<'a>(
    parcels: impl IntoIterator<Item = &'a Parcel>,
    water_nodes: &[WaterNode],
    occupancy: &dyn OccupancyQuery,
    mode: PathfindingMode,
) -> Graph {
    let mut graph = Graph::new();
    let mut parcel_nodes = Vec::new();
    let mut landings = Vec::new();

    for parcel in parcels {
        if parcel.boundary.len() < 3 || !parcel.center.is_valid() {
            debug!(parcel = %parcel.id, "graph_parcel_skipped");
            continue;
        }
        let (nodes, parcel_landings) = add_parcel(&mut graph, parcel, occupancy, mode);
        landings.extend(parcel_landings);
        parcel_nodes.push((parcel, nodes));
    }

    link_adjacent_parcels(&mut graph, &parcel_nodes);
    link_bridges(&mut graph, &parcel_nodes, occupancy, mode);
    let water_indices = add_water_network(&mut graph, water_nodes);
    link_landings(&mut graph, &landings, &water_indices);

    info!(
        mode = mode.as_str(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        landings = landings.len(),
        "graph_built"
    );
    graph
}

fn add_parcel(
    graph: &mut Graph,
    parcel: &Parcel,
    occupancy: &dyn OccupancyQuery,
    mode: PathfindingMode,
) -> (ParcelNodes, Vec<NodeIndex>) {
    let centroid = graph.add_node(
        centroid_node_id(parcel),
        parcel.center,
        NodeKind::Centroid,
        Some(parcel.id.clone()),
    );
    let spoke = |graph: &mut Graph, id: String, position: GeoPoint, kind: NodeKind| {
        let node = graph.add_node(id, position, kind, Some(parcel.id.clone()));
        let distance = distance_m(parcel.center, position);
        graph.add_bidirectional_edge(centroid, node, Edge::walking(node, distance));
        node
    };

    for point in parcel.building_points.iter().filter(|p| p.position.is_valid()) {
        spoke(
            graph,
            format!("building:{}:{}", parcel.id, point.id),
            point.position,
            NodeKind::Building,
        );
    }

    let mut landings = Vec::new();
    for point in parcel.canal_points.iter().filter(|p| p.edge.is_valid()) {
        let has_dock = occupancy.is_occupied(
            point.edge,
            OCCUPANCY_TOLERANCE_DEG,
            OccupancyFilter::Constructed(EntityCategory::Dock),
        );
        let kind = if has_dock { NodeKind::Dock } else { NodeKind::Canal };
        let node = spoke(
            graph,
            format!("canal:{}:{}", parcel.id, point.id),
            point.edge,
            kind,
        );
        if has_dock || mode == PathfindingMode::All {
            landings.push(node);
        }
    }

    let mut bridges = Vec::new();
    for point in parcel.bridge_points.iter().filter(|p| p.edge.is_valid()) {
        let node = spoke(
            graph,
            format!("bridge:{}:{}", parcel.id, point.id),
            point.edge,
            NodeKind::Bridge,
        );
        bridges.push((node, point.edge));
    }

    (ParcelNodes { centroid, bridges }, landings)
}

/// Parcels whose rings share a vertex are walkable neighbours.
fn link_adjacent_parcels(graph: &mut Graph, parcel_nodes: &[(&Parcel, ParcelNodes)]) {
    let cell_of = |point: GeoPoint| {
        (
            (point.lat / OCCUPANCY_TOLERANCE_DEG).round() as i64,
            (point.lng / OCCUPANCY_TOLERANCE_DEG).round() as i64,
        )
    };
    let mut vertex_cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (slot, (parcel, _)) in parcel_nodes.iter().enumerate() {
        for vertex in &parcel.boundary {
            let bucket = vertex_cells.entry(cell_of(*vertex)).or_default();
            if !bucket.contains(&slot) {
                bucket.push(slot);
            }
        }
    }

    let mut linked = HashSet::new();
    for (slot, (parcel, nodes)) in parcel_nodes.iter().enumerate() {
        for vertex in &parcel.boundary {
            let (lat, lng) = cell_of(*vertex);
            for d_lat in -1..=1 {
                for d_lng in -1..=1 {
                    let Some(bucket) = vertex_cells.get(&(lat + d_lat, lng + d_lng)) else {
                        continue;
                    };
                    for &other in bucket {
                        if other == slot || !linked.insert((slot.min(other), slot.max(other))) {
                            continue;
                        }
                        let (other_parcel, other_nodes) = &parcel_nodes[other];
                        let shares_vertex = other_parcel
                            .boundary
                            .iter()
                            .any(|candidate| candidate.approx_eq(*vertex, OCCUPANCY_TOLERANCE_DEG));
                        if !shares_vertex {
                            linked.remove(&(slot.min(other), slot.max(other)));
                            continue;
                        }
                        let distance = distance_m(parcel.center, other_parcel.center);
                        graph.add_bidirectional_edge(
                            nodes.centroid,
                            other_nodes.centroid,
                            Edge::walking(other_nodes.centroid, distance),
                        );
                    }
                }
            }
        }
    }
}

fn link_bridges(
    graph: &mut Graph,
    parcel_nodes: &[(&Parcel, ParcelNodes)],
    occupancy: &dyn OccupancyQuery,
    mode: PathfindingMode,
) {
    let parcel_slot: HashMap<_, _> = parcel_nodes
        .iter()
        .enumerate()
        .map(|(slot, (parcel, _))| (&parcel.id, slot))
        .collect();
    let is_built = |position: GeoPoint| {
        occupancy.is_occupied(
            position,
            OCCUPANCY_TOLERANCE_DEG,
            OccupancyFilter::Constructed(EntityCategory::Bridge),
        )
    };

    let mut paired = HashSet::new();
    for (slot, (parcel, nodes)) in parcel_nodes.iter().enumerate() {
        let valid_points = parcel.bridge_points.iter().filter(|p| p.edge.is_valid());
        for (point, &(node, position)) in valid_points.zip(&nodes.bridges) {
            let declared = point.connection.as_ref();
            let target = match declared {
                Some(connection) => parcel_slot
                    .get(&connection.target_parcel_id)
                    .and_then(|&target_slot| {
                        declared_bridge_target(
                            &parcel_nodes[target_slot].1,
                            connection.target_point,
                        )
                    }),
                None => nearest_foreign_bridge(parcel_nodes, slot, position),
            };
            let Some((target_node, target_position)) = target else {
                debug!(parcel = %parcel.id, bridge = %point.id, "bridge_unpaired");
                continue;
            };
            if !paired.insert((node.min(target_node), node.max(target_node))) {
                continue;
            }
            if mode == PathfindingMode::Real && !is_built(position) && !is_built(target_position) {
                continue;
            }
            // Declared span lengths are informational; routing uses geometry so
            // path totals match the waypoint polyline.
            let distance = distance_m(position, target_position);
            graph.add_bidirectional_edge(
                node,
                target_node,
                Edge::walking(target_node, distance).requiring_infrastructure(),
            );
        }
    }
}

fn declared_bridge_target(
    target: &ParcelNodes,
    target_point: GeoPoint,
) -> Option<(NodeIndex, GeoPoint)> {
    let exact = target
        .bridges
        .iter()
        .find(|(_, position)| position.approx_eq(target_point, BRIDGE_TARGET_MATCH_DEG));
    exact.copied().or_else(|| {
        target
            .bridges
            .iter()
            .map(|&(node, position)| (node, position, distance_m(position, target_point)))
            .filter(|(_, _, distance)| *distance <= BRIDGE_PAIRING_RADIUS_M)
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(node, position, _)| (node, position))
    })
}

fn nearest_foreign_bridge(
    parcel_nodes: &[(&Parcel, ParcelNodes)],
    own_slot: usize,
    position: GeoPoint,
) -> Option<(NodeIndex, GeoPoint)> {
    parcel_nodes
        .iter()
        .enumerate()
        .filter(|(slot, _)| *slot != own_slot)
        .flat_map(|(_, (_, nodes))| nodes.bridges.iter().copied())
        .map(|(node, other)| (node, other, distance_m(position, other)))
        .filter(|(_, _, distance)| *distance <= BRIDGE_PAIRING_RADIUS_M)
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(node, other, _)| (node, other))
}

fn add_water_network(graph: &mut Graph, water_nodes: &[WaterNode]) -> Vec<NodeIndex> {
    let mut indices = HashMap::new();
    let mut ordered = Vec::new();
    for node in water_nodes.iter().filter(|node| node.position.is_valid()) {
        let index = graph.add_node(water_node_id(node), node.position, NodeKind::Water, None);
        indices.insert(&node.id, index);
        ordered.push(index);
    }

    let mut connected = HashSet::new();
    for node in water_nodes {
        let Some(&from) = indices.get(&node.id) else {
            continue;
        };
        for connection in &node.connections {
            let Some(&to) = indices.get(&connection.target_id) else {
                debug!(from = %node.id, to = %connection.target_id, "water_connection_dangling");
                continue;
            };
            if !connected.insert((from.min(to), from.max(to))) {
                continue;
            }
            let intermediate: Vec<GeoPoint> = connection
                .intermediate_points
                .iter()
                .copied()
                .filter(GeoPoint::is_valid)
                .collect();
            let mut polyline = Vec::with_capacity(intermediate.len() + 2);
            polyline.push(node.position);
            polyline.extend_from_slice(&intermediate);
            if let Some(target) = graph.node(to) {
                polyline.push(target.position);
            }
            let distance = polyline_length_m(&polyline);
            graph.add_bidirectional_edge(from, to, Edge::water(to, distance, intermediate));
        }
    }
    ordered
}

fn link_landings(graph: &mut Graph, landings: &[NodeIndex], water_indices: &[NodeIndex]) {
    let positions: Vec<(NodeIndex, GeoPoint)> = landings
        .iter()
        .filter_map(|&index| graph.node(index).map(|node| (index, node.position)))
        .collect();

    if water_indices.is_empty() {
        for (slot, &(a, a_position)) in positions.iter().enumerate() {
            for &(b, b_position) in &positions[slot + 1..] {
                let distance = distance_m(a_position, b_position);
                if distance <= DOCK_DOCK_LINK_RADIUS_M {
                    graph.add_bidirectional_edge(
                        a,
                        b,
                        Edge::water(b, distance, Vec::new()).requiring_infrastructure(),
                    );
                }
            }
        }
        return;
    }

    let water_positions: Vec<(NodeIndex, GeoPoint)> = water_indices
        .iter()
        .filter_map(|&index| graph.node(index).map(|node| (index, node.position)))
        .collect();
    for &(landing, position) in &positions {
        let mut links: Vec<(NodeIndex, f64)> = water_positions
            .iter()
            .map(|&(water, water_position)| (water, distance_m(position, water_position)))
            .filter(|(_, distance)| *distance <= DOCK_WATER_LINK_RADIUS_M)
            .collect();
        if links.is_empty() {
            links.extend(
                water_positions
                    .iter()
                    .map(|&(water, water_position)| (water, distance_m(position, water_position)))
                    .filter(|(_, distance)| *distance <= DOCK_WATER_FALLBACK_RADIUS_M)
                    .min_by(|a, b| a.1.total_cmp(&b.1)),
            );
        }
        for (water, distance) in links {
            graph.add_bidirectional_edge(
                landing,
                water,
                Edge::water(water, distance, Vec::new()).requiring_infrastructure(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TransportMode;
    use crate::map::{EntityRegistry, WaterConnection, WaterNodeId};
    use crate::test_support::{placed, square_parcel, with_bridge, with_building, with_canal};

    const SIZE: f64 = 0.001;

    /// Two islands separated by a 0.0003° lng channel with one bridge slot
    /// on each bank, plus a canal slot on the west island.
    fn two_islands() -> Vec<Parcel> {
        let west = square_parcel("west", 45.437, 12.332, SIZE);
        let west = with_building(west, "home", GeoPoint::new(45.4375, 12.3323));
        let west = with_bridge(west, "east-bank", GeoPoint::new(45.4375, 12.333), None);
        let west = with_canal(west, "quay", GeoPoint::new(45.437, 12.3325));
        let east = square_parcel("east", 45.437, 12.3333, SIZE);
        let east = with_bridge(east, "west-bank", GeoPoint::new(45.4375, 12.3333), None);
        vec![west, east]
    }

    fn bridge_edge_exists(graph: &Graph) -> bool {
        let a = graph.find("bridge:west:east-bank").expect("west bridge node");
        let b = graph.find("bridge:east:west-bank").expect("east bridge node");
        graph.has_edge(a, b) && graph.has_edge(b, a)
    }

    #[test]
    fn parcel_points_hang_off_the_centroid() {
        let graph = build_graph(
            &two_islands(),
            &[],
            &EntityRegistry::default(),
            PathfindingMode::Real,
        );
        let centroid = graph.find("centroid:west").expect("centroid");
        let home = graph.find("building:west:home").expect("home");
        assert!(graph.has_edge(centroid, home));
        assert!(graph.has_edge(home, centroid));
        let edge = &graph.node(centroid).expect("node").edges[0];
        assert_eq!(edge.mode, TransportMode::Walking);
        assert!(!edge.requires_infrastructure);
    }

    #[test]
    fn real_mode_needs_a_constructed_bridge_but_all_mode_does_not() {
        let parcels = two_islands();
        let empty = EntityRegistry::default();
        let real = build_graph(&parcels, &[], &empty, PathfindingMode::Real);
        assert!(!bridge_edge_exists(&real));

        let all = build_graph(&parcels, &[], &empty, PathfindingMode::All);
        assert!(bridge_edge_exists(&all));

        let built = EntityRegistry::new([placed(
            "bridge",
            EntityCategory::Bridge,
            GeoPoint::new(45.4375, 12.333),
            true,
        )]);
        let real = build_graph(&parcels, &[], &built, PathfindingMode::Real);
        assert!(bridge_edge_exists(&real));
        let a = real.find("bridge:west:east-bank").expect("node");
        let edge = real.node(a).expect("node").edges.iter().find(|e| e.requires_infrastructure);
        assert!(edge.is_some());
    }

    #[test]
    fn shared_vertex_links_parcel_centroids() {
        let a = square_parcel("a", 45.437, 12.332, SIZE);
        let b = square_parcel("b", 45.437, 12.333, SIZE);
        let far = square_parcel("far", 45.44, 12.34, SIZE);
        let graph = build_graph(
            &[a, b, far],
            &[],
            &EntityRegistry::default(),
            PathfindingMode::Real,
        );
        let a = graph.find("centroid:a").expect("a");
        let b = graph.find("centroid:b").expect("b");
        let far = graph.find("centroid:far").expect("far");
        assert!(graph.has_edge(a, b));
        assert!(graph.has_edge(b, a));
        assert!(!graph.has_edge(a, far));
    }

    #[test]
    fn constructed_dock_becomes_dock_node_linked_to_water() {
        let parcels = two_islands();
        let water = vec![WaterNode {
            id: WaterNodeId::new("w1"),
            position: GeoPoint::new(45.4368, 12.3325),
            connections: Vec::new(),
        }];
        let docks = EntityRegistry::new([placed(
            "dock",
            EntityCategory::Dock,
            GeoPoint::new(45.437, 12.3325),
            true,
        )]);
        let graph = build_graph(&parcels, &water, &docks, PathfindingMode::Real);
        let quay = graph.find("canal:west:quay").expect("quay");
        let w1 = graph.find("water:w1").expect("water");
        assert_eq!(graph.node(quay).map(|n| n.kind), Some(NodeKind::Dock));
        assert!(graph.has_edge(quay, w1));

        let no_dock = build_graph(
            &parcels,
            &water,
            &EntityRegistry::default(),
            PathfindingMode::Real,
        );
        let quay = no_dock.find("canal:west:quay").expect("quay");
        let w1 = no_dock.find("water:w1").expect("water");
        assert_eq!(no_dock.node(quay).map(|n| n.kind), Some(NodeKind::Canal));
        assert!(!no_dock.has_edge(quay, w1));

        let all = build_graph(&parcels, &water, &EntityRegistry::default(), PathfindingMode::All);
        let quay = all.find("canal:west:quay").expect("quay");
        let w1 = all.find("water:w1").expect("water");
        assert!(all.has_edge(quay, w1));
    }

    #[test]
    fn water_connection_distance_follows_intermediate_points() {
        let bend = GeoPoint::new(45.438, 12.333);
        let water = vec![
            WaterNode {
                id: WaterNodeId::new("w1"),
                position: GeoPoint::new(45.437, 12.333),
                connections: vec![WaterConnection {
                    target_id: WaterNodeId::new("w2"),
                    intermediate_points: vec![bend],
                    distance: 1.0,
                    id: "c1".to_string(),
                }],
            },
            WaterNode {
                id: WaterNodeId::new("w2"),
                position: GeoPoint::new(45.438, 12.334),
                connections: Vec::new(),
            },
        ];
        let graph = build_graph(&[], &water, &EntityRegistry::default(), PathfindingMode::Real);
        let w1 = graph.find("water:w1").expect("w1");
        let w2 = graph.find("water:w2").expect("w2");
        let forward = &graph.node(w1).expect("w1").edges[0];
        let expected = polyline_length_m(&[
            GeoPoint::new(45.437, 12.333),
            bend,
            GeoPoint::new(45.438, 12.334),
        ]);
        assert!((forward.distance_m - expected).abs() < 1e-9);
        assert_eq!(forward.intermediate_points, vec![bend]);
        assert!(graph.has_edge(w2, w1));
    }

    #[test]
    fn docks_link_to_each_other_when_there_is_no_water_network() {
        let a = with_canal(
            square_parcel("a", 45.437, 12.332, SIZE),
            "q",
            GeoPoint::new(45.437, 12.3325),
        );
        let b = with_canal(
            square_parcel("b", 45.4355, 12.332, SIZE),
            "q",
            GeoPoint::new(45.4365, 12.3325),
        );
        let graph = build_graph(&[a, b], &[], &EntityRegistry::default(), PathfindingMode::All);
        let qa = graph.find("canal:a:q").expect("a");
        let qb = graph.find("canal:b:q").expect("b");
        let edge = graph
            .node(qa)
            .expect("node")
            .edges
            .iter()
            .find(|edge| edge.target == qb)
            .expect("dock link");
        assert_eq!(edge.mode, TransportMode::Water);
    }
}
