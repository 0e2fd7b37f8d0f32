use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::geo::{distance_m, GeoPoint};
use crate::graph::{
    build_graph, map_fingerprint, Edge, Graph, MapFingerprint, NodeIndex, NodeKind,
    PathfindingMode, TransportMode,
};
use crate::map::{EntityRegistry, OccupancyQuery, ParcelId, WaterNode};
use crate::spatial::SpatialIndex;

use super::error::PathError;
use super::path::Path;
use super::search::{search, SearchGraph};

/// Water-only fallback endpoints snap to a waterside node this close.
pub const WATER_SNAP_RADIUS_M: f64 = 500.0;

/// Answers coordinate-to-coordinate route queries for one map snapshot and
/// one pathfinding mode.
#[derive(Debug)]
pub struct RoutePlanner {
    mode: PathfindingMode,
    index: Arc<SpatialIndex>,
    graph: Graph,
    water_graph: Graph,
    nodes_by_parcel: HashMap<ParcelId, Vec<NodeIndex>>,
}

impl RoutePlanner {
    pub fn new(
        index: Arc<SpatialIndex>,
        water_nodes: &[WaterNode],
        occupancy: &dyn OccupancyQuery,
        mode: PathfindingMode,
    ) -> Self {
        let graph = build_graph(index.parcels(), water_nodes, occupancy, mode);
        let water_graph = graph.water_only();
        let mut nodes_by_parcel: HashMap<ParcelId, Vec<NodeIndex>> = HashMap::new();
        for (node_index, node) in graph.nodes() {
            if let Some(parcel) = &node.parcel {
                nodes_by_parcel
                    .entry(parcel.clone())
                    .or_default()
                    .push(node_index);
            }
        }
        Self {
            mode,
            index,
            graph,
            water_graph,
            nodes_by_parcel,
        }
    }

    pub fn mode(&self) -> PathfindingMode {
        self.mode
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn water_graph(&self) -> &Graph {
        &self.water_graph
    }

    /// Routes between two coordinates.
    ///
    /// Endpoints inside parcels attach to every node of their parcel. When
    /// either endpoint is outside all parcels, or the land search finds no
    /// route, the query is retried on the water-only graph and the result is
    /// flagged `water_only`.
    pub fn plan(&self, start: GeoPoint, end: GeoPoint) -> Result<Path, PathError> {
        for point in [start, end] {
            if !point.is_valid() {
                return Err(PathError::InvalidEndpoint { point });
            }
        }

        let start_parcel = self.index.parcel_at(start).map(|parcel| parcel.id.clone());
        let end_parcel = self.index.parcel_at(end).map(|parcel| parcel.id.clone());
        let on_land = start_parcel.is_some() && end_parcel.is_some();
        if let (Some(start_parcel), Some(end_parcel)) = (&start_parcel, &end_parcel) {
            match self.plan_on_land(start, start_parcel, end, end_parcel) {
                Ok(path) => {
                    debug!(
                        path = %path.id(),
                        distance_m = path.total_distance_m(),
                        "route_planned"
                    );
                    return Ok(path);
                }
                Err(PathError::NoRoute) => {
                    debug!(mode = self.mode.as_str(), "land_route_missing_trying_water");
                }
                Err(error) => return Err(error),
            }
        }

        let path = match self.plan_on_water(start, end) {
            Ok(path) => path,
            // Both endpoints were on land; a failed water snap still means no route.
            Err(PathError::InvalidEndpoint { .. }) if on_land => return Err(PathError::NoRoute),
            Err(error) => return Err(error),
        };
        info!(
            path = %path.id(),
            distance_m = path.total_distance_m(),
            "water_only_route_planned"
        );
        Ok(path)
    }

    fn plan_on_land(
        &self,
        start: GeoPoint,
        start_parcel: &ParcelId,
        end: GeoPoint,
        end_parcel: &ParcelId,
    ) -> Result<Path, PathError> {
        let mut overlay = SearchGraph::new(&self.graph);
        let start_node = overlay.add_virtual_node(start, NodeKind::Endpoint);
        let end_node = overlay.add_virtual_node(end, NodeKind::Endpoint);

        for &node in self.parcel_nodes(start_parcel) {
            if let Some(position) = self.graph.node(node).map(|node| node.position) {
                let edge = Edge::walking(node, distance_m(start, position));
                overlay.add_extra_edge(start_node, edge);
            }
        }
        for &node in self.parcel_nodes(end_parcel) {
            if let Some(position) = self.graph.node(node).map(|node| node.position) {
                overlay.add_extra_edge(node, Edge::walking(end_node, distance_m(position, end)));
            }
        }
        if start_parcel == end_parcel {
            overlay.add_extra_edge(start_node, Edge::walking(end_node, distance_m(start, end)));
        }

        search(&overlay, start_node, end_node, false)
    }

    fn plan_on_water(&self, start: GeoPoint, end: GeoPoint) -> Result<Path, PathError> {
        let (start_anchor, start_gap) = self.snap_to_water(start)?;
        let (end_anchor, end_gap) = self.snap_to_water(end)?;

        let mut overlay = SearchGraph::new(&self.water_graph);
        let start_node = overlay.add_virtual_node(start, NodeKind::Endpoint);
        let end_node = overlay.add_virtual_node(end, NodeKind::Endpoint);
        overlay.add_extra_edge(start_node, Edge::water(start_anchor, start_gap, Vec::new()));
        overlay.add_extra_edge(end_anchor, Edge::water(end_node, end_gap, Vec::new()));
        if start_anchor == end_anchor {
            overlay.add_extra_edge(
                start_node,
                Edge::water(end_node, distance_m(start, end), Vec::new()),
            );
        }

        search(&overlay, start_node, end_node, true)
    }

    fn snap_to_water(&self, point: GeoPoint) -> Result<(NodeIndex, f64), PathError> {
        self.water_graph
            .nearest_node(point, WATER_SNAP_RADIUS_M, |node| {
                node.kind == NodeKind::Water
                    || node
                        .edges
                        .iter()
                        .any(|edge| edge.mode == TransportMode::Water)
            })
            .ok_or(PathError::InvalidEndpoint { point })
    }

    fn parcel_nodes(&self, parcel: &ParcelId) -> &[NodeIndex] {
        self.nodes_by_parcel
            .get(parcel)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Rebuilds the planner only when graph inputs change.
#[derive(Debug, Default)]
pub struct PlannerCache {
    key: Option<MapFingerprint>,
    planner: Option<Arc<RoutePlanner>>,
}

impl PlannerCache {
    pub fn refresh(
        &mut self,
        index: &Arc<SpatialIndex>,
        registry: &EntityRegistry,
        water_nodes: &[WaterNode],
        mode: PathfindingMode,
    ) -> Arc<RoutePlanner> {
        let key = map_fingerprint(index.parcels(), registry.iter(), water_nodes, mode);
        if let (Some(current), Some(planner)) = (&self.key, &self.planner) {
            if *current == key {
                debug!(fingerprint = key.as_hex(), "planner_cache_hit");
                return Arc::clone(planner);
            }
        }

        let planner = Arc::new(RoutePlanner::new(
            Arc::clone(index),
            water_nodes,
            registry,
            mode,
        ));
        info!(
            fingerprint = key.as_hex(),
            mode = mode.as_str(),
            nodes = planner.graph().node_count(),
            water_nodes = planner.water_graph().node_count(),
            "planner_rebuilt"
        );
        self.key = Some(key);
        self.planner = Some(Arc::clone(&planner));
        planner
    }

    pub fn current(&self) -> Option<Arc<RoutePlanner>> {
        self.planner.clone()
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.planner = None;
    }
}
