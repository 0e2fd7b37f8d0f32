use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::{distance_m, GeoPoint};
use crate::map::ParcelId;

/// 5 km/h.
pub const WALKING_SPEED_MPS: f64 = 5.0 / 3.6;
/// 10 km/h.
pub const WATER_SPEED_MPS: f64 = 10.0 / 3.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Building,
    Canal,
    Bridge,
    Dock,
    Water,
    Centroid,
    /// Virtual start/end point of a single query.
    Endpoint,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Building => "building",
            NodeKind::Canal => "canal",
            NodeKind::Bridge => "bridge",
            NodeKind::Dock => "dock",
            NodeKind::Water => "water",
            NodeKind::Centroid => "centroid",
            NodeKind::Endpoint => "endpoint",
        }
    }

    pub fn is_waterside(self) -> bool {
        matches!(self, NodeKind::Water | NodeKind::Dock | NodeKind::Canal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Walking,
    Water,
}

impl TransportMode {
    pub fn speed_mps(self) -> f64 {
        match self {
            TransportMode::Walking => WALKING_SPEED_MPS,
            TransportMode::Water => WATER_SPEED_MPS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportMode::Walking => "walking",
            TransportMode::Water => "water",
        }
    }
}

/// Which infrastructure the graph treats as traversable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathfindingMode {
    /// Only constructed bridges and docks.
    #[default]
    Real,
    /// Every potential bridge and canal point.
    All,
}

impl PathfindingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PathfindingMode::Real => "real",
            PathfindingMode::All => "all",
        }
    }
}

impl fmt::Display for PathfindingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathfindingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "real" => Ok(PathfindingMode::Real),
            "all" => Ok(PathfindingMode::All),
            other => Err(format!(
                "unknown pathfinding mode '{other}', expected 'real' or 'all'"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub target: NodeIndex,
    /// Cosmetic points between source and target, in travel order.
    pub intermediate_points: Vec<GeoPoint>,
    pub distance_m: f64,
    pub mode: TransportMode,
    pub requires_infrastructure: bool,
}

impl Edge {
    pub fn walking(target: NodeIndex, distance_m: f64) -> Self {
        Self {
            target,
            intermediate_points: Vec::new(),
            distance_m,
            mode: TransportMode::Walking,
            requires_infrastructure: false,
        }
    }

    pub fn water(target: NodeIndex, distance_m: f64, intermediate_points: Vec<GeoPoint>) -> Self {
        Self {
            target,
            intermediate_points,
            distance_m,
            mode: TransportMode::Water,
            requires_infrastructure: false,
        }
    }

    pub fn requiring_infrastructure(mut self) -> Self {
        self.requires_infrastructure = true;
        self
    }

    pub fn travel_time_s(&self) -> f64 {
        self.distance_m / self.mode.speed_mps()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub position: GeoPoint,
    pub kind: NodeKind,
    pub parcel: Option<ParcelId>,
    pub edges: Vec<Edge>,
}

/// Directed multi-modal graph. Node indices are dense and stable for the
/// lifetime of the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    by_id: HashMap<String, NodeIndex>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, or returns the existing index when `id` is already known.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        position: GeoPoint,
        kind: NodeKind,
        parcel: Option<ParcelId>,
    ) -> NodeIndex {
        let id = id.into();
        if let Some(existing) = self.by_id.get(&id) {
            debug!(node = %id, "graph_node_reused");
            return *existing;
        }
        let index = NodeIndex(self.nodes.len());
        self.by_id.insert(id.clone(), index);
        self.nodes.push(GraphNode {
            id,
            position,
            kind,
            parcel,
            edges: Vec::new(),
        });
        index
    }

    /// Ignores edges whose endpoints are unknown or that would loop back.
    pub fn add_edge(&mut self, from: NodeIndex, edge: Edge) {
        if from == edge.target || edge.target.0 >= self.nodes.len() {
            return;
        }
        let Some(node) = self.nodes.get_mut(from.0) else {
            return;
        };
        if !edge.distance_m.is_finite() || edge.distance_m < 0.0 {
            debug!(from = %node.id, "graph_edge_rejected");
            return;
        }
        node.edges.push(edge);
    }

    /// Adds `edge` from `a` to `b` plus its mirror, with intermediate points
    /// reversed so both directions trace the same curve.
    pub fn add_bidirectional_edge(&mut self, a: NodeIndex, b: NodeIndex, edge: Edge) {
        let mut reverse = edge.clone();
        reverse.target = a;
        reverse.intermediate_points.reverse();
        let mut forward = edge;
        forward.target = b;
        self.add_edge(a, forward);
        self.add_edge(b, reverse);
    }

    pub fn node(&self, index: NodeIndex) -> Option<&GraphNode> {
        self.nodes.get(index.0)
    }

    pub fn find(&self, id: &str) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|node| node.edges.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &GraphNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeIndex(index), node))
    }

    pub fn has_edge(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.node(from)
            .is_some_and(|node| node.edges.iter().any(|edge| edge.target == to))
    }

    /// Nearest node accepted by `filter` within `max_distance_m`.
    pub fn nearest_node(
        &self,
        point: GeoPoint,
        max_distance_m: f64,
        filter: impl Fn(&GraphNode) -> bool,
    ) -> Option<(NodeIndex, f64)> {
        let mut best: Option<(NodeIndex, f64)> = None;
        for (index, node) in self.nodes() {
            if !filter(node) {
                continue;
            }
            let distance = distance_m(point, node.position);
            if distance > max_distance_m {
                continue;
            }
            if best.is_some_and(|(_, best_distance)| distance >= best_distance) {
                continue;
            }
            best = Some((index, distance));
        }
        best
    }

    /// Copy restricted to waterside nodes and water edges.
    pub fn water_only(&self) -> Graph {
        let mut graph = Graph::new();
        let mut remap = vec![None; self.nodes.len()];
        for (index, node) in self.nodes() {
            if !node.kind.is_waterside() {
                continue;
            }
            remap[index.0] = Some(graph.add_node(
                node.id.clone(),
                node.position,
                node.kind,
                node.parcel.clone(),
            ));
        }
        for (index, node) in self.nodes() {
            let Some(from) = remap[index.0] else {
                continue;
            };
            for edge in node.edges.iter().filter(|edge| edge.mode == TransportMode::Water) {
                let Some(target) = remap[edge.target.0] else {
                    continue;
                };
                let mut kept = edge.clone();
                kept.target = target;
                graph.add_edge(from, kept);
            }
        }
        graph
    }
}
