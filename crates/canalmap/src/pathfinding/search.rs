use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::geo::GeoPoint;
use crate::graph::{Edge, Graph, NodeIndex, NodeKind, TransportMode};

use super::error::PathError;
use super::path::{Path, Waypoint};

/// Arrival-mode slots per node: none (search origin), walking, water.
const MODE_SLOTS: usize = 3;

/// Query-local nodes layered over a shared graph without cloning it.
///
/// Virtual nodes take indices after the base graph's last node. Extra edges
/// may leave from base or virtual nodes.
#[derive(Debug)]
pub(crate) struct SearchGraph<'a> {
    base: &'a Graph,
    virtual_nodes: Vec<(GeoPoint, NodeKind)>,
    extra_edges: Vec<(usize, Edge)>,
}

impl<'a> SearchGraph<'a> {
    pub(crate) fn new(base: &'a Graph) -> Self {
        Self {
            base,
            virtual_nodes: Vec::new(),
            extra_edges: Vec::new(),
        }
    }

    pub(crate) fn add_virtual_node(&mut self, position: GeoPoint, kind: NodeKind) -> NodeIndex {
        let index = NodeIndex(self.base.node_count() + self.virtual_nodes.len());
        self.virtual_nodes.push((position, kind));
        index
    }

    pub(crate) fn add_extra_edge(&mut self, from: NodeIndex, edge: Edge) {
        if from == edge.target || !edge.distance_m.is_finite() || edge.distance_m < 0.0 {
            return;
        }
        self.extra_edges.push((from.0, edge));
    }

    fn node_count(&self) -> usize {
        self.base.node_count() + self.virtual_nodes.len()
    }

    fn node_info(&self, index: usize) -> Option<(GeoPoint, NodeKind)> {
        match self.base.node(NodeIndex(index)) {
            Some(node) => Some((node.position, node.kind)),
            None => self
                .virtual_nodes
                .get(index - self.base.node_count())
                .copied(),
        }
    }

    fn edges(&self, index: usize) -> impl Iterator<Item = &Edge> {
        let base_edges = self
            .base
            .node(NodeIndex(index))
            .map(|node| node.edges.as_slice())
            .unwrap_or(&[]);
        base_edges.iter().chain(
            self.extra_edges
                .iter()
                .filter(move |(from, _)| *from == index)
                .map(|(_, edge)| edge),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cost {
    time_s: f64,
    transitions: u32,
}

impl Cost {
    const ZERO: Cost = Cost {
        time_s: 0.0,
        transitions: 0,
    };

    /// Lower travel time first; exact ties prefer fewer mode changes.
    fn order(&self, other: &Cost) -> Ordering {
        self.time_s
            .total_cmp(&other.time_s)
            .then(self.transitions.cmp(&other.transitions))
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenState {
    cost: Cost,
    state: usize,
    insertion_order: u64,
}

impl OpenState {
    fn order_key(&self, other: &OpenState) -> Ordering {
        self.cost
            .order(&other.cost)
            .then(self.insertion_order.cmp(&other.insertion_order))
    }
}

impl PartialEq for OpenState {
    fn eq(&self, other: &Self) -> bool {
        self.order_key(other) == Ordering::Equal
    }
}

impl Eq for OpenState {}

impl PartialOrd for OpenState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenState {
    // Reversed so the max-heap pops the cheapest state.
    fn cmp(&self, other: &Self) -> Ordering {
        other.order_key(self)
    }
}

fn mode_slot(mode: TransportMode) -> usize {
    match mode {
        TransportMode::Walking => 1,
        TransportMode::Water => 2,
    }
}

fn slot_mode(slot: usize) -> Option<TransportMode> {
    match slot {
        1 => Some(TransportMode::Walking),
        2 => Some(TransportMode::Water),
        _ => None,
    }
}

/// Shortest travel-time path between two graph nodes.
pub fn find_path(graph: &Graph, start: NodeIndex, end: NodeIndex) -> Result<Path, PathError> {
    search(&SearchGraph::new(graph), start, end, false)
}

/// Dijkstra over (node, arrival mode) states so that mode-change counts are
/// exact tie-breakers.
pub(crate) fn search(
    graph: &SearchGraph<'_>,
    start: NodeIndex,
    goal: NodeIndex,
    water_only: bool,
) -> Result<Path, PathError> {
    let node_count = graph.node_count();
    if start.0 >= node_count || goal.0 >= node_count {
        debug!(start = start.0, goal = goal.0, node_count, "path_endpoint_unknown");
        return Err(PathError::NoRoute);
    }

    let state_count = node_count * MODE_SLOTS;
    let mut closed = vec![false; state_count];
    let mut best: Vec<Option<Cost>> = vec![None; state_count];
    let mut parent = vec![None::<(usize, usize)>; state_count];
    let mut open = BinaryHeap::new();
    let mut next_insertion = 0u64;

    let start_state = start.0 * MODE_SLOTS;
    best[start_state] = Some(Cost::ZERO);
    open.push(OpenState {
        cost: Cost::ZERO,
        state: start_state,
        insertion_order: next_insertion,
    });
    next_insertion = next_insertion.saturating_add(1);

    while let Some(current) = open.pop() {
        if closed[current.state] {
            continue;
        }
        closed[current.state] = true;

        let node = current.state / MODE_SLOTS;
        if node == goal.0 {
            return Ok(build_path(
                graph,
                &parent,
                start_state,
                current.state,
                current.cost,
                water_only,
            ));
        }

        let arrival = slot_mode(current.state % MODE_SLOTS);
        for (edge_slot, edge) in graph.edges(node).enumerate() {
            if edge.target.0 >= node_count {
                continue;
            }
            let changes_mode = arrival.is_some_and(|mode| mode != edge.mode);
            let next = Cost {
                time_s: current.cost.time_s + edge.travel_time_s(),
                transitions: current.cost.transitions + u32::from(changes_mode),
            };
            let next_state = edge.target.0 * MODE_SLOTS + mode_slot(edge.mode);
            if closed[next_state] {
                continue;
            }
            if best[next_state].is_some_and(|known| next.order(&known) != Ordering::Less) {
                continue;
            }
            best[next_state] = Some(next);
            parent[next_state] = Some((current.state, edge_slot));
            open.push(OpenState {
                cost: next,
                state: next_state,
                insertion_order: next_insertion,
            });
            next_insertion = next_insertion.saturating_add(1);
        }
    }

    Err(PathError::NoRoute)
}

fn build_path(
    graph: &SearchGraph<'_>,
    parent: &[Option<(usize, usize)>],
    start_state: usize,
    goal_state: usize,
    cost: Cost,
    water_only: bool,
) -> Path {
    let mut steps = Vec::new();
    let mut cursor = goal_state;
    while cursor != start_state {
        let Some((previous, edge_slot)) = parent[cursor] else {
            break;
        };
        steps.push((previous / MODE_SLOTS, edge_slot));
        cursor = previous;
    }
    steps.reverse();

    let mut waypoints = Vec::new();
    let mut total_distance_m = 0.0;
    let mut last_mode = TransportMode::Walking;
    for (node, edge_slot) in steps {
        let Some(edge) = graph.edges(node).nth(edge_slot) else {
            continue;
        };
        if let Some((position, kind)) = graph.node_info(node) {
            waypoints.push(Waypoint {
                position,
                kind,
                mode: edge.mode,
                is_intermediate: false,
            });
        }
        let bend_kind = match edge.mode {
            TransportMode::Water => NodeKind::Water,
            TransportMode::Walking => graph
                .node_info(edge.target.0)
                .map(|(_, kind)| kind)
                .unwrap_or(NodeKind::Centroid),
        };
        waypoints.extend(edge.intermediate_points.iter().map(|position| Waypoint {
            position: *position,
            kind: bend_kind,
            mode: edge.mode,
            is_intermediate: true,
        }));
        total_distance_m += edge.distance_m;
        last_mode = edge.mode;
    }
    if let Some((position, kind)) = graph.node_info(goal_state / MODE_SLOTS) {
        waypoints.push(Waypoint {
            position,
            kind,
            mode: last_mode,
            is_intermediate: false,
        });
    }

    Path::new(
        waypoints,
        total_distance_m,
        cost.time_s,
        cost.transitions,
        water_only,
    )
}
