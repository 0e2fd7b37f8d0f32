mod builder;
mod fingerprint;
mod model;

pub use builder::{
    build_graph, centroid_node_id, water_node_id, BRIDGE_PAIRING_RADIUS_M,
    DOCK_DOCK_LINK_RADIUS_M, DOCK_WATER_FALLBACK_RADIUS_M, DOCK_WATER_LINK_RADIUS_M,
};
pub use fingerprint::{map_fingerprint, MapFingerprint};
pub use model::{
    Edge, Graph, GraphNode, NodeIndex, NodeKind, PathfindingMode, TransportMode,
    WALKING_SPEED_MPS, WATER_SPEED_MPS,
};
