use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}
pub(crate) use string_id;

string_id!(ParcelId);
string_id!(EntityId);
string_id!(WaterNodeId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    Building,
    Canal,
    Bridge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingPoint {
    pub id: String,
    pub position: GeoPoint,
}

/// Water-adjacent slot. `edge` is the boundary coordinate facing the water.
#[derive(Debug, Clone, PartialEq)]
pub struct CanalPoint {
    pub id: String,
    pub edge: GeoPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConnection {
    pub target_parcel_id: ParcelId,
    pub target_point: GeoPoint,
    pub distance_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgePoint {
    pub id: String,
    pub edge: GeoPoint,
    pub connection: Option<BridgeConnection>,
}

/// Land parcel with a boundary ring of at least three valid vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    pub id: ParcelId,
    pub name: Option<String>,
    pub boundary: Vec<GeoPoint>,
    pub center: GeoPoint,
    pub building_points: Vec<BuildingPoint>,
    pub canal_points: Vec<CanalPoint>,
    pub bridge_points: Vec<BridgePoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    Building,
    Dock,
    Bridge,
}

impl EntityCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityCategory::Building => "building",
            EntityCategory::Dock => "dock",
            EntityCategory::Bridge => "bridge",
        }
    }

    /// Case-insensitive match on the stored category label.
    pub fn from_label(label: &str) -> Option<Self> {
        [Self::Building, Self::Dock, Self::Bridge]
            .into_iter()
            .find(|category| label.trim().eq_ignore_ascii_case(category.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedEntity {
    pub id: EntityId,
    pub parcel_id: Option<ParcelId>,
    pub point_id: Option<String>,
    pub category: EntityCategory,
    pub entity_type: String,
    pub position: GeoPoint,
    pub constructed: bool,
    /// Radians in `[0, 2π)`; only meaningful for bridges.
    pub orientation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterConnection {
    pub target_id: WaterNodeId,
    #[serde(default)]
    pub intermediate_points: Vec<GeoPoint>,
    pub distance: f64,
    pub id: String,
}

/// Navigable water node, stored by the external persistence collaborator in
/// exactly this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterNode {
    pub id: WaterNodeId,
    pub position: GeoPoint,
    #[serde(default)]
    pub connections: Vec<WaterConnection>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapData {
    pub parcels: Vec<Parcel>,
    pub entities: Vec<PlacedEntity>,
    pub water_nodes: Vec<WaterNode>,
}

impl MapData {
    pub fn parcel(&self, id: &ParcelId) -> Option<&Parcel> {
        self.parcels.iter().find(|parcel| &parcel.id == id)
    }

    pub fn water_node(&self, id: &WaterNodeId) -> Option<&WaterNode> {
        self.water_nodes.iter().find(|node| &node.id == id)
    }

    pub fn water_node_mut(&mut self, id: &WaterNodeId) -> Option<&mut WaterNode> {
        self.water_nodes.iter_mut().find(|node| &node.id == id)
    }
}
