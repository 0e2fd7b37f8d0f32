use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::graph::{NodeKind, PathfindingMode, TransportMode};
use crate::pathfinding::{Path, PathError, Waypoint};

use super::error::RouteError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub start_point: GeoPoint,
    pub end_point: GeoPoint,
    #[serde(default)]
    pub pathfinding_mode: PathfindingMode,
}

impl RouteRequest {
    pub fn new(
        start_point: GeoPoint,
        end_point: GeoPoint,
        pathfinding_mode: PathfindingMode,
    ) -> Self {
        Self {
            start_point,
            end_point,
            pathfinding_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireWaypoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub transport_mode: TransportMode,
    #[serde(default)]
    pub is_intermediate_point: bool,
}

impl From<&Waypoint> for WireWaypoint {
    fn from(waypoint: &Waypoint) -> Self {
        Self {
            lat: waypoint.position.lat,
            lng: waypoint.position.lng,
            kind: waypoint.kind,
            transport_mode: waypoint.mode,
            is_intermediate_point: waypoint.is_intermediate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<WireWaypoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteResponse {
    pub fn found(path: &Path) -> Self {
        Self {
            success: true,
            path: Some(path.waypoints().iter().map(WireWaypoint::from).collect()),
            water_only: Some(path.water_only()),
            error: None,
        }
    }

    pub fn failed(error: &PathError) -> Self {
        Self {
            success: false,
            path: None,
            water_only: None,
            error: Some(error.to_string()),
        }
    }

    pub fn from_result(result: &Result<Path, PathError>) -> Self {
        match result {
            Ok(path) => Self::found(path),
            Err(error) => Self::failed(error),
        }
    }

    /// Rebuilds the path a remote service answered with.
    pub fn into_path(self) -> Result<Path, RouteError> {
        if !self.success {
            return Err(RouteError::Remote {
                message: self
                    .error
                    .unwrap_or_else(|| "request failed without a reason".to_string()),
            });
        }
        let Some(points) = self.path.filter(|points| !points.is_empty()) else {
            return Err(RouteError::Remote {
                message: "successful response carried no path".to_string(),
            });
        };
        Path::from_wire(&points, self.water_only.unwrap_or(false))
    }
}

impl Path {
    /// Distance, duration and transitions are recomputed from the points.
    pub fn from_wire(points: &[WireWaypoint], water_only: bool) -> Result<Path, RouteError> {
        let mut waypoints = Vec::with_capacity(points.len());
        for point in points {
            let position = GeoPoint::new(point.lat, point.lng);
            if !position.is_valid() {
                return Err(RouteError::Remote {
                    message: format!("waypoint ({}, {}) is not a coordinate", point.lat, point.lng),
                });
            }
            waypoints.push(Waypoint {
                position,
                kind: point.kind,
                mode: point.transport_mode,
                is_intermediate: point.is_intermediate_point,
            });
        }
        Ok(Path::from_waypoints(waypoints, water_only))
    }
}
