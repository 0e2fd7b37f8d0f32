use thiserror::Error;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("no route connects the requested endpoints")]
    NoRoute,
    #[error("endpoint ({}, {}) lies outside every known graph bound", .point.lat, .point.lng)]
    InvalidEndpoint { point: GeoPoint },
}

impl PathError {
    pub fn user_message(&self) -> &'static str {
        match self {
            PathError::NoRoute => "No route connects these two places.",
            PathError::InvalidEndpoint { .. } => {
                "That spot is too far from any street or canal to route to."
            }
        }
    }
}
