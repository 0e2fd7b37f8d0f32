use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::graph::PathfindingMode;
use crate::pathfinding::{Path, RoutePlanner};

use super::error::RouteError;
use super::wire::RouteRequest;

pub type RouteFuture = Pin<Box<dyn Future<Output = Result<Path, RouteError>> + Send + 'static>>;

/// Route lookup collaborator. Implementations may be remote and arbitrarily
/// slow; callers bound them with a timeout.
pub trait RouteClient: Send + Sync {
    fn find_route(&self, request: RouteRequest) -> RouteFuture;
}

/// Answers requests from in-process planners on tokio's blocking pool.
#[derive(Debug, Clone, Default)]
pub struct LocalRouteService {
    planners: Arc<RwLock<HashMap<PathfindingMode, Arc<RoutePlanner>>>>,
}

impl LocalRouteService {
    pub fn new(planner: Arc<RoutePlanner>) -> Self {
        let service = Self::default();
        service.install(planner);
        service
    }

    /// Replaces the planner serving the planner's own mode.
    pub fn install(&self, planner: Arc<RoutePlanner>) {
        let mode = planner.mode();
        let mut guard = match self.planners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(mode, planner);
        debug!(mode = mode.as_str(), "route_planner_installed");
    }

    pub fn planner(&self, mode: PathfindingMode) -> Option<Arc<RoutePlanner>> {
        let guard = match self.planners.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.get(&mode).cloned()
    }
}

impl RouteClient for LocalRouteService {
    fn find_route(&self, request: RouteRequest) -> RouteFuture {
        let planner = self.planner(request.pathfinding_mode);
        Box::pin(async move {
            let Some(planner) = planner else {
                return Err(RouteError::Remote {
                    message: format!(
                        "no planner loaded for {} mode",
                        request.pathfinding_mode.as_str()
                    ),
                });
            };
            let outcome = tokio::task::spawn_blocking(move || {
                planner.plan(request.start_point, request.end_point)
            })
            .await;
            match outcome {
                Ok(result) => result.map_err(RouteError::from),
                Err(error) => Err(RouteError::Worker {
                    message: error.to_string(),
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::map::EntityRegistry;
    use crate::pathfinding::PathError;
    use crate::spatial::SpatialIndex;
    use crate::test_support::square_parcel;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime")
    }

    fn service() -> LocalRouteService {
        let index = Arc::new(SpatialIndex::build(&[square_parcel(
            "p1", 45.437, 12.332, 0.001,
        )]));
        let registry = EntityRegistry::default();
        let planner = RoutePlanner::new(index, &[], &registry, PathfindingMode::Real);
        LocalRouteService::new(Arc::new(planner))
    }

    #[test]
    fn answers_from_the_planner_for_the_requested_mode() {
        let service = service();
        let request = RouteRequest::new(
            GeoPoint::new(45.4372, 12.3322),
            GeoPoint::new(45.4378, 12.3326),
            PathfindingMode::Real,
        );
        let path = runtime()
            .block_on(service.find_route(request))
            .expect("route");
        assert_eq!(path.start(), Some(request.start_point));
        assert_eq!(path.end(), Some(request.end_point));
    }

    #[test]
    fn unknown_mode_and_path_errors_surface_as_route_errors() {
        let service = service();
        let runtime = runtime();
        let start = GeoPoint::new(45.4372, 12.3322);

        let all = RouteRequest::new(start, start, PathfindingMode::All);
        assert!(matches!(
            runtime.block_on(service.find_route(all)),
            Err(RouteError::Remote { .. })
        ));

        let far = RouteRequest::new(start, GeoPoint::new(f64::NAN, 0.0), PathfindingMode::Real);
        assert!(matches!(
            runtime.block_on(service.find_route(far)),
            Err(RouteError::Path(PathError::InvalidEndpoint { .. }))
        ));
    }
}
