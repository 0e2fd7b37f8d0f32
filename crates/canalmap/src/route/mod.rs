mod background;
mod client;
mod dispatcher;
mod error;
mod wire;

pub use background::BackgroundRoutes;
pub use client::{LocalRouteService, RouteClient, RouteFuture};
pub use dispatcher::{RouteDispatcher, RouteOutcome, DEFAULT_ROUTE_TIMEOUT};
pub use error::RouteError;
pub use wire::{RouteRequest, RouteResponse, WireWaypoint};
