use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::animation::AnimationEngine;
use crate::geo::{polyline_length_m, GeoPoint, ViewTransform, ZOOM_DEFAULT};
use crate::graph::PathfindingMode;
use crate::interaction::{
    ControllerEvent, InputEvent, InteractionContext, InteractionController, ModeRequest,
    RateLimiter, DEFAULT_MIN_INTERVAL,
};
use crate::map::{
    EntityCategory, EntityId, EntityRegistry, LoadedMap, MalformedRecord, MapData, PlacedEntity,
    RegistryError, StoreError, WaterConnection, WaterNode, WaterNodeId, WaterNodeStore,
};
use crate::pathfinding::{Path, PlannerCache, RoutePlanner};
use crate::route::{
    BackgroundRoutes, LocalRouteService, RouteClient, RouteDispatcher, RouteError, RouteRequest,
    DEFAULT_ROUTE_TIMEOUT,
};
use crate::spatial::{
    EntityMarker, HitTester, SelectedEntity, SpatialIndex, DEFAULT_HIT_TOLERANCE_PX,
};

pub const MARKER_RADIUS_PX: f64 = 7.0;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub pathfinding_mode: PathfindingMode,
    pub route_timeout: Duration,
    /// Minimum spacing between applied wheel-zoom and resize changes.
    pub view_rate_limit: Duration,
    pub hit_tolerance_px: f64,
    pub initial_zoom: f64,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pathfinding_mode: PathfindingMode::Real,
            route_timeout: DEFAULT_ROUTE_TIMEOUT,
            view_rate_limit: DEFAULT_MIN_INTERVAL,
            hit_tolerance_px: DEFAULT_HIT_TOLERANCE_PX,
            initial_zoom: ZOOM_DEFAULT,
            canvas_width: 1280,
            canvas_height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Controller(ControllerEvent),
    RouteReady {
        generation: u64,
        path: Arc<Path>,
    },
    RouteFailed {
        generation: u64,
        error: RouteError,
    },
    /// Outcome of a keyed lookup from `request_background_route`.
    BackgroundRouteFinished {
        key: String,
        result: Result<Arc<Path>, RouteError>,
    },
    WaterNodeAdded(WaterNodeId),
    WaterConnectionAdded {
        from: WaterNodeId,
        to: WaterNodeId,
    },
    RoutingRebuilt {
        nodes: usize,
        edges: usize,
    },
    /// Short human-readable message for the status line.
    Notice(String),
}

enum RouteBackend {
    Inline,
    Dispatched {
        dispatcher: RouteDispatcher,
        background: BackgroundRoutes,
        local: Option<LocalRouteService>,
    },
}

/// Everything one open map needs, passed explicitly to whoever drives it.
///
/// The session is single-writer: input, ticks and route outcomes are all
/// applied from the thread that owns it, so the view and the interaction
/// state are never observed half-updated.
pub struct MapSession {
    config: SessionConfig,
    skipped: Vec<MalformedRecord>,
    index: Arc<SpatialIndex>,
    registry: EntityRegistry,
    water_nodes: Vec<WaterNode>,
    markers: Vec<EntityMarker>,
    controller: InteractionController,
    animations: AnimationEngine,
    planners: PlannerCache,
    planner: Arc<RoutePlanner>,
    backend: RouteBackend,
    store: Option<Box<dyn WaterNodeStore>>,
    route_generation: u64,
    last_route: Option<RouteRequest>,
    active_route: Option<Arc<Path>>,
    events: VecDeque<SessionEvent>,
}

impl MapSession {
    pub fn new(map: LoadedMap, config: SessionConfig) -> Self {
        let LoadedMap { data, mut skipped } = map;
        let index = Arc::new(SpatialIndex::build(&data.parcels));
        skipped.extend(index.skipped().iter().cloned());
        let registry = EntityRegistry::new(data.entities);
        let mut planners = PlannerCache::default();
        let planner = planners.refresh(
            &index,
            &registry,
            &data.water_nodes,
            config.pathfinding_mode,
        );
        let view = ViewTransform::new(config.canvas_width, config.canvas_height)
            .with_scale(config.initial_zoom);
        let controller = InteractionController::new(
            view,
            HitTester::new(config.hit_tolerance_px),
            RateLimiter::new(config.view_rate_limit),
        );
        info!(
            parcels = index.parcel_count(),
            entities = registry.len(),
            water_nodes = data.water_nodes.len(),
            skipped = skipped.len(),
            mode = config.pathfinding_mode.as_str(),
            "session_opened"
        );

        let mut session = Self {
            config,
            skipped,
            index,
            registry,
            water_nodes: data.water_nodes,
            markers: Vec::new(),
            controller,
            animations: AnimationEngine::new(),
            planners,
            planner,
            backend: RouteBackend::Inline,
            store: None,
            route_generation: 0,
            last_route: None,
            active_route: None,
            events: VecDeque::new(),
        };
        session.rebuild_markers();
        session
    }

    /// Loads persisted water nodes and keeps the store for later saves. An
    /// empty store leaves the map's own water nodes in place.
    pub fn attach_store(&mut self, store: Box<dyn WaterNodeStore>) -> Result<(), StoreError> {
        let stored = store.load()?;
        if !stored.is_empty() {
            info!(water_nodes = stored.len(), "water_nodes_restored");
            self.water_nodes = stored;
            self.rebuild_routing();
        }
        self.store = Some(store);
        Ok(())
    }

    /// Routes through an in-process planner on `runtime`.
    pub fn use_local_dispatch(&mut self, runtime: Handle) {
        let local = LocalRouteService::new(Arc::clone(&self.planner));
        let client: Arc<dyn RouteClient> = Arc::new(local.clone());
        self.dispatch_through(runtime, client, Some(local));
    }

    /// Routes through an external collaborator on `runtime`.
    pub fn use_route_client(&mut self, runtime: Handle, client: Arc<dyn RouteClient>) {
        self.dispatch_through(runtime, client, None);
    }

    fn dispatch_through(
        &mut self,
        runtime: Handle,
        client: Arc<dyn RouteClient>,
        local: Option<LocalRouteService>,
    ) {
        let timeout = self.config.route_timeout;
        self.backend = RouteBackend::Dispatched {
            dispatcher: RouteDispatcher::new(runtime.clone(), Arc::clone(&client), timeout),
            background: BackgroundRoutes::new(runtime, client, timeout),
            local,
        };
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn water_nodes(&self) -> &[WaterNode] {
        &self.water_nodes
    }

    pub fn markers(&self) -> &[EntityMarker] {
        &self.markers
    }

    pub fn skipped_records(&self) -> &[MalformedRecord] {
        &self.skipped
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut InteractionController {
        &mut self.controller
    }

    pub fn view(&self) -> &ViewTransform {
        self.controller.view()
    }

    pub fn animations(&self) -> &AnimationEngine {
        &self.animations
    }

    pub fn animations_mut(&mut self) -> &mut AnimationEngine {
        &mut self.animations
    }

    pub fn planner(&self) -> &Arc<RoutePlanner> {
        &self.planner
    }

    pub fn active_route(&self) -> Option<&Arc<Path>> {
        self.active_route.as_ref()
    }

    pub fn route_in_flight(&self) -> bool {
        match &self.backend {
            RouteBackend::Inline => false,
            RouteBackend::Dispatched { dispatcher, .. } => dispatcher.in_flight(),
        }
    }

    /// Snapshot of the map as it stands now, for saving.
    pub fn map_data(&self) -> MapData {
        MapData {
            parcels: self.index.parcels().cloned().collect(),
            entities: self.registry.iter().cloned().collect(),
            water_nodes: self.water_nodes.clone(),
        }
    }

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) {
        let ctx = InteractionContext {
            index: &self.index,
            occupancy: &self.registry,
            markers: &self.markers,
            water_nodes: &self.water_nodes,
        };
        self.controller.handle_event(event, now, ctx);
        self.apply_controller_events();
    }

    /// One frame step: flushes rate-limited view changes, applies any route
    /// outcome that arrived and advances animations by `delta_s`.
    pub fn tick(&mut self, now: Instant, delta_s: f64) {
        self.controller.tick(now);
        self.apply_controller_events();
        self.poll_routes();
        self.animations.advance(delta_s);
    }

    /// Starts a route lookup; the answer arrives as a `SessionEvent`.
    pub fn request_route(&mut self, start: GeoPoint, end: GeoPoint) -> u64 {
        let request = RouteRequest::new(start, end, self.config.pathfinding_mode);
        self.last_route = Some(request);
        if let RouteBackend::Dispatched { dispatcher, .. } = &mut self.backend {
            return dispatcher.submit(request);
        }
        self.route_generation = self.route_generation.wrapping_add(1);
        let generation = self.route_generation;
        let result = self.planner.plan(start, end).map_err(RouteError::from);
        self.finish_route(generation, result);
        generation
    }

    /// Starts a lookup on its own lane under `key`, beside the interactive
    /// route. A newer request under the same key supersedes the older one.
    /// The answer arrives as `SessionEvent::BackgroundRouteFinished`; without
    /// a runtime attached it is planned before this returns.
    pub fn request_background_route(&mut self, key: &str, start: GeoPoint, end: GeoPoint) {
        let request = RouteRequest::new(start, end, self.config.pathfinding_mode);
        if let RouteBackend::Dispatched { background, .. } = &mut self.backend {
            background.submit(key, request);
            return;
        }
        let result = self
            .planner
            .plan(start, end)
            .map(Arc::new)
            .map_err(RouteError::from);
        self.events.push_back(SessionEvent::BackgroundRouteFinished {
            key: key.to_string(),
            result,
        });
    }

    pub fn background_route_in_flight(&self, key: &str) -> bool {
        match &self.backend {
            RouteBackend::Inline => false,
            RouteBackend::Dispatched { background, .. } => background.in_flight(key),
        }
    }

    pub fn cancel_background_route(&mut self, key: &str) -> bool {
        match &mut self.backend {
            RouteBackend::Inline => false,
            RouteBackend::Dispatched { background, .. } => background.cancel(key),
        }
    }

    pub fn cancel_route(&mut self) -> bool {
        match &mut self.backend {
            RouteBackend::Inline => false,
            RouteBackend::Dispatched { dispatcher, .. } => dispatcher.cancel(),
        }
    }

    pub fn clear_route(&mut self) {
        self.cancel_route();
        self.last_route = None;
        self.active_route = None;
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    pub fn place_entity(&mut self, entity: PlacedEntity) -> Result<(), RegistryError> {
        let id = entity.id.clone();
        self.registry.upsert(entity)?;
        debug!(entity = %id, "entity_placed");
        self.rebuild_markers();
        self.rebuild_routing();
        Ok(())
    }

    /// Also drops a selection or bridge-orientation mode tied to the entity.
    pub fn remove_entity(&mut self, id: &EntityId) -> Option<PlacedEntity> {
        let removed = self.registry.remove(id)?;
        if self.controller.selected_bridge() == Some(id) {
            self.controller.request_mode(ModeRequest::Normal);
        }
        let selected = matches!(
            self.controller.selection(),
            Some(SelectedEntity::Marker { entity_id, .. }) if entity_id == id
        );
        if selected {
            debug!(entity = %id, "removed_entity_deselected");
            self.controller.clear_selection();
        }
        self.apply_controller_events();
        self.rebuild_markers();
        self.rebuild_routing();
        Some(removed)
    }

    fn apply_controller_events(&mut self) {
        while let Some(event) = self.controller.events_mut().pop() {
            match &event {
                ControllerEvent::BridgeOrientationCommitted {
                    bridge_id,
                    orientation,
                } => match self.registry.set_orientation(bridge_id, *orientation) {
                    Ok(()) => {
                        info!(bridge = %bridge_id, orientation, "bridge_orientation_saved");
                        self.rebuild_markers();
                    }
                    Err(error) => warn!(error = %error, "bridge_orientation_dropped"),
                },
                ControllerEvent::WaterPointPlaced(position) => self.add_water_node(*position),
                ControllerEvent::WaterRouteSaved {
                    from,
                    to,
                    intermediate_points,
                } => self.add_water_connection(from, to, intermediate_points),
                ControllerEvent::PathRecomputeRequested => self.rebuild_routing(),
                _ => {}
            }
            self.events.push_back(SessionEvent::Controller(event));
        }
    }

    fn add_water_node(&mut self, position: GeoPoint) {
        let mut serial = self.water_nodes.len() + 1;
        let id = loop {
            let candidate = WaterNodeId::new(format!("water-{serial}"));
            if !self.water_nodes.iter().any(|node| node.id == candidate) {
                break candidate;
            }
            serial += 1;
        };
        self.water_nodes.push(WaterNode {
            id: id.clone(),
            position,
            connections: Vec::new(),
        });
        info!(node = %id, lat = position.lat, lng = position.lng, "water_node_added");
        self.persist_water_nodes();
        self.events.push_back(SessionEvent::WaterNodeAdded(id));
        self.rebuild_routing();
    }

    fn add_water_connection(
        &mut self,
        from: &WaterNodeId,
        to: &WaterNodeId,
        intermediate_points: &[GeoPoint],
    ) {
        let (Some(from_position), Some(to_position)) = (
            self.water_node(from).map(|node| node.position),
            self.water_node(to).map(|node| node.position),
        ) else {
            warn!(from = %from, to = %to, "water_route_endpoint_missing");
            return;
        };

        let mut polyline = Vec::with_capacity(intermediate_points.len() + 2);
        polyline.push(from_position);
        polyline.extend_from_slice(intermediate_points);
        polyline.push(to_position);
        let connection = WaterConnection {
            target_id: to.clone(),
            intermediate_points: intermediate_points.to_vec(),
            distance: polyline_length_m(&polyline),
            id: format!("{from}-{to}"),
        };

        let Some(node) = self.water_nodes.iter_mut().find(|node| &node.id == from) else {
            return;
        };
        node.connections
            .retain(|existing| &existing.target_id != to);
        node.connections.push(connection);
        info!(
            from = %from,
            to = %to,
            points = intermediate_points.len(),
            "water_connection_saved"
        );
        self.persist_water_nodes();
        self.events.push_back(SessionEvent::WaterConnectionAdded {
            from: from.clone(),
            to: to.clone(),
        });
    }

    fn water_node(&self, id: &WaterNodeId) -> Option<&WaterNode> {
        self.water_nodes.iter().find(|node| &node.id == id)
    }

    fn persist_water_nodes(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(error) = store.save(&self.water_nodes) {
            warn!(error = %error, "water_node_save_failed");
            self.events
                .push_back(SessionEvent::Notice(error.user_message().to_string()));
        }
    }

    fn rebuild_markers(&mut self) {
        self.markers = self
            .registry
            .iter()
            .filter(|entity| entity.constructed)
            .map(|entity| EntityMarker {
                entity_id: entity.id.clone(),
                category: entity.category,
                position: entity.position,
                radius_px: MARKER_RADIUS_PX,
                orientation: match entity.category {
                    EntityCategory::Bridge => Some(entity.orientation.unwrap_or(0.0)),
                    EntityCategory::Building | EntityCategory::Dock => None,
                },
            })
            .collect();
    }

    fn rebuild_routing(&mut self) {
        let planner = self.planners.refresh(
            &self.index,
            &self.registry,
            &self.water_nodes,
            self.config.pathfinding_mode,
        );
        if Arc::ptr_eq(&planner, &self.planner) {
            return;
        }
        self.planner = planner;
        if let RouteBackend::Dispatched {
            local: Some(local), ..
        } = &self.backend
        {
            local.install(Arc::clone(&self.planner));
        }
        self.events.push_back(SessionEvent::RoutingRebuilt {
            nodes: self.planner.graph().node_count(),
            edges: self.planner.graph().edge_count(),
        });
        if let Some(request) = self.last_route {
            debug!("active_route_recomputed");
            self.request_route(request.start_point, request.end_point);
        }
    }

    fn poll_routes(&mut self) {
        if let RouteBackend::Dispatched { background, .. } = &mut self.backend {
            for (key, outcome) in background.poll() {
                self.events.push_back(SessionEvent::BackgroundRouteFinished {
                    key,
                    result: outcome.result.map(Arc::new),
                });
            }
        }
        loop {
            let outcome = match &mut self.backend {
                RouteBackend::Inline => return,
                RouteBackend::Dispatched { dispatcher, .. } => dispatcher.poll(),
            };
            let Some(outcome) = outcome else {
                return;
            };
            self.finish_route(outcome.generation, outcome.result);
        }
    }

    fn finish_route(&mut self, generation: u64, result: Result<Path, RouteError>) {
        match result {
            Ok(path) => {
                let path = Arc::new(path);
                info!(
                    generation,
                    path = %path.id(),
                    distance_m = path.total_distance_m(),
                    duration_s = path.estimated_duration_s(),
                    water_only = path.water_only(),
                    "route_ready"
                );
                self.active_route = Some(Arc::clone(&path));
                self.events
                    .push_back(SessionEvent::RouteReady { generation, path });
            }
            Err(error) => {
                if !matches!(error, RouteError::Cancelled) {
                    self.events
                        .push_back(SessionEvent::Notice(error.user_message().to_string()));
                }
                self.events
                    .push_back(SessionEvent::RouteFailed { generation, error });
            }
        }
    }
}
