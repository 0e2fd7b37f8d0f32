use std::f64::consts::PI;
use std::mem;
use std::time::Instant;

use tracing::{debug, info};

use crate::geo::{
    distance_m, geo_to_screen, normalize_angle, screen_to_geo, GeoPoint, ScreenPoint,
    ViewTransform,
};
use crate::map::{EntityCategory, EntityId, OccupancyQuery, WaterNode, WaterNodeId};
use crate::spatial::{EntityMarker, HitTester, SelectedEntity, SpatialIndex};

use super::events::{
    ControllerEvent, EventQueue, InputEvent, Key, ModeKind, ModeRequest, WaterPointRejection,
};
use super::rate_limit::RateLimiter;

pub const BRIDGE_ROTATION_STEP: f64 = PI / 12.0;
/// Pointer travel below this still counts as a click.
pub const CLICK_SLOP_PX: f64 = 4.0;
/// Horizontal drag distance per rotation step while orienting a bridge.
pub const DRAG_ROTATION_PX: f64 = 24.0;
pub const MIN_WATER_POINT_SPACING_M: f64 = 5.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaterRouteDraft {
    pub start: Option<WaterNodeId>,
    pub points: Vec<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionMode {
    Normal,
    OrientBridge {
        bridge_id: EntityId,
        original: f64,
        pending: f64,
    },
    PlaceWaterPoint,
    CreateWaterRoute {
        draft: WaterRouteDraft,
    },
}

impl InteractionMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            InteractionMode::Normal => ModeKind::Normal,
            InteractionMode::OrientBridge { .. } => ModeKind::OrientBridge,
            InteractionMode::PlaceWaterPoint => ModeKind::PlaceWaterPoint,
            InteractionMode::CreateWaterRoute { .. } => ModeKind::CreateWaterRoute,
        }
    }
}

/// Read-only map state the controller consults while handling input.
#[derive(Clone, Copy)]
pub struct InteractionContext<'a> {
    pub index: &'a SpatialIndex,
    pub occupancy: &'a dyn OccupancyQuery,
    pub markers: &'a [EntityMarker],
    pub water_nodes: &'a [WaterNode],
}

#[derive(Debug, Clone)]
struct PointerGesture {
    origin: ScreenPoint,
    start_offset: (f64, f64),
    max_travel_px: f64,
    panning: bool,
    rotation_steps: i32,
    hit: Option<SelectedEntity>,
}

/// Finite-state input handler that owns the session's `ViewTransform`.
///
/// Every handled event leaves the view fully updated before returning, and
/// every mode change runs the exit cleanup of the old mode and the entry setup
/// of the new one.
#[derive(Debug, Clone)]
pub struct InteractionController {
    mode: InteractionMode,
    view: ViewTransform,
    hit_tester: HitTester,
    selection: Option<SelectedEntity>,
    gesture: Option<PointerGesture>,
    pending_zoom_steps: f64,
    pending_resize: Option<(u32, u32)>,
    limiter: RateLimiter,
    events: EventQueue,
}

impl InteractionController {
    pub fn new(view: ViewTransform, hit_tester: HitTester, limiter: RateLimiter) -> Self {
        Self {
            mode: InteractionMode::Normal,
            view,
            hit_tester,
            selection: None,
            gesture: None,
            pending_zoom_steps: 0.0,
            pending_resize: None,
            limiter,
            events: EventQueue::default(),
        }
    }

    pub fn mode(&self) -> &InteractionMode {
        &self.mode
    }

    pub fn mode_kind(&self) -> ModeKind {
        self.mode.kind()
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn selection(&self) -> Option<&SelectedEntity> {
        self.selection.as_ref()
    }

    pub fn selected_bridge(&self) -> Option<&EntityId> {
        match &self.mode {
            InteractionMode::OrientBridge { bridge_id, .. } => Some(bridge_id),
            _ => None,
        }
    }

    pub fn pending_angle(&self) -> Option<f64> {
        match &self.mode {
            InteractionMode::OrientBridge { pending, .. } => Some(*pending),
            _ => None,
        }
    }

    pub fn draft(&self) -> Option<&WaterRouteDraft> {
        match &self.mode {
            InteractionMode::CreateWaterRoute { draft } => Some(draft),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.gesture.as_ref().is_some_and(|gesture| gesture.panning)
    }

    pub fn has_pending_view_change(&self) -> bool {
        self.pending_zoom_steps != 0.0 || self.pending_resize.is_some()
    }

    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        self.events.drain().collect()
    }

    pub fn handle_event(&mut self, event: InputEvent, now: Instant, ctx: InteractionContext<'_>) {
        match event {
            InputEvent::PointerDown(point) => self.pointer_down(point, ctx),
            InputEvent::PointerMove(point) => self.pointer_move(point),
            InputEvent::PointerUp(point) => self.pointer_up(point, ctx),
            InputEvent::Wheel(steps) => {
                if steps.is_finite() {
                    self.pending_zoom_steps += steps;
                    self.flush_view_changes(now);
                }
            }
            InputEvent::Resize { width, height } => {
                self.pending_resize = Some((width, height));
                self.flush_view_changes(now);
            }
            InputEvent::Key(key) => self.key(key),
        }
    }

    /// Applies rate-limited wheel and resize changes once the interval allows.
    pub fn tick(&mut self, now: Instant) {
        self.flush_view_changes(now);
    }

    pub fn request_mode(&mut self, request: ModeRequest) {
        let next = match request {
            ModeRequest::Normal => InteractionMode::Normal,
            ModeRequest::OrientBridge {
                bridge_id,
                orientation,
            } => {
                let orientation = normalize_angle(orientation);
                InteractionMode::OrientBridge {
                    bridge_id,
                    original: orientation,
                    pending: orientation,
                }
            }
            ModeRequest::PlaceWaterPoint => InteractionMode::PlaceWaterPoint,
            ModeRequest::CreateWaterRoute => InteractionMode::CreateWaterRoute {
                draft: WaterRouteDraft::default(),
            },
        };
        self.transition(next, false);
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(None);
    }

    fn transition(&mut self, next: InteractionMode, committed: bool) {
        let previous = mem::replace(&mut self.mode, InteractionMode::Normal);
        match previous {
            InteractionMode::OrientBridge {
                ref bridge_id,
                original,
                ..
            } if !committed => {
                self.events.push(ControllerEvent::BridgeOrientationReverted {
                    bridge_id: bridge_id.clone(),
                    orientation: original,
                });
            }
            InteractionMode::CreateWaterRoute { ref draft } if draft.start.is_some() => {
                debug!(points = draft.points.len(), "water_route_draft_discarded");
            }
            _ => {}
        }
        self.gesture = None;

        let next = match next {
            InteractionMode::CreateWaterRoute { .. } => InteractionMode::CreateWaterRoute {
                draft: WaterRouteDraft::default(),
            },
            other => other,
        };
        let from = previous.kind();
        let to = next.kind();
        self.mode = next;
        info!(from = from.as_str(), to = to.as_str(), "interaction_mode_changed");
        self.events.push(ControllerEvent::ModeChanged { from, to });
    }

    fn set_selection(&mut self, selection: Option<SelectedEntity>) {
        if self.selection == selection {
            return;
        }
        self.selection = selection.clone();
        self.events.push(ControllerEvent::SelectionChanged(selection));
    }

    fn pointer_down(&mut self, point: ScreenPoint, ctx: InteractionContext<'_>) {
        let hit = match self.mode {
            InteractionMode::Normal => self.hit_tester.resolve(
                point,
                &self.view,
                ctx.index,
                ctx.occupancy,
                ctx.markers,
            ),
            _ => None,
        };

        if let Some(SelectedEntity::Marker {
            entity_id,
            category: EntityCategory::Bridge,
        }) = &hit
        {
            let orientation = ctx
                .markers
                .iter()
                .find(|marker| &marker.entity_id == entity_id)
                .and_then(|marker| marker.orientation)
                .unwrap_or(0.0);
            let bridge_id = entity_id.clone();
            self.set_selection(hit.clone());
            self.request_mode(ModeRequest::OrientBridge {
                bridge_id,
                orientation,
            });
            return;
        }

        self.gesture = Some(PointerGesture {
            origin: point,
            start_offset: self.view.offset(),
            max_travel_px: 0.0,
            panning: false,
            rotation_steps: 0,
            hit,
        });
    }

    fn pointer_move(&mut self, point: ScreenPoint) {
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };
        gesture.max_travel_px = gesture.max_travel_px.max(point.distance(gesture.origin));

        if let InteractionMode::OrientBridge { pending, .. } = &mut self.mode {
            let steps = ((point.x - gesture.origin.x) / DRAG_ROTATION_PX).trunc() as i32;
            if steps != gesture.rotation_steps {
                let delta = f64::from(steps - gesture.rotation_steps) * BRIDGE_ROTATION_STEP;
                *pending = normalize_angle(*pending + delta);
                gesture.rotation_steps = steps;
            }
            return;
        }

        if !gesture.panning && gesture.max_travel_px < CLICK_SLOP_PX {
            return;
        }
        gesture.panning = true;
        let (start_x, start_y) = gesture.start_offset;
        self.view.set_offset(
            start_x + (point.x - gesture.origin.x),
            start_y + (point.y - gesture.origin.y),
        );
        self.events.push(ControllerEvent::ViewChanged(self.view));
    }

    fn pointer_up(&mut self, point: ScreenPoint, ctx: InteractionContext<'_>) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        let travel = gesture.max_travel_px.max(point.distance(gesture.origin));
        if gesture.panning || travel >= CLICK_SLOP_PX {
            return;
        }

        match self.mode.kind() {
            ModeKind::Normal => self.set_selection(gesture.hit),
            ModeKind::PlaceWaterPoint => self.place_water_point(point, ctx),
            ModeKind::CreateWaterRoute => self.water_route_click(point, ctx),
            ModeKind::OrientBridge => {}
        }
    }

    fn key(&mut self, key: Key) {
        match (self.mode.kind(), key) {
            (ModeKind::OrientBridge, Key::ArrowLeft) => self.rotate_pending(-BRIDGE_ROTATION_STEP),
            (ModeKind::OrientBridge, Key::ArrowRight) => self.rotate_pending(BRIDGE_ROTATION_STEP),
            (ModeKind::OrientBridge, Key::Enter) => self.commit_orientation(),
            (ModeKind::Normal, Key::Escape) => self.set_selection(None),
            (_, Key::Escape) => self.transition(InteractionMode::Normal, false),
            _ => {}
        }
    }

    fn rotate_pending(&mut self, delta: f64) {
        if let InteractionMode::OrientBridge { pending, .. } = &mut self.mode {
            *pending = normalize_angle(*pending + delta);
        }
    }

    fn commit_orientation(&mut self) {
        let InteractionMode::OrientBridge {
            bridge_id, pending, ..
        } = &self.mode
        else {
            return;
        };
        self.events.push(ControllerEvent::BridgeOrientationCommitted {
            bridge_id: bridge_id.clone(),
            orientation: *pending,
        });
        self.transition(InteractionMode::Normal, true);
    }

    fn place_water_point(&mut self, point: ScreenPoint, ctx: InteractionContext<'_>) {
        let position = screen_to_geo(point, &self.view);
        let rejection = if ctx.index.parcel_at(position).is_some() {
            Some(WaterPointRejection::OnLand)
        } else if ctx
            .water_nodes
            .iter()
            .any(|node| distance_m(node.position, position) < MIN_WATER_POINT_SPACING_M)
        {
            Some(WaterPointRejection::TooCloseToExisting)
        } else {
            None
        };

        match rejection {
            Some(reason) => self
                .events
                .push(ControllerEvent::WaterPointRejected { position, reason }),
            None => self.events.push(ControllerEvent::WaterPointPlaced(position)),
        }
    }

    fn water_route_click(&mut self, point: ScreenPoint, ctx: InteractionContext<'_>) {
        let node_hit = nearest_water_node(
            point,
            &self.view,
            ctx.water_nodes,
            self.hit_tester.tolerance_px(),
        );
        let position = screen_to_geo(point, &self.view);
        let InteractionMode::CreateWaterRoute { draft } = &mut self.mode else {
            return;
        };

        match (node_hit, draft.start.clone()) {
            (Some(node), None) => draft.start = Some(node),
            (Some(node), Some(start)) if node == start => {}
            (Some(node), Some(start)) => {
                let intermediate_points = mem::take(&mut draft.points);
                draft.start = None;
                info!(
                    from = %start,
                    to = %node,
                    points = intermediate_points.len(),
                    "water_route_completed"
                );
                self.events.push(ControllerEvent::WaterRouteSaved {
                    from: start,
                    to: node,
                    intermediate_points,
                });
                self.events.push(ControllerEvent::PathRecomputeRequested);
            }
            (None, Some(_)) => {
                if ctx.index.parcel_at(position).is_some() {
                    debug!("water_route_point_on_land_ignored");
                } else {
                    draft.points.push(position);
                }
            }
            (None, None) => debug!("water_route_needs_start_node"),
        }
    }

    fn flush_view_changes(&mut self, now: Instant) {
        if !self.has_pending_view_change() || !self.limiter.try_fire(now) {
            return;
        }
        if let Some((width, height)) = self.pending_resize.take() {
            self.view.resize(width, height);
        }
        let steps = mem::take(&mut self.pending_zoom_steps);
        self.view.zoom_by_steps(steps);
        self.events.push(ControllerEvent::ViewChanged(self.view));
    }
}

fn nearest_water_node(
    point: ScreenPoint,
    view: &ViewTransform,
    water_nodes: &[WaterNode],
    tolerance_px: f64,
) -> Option<WaterNodeId> {
    let mut best: Option<(f64, &WaterNode)> = None;
    for node in water_nodes {
        let distance = geo_to_screen(node.position, view).distance(point);
        if distance > tolerance_px {
            continue;
        }
        if best.is_some_and(|(best_distance, _)| distance >= best_distance) {
            continue;
        }
        best = Some((distance, node));
    }
    best.map(|(_, node)| node.id.clone())
}
