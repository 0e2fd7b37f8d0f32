use std::sync::Arc;

use canalmap::animation::AnimationId;
use canalmap::geo::{screen_to_geo, GeoPoint};
use canalmap::map::{EntityCategory, EntityId};
use canalmap::pathfinding::Path;
use canalmap::route::RouteError;
use canalmap::{HookCommand, InputSnapshot, MapSession, SessionEvent, SessionHooks};
use tracing::{debug, info};

const MAX_WALKERS: usize = 6;
/// Walkers cover their routes this many times faster than walking pace.
const TIME_SCALE: f64 = 20.0;
const PREVIEW_ID: &str = "route-preview";

#[derive(Debug)]
struct Walker {
    id: AnimationId,
    next_destination: usize,
    /// A route request is out and its answer not yet applied.
    waiting: bool,
    /// Consecutive destinations without a route.
    failures: usize,
}

/// Residents strolling between houses, plus right-click route previews: the
/// first right-click picks a start, the second requests the route and sends a
/// preview walker along it.
#[derive(Debug, Default)]
pub(crate) struct WalkerHooks {
    walkers: Vec<Walker>,
    destinations: Vec<(EntityId, GeoPoint)>,
    pending_start: Option<GeoPoint>,
    status: Option<String>,
}

impl WalkerHooks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn spawn_walkers(&mut self, session: &mut MapSession) {
        self.destinations = session
            .registry()
            .iter()
            .filter(|entity| entity.category == EntityCategory::Building && entity.constructed)
            .map(|entity| (entity.id.clone(), entity.position))
            .collect();
        let count = self.destinations.len().min(MAX_WALKERS);
        for (slot, (owner, position)) in self.destinations.iter().take(count).enumerate() {
            let id = AnimationId::new(format!("walker-{slot}"));
            session
                .animations_mut()
                .upsert(id.clone(), owner.clone(), *position);
            self.walkers.push(Walker {
                id,
                // Spread walkers over the destination list.
                next_destination: (slot * 3 + 1) % self.destinations.len(),
                waiting: false,
                failures: 0,
            });
        }
        info!(walkers = self.walkers.len(), "walkers_spawned");
        for index in 0..self.walkers.len() {
            self.send_walker(session, index);
        }
    }

    /// Requests a route from wherever the walker is now to its next
    /// destination. The walker stays put until the answer arrives.
    fn send_walker(&mut self, session: &mut MapSession, index: usize) {
        let destination_count = self.destinations.len();
        let Some(walker) = self.walkers.get_mut(index) else {
            return;
        };
        let Some(from) = session.animations().position(&walker.id) else {
            return;
        };
        for _ in 0..destination_count {
            let (_, to) = self.destinations[walker.next_destination];
            walker.next_destination = (walker.next_destination + 1) % destination_count;
            if from.approx_eq(to, 1e-9) {
                continue;
            }
            walker.waiting = true;
            session.request_background_route(walker.id.as_str(), from, to);
            return;
        }
    }

    fn apply_walker_route(
        &mut self,
        session: &mut MapSession,
        key: &str,
        result: &Result<Arc<Path>, RouteError>,
    ) {
        let Some(index) = self
            .walkers
            .iter()
            .position(|walker| walker.id.as_str() == key)
        else {
            return;
        };
        let walker = &mut self.walkers[index];
        walker.waiting = false;
        match result {
            Ok(path) => {
                walker.failures = 0;
                let duration_s = path.estimated_duration_s() / TIME_SCALE;
                let assigned = session.animations_mut().assign_path(
                    &walker.id,
                    Arc::clone(path),
                    duration_s,
                );
                if let Err(error) = assigned {
                    debug!(error = %error, "walker_path_rejected");
                }
            }
            Err(error) => {
                debug!(walker = key, error = %error, "walker_destination_unreachable");
                walker.failures += 1;
                if walker.failures < self.destinations.len() {
                    self.send_walker(session, index);
                } else {
                    info!(walker = key, "walker_stranded");
                }
            }
        }
    }

    fn handle_route_click(&mut self, session: &mut MapSession, point: GeoPoint) {
        match self.pending_start.take() {
            None => {
                self.pending_start = Some(point);
                self.status = Some("Route start set; right-click the destination".to_string());
            }
            Some(start) => {
                let generation = session.request_route(start, point);
                debug!(generation, "route_preview_requested");
                if session.route_in_flight() {
                    self.status = Some("Finding route...".to_string());
                }
            }
        }
    }

    fn show_preview(&mut self, session: &mut MapSession, path: &Arc<Path>) {
        let Some(start) = path.start() else {
            return;
        };
        let id = AnimationId::new(PREVIEW_ID);
        let animations = session.animations_mut();
        animations.upsert(id.clone(), EntityId::new(PREVIEW_ID), start);
        let duration_s = path.estimated_duration_s() / TIME_SCALE;
        if animations.assign_path(&id, Arc::clone(path), duration_s).is_ok() {
            self.status = Some(format!(
                "Route: {:.0} m, about {:.1} min{}",
                path.total_distance_m(),
                path.estimated_duration_s() / 60.0,
                if path.water_only() { " by water" } else { "" }
            ));
        }
    }
}

impl SessionHooks for WalkerHooks {
    fn on_load(&mut self, session: &mut MapSession) {
        self.spawn_walkers(session);
    }

    fn on_tick(
        &mut self,
        session: &mut MapSession,
        input: &InputSnapshot,
        _fixed_dt_seconds: f64,
    ) -> HookCommand {
        for index in 0..self.walkers.len() {
            let walker = &self.walkers[index];
            if walker.waiting || walker.failures >= self.destinations.len() {
                continue;
            }
            let arrived = session
                .animations()
                .get(&walker.id)
                .is_some_and(|animated| animated.path().is_none() || animated.is_finished());
            if arrived {
                self.send_walker(session, index);
            }
        }

        if input.right_click_pressed() {
            if let Some(cursor) = input.cursor_position_px() {
                let point = screen_to_geo(cursor, session.view());
                self.handle_route_click(session, point);
            }
        }
        HookCommand::Continue
    }

    fn on_event(&mut self, session: &mut MapSession, event: &SessionEvent) {
        match event {
            SessionEvent::RouteReady { path, .. } => self.show_preview(session, path),
            SessionEvent::RouteFailed { error, .. } => {
                self.status = Some(error.user_message().to_string());
            }
            SessionEvent::BackgroundRouteFinished { key, result } => {
                self.apply_walker_route(session, key, result);
            }
            SessionEvent::Notice(message) => self.status = Some(message.clone()),
            _ => {}
        }
    }

    fn title(&self, session: &MapSession) -> Option<String> {
        let mut title = format!(
            "Canal Map | {} | {} | {} walkers",
            session.config().pathfinding_mode,
            session.controller().mode_kind().as_str(),
            self.walkers.len()
        );
        if !session.animations().is_enabled() {
            title.push_str(" (frozen)");
        }
        if let Some(status) = &self.status {
            title.push_str(" | ");
            title.push_str(status);
        }
        Some(title)
    }

    fn on_unload(&mut self, session: &mut MapSession) {
        for walker in self.walkers.drain(..) {
            session.cancel_background_route(walker.id.as_str());
            session.animations_mut().remove(&walker.id);
        }
        let animations = session.animations_mut();
        animations.remove(&AnimationId::new(PREVIEW_ID));
        debug!(remaining = animations.len(), "walkers_removed");
    }
}
