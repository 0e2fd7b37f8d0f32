use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::geo::GeoPoint;
use crate::map::{string_id, EntityId};
use crate::pathfinding::Path;

use super::interpolate::interpolate_path;

string_id!(AnimationId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnimationError {
    #[error("no animated entity with id {0}")]
    UnknownEntity(AnimationId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedEntity {
    id: AnimationId,
    owner: EntityId,
    path: Option<Arc<Path>>,
    duration_s: f64,
    elapsed_s: f64,
    progress: f64,
    position: GeoPoint,
    display_position: GeoPoint,
}

impl AnimatedEntity {
    fn new(id: AnimationId, owner: EntityId, display_position: GeoPoint) -> Self {
        Self {
            id,
            owner,
            path: None,
            duration_s: 0.0,
            elapsed_s: 0.0,
            progress: 0.0,
            position: display_position,
            display_position,
        }
    }

    pub fn id(&self) -> &AnimationId {
        &self.id
    }

    pub fn owner(&self) -> &EntityId {
        &self.owner
    }

    pub fn path(&self) -> Option<&Arc<Path>> {
        self.path.as_ref()
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn position(&self) -> GeoPoint {
        self.position
    }

    pub fn display_position(&self) -> GeoPoint {
        self.display_position
    }

    pub fn is_finished(&self) -> bool {
        self.path.is_some() && self.progress >= 1.0
    }

    fn refresh_position(&mut self) {
        self.position = match &self.path {
            Some(path) => interpolate_path(path, self.progress).unwrap_or(self.display_position),
            None => self.display_position,
        };
    }
}

/// Per-frame driver for every moving entity.
///
/// All entities advance in one `advance` call; the global enable flag freezes
/// them in place without discarding progress.
#[derive(Debug, Clone)]
pub struct AnimationEngine {
    entities: BTreeMap<AnimationId, AnimatedEntity>,
    enabled: bool,
}

impl Default for AnimationEngine {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            enabled: true,
        }
    }
}

impl AnimationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the entity, or updates owner and fallback position of an
    /// existing one without touching its path.
    pub fn upsert(&mut self, id: AnimationId, owner: EntityId, display_position: GeoPoint) {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.owner = owner;
                entity.display_position = display_position;
                if entity.path.is_none() {
                    entity.position = display_position;
                }
            }
            None => {
                self.entities
                    .insert(id.clone(), AnimatedEntity::new(id, owner, display_position));
            }
        }
    }

    /// Assigns `path` to run over `duration_s` seconds.
    ///
    /// The same path identity keeps the current progress and position; a new
    /// identity restarts from the path's first waypoint. A non-positive
    /// duration falls back to the path's own travel-time estimate.
    pub fn assign_path(
        &mut self,
        id: &AnimationId,
        path: Arc<Path>,
        duration_s: f64,
    ) -> Result<(), AnimationError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| AnimationError::UnknownEntity(id.clone()))?;
        let duration_s = if duration_s.is_finite() && duration_s > 0.0 {
            duration_s
        } else {
            path.estimated_duration_s().max(0.0)
        };

        let same_path = entity
            .path
            .as_ref()
            .is_some_and(|current| current.id() == path.id());
        entity.path = Some(path);
        entity.duration_s = duration_s;
        if same_path {
            entity.elapsed_s = entity.progress * duration_s;
            debug!(entity = %id, progress = entity.progress, "path_reassigned");
            return Ok(());
        }

        entity.elapsed_s = 0.0;
        entity.progress = if duration_s > 0.0 { 0.0 } else { 1.0 };
        entity.refresh_position();
        debug!(entity = %id, duration_s, "path_assigned");
        Ok(())
    }

    pub fn clear_path(&mut self, id: &AnimationId) -> Result<(), AnimationError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| AnimationError::UnknownEntity(id.clone()))?;
        entity.path = None;
        entity.duration_s = 0.0;
        entity.elapsed_s = 0.0;
        entity.progress = 0.0;
        entity.position = entity.display_position;
        Ok(())
    }

    pub fn remove(&mut self, id: &AnimationId) -> Option<AnimatedEntity> {
        self.entities.remove(id)
    }

    /// Drops every entity not named in `in_scope`; returns how many left.
    pub fn retain_scope<'a>(
        &mut self,
        in_scope: impl IntoIterator<Item = &'a AnimationId>,
    ) -> usize {
        let keep: HashSet<&AnimationId> = in_scope.into_iter().collect();
        let before = self.entities.len();
        self.entities.retain(|id, _| keep.contains(id));
        before - self.entities.len()
    }

    pub fn advance(&mut self, delta_s: f64) {
        if !self.enabled || !delta_s.is_finite() || delta_s < 0.0 {
            return;
        }
        for entity in self.entities.values_mut() {
            if entity.path.is_some() {
                entity.elapsed_s = (entity.elapsed_s + delta_s).min(entity.duration_s);
                entity.progress = if entity.duration_s > 0.0 {
                    (entity.elapsed_s / entity.duration_s).clamp(0.0, 1.0)
                } else {
                    1.0
                };
            }
            entity.refresh_position();
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, id: &AnimationId) -> Option<&AnimatedEntity> {
        self.entities.get(id)
    }

    pub fn position(&self, id: &AnimationId) -> Option<GeoPoint> {
        self.entities.get(id).map(AnimatedEntity::position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnimatedEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
