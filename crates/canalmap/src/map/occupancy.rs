use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use crate::geo::GeoPoint;

use super::types::{EntityCategory, EntityId, PlacedEntity};

/// Two positions closer than this (per axis, degrees) are the same slot.
pub const OCCUPANCY_TOLERANCE_DEG: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyFilter {
    AnyConstructed,
    Constructed(EntityCategory),
}

impl OccupancyFilter {
    fn matches(self, entity: &PlacedEntity) -> bool {
        if !entity.constructed {
            return false;
        }
        match self {
            OccupancyFilter::AnyConstructed => true,
            OccupancyFilter::Constructed(category) => entity.category == category,
        }
    }
}

/// Registry collaborator answering "is something built here?".
pub trait OccupancyQuery {
    fn is_occupied(&self, point: GeoPoint, tolerance: f64, filter: OccupancyFilter) -> bool;

    /// Whether the entity still exists; markers for missing entities are stale.
    fn is_present(&self, id: &EntityId) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("constructed entity {existing} already occupies the slot requested by {requested}")]
    SlotOccupied {
        existing: EntityId,
        requested: EntityId,
    },
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
}

#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: Vec<PlacedEntity>,
    index_by_id: HashMap<EntityId, usize>,
}

impl EntityRegistry {
    /// Builds the registry, dropping entities that would break the one
    /// constructed entity per slot rule.
    pub fn new(entities: impl IntoIterator<Item = PlacedEntity>) -> Self {
        let mut registry = Self::default();
        for entity in entities {
            if let Err(error) = registry.upsert(entity) {
                warn!(error = %error, "entity_rejected");
            }
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedEntity> {
        self.entities.iter()
    }

    pub fn get(&self, id: &EntityId) -> Option<&PlacedEntity> {
        self.index_by_id
            .get(id)
            .and_then(|index| self.entities.get(*index))
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index_by_id.contains_key(id)
    }

    pub fn upsert(&mut self, entity: PlacedEntity) -> Result<(), RegistryError> {
        if entity.constructed {
            let conflict = self.entities.iter().find(|existing| {
                existing.constructed
                    && existing.id != entity.id
                    && existing
                        .position
                        .approx_eq(entity.position, OCCUPANCY_TOLERANCE_DEG)
            });
            if let Some(existing) = conflict {
                return Err(RegistryError::SlotOccupied {
                    existing: existing.id.clone(),
                    requested: entity.id,
                });
            }
        }

        match self.index_by_id.get(&entity.id) {
            Some(index) => self.entities[*index] = entity,
            None => {
                self.index_by_id
                    .insert(entity.id.clone(), self.entities.len());
                self.entities.push(entity);
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<PlacedEntity> {
        let index = self.index_by_id.remove(id)?;
        let removed = self.entities.remove(index);
        for slot in self.index_by_id.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn set_orientation(&mut self, id: &EntityId, radians: f64) -> Result<(), RegistryError> {
        let index = *self
            .index_by_id
            .get(id)
            .ok_or_else(|| RegistryError::UnknownEntity(id.clone()))?;
        self.entities[index].orientation = Some(crate::geo::normalize_angle(radians));
        Ok(())
    }

    pub fn constructed_at(
        &self,
        point: GeoPoint,
        tolerance: f64,
        filter: OccupancyFilter,
    ) -> Option<&PlacedEntity> {
        self.entities
            .iter()
            .find(|entity| filter.matches(entity) && entity.position.approx_eq(point, tolerance))
    }
}

impl OccupancyQuery for EntityRegistry {
    fn is_occupied(&self, point: GeoPoint, tolerance: f64, filter: OccupancyFilter) -> bool {
        self.constructed_at(point, tolerance, filter).is_some()
    }

    fn is_present(&self, id: &EntityId) -> bool {
        self.contains(id)
    }
}
