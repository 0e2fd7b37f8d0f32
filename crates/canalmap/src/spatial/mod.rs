mod hit_test;
mod index;

pub use hit_test::{
    hit_threshold_deg, EntityMarker, HitTester, SelectedEntity, DEFAULT_HIT_TOLERANCE_PX,
    MAX_POINT_HIT_DEG,
};
pub use index::{SlotPoint, SpatialIndex};

#[cfg(test)]
mod tests;
