mod engine;
mod interpolate;

pub use engine::{AnimatedEntity, AnimationEngine, AnimationError, AnimationId};
pub use interpolate::interpolate_path;
