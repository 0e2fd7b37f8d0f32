mod controller;
mod events;
mod rate_limit;

pub use controller::{
    InteractionContext, InteractionController, InteractionMode, WaterRouteDraft,
    BRIDGE_ROTATION_STEP, CLICK_SLOP_PX, DRAG_ROTATION_PX, MIN_WATER_POINT_SPACING_M,
};
pub use events::{
    ControllerEvent, EventQueue, InputEvent, Key, ModeKind, ModeRequest, WaterPointRejection,
};
pub use rate_limit::{RateLimiter, DEFAULT_MIN_INTERVAL};
