mod error;
mod path;
mod planner;
mod search;

pub use error::PathError;
pub use path::{Path, PathId, Waypoint};
pub use planner::{PlannerCache, RoutePlanner, WATER_SNAP_RADIUS_M};
pub use search::find_path;
