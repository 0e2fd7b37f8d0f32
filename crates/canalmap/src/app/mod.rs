mod hooks;
mod input;
mod loop_runner;
mod metrics;
mod pacing;
mod rendering;

pub use hooks::{HookCommand, NoHooks, SessionHooks};
pub use input::{InputSnapshot, Shortcut};
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use pacing::SLOW_FRAME_ENV_VAR;
pub use rendering::{Canvas, MapRenderer, Viewport};
