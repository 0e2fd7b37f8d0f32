mod draw;
mod renderer;

pub use draw::Canvas;
pub use renderer::{MapRenderer, Viewport};
