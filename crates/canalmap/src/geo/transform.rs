use super::{GeoBounds, GeoPoint, ScreenPoint, WorldPoint, REFERENCE_POINT};

/// World units per degree of latitude/longitude.
pub const PLANAR_SCALE: f64 = 20_000.0;
/// Vertical squash applied on the way to screen space; gives the isometric look.
pub const ISOMETRIC_Y_COMPRESSION: f64 = 1.4;
pub const ZOOM_DEFAULT: f64 = 3.0;
pub const ZOOM_MIN: f64 = 1.0;
pub const ZOOM_MAX: f64 = 16.0;
pub const ZOOM_STEP_FACTOR: f64 = 1.1;

pub fn geo_to_world(geo: GeoPoint) -> WorldPoint {
    WorldPoint {
        x: (geo.lng - REFERENCE_POINT.lng) * PLANAR_SCALE,
        y: (geo.lat - REFERENCE_POINT.lat) * PLANAR_SCALE,
    }
}

pub fn world_to_geo(world: WorldPoint) -> GeoPoint {
    GeoPoint {
        lat: world.y / PLANAR_SCALE + REFERENCE_POINT.lat,
        lng: world.x / PLANAR_SCALE + REFERENCE_POINT.lng,
    }
}

pub fn world_to_screen(world: WorldPoint, view: &ViewTransform) -> ScreenPoint {
    let (width, height) = view.canvas_size_f64();
    ScreenPoint {
        x: world.x * view.scale + width * 0.5 + view.offset_x,
        y: -world.y * view.scale * ISOMETRIC_Y_COMPRESSION + height * 0.5 + view.offset_y,
    }
}

pub fn screen_to_world(screen: ScreenPoint, view: &ViewTransform) -> WorldPoint {
    let (width, height) = view.canvas_size_f64();
    WorldPoint {
        x: (screen.x - width * 0.5 - view.offset_x) / view.scale,
        y: -(screen.y - height * 0.5 - view.offset_y) / (view.scale * ISOMETRIC_Y_COMPRESSION),
    }
}

pub fn geo_to_screen(geo: GeoPoint, view: &ViewTransform) -> ScreenPoint {
    world_to_screen(geo_to_world(geo), view)
}

pub fn screen_to_geo(screen: ScreenPoint, view: &ViewTransform) -> GeoPoint {
    world_to_geo(screen_to_world(screen, view))
}

/// Pan/zoom state of one rendering session.
///
/// The scale is always kept inside `[ZOOM_MIN, ZOOM_MAX]`. Every mutator
/// leaves the struct fully updated, so a renderer reading it between two
/// input events never observes a half-applied change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
    width: u32,
    height: u32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl ViewTransform {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            scale: ZOOM_DEFAULT,
            offset_x: 0.0,
            offset_y: 0.0,
            width,
            height,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = clamp_zoom(scale);
        self
    }

    pub fn with_offset(mut self, offset_x: f64, offset_y: f64) -> Self {
        self.set_offset(offset_x, offset_y);
        self
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn canvas_size_f64(&self) -> (f64, f64) {
        (self.width as f64, self.height as f64)
    }

    pub fn center(&self) -> ScreenPoint {
        let (width, height) = self.canvas_size_f64();
        ScreenPoint {
            x: width * 0.5,
            y: height * 0.5,
        }
    }

    pub fn set_offset(&mut self, offset_x: f64, offset_y: f64) {
        if offset_x.is_finite() && offset_y.is_finite() {
            self.offset_x = offset_x;
            self.offset_y = offset_y;
        }
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.set_offset(self.offset_x + dx, self.offset_y + dy);
    }

    /// Rescales while keeping the world point under the viewport centre fixed.
    pub fn zoom_to(&mut self, scale: f64) {
        let target = clamp_zoom(scale);
        if target == self.scale {
            return;
        }
        let ratio = target / self.scale;
        self.offset_x *= ratio;
        self.offset_y *= ratio;
        self.scale = target;
    }

    /// Positive steps zoom in by `ZOOM_STEP_FACTOR` each; fractional steps
    /// come from smooth-scrolling devices.
    pub fn zoom_by_steps(&mut self, steps: f64) {
        if steps == 0.0 || !steps.is_finite() {
            return;
        }
        self.zoom_to(self.scale * ZOOM_STEP_FACTOR.powf(steps));
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn visible_geo_bounds(&self) -> GeoBounds {
        let (width, height) = self.canvas_size_f64();
        let corners = [
            screen_to_geo(ScreenPoint::new(0.0, 0.0), self),
            screen_to_geo(ScreenPoint::new(width, 0.0), self),
            screen_to_geo(ScreenPoint::new(0.0, height), self),
            screen_to_geo(ScreenPoint::new(width, height), self),
        ];
        GeoBounds::from_points(&corners).unwrap_or_else(|| GeoBounds::point(REFERENCE_POINT))
    }
}

fn clamp_zoom(scale: f64) -> f64 {
    if !scale.is_finite() {
        return ZOOM_DEFAULT;
    }
    scale.clamp(ZOOM_MIN, ZOOM_MAX)
}
