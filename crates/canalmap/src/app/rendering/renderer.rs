use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::geo::{geo_to_screen, GeoBounds, GeoPoint, ViewTransform};
use crate::graph::TransportMode;
use crate::interaction::InteractionMode;
use crate::map::{EntityCategory, PointKind};
use crate::session::MapSession;
use crate::spatial::SelectedEntity;

use super::draw::{
    clear, draw_circle_outline, draw_cross, draw_line, draw_polyline, draw_square,
    draw_square_outline, fill_circle, fill_polygon, to_px, Canvas,
};

const WATER_COLOR: [u8; 4] = [28, 66, 96, 255];
const LAND_COLOR: [u8; 4] = [196, 178, 142, 255];
const LAND_OUTLINE_COLOR: [u8; 4] = [120, 98, 70, 255];
const BUILDING_SLOT_COLOR: [u8; 4] = [150, 130, 110, 255];
const CANAL_SLOT_COLOR: [u8; 4] = [90, 160, 210, 255];
const BRIDGE_SLOT_COLOR: [u8; 4] = [150, 90, 50, 255];
const WATER_NODE_COLOR: [u8; 4] = [140, 220, 255, 255];
const WATER_LINK_COLOR: [u8; 4] = [70, 130, 180, 255];
const BUILDING_MARKER_COLOR: [u8; 4] = [200, 60, 50, 255];
const DOCK_MARKER_COLOR: [u8; 4] = [40, 120, 200, 255];
const BRIDGE_MARKER_COLOR: [u8; 4] = [110, 70, 40, 255];
const SELECTION_COLOR: [u8; 4] = [255, 255, 255, 255];
const PENDING_ANGLE_COLOR: [u8; 4] = [255, 210, 60, 255];
const DRAFT_COLOR: [u8; 4] = [255, 140, 0, 255];
const WALKING_ROUTE_COLOR: [u8; 4] = [250, 220, 80, 255];
const WATER_ROUTE_COLOR: [u8; 4] = [0, 230, 210, 255];
const WALKER_COLOR: [u8; 4] = [245, 245, 245, 255];
const WALKER_OUTLINE_COLOR: [u8; 4] = [20, 20, 20, 255];

const SLOT_HALF_SIZE_PX: i32 = 1;
const WATER_NODE_HALF_SIZE_PX: i32 = 3;
const SELECTION_HALF_SIZE_PX: i32 = 9;
const WALKER_RADIUS_PX: i32 = 4;
const ORIENTATION_ARM_PX: f64 = 14.0;
/// Parcels just outside the view still get drawn so outlines don't pop in.
const CULL_MARGIN_DEG: f64 = 0.0005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Software renderer presenting one `MapSession` per frame.
pub struct MapRenderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
}

impl MapRenderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width.max(1), height.max(1), surface)
    }

    pub fn render(&mut self, session: &MapSession) -> Result<(), Error> {
        let canvas = Canvas {
            width: self.viewport.width,
            height: self.viewport.height,
        };
        draw_session(self.pixels.frame_mut(), canvas, session);
        self.pixels.render()
    }
}

/// Paints the whole session into `frame`, back to front.
pub(crate) fn draw_session(frame: &mut [u8], canvas: Canvas, session: &MapSession) {
    clear(frame, WATER_COLOR);
    if canvas.width == 0 || canvas.height == 0 {
        return;
    }
    let view = session.view();
    let visible = view.visible_geo_bounds().expanded(CULL_MARGIN_DEG);

    draw_parcels(frame, canvas, session, view, &visible);
    draw_water_network(frame, canvas, session, view);
    draw_markers(frame, canvas, session, view);
    if let Some(path) = session.active_route() {
        draw_route(frame, canvas, path.waypoints().iter().map(|w| (w.position, w.mode)), view);
    }
    for entity in session.animations().iter() {
        let (x, y) = to_px(geo_to_screen(entity.position(), view));
        fill_circle(frame, canvas, x, y, WALKER_RADIUS_PX + 1, WALKER_OUTLINE_COLOR);
        fill_circle(frame, canvas, x, y, WALKER_RADIUS_PX, WALKER_COLOR);
    }
    draw_interaction(frame, canvas, session, view);
}

fn draw_parcels(
    frame: &mut [u8],
    canvas: Canvas,
    session: &MapSession,
    view: &ViewTransform,
    visible: &GeoBounds,
) {
    let mut ring = Vec::new();
    for parcel in session.index().parcels() {
        let in_view = GeoBounds::from_points(&parcel.boundary)
            .is_some_and(|bounds| bounds.intersects(visible));
        if !in_view {
            continue;
        }
        ring.clear();
        ring.extend(
            parcel
                .boundary
                .iter()
                .map(|vertex| to_px(geo_to_screen(*vertex, view))),
        );
        fill_polygon(frame, canvas, &ring, LAND_COLOR);
        if let Some(&first) = ring.first() {
            ring.push(first);
        }
        draw_polyline(frame, canvas, &ring, LAND_OUTLINE_COLOR);
    }

    for slot in session.index().slots() {
        if !visible.contains(slot.position) {
            continue;
        }
        let (x, y) = to_px(geo_to_screen(slot.position, view));
        match slot.kind {
            PointKind::Building => {
                draw_square(frame, canvas, x, y, SLOT_HALF_SIZE_PX, BUILDING_SLOT_COLOR)
            }
            PointKind::Canal => draw_cross(frame, canvas, x, y, 2, CANAL_SLOT_COLOR),
            PointKind::Bridge => {
                draw_square_outline(frame, canvas, x, y, SLOT_HALF_SIZE_PX + 1, BRIDGE_SLOT_COLOR)
            }
        }
    }
}

fn draw_water_network(
    frame: &mut [u8],
    canvas: Canvas,
    session: &MapSession,
    view: &ViewTransform,
) {
    let nodes = session.water_nodes();
    let mut line = Vec::new();
    for node in nodes {
        for connection in &node.connections {
            let Some(target) = nodes.iter().find(|other| other.id == connection.target_id) else {
                continue;
            };
            line.clear();
            line.push(to_px(geo_to_screen(node.position, view)));
            line.extend(
                connection
                    .intermediate_points
                    .iter()
                    .map(|point| to_px(geo_to_screen(*point, view))),
            );
            line.push(to_px(geo_to_screen(target.position, view)));
            draw_polyline(frame, canvas, &line, WATER_LINK_COLOR);
        }
    }
    for node in nodes {
        let (x, y) = to_px(geo_to_screen(node.position, view));
        draw_square(frame, canvas, x, y, WATER_NODE_HALF_SIZE_PX, WATER_NODE_COLOR);
    }
}

fn draw_markers(frame: &mut [u8], canvas: Canvas, session: &MapSession, view: &ViewTransform) {
    for marker in session.markers() {
        let (x, y) = to_px(geo_to_screen(marker.position, view));
        let radius = marker.radius_px.round() as i32;
        let color = match marker.category {
            EntityCategory::Building => BUILDING_MARKER_COLOR,
            EntityCategory::Dock => DOCK_MARKER_COLOR,
            EntityCategory::Bridge => BRIDGE_MARKER_COLOR,
        };
        fill_circle(frame, canvas, x, y, radius, color);
        if let Some(orientation) = marker.orientation {
            draw_orientation_arm(frame, canvas, (x, y), orientation, BRIDGE_SLOT_COLOR);
        }
    }
}

/// Bridge deck direction; positive angles turn counter-clockwise on screen.
fn draw_orientation_arm(
    frame: &mut [u8],
    canvas: Canvas,
    center: (i32, i32),
    radians: f64,
    color: [u8; 4],
) {
    let dx = (radians.cos() * ORIENTATION_ARM_PX).round() as i32;
    let dy = (radians.sin() * ORIENTATION_ARM_PX).round() as i32;
    draw_line(
        frame,
        canvas,
        (center.0 - dx, center.1 + dy),
        (center.0 + dx, center.1 - dy),
        color,
    );
}

fn draw_route(
    frame: &mut [u8],
    canvas: Canvas,
    points: impl Iterator<Item = (GeoPoint, TransportMode)>,
    view: &ViewTransform,
) {
    let mut previous: Option<((i32, i32), TransportMode)> = None;
    for (position, mode) in points {
        let current = to_px(geo_to_screen(position, view));
        if let Some((from, from_mode)) = previous {
            let color = match from_mode {
                TransportMode::Walking => WALKING_ROUTE_COLOR,
                TransportMode::Water => WATER_ROUTE_COLOR,
            };
            draw_line(frame, canvas, from, current, color);
            draw_line(frame, canvas, (from.0, from.1 + 1), (current.0, current.1 + 1), color);
        }
        previous = Some((current, mode));
    }
}

fn draw_interaction(frame: &mut [u8], canvas: Canvas, session: &MapSession, view: &ViewTransform) {
    let controller = session.controller();
    if let Some(selection) = controller.selection() {
        let position = match selection {
            SelectedEntity::Marker { entity_id, .. } => session
                .markers()
                .iter()
                .find(|marker| &marker.entity_id == entity_id)
                .map(|marker| marker.position),
            SelectedEntity::Point { position, .. } => Some(*position),
            SelectedEntity::Parcel(id) => session
                .index()
                .parcels()
                .find(|parcel| &parcel.id == id)
                .map(|parcel| parcel.center),
        };
        if let Some(position) = position {
            let (x, y) = to_px(geo_to_screen(position, view));
            draw_square_outline(frame, canvas, x, y, SELECTION_HALF_SIZE_PX, SELECTION_COLOR);
        }
    }

    match controller.mode() {
        InteractionMode::OrientBridge {
            bridge_id, pending, ..
        } => {
            let marker = session
                .markers()
                .iter()
                .find(|marker| &marker.entity_id == bridge_id);
            if let Some(marker) = marker {
                let center = to_px(geo_to_screen(marker.position, view));
                draw_circle_outline(
                    frame,
                    canvas,
                    center.0,
                    center.1,
                    ORIENTATION_ARM_PX as i32 + 2,
                    PENDING_ANGLE_COLOR,
                );
                draw_orientation_arm(frame, canvas, center, *pending, PENDING_ANGLE_COLOR);
            }
        }
        InteractionMode::CreateWaterRoute { draft } => {
            let start = draft.start.as_ref().and_then(|id| {
                session
                    .water_nodes()
                    .iter()
                    .find(|node| &node.id == id)
                    .map(|node| node.position)
            });
            let Some(start) = start else {
                return;
            };
            let line: Vec<(i32, i32)> = std::iter::once(start)
                .chain(draft.points.iter().copied())
                .map(|point| to_px(geo_to_screen(point, view)))
                .collect();
            draw_polyline(frame, canvas, &line, DRAFT_COLOR);
            for &(x, y) in &line {
                draw_square_outline(frame, canvas, x, y, 2, DRAFT_COLOR);
            }
        }
        InteractionMode::Normal | InteractionMode::PlaceWaterPoint => {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::geo::ScreenPoint;
    use crate::interaction::{InputEvent, ModeRequest};
    use crate::map::{EntityId, LoadedMap, MapData, WaterNode, WaterNodeId};
    use crate::session::SessionConfig;
    use crate::test_support::{placed, square_parcel, with_building};

    const CANVAS: Canvas = Canvas {
        width: 800,
        height: 600,
    };
    const HOME: GeoPoint = GeoPoint::new(45.4375, 12.3325);

    fn session() -> MapSession {
        let parcel = with_building(square_parcel("p1", 45.437, 12.332, 0.001), "home", HOME);
        let map = LoadedMap {
            data: MapData {
                parcels: vec![parcel],
                entities: vec![placed("house", EntityCategory::Building, HOME, true)],
                water_nodes: vec![WaterNode {
                    id: WaterNodeId::new("w1"),
                    position: GeoPoint::new(45.4362, 12.3321),
                    connections: Vec::new(),
                }],
            },
            skipped: Vec::new(),
        };
        MapSession::new(
            map,
            SessionConfig {
                initial_zoom: 8.0,
                canvas_width: CANVAS.width,
                canvas_height: CANVAS.height,
                ..SessionConfig::default()
            },
        )
    }

    fn pixel_at(frame: &[u8], point: ScreenPoint) -> [u8; 4] {
        let (x, y) = to_px(point);
        let offset = (y as usize * CANVAS.width as usize + x as usize) * 4;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    fn frame() -> Vec<u8> {
        vec![0; (CANVAS.width * CANVAS.height * 4) as usize]
    }

    #[test]
    fn land_water_and_markers_get_their_own_colors() {
        let session = session();
        let mut frame = frame();
        draw_session(&mut frame, CANVAS, &session);

        let view = session.view();
        assert_eq!(pixel_at(&frame, ScreenPoint::new(1.0, 1.0)), WATER_COLOR);
        let marker = geo_to_screen(HOME, view);
        assert_eq!(pixel_at(&frame, marker), BUILDING_MARKER_COLOR);
        let inland = geo_to_screen(GeoPoint::new(45.4372, 12.3322), view);
        assert_eq!(pixel_at(&frame, inland), LAND_COLOR);
        let node = geo_to_screen(GeoPoint::new(45.4362, 12.3321), view);
        assert_eq!(pixel_at(&frame, node), WATER_NODE_COLOR);
    }

    #[test]
    fn selection_is_outlined_around_the_marker() {
        let mut session = session();
        let point = geo_to_screen(HOME, session.view());
        let now = Instant::now();
        session.handle_input(InputEvent::PointerDown(point), now);
        session.handle_input(InputEvent::PointerUp(point), now);
        assert!(matches!(
            session.controller().selection(),
            Some(SelectedEntity::Marker { entity_id, .. }) if entity_id == &EntityId::new("house")
        ));

        let mut frame = frame();
        draw_session(&mut frame, CANVAS, &session);
        let corner = ScreenPoint::new(
            point.x - SELECTION_HALF_SIZE_PX as f64,
            point.y - SELECTION_HALF_SIZE_PX as f64,
        );
        assert_eq!(pixel_at(&frame, corner), SELECTION_COLOR);
    }

    #[test]
    fn zero_sized_canvas_draws_nothing() {
        let mut session = session();
        session
            .controller_mut()
            .request_mode(ModeRequest::CreateWaterRoute);
        let mut empty: Vec<u8> = Vec::new();
        draw_session(
            &mut empty,
            Canvas {
                width: 0,
                height: 0,
            },
            &session,
        );
        assert!(empty.is_empty());
    }
}
