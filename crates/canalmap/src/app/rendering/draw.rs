//! RGBA8 frame-buffer primitives. Every writer clips against the frame, so
//! callers pass raw projected coordinates.

use crate::geo::ScreenPoint;

/// Longest line the rasterizer walks; anything longer is clipped to the frame
/// first, so this only bounds degenerate input.
const MAX_LINE_STEPS: i64 = 1 << 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32
    }
}

pub fn to_px(point: ScreenPoint) -> (i32, i32) {
    (clamp_coord(point.x), clamp_coord(point.y))
}

fn clamp_coord(value: f64) -> i32 {
    if !value.is_finite() {
        return i32::MIN / 2;
    }
    value.round().clamp(i32::MIN as f64 / 2.0, i32::MAX as f64 / 2.0) as i32
}

pub fn clear(frame: &mut [u8], color: [u8; 4]) {
    for pixel in frame.chunks_exact_mut(4) {
        pixel.copy_from_slice(&color);
    }
}

pub fn write_pixel_rgba_clipped(frame: &mut [u8], canvas: Canvas, x: i32, y: i32, color: [u8; 4]) {
    if !canvas.contains(x, y) {
        return;
    }
    let x = x as usize;
    let y = y as usize;
    let Some(pixel_offset) = y
        .checked_mul(canvas.width as usize)
        .and_then(|row| row.checked_add(x))
    else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    frame[byte_offset..end].copy_from_slice(&color);
}

pub fn draw_square(
    frame: &mut [u8],
    canvas: Canvas,
    cx: i32,
    cy: i32,
    half_size: i32,
    color: [u8; 4],
) {
    for y in (cy - half_size)..=(cy + half_size) {
        for x in (cx - half_size)..=(cx + half_size) {
            write_pixel_rgba_clipped(frame, canvas, x, y, color);
        }
    }
}

pub fn draw_square_outline(
    frame: &mut [u8],
    canvas: Canvas,
    cx: i32,
    cy: i32,
    half_size: i32,
    color: [u8; 4],
) {
    let left = cx - half_size;
    let right = cx + half_size;
    let top = cy - half_size;
    let bottom = cy + half_size;

    for x in left..=right {
        write_pixel_rgba_clipped(frame, canvas, x, top, color);
        write_pixel_rgba_clipped(frame, canvas, x, bottom, color);
    }
    for y in top..=bottom {
        write_pixel_rgba_clipped(frame, canvas, left, y, color);
        write_pixel_rgba_clipped(frame, canvas, right, y, color);
    }
}

pub fn draw_cross(
    frame: &mut [u8],
    canvas: Canvas,
    cx: i32,
    cy: i32,
    half_size: i32,
    color: [u8; 4],
) {
    for offset in -half_size..=half_size {
        write_pixel_rgba_clipped(frame, canvas, cx + offset, cy, color);
        write_pixel_rgba_clipped(frame, canvas, cx, cy + offset, color);
    }
}

pub fn fill_circle(
    frame: &mut [u8],
    canvas: Canvas,
    cx: i32,
    cy: i32,
    radius: i32,
    color: [u8; 4],
) {
    let radius = radius.max(0);
    let radius_sq = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius_sq {
                write_pixel_rgba_clipped(frame, canvas, cx + dx, cy + dy, color);
            }
        }
    }
}

pub fn draw_circle_outline(
    frame: &mut [u8],
    canvas: Canvas,
    cx: i32,
    cy: i32,
    radius: i32,
    color: [u8; 4],
) {
    // Midpoint circle.
    let mut x = radius.max(0);
    let mut y = 0;
    let mut err = 1 - x;
    while x >= y {
        for (px, py) in [
            (x, y),
            (y, x),
            (-y, x),
            (-x, y),
            (-x, -y),
            (-y, -x),
            (y, -x),
            (x, -y),
        ] {
            write_pixel_rgba_clipped(frame, canvas, cx + px, cy + py, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Bresenham line, clipped to the canvas before rasterizing.
pub fn draw_line(
    frame: &mut [u8],
    canvas: Canvas,
    from: (i32, i32),
    to: (i32, i32),
    color: [u8; 4],
) {
    let Some(((x0, y0), (x1, y1))) = clip_segment(canvas, from, to) else {
        return;
    };
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);
    for _ in 0..MAX_LINE_STEPS {
        write_pixel_rgba_clipped(frame, canvas, x as i32, y as i32, color);
        if x == x1 && y == y1 {
            break;
        }
        let doubled = 2 * err;
        if doubled >= dy {
            err += dy;
            x += sx;
        }
        if doubled <= dx {
            err += dx;
            y += sy;
        }
    }
}

pub fn draw_polyline(frame: &mut [u8], canvas: Canvas, points: &[(i32, i32)], color: [u8; 4]) {
    for pair in points.windows(2) {
        draw_line(frame, canvas, pair[0], pair[1], color);
    }
}

/// Even-odd scanline fill of a closed ring.
pub fn fill_polygon(frame: &mut [u8], canvas: Canvas, ring: &[(i32, i32)], color: [u8; 4]) {
    if ring.len() < 3 || canvas.width == 0 || canvas.height == 0 {
        return;
    }
    let min_y = ring.iter().map(|p| p.1).min().unwrap_or(0).max(0);
    let max_y = ring
        .iter()
        .map(|p| p.1)
        .max()
        .unwrap_or(0)
        .min(canvas.height as i32 - 1);
    let mut crossings: Vec<i32> = Vec::with_capacity(ring.len());
    for y in min_y..=max_y {
        crossings.clear();
        let scan = y as f64 + 0.5;
        for (index, &(x0, y0)) in ring.iter().enumerate() {
            let (x1, y1) = ring[(index + 1) % ring.len()];
            let (y0f, y1f) = (y0 as f64, y1 as f64);
            if (y0f <= scan) == (y1f <= scan) {
                continue;
            }
            let t = (scan - y0f) / (y1f - y0f);
            crossings.push((x0 as f64 + t * (x1 - x0) as f64).round() as i32);
        }
        crossings.sort_unstable();
        for span in crossings.chunks_exact(2) {
            let start = span[0].max(0);
            let end = span[1].min(canvas.width as i32 - 1);
            for x in start..=end {
                write_pixel_rgba_clipped(frame, canvas, x, y, color);
            }
        }
    }
}

/// Liang-Barsky clip against the canvas rectangle.
fn clip_segment(
    canvas: Canvas,
    from: (i32, i32),
    to: (i32, i32),
) -> Option<((i64, i64), (i64, i64))> {
    if canvas.width == 0 || canvas.height == 0 {
        return None;
    }
    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let (dx, dy) = ((to.0 - from.0) as f64, (to.1 - from.1) as f64);
    let max_x = canvas.width as f64 - 1.0;
    let max_y = canvas.height as f64 - 1.0;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [(-dx, x0), (dx, max_x - x0), (-dy, y0), (dy, max_y - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    let start = ((x0 + t0 * dx).round() as i64, (y0 + t0 * dy).round() as i64);
    let end = ((x0 + t1 * dx).round() as i64, (y0 + t1 * dy).round() as i64);
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const CANVAS: Canvas = Canvas {
        width: 8,
        height: 6,
    };

    fn frame() -> Vec<u8> {
        vec![0; (CANVAS.width * CANVAS.height * 4) as usize]
    }

    fn pixel(frame: &[u8], x: usize, y: usize) -> [u8; 4] {
        let offset = (y * CANVAS.width as usize + x) * 4;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    fn lit(frame: &[u8]) -> usize {
        frame.chunks_exact(4).filter(|pixel| pixel[3] != 0).count()
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut frame = frame();
        write_pixel_rgba_clipped(&mut frame, CANVAS, -1, 0, RED);
        write_pixel_rgba_clipped(&mut frame, CANVAS, 8, 0, RED);
        write_pixel_rgba_clipped(&mut frame, CANVAS, 0, 6, RED);
        assert_eq!(lit(&frame), 0);
        write_pixel_rgba_clipped(&mut frame, CANVAS, 7, 5, RED);
        assert_eq!(pixel(&frame, 7, 5), RED);
    }

    #[test]
    fn line_covers_both_endpoints() {
        let mut frame = frame();
        draw_line(&mut frame, CANVAS, (1, 1), (6, 4), RED);
        assert_eq!(pixel(&frame, 1, 1), RED);
        assert_eq!(pixel(&frame, 6, 4), RED);
        assert_eq!(lit(&frame), 6);
    }

    #[test]
    fn far_off_canvas_line_is_clipped_not_walked() {
        let mut frame = frame();
        draw_line(&mut frame, CANVAS, (-1_000_000, 2), (1_000_000, 2), RED);
        assert_eq!(lit(&frame), CANVAS.width as usize);
        draw_line(&mut frame, CANVAS, (-50, -50), (-10, -20), RED);
        assert_eq!(lit(&frame), CANVAS.width as usize);
    }

    #[test]
    fn polygon_fill_stays_inside_the_ring() {
        let mut frame = frame();
        fill_polygon(&mut frame, CANVAS, &[(1, 1), (5, 1), (5, 4), (1, 4)], RED);
        assert_eq!(pixel(&frame, 3, 2), RED);
        assert_eq!(pixel(&frame, 0, 0), [0; 4]);
        assert_eq!(pixel(&frame, 7, 5), [0; 4]);
    }

    #[test]
    fn non_finite_projection_lands_off_canvas() {
        let (x, y) = to_px(ScreenPoint { x: f64::NAN, y: 2.0 });
        assert!(!CANVAS.contains(x, y));
    }
}
