//! Rasterization of strokes and shape outlines.
//!
//! All primitives overwrite pixels with an opaque color; nothing is blended,
//! so drawing the same primitive twice leaves the buffer unchanged.

use super::{ShapeKind, StrokeStyle};
use image::{Rgba, RgbaImage};
use kurbo::{Circle, Line, ParamCurveNearest, Point, Rect, Shape as _};

/// Thinnest stroke radius, so hairlines still cover the pixels they cross.
const MIN_RADIUS: f64 = 0.5;

/// Integer pixel range `[x0, x1) x [y0, y1)` covered by `rect`, clipped to the image.
fn pixel_span(img: &RgbaImage, rect: Rect) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = img.dimensions();
    let x0 = rect.x0.floor().max(0.0);
    let y0 = rect.y0.floor().max(0.0);
    let x1 = rect.x1.ceil().min(w as f64);
    let y1 = rect.y1.ceil().min(h as f64);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

fn pixel_center(x: u32, y: u32) -> Point {
    Point::new(x as f64 + 0.5, y as f64 + 0.5)
}

/// Draw a round-capped line segment.
pub(crate) fn stroke_line(img: &mut RgbaImage, from: Point, to: Point, style: StrokeStyle) {
    let radius = (style.width / 2.0).max(MIN_RADIUS);
    let line = Line::new(from, to);
    let bounds = Rect::from_points(from, to).inflate(radius, radius);
    let Some((x0, y0, x1, y1)) = pixel_span(img, bounds) else {
        return;
    };

    let color: Rgba<u8> = style.color.opaque().into();
    let radius_sq = radius * radius;
    for y in y0..y1 {
        for x in x0..x1 {
            if line.nearest(pixel_center(x, y), 1e-9).distance_sq <= radius_sq {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Draw an axis-aligned rectangle outline with corners `a` and `b`.
pub(crate) fn stroke_rect(img: &mut RgbaImage, a: Point, b: Point, style: StrokeStyle) {
    let corners = [a, Point::new(b.x, a.y), b, Point::new(a.x, b.y)];
    for i in 0..corners.len() {
        stroke_line(img, corners[i], corners[(i + 1) % corners.len()], style);
    }
}

/// Draw a circle outline centered on `center` passing through `edge`.
pub(crate) fn stroke_circle(img: &mut RgbaImage, center: Point, edge: Point, style: StrokeStyle) {
    let radius = center.distance(edge);
    let half = (style.width / 2.0).max(MIN_RADIUS);
    let bounds = Circle::new(center, radius + half).bounding_box();
    let Some((x0, y0, x1, y1)) = pixel_span(img, bounds) else {
        return;
    };

    let color: Rgba<u8> = style.color.opaque().into();
    for y in y0..y1 {
        for x in x0..x1 {
            if (pixel_center(x, y).distance(center) - radius).abs() <= half {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Draw the outline of `kind` spanning `start` to `end`.
pub(crate) fn stroke_shape(
    img: &mut RgbaImage,
    kind: ShapeKind,
    start: Point,
    end: Point,
    style: StrokeStyle,
) {
    match kind {
        ShapeKind::Rectangle => stroke_rect(img, start, end, style),
        ShapeKind::Circle => stroke_circle(img, start, end, style),
    }
}
