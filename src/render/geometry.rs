//! Map frames and polygon paths.

use geo::{Coord, CoordsIter, LineString, MultiPolygon, Rect};

/// Projection function: map coordinates -> SVG coords (x, y).
pub(crate) type Projection = dyn Fn(&Coord<f64>) -> (f64, f64);

/// A rectangle of the drawing surface, in SVG units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub(crate) const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[inline] pub(crate) fn right(&self) -> f64 { self.x + self.width }

    #[inline] pub(crate) fn bottom(&self) -> f64 { self.y + self.height }

    #[inline] pub(crate) fn center_x(&self) -> f64 { self.x + self.width / 2.0 }
}

/// Uniform scaling of a map extent into a frame, centred, Y down.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Viewport {
    bounds: Rect<f64>,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    /// Fit `bounds` inside `frame`, preserving aspect ratio.
    pub(crate) fn fit(bounds: Rect<f64>, frame: Frame) -> Self {
        let (w, h) = (bounds.width().max(f64::EPSILON), bounds.height().max(f64::EPSILON));
        let scale = (frame.width / w).min(frame.height / h);
        let offset_x = frame.x + (frame.width - w * scale) / 2.0;
        let offset_y = frame.y + (frame.height - h * scale) / 2.0;
        Self { bounds, scale, offset_x, offset_y }
    }

    #[inline] pub(crate) fn scale(&self) -> f64 { self.scale }

    #[inline] pub(crate) fn bounds(&self) -> Rect<f64> { self.bounds }

    #[inline]
    pub(crate) fn project(&self, coord: &Coord<f64>) -> (f64, f64) {
        let x = self.offset_x + (coord.x - self.bounds.min().x) * self.scale;
        let y = self.offset_y + (self.bounds.max().y - coord.y) * self.scale; // invert vertically
        (x, y)
    }

    /// Area actually covered by the map inside its frame.
    pub(crate) fn drawn_frame(&self) -> Frame {
        Frame::new(self.offset_x, self.offset_y,
            self.bounds.width() * self.scale, self.bounds.height() * self.scale)
    }
}

/// Grow a rectangle by a fraction of its larger side on every edge.
pub(crate) fn pad_rect(rect: Rect<f64>, fraction: f64) -> Rect<f64> {
    let pad = rect.width().max(rect.height()) * fraction;
    Rect::new(
        Coord { x: rect.min().x - pad, y: rect.min().y - pad },
        Coord { x: rect.max().x + pad, y: rect.max().y + pad },
    )
}

/// Build a compact SVG path string for a MultiPolygon (exteriors + holes).
pub(crate) fn multipolygon_to_path(shape: &MultiPolygon<f64>, project: &Projection) -> String {
    let mut out = String::new();

    for polygon in &shape.0 {
        out.push_str(&ring_to_path(polygon.exterior(), project));
        for interior in polygon.interiors() {
            out.push_str(&ring_to_path(interior, project));
        }
    }

    out
}

/// Build a compact SVG path string for a LineString (ring).
pub(crate) fn ring_to_path(ring: &LineString<f64>, project: &Projection) -> String {
    let mut out = String::new();

    let mut coords = ring.coords_iter()
        .map(|coord| project(&coord));
    if let Some((x, y)) = coords.next() {
        out.push_str(&format!(" M{x:.2},{y:.2}"));
        for (x, y) in coords {
            out.push_str(&format!(" L{x:.2},{y:.2}"));
        }
        out.push('Z');
    }

    out
}
