use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// North-up affine grid placement: upper-left corner of pixel (0, 0) and pixel size.
/// Rows run southwards, so `pixel_height` is positive and y decreases with the row index.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

/// A block of pixels, half-open on both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Window {
    #[inline] pub fn rows(&self) -> usize { self.row_end - self.row_start }
    #[inline] pub fn cols(&self) -> usize { self.col_end - self.col_start }
    #[inline] pub fn is_empty(&self) -> bool { self.rows() == 0 || self.cols() == 0 }
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self { origin_x, origin_y, pixel_width, pixel_height }
    }

    /// World coordinate of the centre of a pixel.
    pub fn pixel_center(&self, row: usize, col: usize) -> Coord<f64> {
        Coord {
            x: self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            y: self.origin_y - (row as f64 + 0.5) * self.pixel_height,
        }
    }

    /// World envelope of a single pixel.
    pub fn pixel_rect(&self, row: usize, col: usize) -> Rect<f64> {
        let x0 = self.origin_x + col as f64 * self.pixel_width;
        let y0 = self.origin_y - row as f64 * self.pixel_height;
        Rect::new(
            Coord { x: x0, y: y0 - self.pixel_height },
            Coord { x: x0 + self.pixel_width, y: y0 },
        )
    }

    /// World envelope of a `rows` x `cols` grid.
    pub fn extent(&self, rows: usize, cols: usize) -> Rect<f64> {
        Rect::new(
            Coord { x: self.origin_x, y: self.origin_y - rows as f64 * self.pixel_height },
            Coord { x: self.origin_x + cols as f64 * self.pixel_width, y: self.origin_y },
        )
    }

    /// Fractional (row, col) of a world coordinate.
    pub fn to_pixel(&self, coord: Coord<f64>) -> (f64, f64) {
        (
            (self.origin_y - coord.y) / self.pixel_height,
            (coord.x - self.origin_x) / self.pixel_width,
        )
    }

    /// Pixels touching an envelope, clipped to a `rows` x `cols` grid.
    /// Returns `None` when the envelope misses the grid.
    pub fn window(&self, rect: &Rect<f64>, rows: usize, cols: usize) -> Option<Window> {
        let (r0, c0) = self.to_pixel(Coord { x: rect.min().x, y: rect.max().y });
        let (r1, c1) = self.to_pixel(Coord { x: rect.max().x, y: rect.min().y });

        let clip = |v: f64, n: usize| v.clamp(0.0, n as f64) as usize;
        let window = Window {
            row_start: clip(r0.floor(), rows),
            row_end: clip(r1.ceil(), rows),
            col_start: clip(c0.floor(), cols),
            col_end: clip(c1.ceil(), cols),
        };

        if r1 < 0.0 || c1 < 0.0 || r0 > rows as f64 || c0 > cols as f64 || window.is_empty() {
            return None;
        }
        Some(window)
    }

    /// Same placement within a tolerance of a thousandth of a pixel.
    pub fn approx_eq(&self, other: &Self) -> bool {
        let tol_x = self.pixel_width.abs() * 1e-3;
        let tol_y = self.pixel_height.abs() * 1e-3;
        (self.origin_x - other.origin_x).abs() <= tol_x
            && (self.origin_y - other.origin_y).abs() <= tol_y
            && (self.pixel_width - other.pixel_width).abs() <= tol_x
            && (self.pixel_height - other.pixel_height).abs() <= tol_y
    }
}
