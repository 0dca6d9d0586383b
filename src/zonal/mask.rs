use geo::{BoundingRect, Contains, Intersects, MultiPolygon, Point};
use serde::{Deserialize, Serialize};

use crate::raster::Raster;

/// Which pixels belong to a polygon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskMode {
    /// Pixel centre strictly inside the polygon.
    #[default]
    Centers,
    /// Any overlap between the pixel square and the polygon.
    AllTouched,
}

/// (row, col) of every pixel selected by `polygon`, in row-major order.
/// The polygon must be in the raster CRS.
pub fn mask_indices(raster: &Raster, polygon: &MultiPolygon<f64>, mode: MaskMode) -> Vec<(usize, usize)> {
    let Some(rect) = polygon.bounding_rect() else { return Vec::new() };
    let Some(window) = raster.window(&rect) else { return Vec::new() };

    let transform = raster.transform();
    let mut indices = Vec::new();
    for row in window.row_start..window.row_end {
        for col in window.col_start..window.col_end {
            let selected = match mode {
                MaskMode::Centers => polygon.contains(&Point::from(transform.pixel_center(row, col))),
                MaskMode::AllTouched => polygon.intersects(&transform.pixel_rect(row, col)),
            };
            if selected { indices.push((row, col)) }
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};
    use ndarray::Array2;

    use super::{mask_indices, MaskMode};
    use crate::{geom::Crs, raster::{GeoTransform, Raster}};

    fn raster() -> Raster {
        Raster::new(Array2::from_elem((4, 4), 1.0), GeoTransform::new(0.0, 4.0, 1.0, 1.0), Crs::WGS84, None).unwrap()
    }

    #[test]
    fn centers_select_pixels_whose_centre_is_inside() {
        // x 0.6..2.4, y 2.6..3.9 holds only the centre (1.5, 3.5).
        let p = MultiPolygon(vec![polygon![(x: 0.6, y: 2.6), (x: 2.4, y: 2.6), (x: 2.4, y: 3.9), (x: 0.6, y: 3.9)]]);
        assert_eq!(mask_indices(&raster(), &p, MaskMode::Centers), vec![(0, 1)]);
    }

    #[test]
    fn all_touched_includes_partial_pixels() {
        let p = MultiPolygon(vec![polygon![(x: 0.6, y: 2.6), (x: 2.4, y: 2.6), (x: 2.4, y: 3.9), (x: 0.6, y: 3.9)]]);
        assert_eq!(
            mask_indices(&raster(), &p, MaskMode::AllTouched),
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)],
        );
    }

    #[test]
    fn polygon_smaller_than_a_pixel_can_select_nothing() {
        let p = MultiPolygon(vec![polygon![(x: 0.1, y: 0.1), (x: 0.2, y: 0.1), (x: 0.2, y: 0.2)]]);
        assert!(mask_indices(&raster(), &p, MaskMode::Centers).is_empty());
        assert_eq!(mask_indices(&raster(), &p, MaskMode::AllTouched), vec![(3, 0)]);
    }

    #[test]
    fn outside_polygon_selects_nothing() {
        let p = MultiPolygon(vec![polygon![(x: 10.0, y: 10.0), (x: 11.0, y: 10.0), (x: 11.0, y: 11.0)]]);
        assert!(mask_indices(&raster(), &p, MaskMode::AllTouched).is_empty());
    }
}
