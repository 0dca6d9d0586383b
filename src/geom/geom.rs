use anyhow::{Context, Result};
use geo::{BoundingRect, Centroid, Coord, MapCoords, MultiPolygon, Point, Rect};
use rstar::{RTree, AABB};

use crate::geom::{bbox::ShapeEnvelope, Crs, Transformer};

/// Geometries represents an ordered collection of MultiPolygons in a single CRS,
/// with an R-tree over their bounding boxes.
#[derive(Debug, Clone)]
pub struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<ShapeEnvelope>,
    crs: Crs,
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons.
    /// Empty shapes are kept (so indices line up) but are absent from the R-tree.
    pub fn new(polygons: Vec<MultiPolygon<f64>>, crs: Crs) -> Self {
        Self {
            rtree: RTree::bulk_load(
                polygons.iter().enumerate()
                    .filter_map(|(i, polygon)| polygon.bounding_rect().map(|rect| ShapeEnvelope::new(i, rect)))
                    .collect()
            ),
            shapes: polygons,
            crs,
        }
    }

    /// Get the number of MultiPolygons.
    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    /// Check if there are no MultiPolygons.
    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Get the coordinate reference system of every shape.
    #[inline] pub fn crs(&self) -> Crs { self.crs }

    /// Indices of shapes whose bounding boxes intersect the envelope, in ascending order.
    pub fn query_indices(&self, envelope: &AABB<[f64; 2]>) -> Vec<usize> {
        let mut indices = self.rtree.locate_in_envelope_intersecting(envelope)
            .map(ShapeEnvelope::row)
            .collect::<Vec<_>>();
        indices.sort_unstable();
        indices
    }

    /// Indices of shapes whose bounding boxes intersect `rect`, in ascending order.
    pub fn intersecting(&self, rect: &Rect<f64>) -> Vec<usize> {
        self.query_indices(&AABB::from_corners(rect.min().into(), rect.max().into()))
    }

    /// Compute the bounding rectangle of all MultiPolygons.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.shapes.iter()
            .filter_map(|polygon| polygon.bounding_rect())
            .reduce(|a, b| Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                }
            ))
    }

    /// Compute the centroids of all MultiPolygons.
    pub fn centroids(&self) -> Vec<Point<f64>> {
        self.shapes.iter()
            .map(|polygon| polygon.centroid()
                .unwrap_or(Point::new(f64::NAN, f64::NAN)))
            .collect()
    }

    /// Reproject every shape into `to`, preserving order.
    pub fn reproject(&self, to: Crs) -> Result<Self> {
        let transformer = Transformer::new(self.crs, to)?;
        if transformer.is_identity() {
            return Ok(Self { crs: to, ..self.clone() });
        }

        let shapes = self.shapes.iter().enumerate()
            .map(|(i, shape)| shape.try_map_coords(|coord| transformer.apply(coord))
                .with_context(|| format!("[geom] failed to reproject shape {i} from {} to {to}", self.crs)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(shapes, to))
    }
}
