use geo::Rect;
use rstar::{RTreeObject, AABB};

/// R-tree entry: the envelope of one shape and its row.
#[derive(Debug, Clone, Copy)]
pub(super) struct ShapeEnvelope {
    row: usize,
    envelope: AABB<[f64; 2]>,
}

impl ShapeEnvelope {
    pub(super) fn new(row: usize, rect: Rect<f64>) -> Self {
        Self { row, envelope: AABB::from_corners(rect.min().into(), rect.max().into()) }
    }

    #[inline] pub(super) fn row(&self) -> usize { self.row }
}

impl RTreeObject for ShapeEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope { self.envelope }
}
