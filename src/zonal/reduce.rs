use geo::{BoundingRect, CoordsIter, MultiPolygon};
use serde::Serialize;
use thiserror::Error;

use crate::{raster::{NoData, Raster}, zonal::{mask_indices, MaskMode}};

/// Per-polygon failure. The polygon's value becomes missing and extraction continues.
#[derive(Clone, Debug, Error, PartialEq, Serialize)]
pub enum ZonalError {
    #[error("reprojection failed: {0}")]
    Reprojection(String),

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

/// Mean of the valid pixels under one polygon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ZonalStat {
    /// `None` when no valid pixel lies under the polygon.
    pub mean: Option<f64>,
    /// Pixels selected by the polygon.
    pub count: usize,
    /// Selected pixels holding a valid value.
    pub valid: usize,
}

/// Arithmetic mean of the valid pixels of `raster` selected by `polygon` (same CRS).
/// Non-finite pixels and the declared nodata value are invalid; mask the raster first for other policies.
pub fn zonal_mean(raster: &Raster, polygon: &MultiPolygon<f64>, mode: MaskMode) -> Result<ZonalStat, ZonalError> {
    if polygon.0.is_empty() || polygon.bounding_rect().is_none() {
        return Err(ZonalError::DegenerateGeometry("empty geometry".to_string()));
    }
    if polygon.coords_iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
        return Err(ZonalError::DegenerateGeometry("non-finite coordinate".to_string()));
    }

    let indices = mask_indices(raster, polygon, mode);
    let (sum, valid) = indices.iter()
        .map(|&(row, col)| raster.get(row, col))
        .filter(|&v| raster.is_valid(v, NoData::Declared))
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));

    Ok(ZonalStat {
        mean: (valid > 0).then(|| sum / valid as f64),
        count: indices.len(),
        valid,
    })
}
