use ahash::AHashSet;
use geo::{BoundingRect, Intersects, MapCoords};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    geom::{reproject_rect, Transformer},
    layer::{FeatureId, FeatureLayer},
    raster::{NoData, Raster},
    zonal::{zonal_mean, MaskMode, ZonalError},
};

/// How polygons are reduced against a raster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ExtractionOptions {
    pub mode: MaskMode,
    /// Pixels invalid under this policy are excluded before reduction.
    pub nodata: NoData,
}

/// Per-feature results of one extraction, in layer order.
#[derive(Clone, Debug, Serialize)]
pub struct ExtractionReport {
    pub dataset: String,
    pub values: Vec<(FeatureId, Option<f64>)>,
    pub failures: Vec<(FeatureId, ZonalError)>,
}

impl ExtractionReport {
    /// Features without a value (outside coverage, no valid pixels, or failed).
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|(_, v)| v.is_none()).count()
    }

    pub fn valid_count(&self) -> usize {
        self.values.len() - self.missing_count()
    }

    /// Log one aggregated line for the extraction, plus the failing identifiers.
    pub fn log_summary(&self) {
        info!("[extract] {}: {}/{} features have a value ({} missing, {} failed)",
            self.dataset, self.valid_count(), self.values.len(), self.missing_count(), self.failures.len());

        if !self.failures.is_empty() {
            const SHOWN: usize = 5;
            let listed = self.failures.iter()
                .take(SHOWN)
                .map(|(id, err)| format!("{id}: {err}"))
                .collect::<Vec<_>>()
                .join("; ");
            let more = self.failures.len().saturating_sub(SHOWN);
            if more > 0 {
                warn!("[extract] {} failures: {listed}; and {more} more", self.dataset);
            } else {
                warn!("[extract] {} failures: {listed}", self.dataset);
            }
        }
    }
}

/// Reduce every polygon of `layer` against `raster`.
///
/// The layer is reprojected into the raster CRS feature by feature. Polygons whose envelope
/// misses the raster extent get a missing value without being reprojected. A polygon that cannot be reprojected or is
/// degenerate records a [`ZonalError`] and gets a missing value; the others still run.
pub fn extract(dataset: &str, raster: &Raster, layer: &FeatureLayer, options: &ExtractionOptions) -> anyhow::Result<ExtractionReport> {
    let raster = raster.masked(options.nodata);
    let extent = raster.extent();
    let transformer = Transformer::new(layer.crs(), raster.crs())?;

    // Rows whose envelope meets the raster, looked up in the layer's own CRS.
    let covered = reproject_rect(&extent, raster.crs(), layer.crs())
        .map(|rect| layer.geoms().intersecting(&rect).into_iter().collect::<AHashSet<_>>())
        .ok();

    let mut values = Vec::with_capacity(layer.len());
    let mut failures = Vec::new();
    let mut outside = 0usize;

    for (row, (id, shape)) in layer.ids().iter().zip(layer.geoms().shapes()).enumerate() {
        let skipped = covered.as_ref()
            .is_some_and(|rows| !rows.contains(&row) && shape.bounding_rect().is_some());
        if skipped {
            outside += 1;
            values.push((id.clone(), None));
            continue;
        }

        let projected = if transformer.is_identity() {
            Ok(shape.clone())
        } else {
            shape.try_map_coords(|c| transformer.apply(c))
                .map_err(|e| ZonalError::Reprojection(format!("{e:#}")))
        };

        let value = projected.and_then(|polygon| {
            match polygon.bounding_rect() {
                Some(rect) if !rect.intersects(&extent) => {
                    outside += 1;
                    Ok(None)
                }
                _ => zonal_mean(&raster, &polygon, options.mode).map(|stat| stat.mean),
            }
        });

        match value {
            Ok(value) => values.push((id.clone(), value)),
            Err(err) => {
                debug!("[extract] {dataset}: feature {id}: {err}");
                failures.push((id.clone(), err));
                values.push((id.clone(), None));
            }
        }
    }

    if outside > 0 {
        debug!("[extract] {dataset}: {outside} feature(s) outside raster coverage");
    }

    Ok(ExtractionReport { dataset: dataset.to_string(), values, failures })
}
