//! Raster decoders.

pub(crate) mod ascii;
mod tiff;

use std::path::Path;

use geo::Rect;

use crate::{geom::Crs, raster::{GeoTransform, Raster, RasterError}};

/// Grid placement read without decoding pixels.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Header {
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    pub(crate) transform: GeoTransform,
    pub(crate) crs: Crs,
}

impl Header {
    pub(crate) fn extent(&self) -> Rect<f64> {
        self.transform.extent(self.rows, self.cols)
    }

    /// `rows * cols`, rejecting sizes that overflow.
    pub(crate) fn pixel_count(&self, path: &Path) -> Result<usize, RasterError> {
        self.rows.checked_mul(self.cols).ok_or_else(|| RasterError::decode(path,
            format!("grid size {} x {} is too large", self.rows, self.cols)))
    }
}

enum Format { Tiff, Ascii }

fn format_of(path: &Path) -> Result<Format, RasterError> {
    let ext = path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "tif" | "tiff" => Ok(Format::Tiff),
        "asc" => Ok(Format::Ascii),
        _ => Err(RasterError::UnsupportedFormat { path: path.to_path_buf(), format: format!(".{ext}") }),
    }
}

/// Read one band (1-based) of a raster file.
pub(crate) fn read(path: &Path, band: usize, crs_hint: Option<Crs>) -> Result<Raster, RasterError> {
    match format_of(path)? {
        Format::Tiff => tiff::read(path, band, crs_hint),
        Format::Ascii => {
            if band != 1 {
                return Err(RasterError::BandOutOfRange { path: path.to_path_buf(), band, bands: 1 });
            }
            ascii::read(path, crs_hint)
        }
    }
}

/// Read only the grid placement of a raster file.
pub(crate) fn probe(path: &Path, crs_hint: Option<Crs>) -> Result<Header, RasterError> {
    match format_of(path)? {
        Format::Tiff => tiff::probe(path, crs_hint),
        Format::Ascii => ascii::probe(path, crs_hint),
    }
}

/// CRS of a `.prj` sidecar, if one exists and is recognised.
fn sidecar_crs(path: &Path) -> Option<Crs> {
    let prj = path.with_extension("prj");
    let wkt = std::fs::read_to_string(&prj).ok()?;
    match Crs::from_wkt(&wkt) {
        Ok(crs) => Some(crs),
        Err(e) => {
            tracing::warn!("[raster::io] ignoring {}: {e:#}", prj.display());
            None
        }
    }
}
