use std::path::Path;

use geo::{Coord, Rect};
use ndarray::Array2;

use crate::{geom::Crs, raster::{io, GeoTransform, NoData, RasterError, Rescale, Window}};

/// A single-band grid of `f64` values placed on the ground by a [`GeoTransform`].
#[derive(Clone, Debug)]
pub struct Raster {
    data: Array2<f64>,
    transform: GeoTransform,
    crs: Crs,
    nodata: Option<f64>,
}

impl Raster {
    pub fn new(data: Array2<f64>, transform: GeoTransform, crs: Crs, nodata: Option<f64>) -> Result<Self, RasterError> {
        if !(transform.pixel_width > 0.0 && transform.pixel_height > 0.0) {
            return Err(RasterError::InvalidGrid(format!(
                "pixel size must be positive, got {} x {}", transform.pixel_width, transform.pixel_height)));
        }
        if data.is_empty() {
            return Err(RasterError::InvalidGrid("grid has no pixels".to_string()));
        }
        Ok(Self { data, transform, crs, nodata })
    }

    /// Read one band (1-based) of a GeoTIFF (`.tif`, `.tiff`) or ESRI ASCII grid (`.asc`).
    /// `crs_hint` is used when the file does not carry its own CRS.
    pub fn read(path: &Path, band: usize, crs_hint: Option<Crs>) -> Result<Self, RasterError> {
        io::read(path, band, crs_hint)
    }

    /// Write the grid as an ESRI ASCII grid with a `.prj` sidecar. Missing pixels become -9999.
    pub fn write_ascii_grid(&self, path: &Path) -> Result<(), RasterError> {
        io::ascii::write(self, path)
    }

    #[inline] pub fn rows(&self) -> usize { self.data.nrows() }

    #[inline] pub fn cols(&self) -> usize { self.data.ncols() }

    #[inline] pub fn data(&self) -> &Array2<f64> { &self.data }

    #[inline] pub fn transform(&self) -> &GeoTransform { &self.transform }

    #[inline] pub fn crs(&self) -> Crs { self.crs }

    /// Declared nodata value, if the source carried one.
    #[inline] pub fn nodata(&self) -> Option<f64> { self.nodata }

    #[inline] pub fn get(&self, row: usize, col: usize) -> f64 { self.data[[row, col]] }

    pub fn extent(&self) -> Rect<f64> {
        self.transform.extent(self.rows(), self.cols())
    }

    pub fn pixel_center(&self, row: usize, col: usize) -> Coord<f64> {
        self.transform.pixel_center(row, col)
    }

    /// Pixels touching an envelope in the raster CRS, clipped to the grid.
    pub fn window(&self, rect: &Rect<f64>) -> Option<Window> {
        self.transform.window(rect, self.rows(), self.cols())
    }

    /// Check whether a pixel value is usable under a policy, honouring the declared nodata value.
    #[inline]
    pub fn is_valid(&self, value: f64, policy: NoData) -> bool {
        policy.is_valid(value, self.nodata)
    }

    /// Copy with every invalid pixel replaced by NaN.
    pub fn masked(&self, policy: NoData) -> Self {
        let nodata = self.nodata;
        Self {
            data: self.data.mapv(|v| if policy.is_valid(v, nodata) { v } else { f64::NAN }),
            ..self.clone()
        }
    }

    /// Copy with `value * scale + offset` applied to valid pixels.
    /// Declared nodata pixels become NaN so they cannot be rescaled into valid values.
    pub fn rescaled(&self, rescale: Rescale) -> Self {
        if rescale.is_identity() { return self.clone() }
        let nodata = self.nodata;
        Self {
            data: self.data.mapv(|v| {
                if nodata.is_some_and(|nd| v == nd) { f64::NAN } else { rescale.apply(v) }
            }),
            nodata: None,
            ..self.clone()
        }
    }

    /// Number of pixels holding a finite value other than the declared nodata value.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| NoData::Declared.is_valid(v, self.nodata)).count()
    }

    /// Same grid shape, placement and CRS.
    pub fn same_grid(&self, other: &Self) -> bool {
        self.data.dim() == other.data.dim()
            && self.crs == other.crs
            && self.transform.approx_eq(&other.transform)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::Raster;
    use crate::{geom::Crs, raster::{GeoTransform, NoData, Rescale}};

    fn raster() -> Raster {
        Raster::new(
            array![[1.0, 0.0, -5.0], [f64::NAN, -9999.0, 2.5]],
            GeoTransform::new(0.0, 2.0, 1.0, 1.0),
            Crs::WGS84,
            Some(-9999.0),
        ).unwrap()
    }

    #[test]
    fn masking_follows_policy() {
        let r = raster().masked(NoData::NonPositive);
        assert_eq!(r.valid_count(), 2);
        assert!(r.get(0, 1).is_nan());

        let r = raster().masked(NoData::Declared);
        assert_eq!(r.valid_count(), 4);
        assert_eq!(r.get(0, 2), -5.0);
    }

    #[test]
    fn rescale_skips_missing_pixels() {
        let r = raster().masked(NoData::NonPositive).rescaled(Rescale::new(0.0001, 0.0));
        assert!((r.get(1, 2) - 0.00025).abs() < 1e-12);
        assert!(r.get(1, 1).is_nan());
        assert!(r.get(1, 0).is_nan());
        assert_eq!(r.nodata(), None);
    }

    #[test]
    fn rejects_degenerate_grids() {
        let err = Raster::new(array![[1.0]], GeoTransform::new(0.0, 0.0, 0.0, 1.0), Crs::WGS84, None);
        assert!(err.is_err());
    }
}
