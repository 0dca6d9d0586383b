//! ESRI ASCII grid (`.asc`) reading and writing.

use std::{fs::{self, File}, io::{BufRead, BufReader, BufWriter, Write}, path::Path};

use ndarray::Array2;

use crate::{geom::Crs, raster::{io::{sidecar_crs, Header}, GeoTransform, Raster, RasterError}};

/// Nodata sentinel written for missing pixels.
const NODATA_OUT: f64 = -9999.0;

#[derive(Default)]
struct AsciiHeader {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>, // (value, is_center)
    yll: Option<(f64, bool)>,
    cellsize: Option<f64>,
    dx: Option<f64>,
    dy: Option<f64>,
    nodata: Option<f64>,
}

impl AsciiHeader {
    /// Consume one `key value` line. Returns false when the line is not a header line.
    fn accept(&mut self, path: &Path, line: &str) -> Result<bool, RasterError> {
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else { return Ok(true) };
        if !key.starts_with(|c: char| c.is_ascii_alphabetic()) { return Ok(false) }

        let value = parts.next()
            .ok_or_else(|| RasterError::decode(path, format!("header {key:?} has no value")))?;
        let number = value.parse::<f64>()
            .map_err(|_| RasterError::decode(path, format!("header {key:?} has non-numeric value {value:?}")))?;

        match key.to_ascii_lowercase().as_str() {
            "ncols" => self.ncols = Some(number as usize),
            "nrows" => self.nrows = Some(number as usize),
            "xllcorner" => self.xll = Some((number, false)),
            "xllcenter" => self.xll = Some((number, true)),
            "yllcorner" => self.yll = Some((number, false)),
            "yllcenter" => self.yll = Some((number, true)),
            "cellsize" => self.cellsize = Some(number),
            "dx" => self.dx = Some(number),
            "dy" => self.dy = Some(number),
            "nodata_value" => self.nodata = Some(number),
            other => return Err(RasterError::decode(path, format!("unknown header {other:?}"))),
        }
        Ok(true)
    }

    fn finish(&self, path: &Path, crs: Crs) -> Result<Header, RasterError> {
        let missing = |name: &str| RasterError::decode(path, format!("missing header {name:?}"));
        let cols = self.ncols.ok_or_else(|| missing("ncols"))?;
        let rows = self.nrows.ok_or_else(|| missing("nrows"))?;
        let dx = self.dx.or(self.cellsize).ok_or_else(|| missing("cellsize"))?;
        let dy = self.dy.or(self.cellsize).ok_or_else(|| missing("cellsize"))?;
        let (xll, x_center) = self.xll.ok_or_else(|| missing("xllcorner"))?;
        let (yll, y_center) = self.yll.ok_or_else(|| missing("yllcorner"))?;

        let left = if x_center { xll - dx / 2.0 } else { xll };
        let bottom = if y_center { yll - dy / 2.0 } else { yll };

        let header = Header {
            rows,
            cols,
            transform: GeoTransform::new(left, bottom + rows as f64 * dy, dx, dy),
            crs,
        };
        header.pixel_count(path)?;
        Ok(header)
    }
}

pub(crate) fn read(path: &Path, crs_hint: Option<Crs>) -> Result<Raster, RasterError> {
    let text = fs::read_to_string(path).map_err(|e| RasterError::io(path, e))?;

    let mut header = AsciiHeader::default();
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.peek() {
        if !header.accept(path, line)? { break }
        lines.next();
    }

    let crs = sidecar_crs(path).or(crs_hint).unwrap_or_default();
    let placement = header.finish(path, crs)?;

    let values = lines
        .flat_map(|line| line.split_whitespace())
        .map(|token| token.parse::<f64>()
            .map_err(|_| RasterError::decode(path, format!("bad pixel value {token:?}"))))
        .collect::<Result<Vec<_>, _>>()?;

    let expected = placement.pixel_count(path)?;
    if values.len() != expected {
        return Err(RasterError::decode(path, format!("expected {expected} values, found {}", values.len())));
    }

    let data = Array2::from_shape_vec((placement.rows, placement.cols), values)
        .map_err(|e| RasterError::decode(path, e))?;

    Raster::new(data, placement.transform, placement.crs, header.nodata)
}

pub(crate) fn probe(path: &Path, crs_hint: Option<Crs>) -> Result<Header, RasterError> {
    let file = File::open(path).map_err(|e| RasterError::io(path, e))?;
    let mut header = AsciiHeader::default();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| RasterError::io(path, e))?;
        if !header.accept(path, &line)? { break }
    }
    header.finish(path, sidecar_crs(path).or(crs_hint).unwrap_or_default())
}

pub(crate) fn write(raster: &Raster, path: &Path) -> Result<(), RasterError> {
    let t = raster.transform();
    let file = File::create(path).map_err(|e| RasterError::io(path, e))?;
    let mut out = BufWriter::new(file);

    let mut header = format!(
        "ncols {}\nnrows {}\nxllcorner {}\nyllcorner {}\n",
        raster.cols(),
        raster.rows(),
        t.origin_x,
        t.origin_y - raster.rows() as f64 * t.pixel_height,
    );
    if t.pixel_width == t.pixel_height {
        header += &format!("cellsize {}\n", t.pixel_width);
    } else {
        header += &format!("dx {}\ndy {}\n", t.pixel_width, t.pixel_height);
    }
    header += &format!("NODATA_value {NODATA_OUT}\n");

    let body = raster.data().rows().into_iter()
        .map(|row| row.iter()
            .map(|&v| {
                let missing = !v.is_finite() || raster.nodata().is_some_and(|nd| v == nd);
                if missing { NODATA_OUT.to_string() } else { v.to_string() }
            })
            .collect::<Vec<_>>()
            .join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    out.write_all(header.as_bytes())
        .and_then(|_| out.write_all(body.as_bytes()))
        .and_then(|_| out.write_all(b"\n"))
        .and_then(|_| out.flush())
        .map_err(|e| RasterError::io(path, e))?;

    let prj = path.with_extension("prj");
    fs::write(&prj, raster.crs().to_wkt()).map_err(|e| RasterError::io(prj, e))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use crate::{geom::Crs, raster::{GeoTransform, Raster, RasterError}};

    #[test]
    fn reads_corner_and_center_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.asc");
        fs::write(&path, "ncols 3\nnrows 2\nxllcenter 0.5\nyllcenter 0.5\ncellsize 1\nNODATA_value -1\n1 2 3\n4 -1 6\n").unwrap();

        let r = Raster::read(&path, 1, None).unwrap();
        assert_eq!((r.rows(), r.cols()), (2, 3));
        assert_abs_diff_eq!(r.transform().origin_x, 0.0);
        assert_abs_diff_eq!(r.transform().origin_y, 2.0);
        assert_eq!(r.nodata(), Some(-1.0));
        assert_eq!(r.get(1, 2), 6.0);
        assert_eq!(r.crs(), Crs::WGS84);
    }

    #[test]
    fn oversized_header_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.asc");
        fs::write(&path, "ncols 1e300\nnrows 1e300\nxllcorner 0\nyllcorner 0\ncellsize 1\n1\n").unwrap();

        let err = Raster::read(&path, 1, None).unwrap_err();
        assert!(matches!(err, RasterError::Decode { .. }));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn write_then_read_preserves_grid_and_crs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lst.asc");
        let raster = Raster::new(
            array![[31.25, f64::NAN], [29.0, 30.5]],
            GeoTransform::new(3_100_000.0, -3_000_000.0, 1000.0, 1000.0),
            Crs::WEB_MERCATOR,
            None,
        ).unwrap();
        raster.write_ascii_grid(&path).unwrap();

        let back = Raster::read(&path, 1, None).unwrap();
        assert_eq!(back.crs(), Crs::WEB_MERCATOR);
        assert_eq!(back.nodata(), Some(-9999.0));
        assert_eq!(back.get(0, 0), 31.25);
        assert_eq!(back.get(0, 1), -9999.0);
        assert!(back.transform().approx_eq(raster.transform()));
    }

    #[test]
    fn short_body_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.asc");
        fs::write(&path, "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n").unwrap();
        assert!(matches!(Raster::read(&path, 1, None), Err(RasterError::Decode { .. })));
        assert!(matches!(Raster::read(&path, 2, None), Err(RasterError::BandOutOfRange { .. })));
    }
}
