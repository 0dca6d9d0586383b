//! GeoTIFF decoding: pixel data plus the GeoTIFF placement tags.

use std::{fs::File, io::{BufReader, Read, Seek}, path::Path};

use ndarray::Array2;
use tiff::{decoder::{Decoder, DecodingResult, Limits}, tags::Tag};

use crate::{geom::Crs, raster::{io::{sidecar_crs, Header}, GeoTransform, Raster, RasterError}};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const RASTER_PIXEL_IS_POINT: u16 = 2;

fn open(path: &Path) -> Result<Decoder<BufReader<File>>, RasterError> {
    let file = File::open(path).map_err(|e| RasterError::io(path, e))?;
    Decoder::new(BufReader::new(file))
        .map(|decoder| decoder.with_limits(Limits::unlimited()))
        .map_err(|e| RasterError::decode(path, e))
}

fn tag_f64s<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path, code: u16) -> Result<Option<Vec<f64>>, RasterError> {
    decoder.find_tag(Tag::from_u16_exhaustive(code))
        .map_err(|e| RasterError::decode(path, e))?
        .map(|value| value.into_f64_vec().map_err(|e| RasterError::decode(path, e)))
        .transpose()
}

/// Placement from ModelPixelScale + ModelTiepoint, or from a north-up ModelTransformation.
fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<GeoTransform, RasterError> {
    let scale = tag_f64s(decoder, path, MODEL_PIXEL_SCALE)?;
    let tiepoint = tag_f64s(decoder, path, MODEL_TIEPOINT)?;

    if let (Some(scale), Some(tie)) = (scale, tiepoint) {
        if scale.len() < 2 || tie.len() < 6 {
            return Err(RasterError::decode(path, "truncated ModelPixelScale / ModelTiepoint"));
        }
        let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
        return Ok(GeoTransform::new(x - i * scale[0], y + j * scale[1], scale[0], scale[1]));
    }

    if let Some(m) = tag_f64s(decoder, path, MODEL_TRANSFORMATION)? {
        if m.len() < 8 {
            return Err(RasterError::decode(path, "truncated ModelTransformation"));
        }
        if m[1] != 0.0 || m[4] != 0.0 {
            return Err(RasterError::UnsupportedFormat { path: path.to_path_buf(), format: "rotated grid".to_string() });
        }
        return Ok(GeoTransform::new(m[3], m[7], m[0], -m[5]));
    }

    Err(RasterError::MissingGeoreference { path: path.to_path_buf() })
}

/// Short GeoKey values stored inline in the key directory.
fn geo_key(keys: &[u16], id: u16) -> Option<u16> {
    let count = *keys.get(3)? as usize;
    keys.get(4..4 + 4 * count)?
        .chunks_exact(4)
        .find(|entry| entry[0] == id && entry[1] == 0)
        .map(|entry| entry[3])
}

struct GeoKeys {
    crs: Option<Crs>,
    pixel_is_point: bool,
}

fn read_geo_keys<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<GeoKeys, RasterError> {
    let Some(value) = decoder.find_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
        .map_err(|e| RasterError::decode(path, e))? else {
        return Ok(GeoKeys { crs: None, pixel_is_point: false });
    };
    let keys = value.into_u16_vec().map_err(|e| RasterError::decode(path, e))?;

    let code = geo_key(&keys, PROJECTED_CS_TYPE_KEY)
        .or_else(|| geo_key(&keys, GEOGRAPHIC_TYPE_KEY))
        .filter(|&code| code != 32767); // user-defined
    let crs = match code {
        Some(code) => match Crs::from_epsg(code as u32) {
            Ok(crs) => Some(crs),
            Err(e) => {
                tracing::warn!("[raster::io::tiff] {}: {e:#}", path.display());
                None
            }
        },
        None => None,
    };

    Ok(GeoKeys { crs, pixel_is_point: geo_key(&keys, GT_RASTER_TYPE_KEY) == Some(RASTER_PIXEL_IS_POINT) })
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<Option<f64>, RasterError> {
    let Some(value) = decoder.find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))
        .map_err(|e| RasterError::decode(path, e))? else { return Ok(None) };
    let text = value.into_string().map_err(|e| RasterError::decode(path, e))?;
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    match text.to_ascii_lowercase().as_str() {
        "nan" | "-nan" => Ok(None),
        other => other.parse::<f64>().map(Some)
            .map_err(|_| RasterError::decode(path, format!("bad GDAL_NODATA {text:?}"))),
    }
}

fn read_header<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path, crs_hint: Option<Crs>) -> Result<Header, RasterError> {
    let (width, height) = decoder.dimensions().map_err(|e| RasterError::decode(path, e))?;
    let mut transform = read_transform(decoder, path)?;
    let keys = read_geo_keys(decoder, path)?;

    // PixelIsPoint tiepoints refer to pixel centres.
    if keys.pixel_is_point {
        transform.origin_x -= transform.pixel_width / 2.0;
        transform.origin_y += transform.pixel_height / 2.0;
    }

    let crs = keys.crs
        .or_else(|| sidecar_crs(path))
        .or(crs_hint)
        .unwrap_or_default();

    Ok(Header { rows: height as usize, cols: width as usize, transform, crs })
}

fn to_f64(result: DecodingResult) -> Option<Vec<f64>> {
    Some(match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => return None,
    })
}

pub(super) fn probe(path: &Path, crs_hint: Option<Crs>) -> Result<Header, RasterError> {
    let mut decoder = open(path)?;
    read_header(&mut decoder, path, crs_hint)
}

pub(super) fn read(path: &Path, band: usize, crs_hint: Option<Crs>) -> Result<Raster, RasterError> {
    let mut decoder = open(path)?;
    let header = read_header(&mut decoder, path, crs_hint)?;
    let nodata = read_nodata(&mut decoder, path)?;

    let image = decoder.read_image().map_err(|e| RasterError::decode(path, e))?;
    let pixels = to_f64(image).ok_or_else(|| RasterError::UnsupportedFormat {
        path: path.to_path_buf(),
        format: "pixel sample type".to_string(),
    })?;

    let count = header.pixel_count(path)?;
    if count == 0 || pixels.len() % count != 0 {
        return Err(RasterError::decode(path, format!(
            "{} samples do not fill a {} x {} grid", pixels.len(), header.rows, header.cols)));
    }

    // Multi-sample images come back pixel-interleaved.
    let bands = pixels.len() / count;
    if band == 0 || band > bands {
        return Err(RasterError::BandOutOfRange { path: path.to_path_buf(), band, bands });
    }
    let values = if bands == 1 {
        pixels
    } else {
        pixels.into_iter().skip(band - 1).step_by(bands).collect()
    };

    let data = Array2::from_shape_vec((header.rows, header.cols), values)
        .map_err(|e| RasterError::decode(path, e))?;

    Raster::new(data, header.transform, header.crs, nodata)
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use approx::assert_abs_diff_eq;
    use tiff::{encoder::{colortype, TiffEncoder}, tags::Tag};

    use super::{geo_key, GDAL_NODATA, GEO_KEY_DIRECTORY, MODEL_PIXEL_SCALE, MODEL_TIEPOINT};
    use crate::{geom::Crs, raster::{Raster, RasterError}};

    #[test]
    fn geo_key_lookup_skips_referenced_values() {
        let keys = [1, 1, 0, 3, 1024, 0, 1, 2, 2048, 0, 1, 4326, 3072, 34736, 1, 0];
        assert_eq!(geo_key(&keys, 2048), Some(4326));
        assert_eq!(geo_key(&keys, 3072), None);
        assert_eq!(geo_key(&keys, 9999), None);
    }

    #[test]
    fn reads_georeferenced_float_tiff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lst.tif");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(file).unwrap();
            let mut image = encoder.new_image::<colortype::Gray32Float>(3, 2).unwrap();
            let scale: &[f64] = &[0.01, 0.01, 0.0];
            let tie: &[f64] = &[0.0, 0.0, 0.0, 27.9, -26.1, 0.0];
            let keys: &[u16] = &[1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326];
            image.encoder().write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), scale).unwrap();
            image.encoder().write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), tie).unwrap();
            image.encoder().write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), keys).unwrap();
            image.encoder().write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), "-9999").unwrap();
            image.write_data(&[30.0f32, 31.0, 32.0, 33.0, -9999.0, 35.0]).unwrap();
        }

        let r = Raster::read(&path, 1, None).unwrap();
        assert_eq!((r.rows(), r.cols()), (2, 3));
        assert_eq!(r.crs(), Crs::WGS84);
        assert_eq!(r.nodata(), Some(-9999.0));
        assert_abs_diff_eq!(r.transform().origin_x, 27.9);
        assert_abs_diff_eq!(r.transform().pixel_height, 0.01);
        assert_eq!(r.get(1, 2), 35.0);

        assert!(matches!(Raster::read(&path, 2, None), Err(RasterError::BandOutOfRange { bands: 1, .. })));
    }
}
