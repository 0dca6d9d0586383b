use std::{path::{Path, PathBuf}, sync::OnceLock};

use chrono::NaiveDate;
use geo::{Intersects, Rect};
use ndarray::Array2;
use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    geom::{reproject_rect, Crs},
    raster::{io, NoData, Raster, RasterError, Reducer},
};

/// One dated image file of one band.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub date: NaiveDate,
    pub band: String,
    pub path: PathBuf,
}

/// A filtered view over a directory of dated scenes laid out as
/// `<root>/<collection_id>/<band>/<file containing a date>.(tif|tiff|asc)`.
///
/// Filters narrow the view and never touch the files.
#[derive(Clone, Debug)]
pub struct ImageCollection {
    id: String,
    scenes: Vec<Scene>,
    crs_hint: Option<Crs>,
}

/// `2023-01-31`, `2023_01_31` or `20230131`.
fn ymd_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{4})[-_]?(\d{2})[-_]?(\d{2})").ok()).as_ref()
}

/// MODIS-style `A2023031` (year and day of year) as its own dot- or underscore-separated token.
fn doy_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?:^|[._])A(\d{4})(\d{3})(?:[._]|$)").ok()).as_ref()
}

/// Acquisition date embedded in a scene file name.
///
/// A MODIS `A<year><day>` token wins over calendar dates, since MODIS names also
/// carry a production timestamp.
pub fn scene_date(file_name: &str) -> Option<NaiveDate> {
    if let Some(caps) = doy_pattern()?.captures(file_name) {
        if let (Ok(year), Ok(ordinal)) = (caps[1].parse(), caps[2].parse()) {
            if let Some(date) = NaiveDate::from_yo_opt(year, ordinal) {
                return Some(date);
            }
        }
    }
    for caps in ymd_pattern()?.captures_iter(file_name) {
        let parse = |i: usize| caps[i].parse::<u32>().ok();
        if let (Some(y), Some(m), Some(d)) = (parse(1), parse(2), parse(3)) {
            if let Some(date) = NaiveDate::from_ymd_opt(y as i32, m, d) {
                return Some(date);
            }
        }
    }
    None
}

fn is_raster_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "tif" | "tiff" | "asc"))
}

impl ImageCollection {
    /// Scan `<root>/<collection_id>` for dated scenes, ordered by date then path.
    /// Files without a recognisable date are skipped.
    pub fn open(root: &Path, collection_id: &str) -> Result<Self, RasterError> {
        let dir = root.join(collection_id);
        if !dir.is_dir() {
            return Err(RasterError::EmptyCollection {
                collection: collection_id.to_string(),
                detail: format!(" (no directory {})", dir.display()),
            });
        }

        let mut scenes = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(2).sort_by_file_name() {
            let entry = entry.map_err(|e| RasterError::io(&dir, e.into()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_raster_file(path) { continue }

            let Some(band) = path.strip_prefix(&dir).ok()
                .and_then(|rel| rel.components().next())
                .and_then(|c| c.as_os_str().to_str())
                .map(str::to_string) else { continue };

            let file_name = entry.file_name().to_string_lossy();
            match scene_date(&file_name) {
                Some(date) => scenes.push(Scene { date, band, path: path.to_path_buf() }),
                None => debug!("[raster::collection] skipping undated file {}", path.display()),
            }
        }

        scenes.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
        debug!("[raster::collection] {collection_id}: {} scene(s) under {}", scenes.len(), dir.display());

        Ok(Self { id: collection_id.to_string(), scenes, crs_hint: None })
    }

    /// CRS assumed for scenes that carry none (e.g. ASCII grids without a `.prj`).
    pub fn with_crs_hint(mut self, crs: Option<Crs>) -> Self {
        self.crs_hint = crs;
        self
    }

    #[inline] pub fn id(&self) -> &str { &self.id }

    #[inline] pub fn scenes(&self) -> &[Scene] { &self.scenes }

    #[inline] pub fn len(&self) -> usize { self.scenes.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.scenes.is_empty() }

    /// Distinct band names, sorted.
    pub fn bands(&self) -> Vec<String> {
        let mut bands = self.scenes.iter().map(|s| s.band.clone()).collect::<Vec<_>>();
        bands.sort();
        bands.dedup();
        bands
    }

    /// Keep scenes dated within `[start, end)`.
    pub fn filter_date(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.scenes.retain(|scene| scene.date >= start && scene.date < end);
        self
    }

    /// Keep one band.
    pub fn select(mut self, band: &str) -> Self {
        self.scenes.retain(|scene| scene.band == band);
        self
    }

    /// Keep scenes whose extent intersects a region given in `crs`.
    /// Scenes whose header cannot be read are dropped with a warning.
    pub fn filter_bounds(mut self, region: &Rect<f64>, crs: Crs) -> Self {
        let hint = self.crs_hint;
        self.scenes.retain(|scene| {
            let header = match io::probe(&scene.path, hint) {
                Ok(header) => header,
                Err(e) => {
                    warn!("[raster::collection] dropping {}: {e}", scene.path.display());
                    return false;
                }
            };
            match reproject_rect(region, crs, header.crs) {
                Ok(region) => header.extent().intersects(&region),
                Err(e) => {
                    warn!("[raster::collection] dropping {}: {e:#}", scene.path.display());
                    false
                }
            }
        });
        self
    }

    /// Reduce the remaining scenes of a single band to one image.
    /// Invalid pixels (under `policy`) are ignored; pixels with no valid scene value become NaN.
    pub fn composite(&self, reducer: Reducer, policy: NoData) -> Result<Raster, RasterError> {
        let bands = self.bands();
        if bands.len() > 1 {
            return Err(RasterError::GridMismatch(format!(
                "collection {} mixes bands {}; select one first", self.id, bands.join(", "))));
        }

        let Some(first) = self.scenes.first() else {
            return Err(RasterError::EmptyCollection { collection: self.id.clone(), detail: " after filtering".to_string() });
        };

        let base = Raster::read(&first.path, 1, self.crs_hint)?;
        if reducer == Reducer::First {
            info!("[raster::collection] {}: first scene {} ({})", self.id, first.date, first.path.display());
            return Ok(base.masked(policy));
        }

        let mut sum = Array2::<f64>::zeros(base.data().dim());
        let mut count = Array2::<u32>::zeros(base.data().dim());

        for (i, scene) in self.scenes.iter().enumerate() {
            let raster = if i == 0 { base.clone() } else { Raster::read(&scene.path, 1, self.crs_hint)? };
            if !raster.same_grid(&base) {
                return Err(RasterError::GridMismatch(format!(
                    "{} does not share the grid of {}", scene.path.display(), first.path.display())));
            }
            let nodata = raster.nodata();
            ndarray::Zip::from(&mut sum)
                .and(&mut count)
                .and(raster.data())
                .for_each(|s, c, &v| {
                    if policy.is_valid(v, nodata) {
                        *s += v;
                        *c += 1;
                    }
                });
        }

        let mean = ndarray::Zip::from(&sum)
            .and(&count)
            .map_collect(|&s, &c| if c > 0 { s / c as f64 } else { f64::NAN });

        info!("[raster::collection] {}: mean of {} scene(s) from {} to {}",
            self.id, self.scenes.len(), first.date, self.scenes[self.scenes.len() - 1].date);

        Raster::new(mean, *base.transform(), base.crs(), None)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;
    use geo::{Coord, Rect};

    use super::{scene_date, ImageCollection};
    use crate::{geom::Crs, raster::{NoData, RasterError, Reducer}};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

    fn grid(values: &str, xll: f64) -> String {
        format!("ncols 2\nnrows 1\nxllcorner {xll}\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n{values}\n")
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let band = dir.path().join("MODIS/061/MOD11A2/LST_Day_1km");
        fs::create_dir_all(&band).unwrap();
        fs::write(band.join("2023-01-01.asc"), grid("10 0", 0.0)).unwrap();
        fs::write(band.join("2023-01-09.asc"), grid("20 -9999", 0.0)).unwrap();
        fs::write(band.join("2023-02-01.asc"), grid("40 40", 0.0)).unwrap();
        fs::write(band.join("notes.asc"), grid("1 1", 0.0)).unwrap();
        let qc = dir.path().join("MODIS/061/MOD11A2/QC_Day");
        fs::create_dir_all(&qc).unwrap();
        fs::write(qc.join("20230101.asc"), grid("1 1", 0.0)).unwrap();
        dir
    }

    #[test]
    fn dates_from_file_names() {
        assert_eq!(scene_date("2023-01-31_mosaic.tif"), Some(date(2023, 1, 31)));
        assert_eq!(scene_date("era5_20230115.tif"), Some(date(2023, 1, 15)));
        assert_eq!(scene_date("MOD11A2.A2023009.h20v11.tif"), Some(date(2023, 1, 9)));
        assert_eq!(scene_date("readme.tif"), None);
    }

    #[test]
    fn modis_day_of_year_beats_production_timestamp() {
        // The trailing production stamp contains `20231110`.
        let name = "MOD11A2.A2023201.h20v11.061.2023111040815.tif";
        assert_eq!(scene_date(name), Some(date(2023, 7, 20)));
        assert_eq!(scene_date("MOD13Q1_A2023001_NDVI.asc"), Some(date(2023, 1, 1)));
        // Not a day-of-year token: falls back to the calendar date.
        assert_eq!(scene_date("LANDSAT_2023-03-04.tif"), Some(date(2023, 3, 4)));
    }

    #[test]
    fn date_filter_is_start_inclusive_end_exclusive() {
        let dir = fixture();
        let collection = ImageCollection::open(dir.path(), "MODIS/061/MOD11A2").unwrap()
            .select("LST_Day_1km")
            .filter_date(date(2023, 1, 1), date(2023, 2, 1));
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.scenes()[0].date, date(2023, 1, 1));
    }

    #[test]
    fn mean_composite_ignores_invalid_pixels() {
        let dir = fixture();
        let raster = ImageCollection::open(dir.path(), "MODIS/061/MOD11A2").unwrap()
            .select("LST_Day_1km")
            .filter_date(date(2023, 1, 1), date(2023, 2, 1))
            .composite(Reducer::Mean, NoData::NonPositive)
            .unwrap();
        assert_eq!(raster.get(0, 0), 15.0);
        assert!(raster.get(0, 1).is_nan());
    }

    #[test]
    fn composite_requires_single_band_and_scenes() {
        let dir = fixture();
        let all = ImageCollection::open(dir.path(), "MODIS/061/MOD11A2").unwrap();
        assert_eq!(all.bands(), vec!["LST_Day_1km".to_string(), "QC_Day".to_string()]);
        assert!(matches!(all.composite(Reducer::Mean, NoData::NonPositive), Err(RasterError::GridMismatch(_))));

        let empty = all.select("LST_Day_1km").filter_date(date(2024, 1, 1), date(2024, 2, 1));
        assert!(matches!(empty.composite(Reducer::Mean, NoData::NonPositive), Err(RasterError::EmptyCollection { .. })));
    }

    #[test]
    fn first_reducer_takes_earliest_scene() {
        let dir = fixture();
        let raster = ImageCollection::open(dir.path(), "MODIS/061/MOD11A2").unwrap()
            .select("LST_Day_1km")
            .composite(Reducer::First, NoData::NonPositive)
            .unwrap();
        assert_eq!(raster.get(0, 0), 10.0);
        assert!(raster.get(0, 1).is_nan());
    }

    #[test]
    fn bounds_filter_uses_scene_extent() {
        let dir = tempfile::tempdir().unwrap();
        let band = dir.path().join("UHI/band");
        fs::create_dir_all(&band).unwrap();
        fs::write(band.join("2020-01-01.asc"), grid("1 1", 0.0)).unwrap();
        fs::write(band.join("2020-01-02.asc"), grid("1 1", 50.0)).unwrap();

        let region = Rect::new(Coord { x: 0.5, y: 0.2 }, Coord { x: 1.5, y: 0.8 });
        let collection = ImageCollection::open(dir.path(), "UHI").unwrap()
            .filter_bounds(&region, Crs::WGS84);
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.scenes()[0].date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    }
}
