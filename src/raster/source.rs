use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use geo::Rect;
use tracing::info;

use crate::{
    geom::{reproject_rect, Crs},
    layer::FeatureLayer,
    raster::{ImageCollection, NoData, Raster, Reducer},
};

/// The area of interest handed to image sources: an envelope and its CRS.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub bounds: Rect<f64>,
    pub crs: Crs,
}

impl Region {
    pub fn new(bounds: Rect<f64>, crs: Crs) -> Self { Self { bounds, crs } }

    /// Envelope of every feature of a layer.
    pub fn of_layer(layer: &FeatureLayer) -> Result<Self> {
        let bounds = layer.bounds()
            .context("[raster::source] layer has no geometry to derive a region from")?;
        Ok(Self { bounds, crs: layer.crs() })
    }

    /// The same region in another CRS.
    pub fn to_crs(&self, crs: Crs) -> Result<Self> {
        Ok(Self { bounds: reproject_rect(&self.bounds, self.crs, crs)?, crs })
    }
}

/// Something that can produce one composite image for a region.
/// Invalid pixels of the result are NaN; values are not yet rescaled.
pub trait ImageSource {
    /// Short description for logs and reports.
    fn describe(&self) -> String;

    fn composite(&self, region: &Region) -> Result<Raster>;
}

/// A single local raster file.
#[derive(Clone, Debug)]
pub struct LocalRaster {
    pub path: PathBuf,
    pub band: usize,
    pub crs: Option<Crs>,
    pub nodata: NoData,
}

impl ImageSource for LocalRaster {
    fn describe(&self) -> String {
        format!("{} (band {})", self.path.display(), self.band)
    }

    fn composite(&self, _region: &Region) -> Result<Raster> {
        let raster = Raster::read(&self.path, self.band, self.crs)
            .with_context(|| format!("[raster::source] failed to read {}", self.describe()))?;
        Ok(raster.masked(self.nodata))
    }
}

/// A date-filtered, band-selected directory collection reduced to one image.
#[derive(Clone, Debug)]
pub struct CollectionSource {
    pub root: PathBuf,
    pub collection: String,
    pub band: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub reducer: Reducer,
    pub nodata: NoData,
    pub filter_bounds: bool,
    pub crs: Option<Crs>,
}

impl ImageSource for CollectionSource {
    fn describe(&self) -> String {
        let range = match (self.start, self.end) {
            (Some(s), Some(e)) => format!(" {s}..{e}"),
            _ => String::new(),
        };
        format!("{}/{}{}", self.collection, self.band, range)
    }

    fn composite(&self, region: &Region) -> Result<Raster> {
        let mut collection = ImageCollection::open(&self.root, &self.collection)?
            .with_crs_hint(self.crs)
            .select(&self.band);
        if let (Some(start), Some(end)) = (self.start, self.end) {
            collection = collection.filter_date(start, end);
        }
        if self.filter_bounds {
            collection = collection.filter_bounds(&region.bounds, region.crs);
        }
        info!("[raster::source] {}: {} scene(s) selected", self.describe(), collection.len());

        collection.composite(self.reducer, self.nodata)
            .with_context(|| format!("[raster::source] failed to composite {}", self.describe()))
    }
}

/// A raster downloaded once into a content-addressed cache, then read locally.
#[cfg(feature = "download")]
#[derive(Clone, Debug)]
pub struct RemoteRaster {
    pub url: String,
    pub band: usize,
    pub crs: Option<Crs>,
    pub nodata: NoData,
    pub cache_dir: PathBuf,
}

#[cfg(feature = "download")]
impl RemoteRaster {
    /// Where the download is cached.
    pub fn cache_path(&self) -> PathBuf {
        let ext = self.url.rsplit('/').next()
            .and_then(|name| name.split(['?', '#']).next())
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| matches!(ext.as_str(), "tif" | "tiff" | "asc"))
            .unwrap_or_else(|| "tif".to_string());
        crate::common::fs::cache_path(&self.cache_dir, &self.url, &ext)
    }
}

#[cfg(feature = "download")]
impl ImageSource for RemoteRaster {
    fn describe(&self) -> String {
        format!("{} (band {})", self.url, self.band)
    }

    fn composite(&self, region: &Region) -> Result<Raster> {
        use crate::common::download::{download_once, http_client};

        let path = self.cache_path();
        let client = http_client(std::time::Duration::from_secs(300))?;
        if download_once(&client, &self.url, &path)? {
            info!("[raster::source] downloaded {} to {}", self.url, path.display());
        }
        LocalRaster { path, band: self.band, crs: self.crs, nodata: self.nodata }
            .composite(region)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;
    use geo::{Coord, Rect};

    use super::{CollectionSource, ImageSource, LocalRaster, Region};
    use crate::{geom::Crs, raster::{NoData, Reducer}};

    fn region() -> Region {
        Region::new(Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 2.0, y: 1.0 }), Crs::WGS84)
    }

    #[test]
    fn local_raster_applies_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pop.asc");
        fs::write(&path, "ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n12.5 0\n").unwrap();

        let source = LocalRaster { path, band: 1, crs: None, nodata: NoData::NonPositive };
        let raster = source.composite(&region()).unwrap();
        assert_eq!(raster.get(0, 0), 12.5);
        assert!(raster.get(0, 1).is_nan());
    }

    #[test]
    fn collection_source_filters_and_reduces() {
        let dir = tempfile::tempdir().unwrap();
        let band = dir.path().join("ECMWF/ERA5_LAND/HOURLY/temperature_2m");
        fs::create_dir_all(&band).unwrap();
        for (day, value) in [("2023-01-01", 300.0), ("2023-01-02", 302.0), ("2023-02-01", 400.0)] {
            fs::write(band.join(format!("{day}.asc")),
                format!("ncols 1\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n{value}\n")).unwrap();
        }

        let source = CollectionSource {
            root: dir.path().to_path_buf(),
            collection: "ECMWF/ERA5_LAND/HOURLY".to_string(),
            band: "temperature_2m".to_string(),
            start: NaiveDate::from_ymd_opt(2023, 1, 1),
            end: NaiveDate::from_ymd_opt(2023, 2, 1),
            reducer: Reducer::Mean,
            nodata: NoData::NonPositive,
            filter_bounds: true,
            crs: Some(Crs::WGS84),
        };
        let raster = source.composite(&region()).unwrap();
        assert_eq!(raster.get(0, 0), 301.0);
        assert!(source.describe().contains("temperature_2m 2023-01-01..2023-02-01"));
    }
}
