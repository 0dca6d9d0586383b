use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    geom::Crs,
    raster::{CollectionSource, ImageSource, LocalRaster, NoData, Reducer, Rescale},
    render::{ChoroplethStyle, InteractiveSpec, MapOptions, OverlaySpec, Palette, StatisticsSpec},
    zonal::MaskMode,
};

fn default_band() -> usize { 1 }

fn default_ncols() -> usize { 2 }

fn default_joined() -> PathBuf { PathBuf::from("joined.geojson") }

/// Where a dataset's composite image comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
    /// A single raster file (GeoTIFF or ASCII grid), relative to the data root.
    Local {
        path: PathBuf,
        #[serde(default = "default_band")]
        band: usize,
        #[serde(default)]
        crs: Option<Crs>,
    },
    /// A dated scene collection `<data_root>/<collection>/<band>/...`.
    Collection {
        collection: String,
        band: String,
        #[serde(default)]
        start: Option<NaiveDate>,
        /// Exclusive.
        #[serde(default)]
        end: Option<NaiveDate>,
        #[serde(default)]
        reducer: Reducer,
        #[serde(default)]
        filter_bounds: bool,
        #[serde(default)]
        crs: Option<Crs>,
    },
    /// A raster downloaded once into the cache directory.
    Remote {
        url: String,
        #[serde(default = "default_band")]
        band: usize,
        #[serde(default)]
        crs: Option<Crs>,
    },
}

impl SourceSpec {
    /// Build the image source, masking pixels with `nodata`.
    pub fn build(&self, data_root: &Path, cache_dir: &Path, nodata: NoData) -> Result<Box<dyn ImageSource>> {
        let source: Box<dyn ImageSource> = match self {
            SourceSpec::Local { path, band, crs } => Box::new(LocalRaster {
                path: data_root.join(path),
                band: *band,
                crs: *crs,
                nodata,
            }),
            SourceSpec::Collection { collection, band, start, end, reducer, filter_bounds, crs } => Box::new(CollectionSource {
                root: data_root.to_path_buf(),
                collection: collection.clone(),
                band: band.clone(),
                start: *start,
                end: *end,
                reducer: *reducer,
                nodata,
                filter_bounds: *filter_bounds,
                crs: *crs,
            }),
            #[cfg(feature = "download")]
            SourceSpec::Remote { url, band, crs } => Box::new(crate::raster::RemoteRaster {
                url: url.clone(),
                band: *band,
                crs: *crs,
                nodata,
                cache_dir: cache_dir.to_path_buf(),
            }),
            #[cfg(not(feature = "download"))]
            SourceSpec::Remote { url, .. } => {
                let _ = cache_dir;
                anyhow::bail!("[pipeline::config] remote source {url} needs the `download` feature")
            }
        };
        Ok(source)
    }
}

/// Map drawn for a dataset column right after it is joined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetMap {
    pub output: PathBuf,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub legend_label: Option<String>,
    #[serde(default)]
    pub palette: Palette,
    #[serde(default)]
    pub vmin: Option<f64>,
    #[serde(default)]
    pub vmax: Option<f64>,
}

impl DatasetMap {
    pub fn style(&self, column: &str) -> ChoroplethStyle {
        ChoroplethStyle {
            column: column.to_string(),
            title: self.title.clone(),
            legend_label: self.legend_label.clone(),
            palette: self.palette.clone(),
            vmin: self.vmin,
            vmax: self.vmax,
        }
    }
}

/// Interactive page showing a dataset's composite over the basemap.
/// The colourised image is written next to the page, as `<output stem>.png`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetOverlay {
    #[serde(flatten)]
    pub spec: OverlaySpec,
    pub output: PathBuf,
}

impl DatasetOverlay {
    /// Path of the overlay image for a page written at `page`.
    pub fn image_path(page: &Path) -> PathBuf {
        page.with_extension("png")
    }
}

/// One raster dataset reduced per polygon and joined as a column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub column: String,
    pub source: SourceSpec,
    /// Applied to the composite before extraction.
    #[serde(default)]
    pub rescale: Rescale,
    /// Which raw pixel values are missing.
    #[serde(default)]
    pub nodata: NoData,
    #[serde(default)]
    pub mask: MaskMode,
    #[serde(default)]
    pub map: Option<DatasetMap>,
    #[serde(default)]
    pub overlay: Option<DatasetOverlay>,
    /// Write the rescaled composite as an ASCII grid.
    #[serde(default)]
    pub export: Option<PathBuf>,
}

/// A static map of a column already in the table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapSpec {
    #[serde(flatten)]
    pub style: ChoroplethStyle,
    pub output: PathBuf,
}

/// A multi-panel map figure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FigureSpec {
    pub title: String,
    #[serde(default = "default_ncols")]
    pub ncols: usize,
    #[serde(default)]
    pub footnote: Option<String>,
    pub panels: Vec<ChoroplethStyle>,
    pub output: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractiveOutput {
    #[serde(flatten)]
    pub spec: InteractiveSpec,
    pub output: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatisticsOutput {
    #[serde(flatten)]
    pub spec: StatisticsSpec,
    pub output: PathBuf,
}

/// A complete batch run, read from JSON.
///
/// Relative `input`, `output_dir`, `data_root` and `cache_dir` paths are resolved against
/// the configuration file's directory by [`RunConfig::load`]; artifact paths are relative
/// to `output_dir`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub input: PathBuf,
    #[serde(default)]
    pub id_field: Option<String>,
    pub output_dir: PathBuf,
    /// Base directory of local rasters and collections; defaults to the config directory.
    #[serde(default)]
    pub data_root: Option<PathBuf>,
    /// Download cache; defaults to `<output_dir>/cache`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub datasets: Vec<DatasetSpec>,
    #[serde(default)]
    pub maps: Vec<MapSpec>,
    #[serde(default)]
    pub figures: Vec<FigureSpec>,
    #[serde(default)]
    pub interactive: Option<InteractiveOutput>,
    #[serde(default)]
    pub statistics: Option<StatisticsOutput>,
    /// Joined table as GeoJSON, always in EPSG:4326.
    #[serde(default = "default_joined")]
    pub joined: PathBuf,
    #[serde(default)]
    pub csv: Option<PathBuf>,
    #[serde(default)]
    pub map_options: MapOptions,
}

impl RunConfig {
    /// Read a configuration file and resolve its paths.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("[pipeline::config] Failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("[pipeline::config] invalid run configuration {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new("."));
        Ok(config.resolved(base))
    }

    /// Make the top-level directories absolute against `base`.
    pub fn resolved(mut self, base: &Path) -> Self {
        self.input = base.join(&self.input);
        self.output_dir = base.join(&self.output_dir);
        self.data_root = Some(base.join(self.data_root.as_deref().unwrap_or(Path::new(""))));
        self.cache_dir = self.cache_dir.as_deref().map(|dir| base.join(dir));
        self
    }

    pub fn data_root(&self) -> &Path {
        self.data_root.as_deref().unwrap_or(Path::new("."))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| self.output_dir.join("cache"))
    }

    /// Location of an artifact under the output directory.
    pub fn output_path(&self, file: &Path) -> PathBuf {
        self.output_dir.join(file)
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use chrono::NaiveDate;
    use serde_json::json;

    use super::{DatasetOverlay, RunConfig, SourceSpec};
    use crate::{raster::{NoData, Reducer, Rescale}, zonal::MaskMode};

    fn config() -> serde_json::Value {
        json!({
            "input": "data/wards.geojson",
            "id_field": "WardID_",
            "output_dir": "out",
            "datasets": [
                {
                    "column": "LST",
                    "source": { "type": "collection", "collection": "MOD11A2", "band": "LST_Day_1km",
                                "start": "2023-01-01", "end": "2023-12-31" },
                    "rescale": { "scale": 0.02, "offset": -273.15 },
                    "map": { "output": "lst.png", "title": "Land Surface Temperature", "palette": "RdYlBu_r" },
                    "overlay": { "output": "html/lst.html", "title": "Land Surface Temperature",
                                 "vmin": 20, "vmax": 40, "palette": ["#0000ff", "#ffff00", "#ff0000"] }
                },
                {
                    "column": "POP",
                    "source": { "type": "local", "path": "worldpop.tif" },
                    "nodata": { "value": -99999.0 },
                    "mask": "all-touched"
                }
            ],
            "maps": [{ "column": "HVI", "palette": "YlOrRd", "output": "hvi.svg" }],
            "interactive": { "column": "HVI", "title": "Heat Vulnerability", "output": "map.html",
                             "tooltip": [{ "field": "WardID_", "alias": "Ward ID:" }] },
            "statistics": { "value": "HVI", "x": "LST", "y": "NDVI", "group": "LISA_Type", "output": "stats.png" }
        })
    }

    #[test]
    fn parses_sources_and_defaults() {
        let config: RunConfig = serde_json::from_value(config()).unwrap();
        let lst = &config.datasets[0];
        assert_eq!(lst.rescale, Rescale::new(0.02, -273.15));
        assert_eq!(lst.nodata, NoData::NonPositive);
        assert_eq!(lst.mask, MaskMode::Centers);
        match &lst.source {
            SourceSpec::Collection { start, end, reducer, filter_bounds, .. } => {
                assert_eq!(*start, NaiveDate::from_ymd_opt(2023, 1, 1));
                assert_eq!(*end, NaiveDate::from_ymd_opt(2023, 12, 31));
                assert_eq!(*reducer, Reducer::Mean);
                assert!(!filter_bounds);
            }
            other => panic!("unexpected source {other:?}"),
        }
        assert_eq!(lst.map.as_ref().unwrap().style("LST").title(), "Land Surface Temperature");

        let overlay = lst.overlay.as_ref().unwrap();
        assert_eq!((overlay.spec.vmin, overlay.spec.vmax), (20.0, 40.0));
        assert_eq!(overlay.spec.palette.stops().len(), 3);
        assert_eq!(overlay.spec.zoom, 10);
        assert_eq!(DatasetOverlay::image_path(&overlay.output), PathBuf::from("html/lst.png"));

        let pop = &config.datasets[1];
        assert!(pop.overlay.is_none());
        assert_eq!(pop.nodata, NoData::Value(-99999.0));
        assert_eq!(pop.mask, MaskMode::AllTouched);
        assert!(matches!(&pop.source, SourceSpec::Local { band: 1, .. }));

        assert_eq!(config.maps[0].style.column, "HVI");
        assert_eq!(config.interactive.as_ref().unwrap().spec.zoom, 10);
        assert_eq!(config.statistics.as_ref().unwrap().spec.group.as_deref(), Some("LISA_Type"));
        assert_eq!(config.joined, PathBuf::from("joined.geojson"));
    }

    #[test]
    fn paths_resolve_against_config_directory() {
        let config: RunConfig = serde_json::from_value(config()).unwrap();
        let config = config.resolved(Path::new("/runs/jhb"));
        assert_eq!(config.input, PathBuf::from("/runs/jhb/data/wards.geojson"));
        assert_eq!(config.output_path(Path::new("hvi.svg")), PathBuf::from("/runs/jhb/out/hvi.svg"));
        assert_eq!(config.cache_dir(), PathBuf::from("/runs/jhb/out/cache"));
        assert_eq!(config.data_root(), Path::new("/runs/jhb/"));
    }

    #[test]
    fn unknown_source_type_is_rejected() {
        let mut value = config();
        value["datasets"][0]["source"]["type"] = json!("earth_engine");
        assert!(serde_json::from_value::<RunConfig>(value).is_err());
    }
}
