use std::{fs, path::{Path, PathBuf}};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tracing::{error, info};

use crate::{
    common::fs::{ensure_dir_exists, ensure_parent_exists},
    geom::Crs,
    layer::{FeatureLayer, JoinSummary},
    pipeline::config::{DatasetOverlay, DatasetSpec, RunConfig},
    raster::{NoData, Raster, Region},
    render::{
        render_choropleth_svg, render_interactive_html, render_overlay_html, render_overlay_png, render_panels_svg,
        render_statistics_svg, write_map, MapOptions,
    },
    zonal::{extract, ExtractionOptions, ExtractionReport},
};

/// What an output file holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Map,
    Figure,
    Interactive,
    Statistics,
    Composite,
    Vector,
    Table,
}

/// A file written by the run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// A step that failed without stopping the run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepFailure {
    pub step: String,
    pub message: String,
}

/// Everything a run produced, extracted and failed.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    pub extractions: Vec<ExtractionReport>,
    pub joins: Vec<JoinSummary>,
    pub artifacts: Vec<Artifact>,
    pub failures: Vec<StepFailure>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Run one isolated step, recording a failure instead of propagating it.
    fn step<T>(&mut self, name: &str, f: impl FnOnce() -> Result<T>) -> Option<T> {
        match f() {
            Ok(value) => Some(value),
            Err(e) => {
                error!("[run] {name} failed: {e:#}");
                self.failures.push(StepFailure { step: name.to_string(), message: format!("{e:#}") });
                None
            }
        }
    }

    fn wrote(&mut self, kind: ArtifactKind, path: PathBuf) {
        info!("[run] wrote {}", path.display());
        self.artifacts.push(Artifact { kind, path });
    }
}

/// What processing one dataset produced.
struct DatasetRun {
    composite: Raster,
    extraction: ExtractionReport,
    join: JoinSummary,
    exported: Option<PathBuf>,
}

/// Composite, rescale, extract and join one dataset.
fn run_dataset(config: &RunConfig, dataset: &DatasetSpec, layer: &mut FeatureLayer, region: &Region) -> Result<DatasetRun> {
    let source = dataset.source.build(config.data_root(), &config.cache_dir(), dataset.nodata)?;
    info!("[run] {}: compositing {}", dataset.column, source.describe());

    let composite = source.composite(region)?.rescaled(dataset.rescale);

    let exported = match &dataset.export {
        Some(file) => {
            let path = config.output_path(file);
            ensure_parent_exists(&path)?;
            composite.write_ascii_grid(&path)
                .with_context(|| format!("[run] failed to export composite for {}", dataset.column))?;
            Some(path)
        }
        None => None,
    };

    // The composite is already masked; rescaled values may legitimately be zero or negative.
    let options = ExtractionOptions { mode: dataset.mask, nodata: NoData::Declared };
    let extraction = extract(&dataset.column, &composite, layer, &options)?;
    extraction.log_summary();

    let join = layer.join_column(&dataset.column, &extraction.values)?;
    Ok(DatasetRun { composite, extraction, join, exported })
}

/// Write a dataset's overlay image and the page showing it. Returns the page path.
fn write_overlay(config: &RunConfig, overlay: &DatasetOverlay, composite: &Raster) -> Result<PathBuf> {
    let page = config.output_path(&overlay.output);
    let image = DatasetOverlay::image_path(&page);
    if image == page {
        bail!("[run] overlay page {} would be overwritten by its image", page.display());
    }
    let href = image.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("[run] invalid overlay path {}", page.display()))?;

    ensure_parent_exists(&page)?;
    fs::write(&image, render_overlay_png(composite, &overlay.spec)?)
        .with_context(|| format!("[run] Failed to write {}", image.display()))?;
    fs::write(&page, render_overlay_html(composite, &overlay.spec, href)?)
        .with_context(|| format!("[run] Failed to write {}", page.display()))?;
    Ok(page)
}

/// Write rendered SVG (or PNG) for a map-like artifact.
fn write_image(path: &Path, svg: &str, options: &MapOptions) -> Result<()> {
    write_map(path, svg, options.tile_dir.as_deref())
}

/// Run a full batch: load the layer, process every dataset in order, then render and
/// write every configured artifact.
///
/// Loading the input layer (and creating the output directory) are the only fatal
/// steps; any other failure is recorded in the report and the run continues.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    ensure_dir_exists(&config.output_dir)?;
    let mut layer = FeatureLayer::read(&config.input, config.id_field.as_deref())
        .with_context(|| format!("[run] failed to load input layer {}", config.input.display()))?;
    info!("[run] loaded {} features from {} ({})", layer.len(), config.input.display(), layer.crs());

    let options = MapOptions { tile_dir: Some(config.output_dir.clone()), ..config.map_options.clone() };
    let mut report = RunReport::default();

    let region = report.step("region", || Region::of_layer(&layer));

    for dataset in &config.datasets {
        let Some(region) = region.as_ref() else { break };
        let step = format!("dataset {}", dataset.column);
        let Some(outcome) = report.step(&step, || run_dataset(config, dataset, &mut layer, region)) else {
            continue;
        };
        report.extractions.push(outcome.extraction);
        report.joins.push(outcome.join);
        if let Some(path) = outcome.exported {
            report.wrote(ArtifactKind::Composite, path);
        }

        if let Some(map) = &dataset.map {
            let path = config.output_path(&map.output);
            let style = map.style(&dataset.column);
            if report.step(&format!("map {}", dataset.column), || {
                write_image(&path, &render_choropleth_svg(&layer, &style, &options)?, &options)
            }).is_some() {
                report.wrote(ArtifactKind::Map, path);
            }
        }

        if let Some(overlay) = &dataset.overlay {
            if let Some(page) = report.step(&format!("overlay {}", dataset.column), || write_overlay(config, overlay, &outcome.composite)) {
                report.wrote(ArtifactKind::Interactive, page);
            }
        }
    }

    for map in &config.maps {
        let path = config.output_path(&map.output);
        if report.step(&format!("map {}", map.style.column), || {
            write_image(&path, &render_choropleth_svg(&layer, &map.style, &options)?, &options)
        }).is_some() {
            report.wrote(ArtifactKind::Map, path);
        }
    }

    for figure in &config.figures {
        let path = config.output_path(&figure.output);
        if report.step(&format!("figure {}", figure.output.display()), || {
            let svg = render_panels_svg(&layer, &figure.panels, figure.ncols, &figure.title, figure.footnote.as_deref(), &options)?;
            write_image(&path, &svg, &options)
        }).is_some() {
            report.wrote(ArtifactKind::Figure, path);
        }
    }

    if let Some(interactive) = &config.interactive {
        let path = config.output_path(&interactive.output);
        if report.step("interactive map", || {
            let html = render_interactive_html(&layer, &interactive.spec)?;
            ensure_parent_exists(&path)?;
            fs::write(&path, html).with_context(|| format!("[run] Failed to write {}", path.display()))
        }).is_some() {
            report.wrote(ArtifactKind::Interactive, path);
        }
    }

    if let Some(statistics) = &config.statistics {
        let path = config.output_path(&statistics.output);
        if report.step("statistics", || {
            write_image(&path, &render_statistics_svg(&layer, &statistics.spec)?, &options)
        }).is_some() {
            report.wrote(ArtifactKind::Statistics, path);
        }
    }

    let joined = config.output_path(&config.joined);
    if report.step("joined layer", || {
        ensure_parent_exists(&joined)?;
        layer.to_crs(Crs::WGS84)?.write_geojson(&joined)
    }).is_some() {
        report.wrote(ArtifactKind::Vector, joined);
    }

    if let Some(csv) = &config.csv {
        let path = config.output_path(csv);
        if report.step("csv export", || {
            ensure_parent_exists(&path)?;
            layer.write_csv(&path)
        }).is_some() {
            report.wrote(ArtifactKind::Table, path);
        }
    }

    info!("[run] done: {} artifact(s), {} failure(s)", report.artifacts.len(), report.failures.len());
    Ok(report)
}
