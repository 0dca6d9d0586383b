//! Static choropleth maps.

use std::{io::Write, path::PathBuf};

use anyhow::{anyhow, Result};
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    geom::Crs,
    layer::{FeatureId, FeatureLayer},
    render::{
        basemap::{fetch_tiles, write_basemap},
        color::{value_range, Palette},
        geometry::{multipolygon_to_path, pad_rect, Frame, Viewport},
        legend::{colorbar_height, write_colorbar, Colorbar},
        svg::{escape, line_count, write_text, Anchor, SvgStringWriter, TextStyle},
    },
};

/// How one column is drawn as a choropleth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChoroplethStyle {
    pub column: String,
    /// Map title; defaults to the column name.
    #[serde(default)]
    pub title: Option<String>,
    /// Colour bar label; defaults to the column name.
    #[serde(default)]
    pub legend_label: Option<String>,
    #[serde(default)]
    pub palette: Palette,
    /// Colour scale limits; default to the column's finite min / max.
    #[serde(default)]
    pub vmin: Option<f64>,
    #[serde(default)]
    pub vmax: Option<f64>,
}

impl ChoroplethStyle {
    pub fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
            title: None,
            legend_label: None,
            palette: Palette::default(),
            vmin: None,
            vmax: None,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self { self.title = Some(title.to_string()); self }

    pub fn with_legend_label(mut self, label: &str) -> Self { self.legend_label = Some(label.to_string()); self }

    pub fn with_palette(mut self, palette: Palette) -> Self { self.palette = palette; self }

    pub fn title(&self) -> &str { self.title.as_deref().unwrap_or(&self.column) }

    pub fn legend_label(&self) -> &str { self.legend_label.as_deref().unwrap_or(&self.column) }

    /// Colour scale limits for a set of values, or `None` when nothing is finite and no limits are set.
    pub fn scale(&self, values: &[Option<f64>]) -> Option<(f64, f64)> {
        let data = value_range(values);
        let vmin = self.vmin.or(data.map(|(lo, _)| lo))?;
        let vmax = self.vmax.or(data.map(|(_, hi)| hi))?;
        Some((vmin, vmax))
    }
}

/// Page size and basemap settings for static maps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    pub width: f64,
    pub height: f64,
    /// Draw CartoDB Positron tiles under the polygons.
    pub basemap: bool,
    /// Where tiles are cached (`<dir>/tiles/z/x/y.png`); SVG images reference them relative to it.
    #[serde(skip)]
    pub tile_dir: Option<PathBuf>,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self { width: 1000.0, height: 900.0, basemap: false, tile_dir: None }
    }
}

impl MapOptions {
    /// Tiles are only available when a cache directory is set.
    pub(crate) fn tile_cache(&self) -> Option<&std::path::Path> {
        self.tile_dir.as_deref().filter(|_| self.basemap)
    }
}

/// Feature shapes in Web Mercator, ready for drawing.
pub(crate) struct MapGeometry {
    pub ids: Vec<FeatureId>,
    pub shapes: Vec<MultiPolygon<f64>>,
    pub bounds: geo::Rect<f64>,
}

impl MapGeometry {
    pub(crate) fn of(layer: &FeatureLayer) -> Result<Self> {
        let projected = layer.to_crs(Crs::WEB_MERCATOR)?;
        let bounds = projected.bounds()
            .ok_or_else(|| anyhow!("[render] layer has no geometry to draw"))?;
        Ok(Self {
            ids: projected.ids().to_vec(),
            shapes: projected.geoms().shapes().to_vec(),
            bounds: pad_rect(bounds, 0.03),
        })
    }
}

/// Write the `<style>` block shared by map documents.
pub(crate) fn write_map_styles(writer: &mut impl Write) -> Result<()> {
    writeln!(writer, r##"<defs>
<style>
    .ward {{ stroke: #4d4d4d; stroke-width: 0.3; stroke-opacity: 0.7; fill-rule: evenodd; }}
</style>
</defs>"##)?;
    Ok(())
}

/// Draw one titled map with its colour bar inside `frame`.
/// `id` prefixes element ids so several panels can share a document.
#[allow(clippy::too_many_arguments)]
pub(crate) fn write_map_panel(
    writer: &mut impl Write,
    geometry: &MapGeometry,
    values: &[Option<f64>],
    style: &ChoroplethStyle,
    frame: Frame,
    options: &MapOptions,
    id: &str,
    font_size: f64,
) -> Result<()> {
    let (vmin, vmax) = style.scale(values)
        .ok_or_else(|| anyhow!("[render] column {:?} has no finite values", style.column))?;

    let title_size = font_size * 1.3;
    let title_height = title_size * 1.3 * line_count(style.title()) as f64 + 8.0;
    write_text(writer, frame.center_x(), frame.y + title_size, style.title(),
        TextStyle::new(title_size, Anchor::Middle).bold())?;

    let bar_height = 12.0;
    let legend_height = colorbar_height(bar_height, font_size);
    let map_frame = Frame::new(frame.x, frame.y + title_height, frame.width,
        (frame.height - title_height - legend_height - 10.0).max(10.0));
    let view = Viewport::fit(geometry.bounds, map_frame);

    let tiles = match options.tile_cache() {
        Some(dir) => fetch_tiles(dir, &view).unwrap_or_else(|e| {
            warn!("[render] basemap tiles unavailable, using plain background: {e:#}");
            Vec::new()
        }),
        None => Vec::new(),
    };
    write_basemap(writer, &view, &tiles, &format!("{id}-clip"))?;

    let project = move |c: &geo::Coord<f64>| view.project(c);
    writeln!(writer, r#"<g id="{id}-features">"#)?;
    for ((shape, value), fid) in geometry.shapes.iter().zip(values).zip(&geometry.ids) {
        let path = multipolygon_to_path(shape, &project);
        if path.is_empty() { continue }
        writeln!(writer, r#"<path class="ward" data-id="{}" d="{}" fill="{}"/>"#,
            escape(fid.as_str()), path, style.palette.color_for(*value, vmin, vmax))?;
    }
    writeln!(writer, "</g>")?;

    let drawn = view.drawn_frame();
    let bar_width = (drawn.width * 0.7).clamp(80.0, 480.0);
    let bar = Colorbar {
        palette: &style.palette,
        vmin,
        vmax,
        label: style.legend_label(),
        show_missing: values.iter().any(|v| v.is_none()),
    };
    write_colorbar(writer, &format!("{id}-ramp"),
        Frame::new(frame.center_x() - bar_width / 2.0, map_frame.bottom() + 10.0, bar_width, bar_height),
        &bar, font_size)?;
    Ok(())
}

/// Render a single-column choropleth as an SVG document.
///
/// Polygons are drawn in Web Mercator over a light background (and Positron tiles when
/// `options.basemap` is set), with the title above and a colour bar below.
pub fn render_choropleth_svg(layer: &FeatureLayer, style: &ChoroplethStyle, options: &MapOptions) -> Result<String> {
    let values = layer.column_values(&style.column)?;
    let geometry = MapGeometry::of(layer)?;

    let mut writer = SvgStringWriter::new();
    writer.write_header(options.width, options.height, "#ffffff")?;
    write_map_styles(&mut writer)?;
    write_map_panel(&mut writer, &geometry, &values, style,
        Frame::new(20.0, 16.0, options.width - 40.0, options.height - 32.0), options, "map", 14.0)?;
    writer.write_footer()?;

    debug!("[render] choropleth of {:?}: {} features", style.column, layer.len());
    writer.into_string()
}
