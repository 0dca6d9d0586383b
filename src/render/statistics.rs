//! Statistics figure: histogram with KDE, coloured scatter, grouped boxplot and
//! correlation heatmap on a 2x2 grid.

use std::{collections::BTreeMap, io::Write};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    layer::FeatureLayer,
    render::{
        color::{value_range, Palette, Rgb, MISSING_COLOR},
        geometry::Frame,
        legend::{colorbar_height, format_tick, nice_step, nice_ticks, write_colorbar, Colorbar},
        svg::{line_count, write_text, write_text_rotated, Anchor, SvgStringWriter, TextStyle},
    },
    stats::{auto_bins, correlation_matrix, finite, gaussian_kde, histogram, BoxStats},
};

const WIDTH: f64 = 1400.0;
const MARGIN: f64 = 30.0;
const GUTTER: f64 = 40.0;
const CELL_HEIGHT: f64 = 540.0;

const TICK_SIZE: f64 = 11.0;
const LABEL_SIZE: f64 = 13.0;
const PANEL_TITLE_SIZE: f64 = 15.0;
const TITLE_SIZE: f64 = 20.0;

const HISTOGRAM_FILL: &str = "#440154";
const KDE_STROKE: &str = "#22a884";

/// Optional panel titles; each has a default built from the column labels.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelTitles {
    pub histogram: Option<String>,
    pub scatter: Option<String>,
    pub boxplot: Option<String>,
    pub heatmap: Option<String>,
}

/// Which columns the statistics figure summarises.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSpec {
    #[serde(default = "default_title")]
    pub title: String,
    /// Column shown in the histogram and the boxplot.
    pub value: String,
    /// Scatter axes.
    pub x: String,
    pub y: String,
    /// Scatter colour; defaults to `value`.
    #[serde(default)]
    pub hue: Option<String>,
    /// Categorical column for the boxplot; the panel is left out when absent.
    #[serde(default)]
    pub group: Option<String>,
    /// Columns of the correlation heatmap; defaults to value, x and y.
    #[serde(default)]
    pub correlation: Vec<String>,
    /// Axis labels by column name.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub titles: PanelTitles,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_title() -> String { "Statistical Analysis".to_string() }

impl StatisticsSpec {
    pub fn new(value: &str, x: &str, y: &str) -> Self {
        Self {
            title: default_title(),
            value: value.to_string(),
            x: x.to_string(),
            y: y.to_string(),
            hue: None,
            group: None,
            correlation: Vec::new(),
            labels: BTreeMap::new(),
            titles: PanelTitles::default(),
            notes: None,
        }
    }

    fn label<'a>(&'a self, column: &'a str) -> &'a str {
        self.labels.get(column).map_or(column, String::as_str)
    }

    fn hue(&self) -> &str { self.hue.as_deref().unwrap_or(&self.value) }

    fn correlation_columns(&self) -> Vec<&str> {
        if self.correlation.is_empty() {
            vec![self.value.as_str(), self.x.as_str(), self.y.as_str()]
        } else {
            self.correlation.iter().map(String::as_str).collect()
        }
    }
}

/// Value range padded by a fraction of its width; degenerate ranges are widened.
fn padded(lo: f64, hi: f64, fraction: f64) -> (f64, f64) {
    let span = hi - lo;
    if span > 0.0 {
        (lo - span * fraction, hi + span * fraction)
    } else {
        let pad = if lo.abs() > 0.0 { lo.abs() * 0.1 } else { 1.0 };
        (lo - pad, hi + pad)
    }
}

/// A plot area with linear x and y scales.
struct Axes {
    plot: Frame,
    x: (f64, f64),
    y: (f64, f64),
}

impl Axes {
    fn new(plot: Frame, x: (f64, f64), y: (f64, f64)) -> Self {
        Self { plot, x, y }
    }

    fn sx(&self, v: f64) -> f64 {
        self.plot.x + (v - self.x.0) / (self.x.1 - self.x.0) * self.plot.width
    }

    fn sy(&self, v: f64) -> f64 {
        self.plot.bottom() - (v - self.y.0) / (self.y.1 - self.y.0) * self.plot.height
    }

    /// Frame, grid, y ticks and (when `numeric_x`) x ticks, plus axis labels.
    fn write(&self, writer: &mut impl Write, x_label: &str, y_label: &str, numeric_x: bool) -> Result<()> {
        let p = self.plot;
        let tick = TextStyle::new(TICK_SIZE, Anchor::End);

        let y_step = nice_step(self.y.1 - self.y.0, 5);
        for v in nice_ticks(self.y.0, self.y.1, 5) {
            let y = self.sy(v);
            writeln!(writer, r##"<line x1="{:.2}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" stroke="#e0e0e0" stroke-width="0.6"/>"##, p.x, p.right())?;
            write_text(writer, p.x - 6.0, y + TICK_SIZE * 0.35, &format_tick(v, y_step), tick)?;
        }
        if numeric_x {
            let x_step = nice_step(self.x.1 - self.x.0, 5);
            for v in nice_ticks(self.x.0, self.x.1, 5) {
                let x = self.sx(v);
                writeln!(writer, r##"<line x1="{x:.2}" y1="{:.2}" x2="{x:.2}" y2="{:.2}" stroke="#444444" stroke-width="0.6"/>"##, p.bottom(), p.bottom() + 4.0)?;
                write_text(writer, x, p.bottom() + 6.0 + TICK_SIZE, &format_tick(v, x_step), TextStyle::new(TICK_SIZE, Anchor::Middle))?;
            }
            write_text(writer, p.center_x(), p.bottom() + 14.0 + TICK_SIZE + LABEL_SIZE, x_label, TextStyle::new(LABEL_SIZE, Anchor::Middle))?;
        }
        writeln!(writer, r##"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="#444444" stroke-width="0.8"/>"##,
            p.x, p.y, p.width, p.height)?;
        write_text_rotated(writer, p.x - 48.0, p.y + p.height / 2.0, y_label, TextStyle::new(LABEL_SIZE, Anchor::Middle), -90.0)?;
        Ok(())
    }
}

/// Write a panel title and return the frame left below it.
fn panel_title(writer: &mut impl Write, cell: Frame, title: &str) -> Result<Frame> {
    write_text(writer, cell.center_x(), cell.y + PANEL_TITLE_SIZE, title, TextStyle::new(PANEL_TITLE_SIZE, Anchor::Middle).bold())?;
    let used = PANEL_TITLE_SIZE * 1.25 * line_count(title) as f64 + 14.0;
    Ok(Frame::new(cell.x, cell.y + used, cell.width, cell.height - used))
}

fn write_histogram(writer: &mut impl Write, cell: Frame, layer: &FeatureLayer, spec: &StatisticsSpec) -> Result<()> {
    let label = spec.label(&spec.value);
    let default_title = format!("Distribution of {label}");
    let body = panel_title(writer, cell, spec.titles.histogram.as_deref().unwrap_or(&default_title))?;

    let values = finite(&layer.column_values(&spec.value)?);
    let Some(hist) = histogram(&values, auto_bins(&values)) else {
        bail!("[render::statistics] {:?} has no values for a histogram", spec.value);
    };
    let scale = values.len() as f64 * hist.bin_width();
    let kde = gaussian_kde(&values, 200).into_iter()
        .map(|(x, density)| (x, density * scale))
        .collect::<Vec<_>>();

    let x_lo = kde.first().map_or(hist.edges[0], |&(x, _)| x.min(hist.edges[0]));
    let x_hi = kde.last().map_or(hist.edges[hist.edges.len() - 1], |&(x, _)| x.max(hist.edges[hist.edges.len() - 1]));
    let y_hi = kde.iter().map(|&(_, y)| y).fold(hist.max_count() as f64, f64::max) * 1.08;

    let plot = Frame::new(body.x + 70.0, body.y, body.width - 90.0, body.height - 56.0);
    let axes = Axes::new(plot, padded(x_lo, x_hi, 0.0), (0.0, y_hi.max(1.0)));
    axes.write(writer, label, "Frequency", true)?;

    for (i, &count) in hist.counts.iter().enumerate() {
        let (x0, x1) = (axes.sx(hist.edges[i]), axes.sx(hist.edges[i + 1]));
        let (y0, y1) = (axes.sy(count as f64), axes.sy(0.0));
        writeln!(writer, r##"<rect x="{x0:.2}" y="{y0:.2}" width="{:.2}" height="{:.2}" fill="{HISTOGRAM_FILL}" fill-opacity="0.7" stroke="#ffffff" stroke-width="0.8"/>"##,
            x1 - x0, y1 - y0)?;
    }
    if !kde.is_empty() {
        let points = kde.iter()
            .map(|&(x, y)| format!("{:.2},{:.2}", axes.sx(x), axes.sy(y)))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, r#"<polyline points="{points}" fill="none" stroke="{KDE_STROKE}" stroke-width="2"/>"#)?;
    }
    Ok(())
}

fn write_scatter(writer: &mut impl Write, cell: Frame, layer: &FeatureLayer, spec: &StatisticsSpec) -> Result<()> {
    let hue = spec.hue();
    let default_title = format!("Relationship: {} vs {}\nColored by {}", spec.x, spec.y, hue);
    let body = panel_title(writer, cell, spec.titles.scatter.as_deref().unwrap_or(&default_title))?;

    let xs = layer.column_values(&spec.x)?;
    let ys = layer.column_values(&spec.y)?;
    let hues = layer.column_values(hue)?;
    let points = xs.iter().zip(&ys).zip(&hues)
        .filter_map(|((x, y), h)| Some((((*x)?, (*y)?), *h)))
        .collect::<Vec<_>>();
    if points.is_empty() {
        bail!("[render::statistics] no rows with both {:?} and {:?}", spec.x, spec.y);
    }

    let xr = value_range(&xs).unwrap_or((0.0, 1.0));
    let yr = value_range(&ys).unwrap_or((0.0, 1.0));
    let legend_h = colorbar_height(10.0, LABEL_SIZE * 0.9);
    let plot = Frame::new(body.x + 70.0, body.y, body.width - 90.0, body.height - 60.0 - legend_h);
    let axes = Axes::new(plot, padded(xr.0, xr.1, 0.05), padded(yr.0, yr.1, 0.05));
    axes.write(writer, spec.label(&spec.x), spec.label(&spec.y), true)?;

    let palette = Palette::named("viridis")?;
    let (hmin, hmax) = value_range(&hues).unwrap_or((0.0, 1.0));
    for &((x, y), h) in &points {
        writeln!(writer, r#"<circle cx="{:.2}" cy="{:.2}" r="4" fill="{}" fill-opacity="0.6"/>"#,
            axes.sx(x), axes.sy(y), palette.color_for(h, hmin, hmax))?;
    }

    let bar = Colorbar {
        palette: &palette,
        vmin: hmin,
        vmax: hmax,
        label: spec.label(hue),
        show_missing: points.iter().any(|(_, h)| h.is_none()),
    };
    let bar_width = plot.width * 0.6;
    write_colorbar(writer, "scatter-ramp",
        Frame::new(plot.center_x() - bar_width / 2.0, plot.bottom() + 52.0, bar_width, 10.0),
        &bar, LABEL_SIZE * 0.9)?;
    Ok(())
}

/// Values of `value` grouped by the text of `group`, in category order.
fn grouped(layer: &FeatureLayer, value: &str, group: &str) -> Result<Vec<(String, Vec<f64>)>> {
    let values = layer.column_values(value)?;
    let groups = layer.column_strings(group)?;
    let mut by_group: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (v, g) in values.iter().zip(groups) {
        if let (Some(v), Some(g)) = (v, g) {
            by_group.entry(g).or_default().push(*v);
        }
    }
    Ok(by_group.into_iter().collect())
}

fn write_boxplot(writer: &mut impl Write, cell: Frame, layer: &FeatureLayer, spec: &StatisticsSpec, group: &str) -> Result<()> {
    let default_title = format!("{} Distribution by {}", spec.value, group);
    let body = panel_title(writer, cell, spec.titles.boxplot.as_deref().unwrap_or(&default_title))?;

    let boxes = grouped(layer, &spec.value, group)?.into_iter()
        .filter_map(|(name, values)| BoxStats::of(&values).map(|stats| (name, stats)))
        .collect::<Vec<_>>();
    if boxes.is_empty() {
        bail!("[render::statistics] no grouped values for {:?} by {:?}", spec.value, group);
    }

    let lo = boxes.iter().map(|(_, b)| b.outliers.iter().copied().fold(b.whisker_low, f64::min)).fold(f64::INFINITY, f64::min);
    let hi = boxes.iter().map(|(_, b)| b.outliers.iter().copied().fold(b.whisker_high, f64::max)).fold(f64::NEG_INFINITY, f64::max);

    let plot = Frame::new(body.x + 70.0, body.y, body.width - 90.0, body.height - 110.0);
    let n = boxes.len() as f64;
    let axes = Axes::new(plot, (0.0, n), padded(lo, hi, 0.05));
    axes.write(writer, "", spec.label(&spec.value), false)?;

    let palette = Palette::named("RdYlBu_r")?;
    for (i, (name, stats)) in boxes.iter().enumerate() {
        let center = axes.sx(i as f64 + 0.5);
        let half = plot.width / n * 0.3;
        let fill: Rgb = palette.at((i as f64 + 0.5) / n);
        let (q1, q3, med) = (axes.sy(stats.q1), axes.sy(stats.q3), axes.sy(stats.median));
        let (wl, wh) = (axes.sy(stats.whisker_low), axes.sy(stats.whisker_high));

        writeln!(writer, r##"<line x1="{center:.2}" y1="{wl:.2}" x2="{center:.2}" y2="{q1:.2}" stroke="#333333" stroke-width="1"/>"##)?;
        writeln!(writer, r##"<line x1="{center:.2}" y1="{q3:.2}" x2="{center:.2}" y2="{wh:.2}" stroke="#333333" stroke-width="1"/>"##)?;
        for y in [wl, wh] {
            writeln!(writer, r##"<line x1="{:.2}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" stroke="#333333" stroke-width="1"/>"##,
                center - half / 2.0, center + half / 2.0)?;
        }
        writeln!(writer, r##"<rect x="{:.2}" y="{q3:.2}" width="{:.2}" height="{:.2}" fill="{fill}" stroke="#333333" stroke-width="1"/>"##,
            center - half, 2.0 * half, (q1 - q3).max(0.5))?;
        writeln!(writer, r##"<line x1="{:.2}" y1="{med:.2}" x2="{:.2}" y2="{med:.2}" stroke="#111111" stroke-width="1.6"/>"##,
            center - half, center + half)?;
        for &outlier in &stats.outliers {
            writeln!(writer, r##"<circle cx="{center:.2}" cy="{:.2}" r="2.5" fill="none" stroke="#333333" stroke-width="0.8"/>"##, axes.sy(outlier))?;
        }
        write_text_rotated(writer, center, plot.bottom() + 14.0, name, TextStyle::new(TICK_SIZE, Anchor::End), -45.0)?;
    }
    write_text(writer, plot.center_x(), body.bottom() - 4.0, spec.label(group), TextStyle::new(LABEL_SIZE, Anchor::Middle))?;
    Ok(())
}

fn write_heatmap(writer: &mut impl Write, cell: Frame, layer: &FeatureLayer, spec: &StatisticsSpec) -> Result<()> {
    let body = panel_title(writer, cell, spec.titles.heatmap.as_deref().unwrap_or("Correlation Matrix of Key Variables"))?;

    let mut names = Vec::new();
    let mut columns = Vec::new();
    for name in spec.correlation_columns() {
        match layer.column_values(name) {
            Ok(values) => { names.push(name); columns.push(values) }
            Err(_) => warn!("[render::statistics] correlation column {name:?} not found, skipped"),
        }
    }
    if names.len() < 2 {
        bail!("[render::statistics] correlation heatmap needs at least two columns");
    }
    let matrix = correlation_matrix(&columns);

    let legend_h = colorbar_height(10.0, LABEL_SIZE * 0.9);
    let label_space = 120.0;
    let side = (body.width - label_space - 30.0).min(body.height - legend_h - 70.0);
    let grid = Frame::new(body.x + label_space + (body.width - label_space - side) / 2.0, body.y, side, side);
    let cell_size = side / names.len() as f64;

    let palette = Palette::named("RdBu_r")?;
    for (i, row) in matrix.iter().enumerate() {
        for (j, r) in row.iter().enumerate() {
            let (x, y) = (grid.x + j as f64 * cell_size, grid.y + i as f64 * cell_size);
            let fill = r.map_or(MISSING_COLOR, |r| palette.at((r + 1.0) / 2.0));
            writeln!(writer, r##"<rect x="{x:.2}" y="{y:.2}" width="{cell_size:.2}" height="{cell_size:.2}" fill="{fill}" stroke="#ffffff" stroke-width="1"/>"##)?;
            let text = r.map_or_else(|| "n/a".to_string(), |r| format!("{r:.2}"));
            let style = TextStyle {
                fill: if fill.luminance() < 0.5 { "#ffffff" } else { "#111111" },
                ..TextStyle::new(TICK_SIZE + 1.0, Anchor::Middle)
            };
            write_text(writer, x + cell_size / 2.0, y + cell_size / 2.0 + 4.0, &text, style)?;
        }
    }
    for (i, name) in names.iter().enumerate() {
        let c = (i as f64 + 0.5) * cell_size;
        write_text(writer, grid.x - 6.0, grid.y + c + 4.0, name, TextStyle::new(TICK_SIZE, Anchor::End))?;
        write_text_rotated(writer, grid.x + c, grid.bottom() + 12.0, name, TextStyle::new(TICK_SIZE, Anchor::End), -45.0)?;
    }

    let bar = Colorbar { palette: &palette, vmin: -1.0, vmax: 1.0, label: "Correlation Coefficient", show_missing: false };
    let bar_width = side * 0.8;
    write_colorbar(writer, "corr-ramp",
        Frame::new(grid.center_x() - bar_width / 2.0, grid.bottom() + 64.0, bar_width, 10.0),
        &bar, LABEL_SIZE * 0.9)?;
    Ok(())
}

/// Render the statistics figure as an SVG document.
///
/// The histogram, scatter and heatmap panels need their columns; the boxplot panel is
/// left out when `spec.group` is unset or not a column of the layer.
pub fn render_statistics_svg(layer: &FeatureLayer, spec: &StatisticsSpec) -> Result<String> {
    let hue = spec.hue().to_string();
    layer.require_columns(&[spec.value.as_str(), spec.x.as_str(), spec.y.as_str(), hue.as_str()])?;

    let group = spec.group.as_deref().filter(|g| {
        let present = layer.has_column(g);
        if !present { warn!("[render::statistics] group column {g:?} not found, boxplot left out") }
        present
    });

    let cell_w = (WIDTH - 2.0 * MARGIN - GUTTER) / 2.0;
    let title_h = TITLE_SIZE * 1.35 * line_count(&spec.title) as f64 + 20.0;
    let notes_h = spec.notes.as_deref().map_or(0.0, |n| LABEL_SIZE * 1.3 * line_count(n) as f64 + 20.0);
    let height = MARGIN + title_h + 2.0 * CELL_HEIGHT + GUTTER + notes_h + MARGIN;
    let cell = |row: usize, col: usize| Frame::new(
        MARGIN + col as f64 * (cell_w + GUTTER),
        MARGIN + title_h + row as f64 * (CELL_HEIGHT + GUTTER),
        cell_w,
        CELL_HEIGHT,
    );

    let mut writer = SvgStringWriter::new();
    writer.write_header(WIDTH, height, "#ffffff")?;
    write_text(&mut writer, WIDTH / 2.0, MARGIN + TITLE_SIZE, &spec.title, TextStyle::new(TITLE_SIZE, Anchor::Middle).bold())?;

    write_histogram(&mut writer, cell(0, 0), layer, spec)?;
    write_scatter(&mut writer, cell(0, 1), layer, spec)?;
    if let Some(group) = group {
        write_boxplot(&mut writer, cell(1, 0), layer, spec, group)?;
    }
    write_heatmap(&mut writer, cell(1, 1), layer, spec)?;

    if let Some(notes) = &spec.notes {
        let y = height - MARGIN - notes_h + 20.0 + LABEL_SIZE;
        write_text(&mut writer, MARGIN, y, notes, TextStyle::new(LABEL_SIZE, Anchor::Start))?;
    }
    writer.write_footer()?;

    debug!("[render::statistics] figure for {:?} ({} features)", spec.value, layer.len());
    writer.into_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{grouped, padded, render_statistics_svg, StatisticsSpec};
    use crate::layer::FeatureLayer;

    fn wards() -> FeatureLayer {
        let rows = [
            (0.2, 30.0, 0.45, "Low-Low"), (0.4, 31.5, 0.40, "Low-Low"), (0.5, 33.0, 0.30, "Not Significant"),
            (0.6, 34.0, 0.25, "High-High"), (0.9, 36.5, 0.12, "High-High"), (0.7, 35.0, 0.20, "Not Significant"),
        ];
        let features = rows.iter().enumerate().map(|(i, (hvi, lst, ndvi, lisa))| {
            let x = 28.0 + i as f64 * 0.1;
            json!({
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [[[x, -26.3], [x + 0.1, -26.3], [x + 0.1, -26.2], [x, -26.2]]] },
                "properties": { "HVI": hvi, "LST": lst, "NDVI": ndvi, "LISA_Type": lisa },
            })
        }).collect::<Vec<_>>();
        let bytes = serde_json::to_vec(&json!({ "type": "FeatureCollection", "features": features })).unwrap();
        FeatureLayer::from_geojson_bytes(&bytes, None).unwrap()
    }

    #[test]
    fn full_figure_has_all_four_panels() {
        let mut spec = StatisticsSpec::new("HVI", "LST", "NDVI");
        spec.group = Some("LISA_Type".into());
        spec.labels.insert("HVI".into(), "Heat Vulnerability Index".into());
        spec.notes = Some("Notes:\n• LISA Types indicate spatial clustering patterns".into());
        let svg = render_statistics_svg(&wards(), &spec).unwrap();

        assert!(svg.contains("Distribution of Heat Vulnerability Index"));
        assert!(svg.contains("<polyline"));
        assert!(svg.contains("Colored by HVI"));
        assert!(svg.matches("<circle cx").count() >= 6);
        assert!(svg.contains("HVI Distribution by LISA_Type"));
        assert!(svg.contains("High-High"));
        assert!(svg.contains("Correlation Coefficient"));
        assert!(svg.contains(">1.00<"));
        assert!(svg.contains("LISA Types indicate"));
    }

    #[test]
    fn boxplot_is_left_out_without_group_column() {
        let mut spec = StatisticsSpec::new("HVI", "LST", "NDVI");
        spec.group = Some("Cluster".into());
        let svg = render_statistics_svg(&wards(), &spec).unwrap();
        assert!(!svg.contains("Distribution by"));
        assert!(svg.contains("Correlation Matrix of Key Variables"));
    }

    #[test]
    fn missing_scatter_column_is_an_error() {
        let spec = StatisticsSpec::new("HVI", "UHI", "NDVI");
        assert!(render_statistics_svg(&wards(), &spec).is_err());
    }

    #[test]
    fn groups_are_sorted_and_skip_missing() {
        let groups = grouped(&wards(), "HVI", "LISA_Type").unwrap();
        let names = groups.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["High-High", "Low-Low", "Not Significant"]);
        assert_eq!(groups[0].1, vec![0.6, 0.9]);
    }

    #[test]
    fn degenerate_ranges_are_widened() {
        assert_eq!(padded(0.0, 10.0, 0.1), (-1.0, 11.0));
        assert_eq!(padded(0.0, 0.0, 0.1), (-1.0, 1.0));
        assert_eq!(padded(5.0, 5.0, 0.1), (4.5, 5.5));
    }
}
