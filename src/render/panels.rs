//! Multi-panel map figures.

use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::{
    layer::FeatureLayer,
    render::{
        choropleth::{write_map_panel, write_map_styles, ChoroplethStyle, MapGeometry, MapOptions},
        geometry::Frame,
        svg::{line_count, write_text, Anchor, SvgStringWriter, TextStyle},
    },
};

const MARGIN: f64 = 24.0;
const GUTTER: f64 = 28.0;
const FONT_SIZE: f64 = 13.0;

/// Render several choropleths of one layer on a grid with `ncols` columns.
///
/// Panels whose column is absent or has no finite values are left out and the
/// remaining panels close up. `options.width` sets the figure width; each panel
/// is as tall as it is wide.
pub fn render_panels_svg(
    layer: &FeatureLayer,
    styles: &[ChoroplethStyle],
    ncols: usize,
    title: &str,
    footnote: Option<&str>,
    options: &MapOptions,
) -> Result<String> {
    let mut panels = Vec::with_capacity(styles.len());
    for style in styles {
        match layer.column_values(&style.column) {
            Ok(values) if style.scale(&values).is_some() => panels.push((style, values)),
            Ok(_) => warn!("[render::panels] {:?} has no values, panel skipped", style.column),
            Err(_) => warn!("[render::panels] column {:?} not found, panel skipped", style.column),
        }
    }
    if panels.is_empty() {
        bail!("[render::panels] none of the requested columns are available");
    }

    let ncols = ncols.clamp(1, panels.len());
    let nrows = panels.len().div_ceil(ncols);
    let width = options.width;
    let cell_w = (width - 2.0 * MARGIN - GUTTER * (ncols - 1) as f64) / ncols as f64;
    let cell_h = cell_w;

    let title_size = FONT_SIZE * 1.6;
    let title_h = title_size * 1.35 * line_count(title) as f64 + 16.0;
    let foot_h = footnote.map_or(0.0, |text| FONT_SIZE * 1.25 * line_count(text) as f64 + 16.0);
    let height = MARGIN + title_h + nrows as f64 * cell_h + (nrows - 1) as f64 * GUTTER + foot_h + MARGIN;

    let geometry = MapGeometry::of(layer)?;

    let mut writer = SvgStringWriter::new();
    writer.write_header(width, height, "#ffffff")?;
    write_map_styles(&mut writer)?;
    write_text(&mut writer, width / 2.0, MARGIN + title_size, title,
        TextStyle::new(title_size, Anchor::Middle).bold())?;

    for (i, (style, values)) in panels.iter().enumerate() {
        let (row, col) = (i / ncols, i % ncols);
        let frame = Frame::new(
            MARGIN + col as f64 * (cell_w + GUTTER),
            MARGIN + title_h + row as f64 * (cell_h + GUTTER),
            cell_w,
            cell_h,
        );
        write_map_panel(&mut writer, &geometry, values, style, frame, options, &format!("panel{i}"), FONT_SIZE)?;
    }

    if let Some(text) = footnote {
        let y = height - MARGIN - foot_h + 16.0 + FONT_SIZE;
        write_text(&mut writer, MARGIN, y, text, TextStyle::new(FONT_SIZE * 0.9, Anchor::Start))?;
    }
    writer.write_footer()?;

    debug!("[render::panels] {} of {} panels drawn on {nrows}x{ncols}", panels.len(), styles.len());
    writer.into_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::render_panels_svg;
    use crate::{layer::FeatureLayer, render::choropleth::{ChoroplethStyle, MapOptions}};

    fn wards() -> FeatureLayer {
        let square = |x: f64| json!({ "type": "Polygon", "coordinates": [[[x, -26.3], [x + 0.1, -26.3], [x + 0.1, -26.2], [x, -26.2]]] });
        let bytes = serde_json::to_vec(&json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": square(28.0), "properties": { "HVI": 0.1, "LST": 31.0, "NDVI": null } },
                { "type": "Feature", "geometry": square(28.1), "properties": { "HVI": 0.7, "LST": 35.5, "NDVI": null } },
            ]
        })).unwrap();
        FeatureLayer::from_geojson_bytes(&bytes, None).unwrap()
    }

    #[test]
    fn unavailable_columns_leave_their_panel_out() {
        let styles = ["HVI", "LST", "NDVI", "CVI"].map(ChoroplethStyle::new);
        let svg = render_panels_svg(&wards(), &styles, 2, "Heat Vulnerability Analysis\nSpatial Distribution",
            Some("Data sources: test"), &MapOptions::default()).unwrap();
        assert!(svg.contains(r#"id="panel0-features""#));
        assert!(svg.contains(r#"id="panel1-features""#));
        assert!(!svg.contains(r#"id="panel2-features""#));
        assert_eq!(svg.matches(r#"class="ward""#).count(), 4);
        assert!(svg.contains("Data sources: test"));
    }

    #[test]
    fn nothing_to_draw_is_an_error() {
        let styles = [ChoroplethStyle::new("CVI")];
        assert!(render_panels_svg(&wards(), &styles, 2, "t", None, &MapOptions::default()).is_err());
    }
}
