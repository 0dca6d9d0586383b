//! Interactive pages showing a composite raster as a coloured image over the basemap.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tiny_skia::{ColorU8, Pixmap, PremultipliedColorU8};
use tracing::debug;

use crate::{
    geom::{reproject_rect, Crs},
    raster::{NoData, Raster},
    render::{
        basemap::{POSITRON_ATTRIBUTION, POSITRON_TEMPLATE},
        color::Palette,
        html::{colour_bar, script_json},
        svg::escape,
    },
};

const OVERLAY_OPACITY: f64 = 0.8;

fn default_zoom() -> u8 { 10 }

/// Settings for a raster overlay page. The colour scale is fixed, not fitted to the data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub title: String,
    #[serde(default)]
    pub legend_label: Option<String>,
    #[serde(default)]
    pub palette: Palette,
    pub vmin: f64,
    pub vmax: f64,
    /// Initial view `[lat, lon]`; defaults to the raster's centre.
    #[serde(default)]
    pub center: Option<[f64; 2]>,
    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

impl OverlaySpec {
    pub fn new(title: &str, vmin: f64, vmax: f64) -> Self {
        Self {
            title: title.to_string(),
            legend_label: None,
            palette: Palette::default(),
            vmin,
            vmax,
            center: None,
            zoom: default_zoom(),
        }
    }

    fn legend_label(&self) -> &str { self.legend_label.as_deref().unwrap_or(&self.title) }

    fn check_range(&self) -> Result<()> {
        if !(self.vmin.is_finite() && self.vmax.is_finite() && self.vmin < self.vmax) {
            bail!("[render::overlay] invalid colour range {} .. {}", self.vmin, self.vmax);
        }
        Ok(())
    }
}

/// Colourise a raster into a PNG, one image pixel per grid cell.
/// Missing pixels are transparent; values outside the range take the end colours.
pub fn render_overlay_png(raster: &Raster, spec: &OverlaySpec) -> Result<Vec<u8>> {
    spec.check_range()?;
    let (width, height) = (u32::try_from(raster.cols())?, u32::try_from(raster.rows())?);
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("[render::overlay] invalid image size {width}x{height}"))?;

    for (pixel, &value) in pixmap.pixels_mut().iter_mut().zip(raster.data().iter()) {
        *pixel = if raster.is_valid(value, NoData::Declared) {
            let c = spec.palette.color_for(Some(value), spec.vmin, spec.vmax);
            ColorU8::from_rgba(c.r, c.g, c.b, u8::MAX).premultiply()
        } else {
            PremultipliedColorU8::TRANSPARENT
        };
    }

    pixmap.encode_png().map_err(|e| anyhow!("[render::overlay] failed to encode PNG: {e}"))
}

/// Render a Leaflet page placing `image_href` (see [`render_overlay_png`]) over the
/// raster's extent, with a colour bar for the fixed range.
///
/// The image is stretched over the extent's EPSG:4326 envelope, which is exact for
/// geographic grids and approximate for projected ones.
pub fn render_overlay_html(raster: &Raster, spec: &OverlaySpec, image_href: &str) -> Result<String> {
    spec.check_range()?;
    let bounds = reproject_rect(&raster.extent(), raster.crs(), Crs::WGS84)?;
    let center = spec.center.unwrap_or([bounds.center().y, bounds.center().x]);
    let (gradient, legend_html) = colour_bar(spec.legend_label(), &spec.palette, spec.vmin, spec.vmax);

    let html = format!(r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8"/>
<meta name="viewport" content="width=device-width, initial-scale=1.0"/>
<title>{title}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css"/>
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
    html, body, #map {{ height: 100%; margin: 0; }}
    .legend {{ background: white; padding: 8px 12px 22px 12px; border-radius: 4px; font: 12px Arial, sans-serif; width: 240px; }}
    .legend .ramp {{ height: 12px; background: linear-gradient(to right, {gradient}); border: 1px solid #777; }}
    .legend .ticks {{ position: relative; height: 14px; }}
    .legend .ticks span {{ position: absolute; transform: translateX(-50%); top: 2px; }}
    .overlay {{ image-rendering: pixelated; }}
</style>
</head>
<body>
<div id="map"></div>
<script>
var map = L.map("map").setView([{lat}, {lon}], {zoom});
var positron = L.tileLayer("{tiles}", {{ attribution: {attribution}, subdomains: "abcd", maxZoom: 20 }}).addTo(map);
var overlay = L.imageOverlay({image}, {bounds}, {{ opacity: {opacity}, className: "overlay" }}).addTo(map);
var legend = L.control({{ position: "bottomright" }});
legend.onAdd = function () {{
    var div = L.DomUtil.create("div", "legend");
    div.innerHTML = {legend_html};
    return div;
}};
legend.addTo(map);
L.control.layers({{ "CartoDB Positron": positron }}, {{ {layer_name}: overlay }}).addTo(map);
</script>
</body>
</html>
"##,
        title = escape(&spec.title),
        lat = center[0],
        lon = center[1],
        zoom = spec.zoom,
        tiles = POSITRON_TEMPLATE,
        attribution = script_json(&json!(POSITRON_ATTRIBUTION))?,
        image = script_json(&json!(image_href))?,
        bounds = script_json(&json!([[bounds.min().y, bounds.min().x], [bounds.max().y, bounds.max().x]]))?,
        opacity = OVERLAY_OPACITY,
        legend_html = script_json(&json!(legend_html))?,
        layer_name = script_json(&json!(escape(&spec.title)))?,
    );

    debug!("[render::overlay] {:?}: {}x{} grid over {:?}", spec.title, raster.cols(), raster.rows(), bounds);
    Ok(html)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use serde_json::json;

    use super::{render_overlay_html, render_overlay_png, OverlaySpec};
    use crate::{
        geom::Crs,
        raster::{GeoTransform, Raster},
        render::Palette,
    };

    fn lst() -> Raster {
        Raster::new(
            array![[20.0, 30.0, 40.0], [f64::NAN, 45.0, 10.0]],
            GeoTransform::new(27.8, -26.0, 0.1, 0.1),
            Crs::WGS84,
            None,
        ).unwrap()
    }

    fn spec() -> OverlaySpec {
        let mut spec = OverlaySpec::new("Land Surface Temperature", 20.0, 40.0);
        spec.palette = Palette::from_stops(&["#0000ff", "#ffff00", "#ff0000"]).unwrap();
        spec.legend_label = Some("Land Surface Temperature (°C)".to_string());
        spec
    }

    /// Decode the RGBA pixels of an 8-bit PNG.
    fn pixels(png: &[u8]) -> (u32, u32, Vec<[u8; 4]>) {
        let pixmap = tiny_skia::Pixmap::decode_png(png).unwrap();
        let rgba = pixmap.pixels().iter().map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        }).collect();
        (pixmap.width(), pixmap.height(), rgba)
    }

    #[test]
    fn png_colours_each_cell_on_the_fixed_range() {
        let (width, height, rgba) = pixels(&render_overlay_png(&lst(), &spec()).unwrap());
        assert_eq!((width, height), (3, 2));
        assert_eq!(rgba[0], [0, 0, 255, 255]);
        assert_eq!(rgba[1], [255, 255, 0, 255]);
        assert_eq!(rgba[2], [255, 0, 0, 255]);
        // Missing is transparent; out-of-range values clamp to the ends.
        assert_eq!(rgba[3][3], 0);
        assert_eq!(rgba[4], [255, 0, 0, 255]);
        assert_eq!(rgba[5], [0, 0, 255, 255]);
    }

    #[test]
    fn page_places_image_over_extent_with_colour_bar() {
        let html = render_overlay_html(&lst(), &spec(), "lst_overlay.png").unwrap();
        let extent = lst().extent();
        assert_abs_diff_eq!(extent.min().y, -26.2, epsilon = 1e-9);
        assert_abs_diff_eq!(extent.max().x, 28.1, epsilon = 1e-9);
        let bounds = serde_json::to_string(&json!([[extent.min().y, extent.min().x], [extent.max().y, extent.max().x]])).unwrap();
        assert!(html.contains(&format!(r#"L.imageOverlay("lst_overlay.png", {bounds}"#)));
        assert!(html.contains("light_all"));
        assert!(html.contains("Land Surface Temperature (°C)"));
        assert!(html.contains("#0000ff, "));
        assert!(html.contains(r#"{ "Land Surface Temperature": overlay }"#));
        assert!(html.contains(&format!("setView([{}, {}], 10)", extent.center().y, extent.center().x)));
    }

    #[test]
    fn empty_or_inverted_range_is_rejected() {
        let mut spec = spec();
        spec.vmax = spec.vmin;
        assert!(render_overlay_png(&lst(), &spec).is_err());
        spec.vmax = f64::NAN;
        assert!(render_overlay_html(&lst(), &spec, "x.png").is_err());
    }
}
