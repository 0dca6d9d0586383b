//! Interactive Leaflet maps.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    geom::Crs,
    layer::{io::multipolygon_to_geojson, FeatureLayer},
    render::{
        basemap::{POSITRON_ATTRIBUTION, POSITRON_TEMPLATE},
        color::Palette,
        legend::{format_tick, nice_step, nice_ticks},
        svg::escape,
    },
};

const FILL_OPACITY: f64 = 0.7;
const LINE_OPACITY: f64 = 0.2;

/// One tooltip row: an attribute and the label shown for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TooltipField {
    pub field: String,
    pub alias: String,
}

/// Settings for an interactive choropleth page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractiveSpec {
    pub column: String,
    pub title: String,
    /// Extra line(s) of HTML under the title.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub legend_label: Option<String>,
    #[serde(default)]
    pub palette: Palette,
    /// Initial view `[lat, lon]`; defaults to the layer's centre.
    #[serde(default)]
    pub center: Option<[f64; 2]>,
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    #[serde(default)]
    pub tooltip: Vec<TooltipField>,
}

fn default_zoom() -> u8 { 10 }

impl InteractiveSpec {
    pub fn new(column: &str, title: &str) -> Self {
        Self {
            column: column.to_string(),
            title: title.to_string(),
            description: None,
            legend_label: None,
            palette: Palette::default(),
            center: None,
            zoom: default_zoom(),
            tooltip: Vec::new(),
        }
    }

    fn legend_label(&self) -> &str { self.legend_label.as_deref().unwrap_or(&self.column) }
}

/// Tooltip text for one attribute value.
fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "No data".to_string(),
        Value::Number(n) if n.is_f64() => n.as_f64().map_or_else(|| n.to_string(), |f| format!("{f:.2}")),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Serialize a value for inclusion inside a `<script>` element.
pub(crate) fn script_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// Colour bar for a Leaflet legend control: the CSS gradient and the legend's inner HTML.
pub(crate) fn colour_bar(label: &str, palette: &Palette, vmin: f64, vmax: f64) -> (String, String) {
    let gradient = (0..=10)
        .map(|i| palette.at(i as f64 / 10.0).to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let step = nice_step(vmax - vmin, 4);
    let ticks = nice_ticks(vmin, vmax, 4).iter()
        .map(|&t| {
            let pct = if vmax > vmin { (t - vmin) / (vmax - vmin) * 100.0 } else { 50.0 };
            format!(r#"<span style="left:{pct:.1}%">{}</span>"#, format_tick(t, step))
        })
        .collect::<String>();
    let html = format!(r#"<div><b>{}</b></div><div class="ramp"></div><div class="ticks">{ticks}</div>"#, escape(label));
    (gradient, html)
}

/// Render a standalone HTML page with a Leaflet choropleth of `spec.column`.
///
/// Fill colours and tooltip contents are computed here, so the page only needs Leaflet
/// itself. Geometry is written in EPSG:4326.
pub fn render_interactive_html(layer: &FeatureLayer, spec: &InteractiveSpec) -> Result<String> {
    let values = layer.column_values(&spec.column)?;
    let (vmin, vmax) = crate::render::color::value_range(&values)
        .ok_or_else(|| anyhow!("[render::html] column {:?} has no finite values", spec.column))?;

    let fields = spec.tooltip.iter()
        .filter(|f| {
            let present = layer.has_column(&f.field);
            if !present { warn!("[render::html] tooltip field {:?} not found, skipped", f.field) }
            present
        })
        .map(|f| Ok((f, layer.column_json(&f.field)?)))
        .collect::<Result<Vec<_>>>()?;

    let lonlat = layer.to_crs(Crs::WGS84)?;
    let bounds = lonlat.bounds()
        .ok_or_else(|| anyhow!("[render::html] layer has no geometry"))?;
    let center = spec.center.unwrap_or([bounds.center().y, bounds.center().x]);

    let features = lonlat.geoms().shapes().iter().enumerate()
        .map(|(i, shape)| {
            let rows = fields.iter()
                .map(|(f, column)| format!("<tr><th>{}</th><td>{}</td></tr>", escape(&f.alias), escape(&display_value(&column[i]))))
                .collect::<String>();
            json!({
                "type": "Feature",
                "id": lonlat.ids()[i].as_str(),
                "geometry": multipolygon_to_geojson(shape),
                "properties": {
                    "fill": spec.palette.color_for(values[i], vmin, vmax).to_string(),
                    "tooltip": format!("<table>{rows}</table>"),
                },
            })
        })
        .collect::<Vec<_>>();
    let collection = json!({ "type": "FeatureCollection", "features": features });

    let (gradient, legend_html) = colour_bar(spec.legend_label(), &spec.palette, vmin, vmax);
    let description = spec.description.as_deref()
        .map(|d| format!("<p>{d}</p>"))
        .unwrap_or_default();

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
    .title-box {{ position: fixed; top: 10px; left: 50px; z-index: 1000; width: 300px; background: white; border: 2px solid grey; border-radius: 5px; padding: 10px; font: 14px Arial, sans-serif; }}
    .title-box h3 {{ margin: 0 0 6px 0; }}
    .title-box p {{ margin: 0; }}
    .legend {{ background: white; padding: 8px 12px 22px 12px; border-radius: 4px; font: 12px Arial, sans-serif; width: 240px; }}
    .legend .ramp {{ height: 12px; background: linear-gradient(to right, {gradient}); border: 1px solid #777; }}
    .legend .ticks {{ position: relative; height: 14px; }}
    .legend .ticks span {{ position: absolute; transform: translateX(-50%); top: 2px; }}
    .tooltip-table th {{ text-align: left; padding-right: 8px; }}
</style>
</head>
<body>
<div id="map"></div>
<div class="title-box"><h3>{title}</h3>{description}</div>
<script>
var map = L.map("map").setView([{lat}, {lon}], {zoom});
var positron = L.tileLayer("{tiles}", {{ attribution: {attribution}, subdomains: "abcd", maxZoom: 20 }}).addTo(map);
var data = {data};
var baseStyle = function (feature) {{
    return {{ fillColor: feature.properties.fill, fillOpacity: {fill_opacity}, color: "#000000", opacity: {line_opacity}, weight: 1 }};
}};
var choropleth = L.geoJSON(data, {{
    style: baseStyle,
    onEachFeature: function (feature, layer) {{
        layer.bindTooltip(feature.properties.tooltip, {{ sticky: true, className: "tooltip-table" }});
        layer.on({{
            mouseover: function (e) {{ e.target.setStyle({{ fillColor: "#000000", fillOpacity: 0.5, weight: 1 }}); }},
            mouseout: function (e) {{ choropleth.resetStyle(e.target); }}
        }});
    }}
}}).addTo(map);
var legend = L.control({{ position: "topright" }});
legend.onAdd = function () {{
    var div = L.DomUtil.create("div", "legend");
    div.innerHTML = {legend_html};
    return div;
}};
legend.addTo(map);
L.control.layers({{ "CartoDB Positron": positron }}, {{ {layer_name}: choropleth }}).addTo(map);
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
        data = script_json(&collection)?,
        fill_opacity = FILL_OPACITY,
        line_opacity = LINE_OPACITY,
        legend_html = script_json(&json!(legend_html))?,
        layer_name = script_json(&json!(escape(spec.legend_label())))?,
    );

    debug!("[render::html] interactive map of {:?}: {} features", spec.column, layer.len());
    Ok(html)
}
