use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use polars::prelude::DataType;
use serde_json::{json, Map, Value};

use crate::{geom::Crs, layer::FeatureLayer};
use super::RawFeature;

impl FeatureLayer {
    /// Load a GeoJSON FeatureCollection of Polygon / MultiPolygon features.
    pub fn read_geojson(path: &Path, id_field: Option<&str>) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("[layer::io::geojson] Failed to read {}", path.display()))?;
        Self::from_geojson_bytes(&bytes, id_field)
            .with_context(|| format!("[layer::io::geojson] Failed to load {}", path.display()))
    }

    /// Load a GeoJSON FeatureCollection from bytes.
    pub fn from_geojson_bytes(bytes: &[u8], id_field: Option<&str>) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .context("[layer::io::geojson] Failed to parse GeoJSON")?;

        if value["type"].as_str() != Some("FeatureCollection") {
            bail!("[layer::io::geojson] expected a FeatureCollection, found {:?}", value["type"]);
        }

        // Legacy (pre-RFC 7946) named CRS member; RFC 7946 files are always lon/lat.
        let crs = match value["crs"]["properties"]["name"].as_str() {
            Some(name) => Crs::parse(name)?,
            None => Crs::WGS84,
        };

        let features = value["features"].as_array()
            .ok_or_else(|| anyhow!("[layer::io::geojson] FeatureCollection has no features array"))?
            .iter().enumerate()
            .map(|(i, feature)| parse_feature(feature)
                .with_context(|| format!("[layer::io::geojson] invalid feature {i}")))
            .collect::<Result<Vec<_>>>()?;

        Self::from_raw_features(features, crs, id_field)
    }

    /// Export the layer as a GeoJSON FeatureCollection with every attribute column.
    pub fn to_geojson(&self) -> Result<Value> {
        let names = self.column_names();
        let columns = names.iter()
            .map(|name| self.column_json(name))
            .collect::<Result<Vec<_>>>()?;

        let features = self.geoms().shapes().iter().enumerate()
            .map(|(idx, mp)| {
                let properties = names.iter().zip(columns.iter())
                    .map(|(name, values)| (name.clone(), values[idx].clone()))
                    .collect::<Map<_, _>>();
                json!({
                    "type": "Feature",
                    "id": self.ids()[idx].as_str(),
                    "geometry": multipolygon_to_geojson(mp),
                    "properties": properties,
                })
            })
            .collect::<Vec<_>>();

        let mut collection = json!({
            "type": "FeatureCollection",
            "features": features,
        });
        if !self.crs().is_geographic() {
            collection["crs"] = json!({
                "type": "name",
                "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", self.crs().epsg()) },
            });
        }
        Ok(collection)
    }

    /// Write the layer to a GeoJSON file.
    pub fn write_geojson(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(&self.to_geojson()?)
            .context("[layer::io::geojson] Failed to serialize GeoJSON")?;
        fs::write(path, bytes)
            .with_context(|| format!("[layer::io::geojson] Failed to write {}", path.display()))
    }

    /// Convert one attribute column to JSON values, by dtype.
    pub(crate) fn column_json(&self, name: &str) -> Result<Vec<Value>> {
        let column = self.data().column(name)
            .with_context(|| format!("[layer::io::geojson] missing column {name:?}"))?;

        let values = match column.dtype() {
            DataType::Float64 | DataType::Float32 => column.cast(&DataType::Float64)?.f64()?.into_iter()
                .map(|v| v.filter(|v| v.is_finite()).map_or(Value::Null, |v| json!(v)))
                .collect(),
            DataType::Int64 | DataType::Int32 | DataType::UInt32 | DataType::UInt64 => column.cast(&DataType::Int64)?.i64()?.into_iter()
                .map(|v| v.map_or(Value::Null, |v| json!(v)))
                .collect(),
            DataType::Boolean => column.bool()?.into_iter()
                .map(|v| v.map_or(Value::Null, |v| json!(v)))
                .collect(),
            _ => column.cast(&DataType::String)?.str()?.into_iter()
                .map(|v| v.map_or(Value::Null, |v| json!(v)))
                .collect(),
        };
        Ok(values)
    }
}

/// Parse one GeoJSON feature into geometry, identifier and properties.
fn parse_feature(feature: &Value) -> Result<RawFeature> {
    let geometry = &feature["geometry"];
    let shape = match geometry["type"].as_str() {
        Some("Polygon") => MultiPolygon(vec![parse_polygon_coords(coords_array(geometry)?)?]),
        Some("MultiPolygon") => MultiPolygon(coords_array(geometry)?.iter()
            .map(|polygon| polygon.as_array()
                .ok_or_else(|| anyhow!("MultiPolygon member is not an array"))
                .and_then(|rings| parse_polygon_coords(rings)))
            .collect::<Result<Vec<_>>>()?),
        Some(other) => bail!("unsupported geometry type {other:?} (expected Polygon or MultiPolygon)"),
        None => bail!("feature has no geometry"),
    };

    let id = feature.get("id").and_then(super::json_to_id);
    let properties = match &feature["properties"] {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => bail!("properties must be an object, found {other}"),
    };

    Ok(RawFeature { id, shape, properties })
}

fn coords_array(geometry: &Value) -> Result<&Vec<Value>> {
    geometry["coordinates"].as_array()
        .ok_or_else(|| anyhow!("geometry has no coordinates array"))
}

/// Parse polygon rings `[exterior, hole, hole, ...]`.
fn parse_polygon_coords(rings: &[Value]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter()
        .map(|ring| ring.as_array()
            .ok_or_else(|| anyhow!("polygon ring is not an array"))
            .and_then(|coords| parse_ring_coords(coords)));

    let exterior = rings.next()
        .ok_or_else(|| anyhow!("polygon has no exterior ring"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(exterior, interiors))
}

/// Parse a ring (exterior or interior) from GeoJSON coordinates.
/// Format: [[x, y], [x, y], ...]
fn parse_ring_coords(coords: &[Value]) -> Result<LineString<f64>> {
    let mut points = coords.iter()
        .map(|pair| {
            let x = pair[0].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: x must be a number"))?;
            let y = pair[1].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: y must be a number"))?;
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>>>()?;

    // Ensure ring is closed (first point == last point)
    if !points.is_empty() && points[0] != points[points.len() - 1] {
        points.push(points[0]);
    }

    Ok(LineString(points))
}

/// Helper to convert a MultiPolygon to a serde_json::Value representing GeoJSON Geometry.
pub(crate) fn multipolygon_to_geojson(mp: &MultiPolygon<f64>) -> Value {
    let polygons = mp.0.iter()
        .map(|polygon| std::iter::once(polygon.exterior())
            .chain(polygon.interiors().iter())
            .map(|ring| ring.coords().map(|c| vec![c.x, c.y]).collect::<Vec<_>>())
            .collect::<Vec<_>>())
        .collect::<Vec<_>>();
    json!({
        "type": "MultiPolygon",
        "coordinates": polygons
    })
}
