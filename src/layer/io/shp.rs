use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Map, Value};
use shapefile::{dbase::FieldValue, Reader, Shape};

use crate::{geom::Crs, layer::FeatureLayer};
use super::RawFeature;

impl FeatureLayer {
    /// Load polygon features and their dBASE attributes from an ESRI shapefile.
    /// The CRS comes from the sibling `.prj` file when present, otherwise WGS84.
    pub fn read_shapefile(path: &Path, id_field: Option<&str>) -> Result<Self> {
        let mut reader = Reader::from_path(path)
            .with_context(|| format!("[layer::io::shp] Failed to open shapefile: {}", path.display()))?;

        let mut features = Vec::with_capacity(reader.shape_count()?);
        for (i, result) in reader.iter_shapes_and_records().enumerate() {
            let (shape, record) = result
                .with_context(|| format!("[layer::io::shp] Error reading shape+record {i}"))?;

            let rings = match shape {
                Shape::Polygon(p) => p.rings().iter()
                    .map(|ring| ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect())
                    .collect::<Vec<Vec<_>>>(),
                Shape::PolygonM(p) => p.rings().iter()
                    .map(|ring| ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect())
                    .collect(),
                Shape::PolygonZ(p) => p.rings().iter()
                    .map(|ring| ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect())
                    .collect(),
                Shape::NullShape => Vec::new(),
                other => bail!("[layer::io::shp] feature {i}: unsupported shape type {:?} (expected Polygon)", other.shapetype()),
            };

            let properties = record.into_iter()
                .map(|(name, value)| (name, field_to_json(value)))
                .collect::<Map<_, _>>();

            features.push(RawFeature { id: None, shape: rings_to_multipolygon(rings), properties });
        }

        let prj = path.with_extension("prj");
        let crs = if prj.exists() {
            let wkt = fs::read_to_string(&prj)
                .with_context(|| format!("[layer::io::shp] Failed to read {}", prj.display()))?;
            Crs::from_wkt(&wkt)
                .with_context(|| format!("[layer::io::shp] unrecognised projection in {}", prj.display()))?
        } else {
            Crs::WGS84
        };

        Self::from_raw_features(features, crs, id_field)
            .with_context(|| format!("[layer::io::shp] Failed to load {}", path.display()))
    }
}

/// Convert a dBASE field value to JSON. Empty fields become null.
fn field_to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(s) => s.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map_or(Value::Null, Value::String),
        FieldValue::Numeric(n) => n.map_or(Value::Null, number_to_json),
        FieldValue::Float(f) => f.map_or(Value::Null, |f| number_to_json(f as f64)),
        FieldValue::Double(d) => number_to_json(d),
        FieldValue::Currency(c) => number_to_json(c),
        FieldValue::Integer(i) => json!(i),
        FieldValue::Logical(b) => b.map_or(Value::Null, Value::Bool),
        FieldValue::Memo(s) => Value::String(s),
        FieldValue::Date(d) => d.map_or(Value::Null, |d| json!(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))),
        other => json!(format!("{other:?}")),
    }
}

/// Whole numbers stay integers so identifier fields read as `79800001`, not `79800001.0`.
fn number_to_json(n: f64) -> Value {
    if !n.is_finite() { return Value::Null }
    if n.fract() == 0.0 && n.abs() < 9.0e15 { json!(n as i64) } else { json!(n) }
}

/// Get the signed area of a ring (negative for clockwise).
fn signed_area(pts: &[Coord<f64>]) -> f64 {
    pts.windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum::<f64>() / 2.0
}

/// Group shapefile rings into polygons. Clockwise rings are exteriors,
/// and each is followed by its counter-clockwise holes.
fn rings_to_multipolygon(rings: Vec<Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    let mut polys = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for mut coords in rings.into_iter().filter(|r| r.len() >= 3) {
        if coords.first() != coords.last() {
            coords.push(coords[0]);
        }
        let is_exterior = signed_area(&coords) < 0.0;
        let ring = LineString(coords);

        if is_exterior || exterior.is_none() {
            if let Some(ext) = exterior.take() {
                polys.push(Polygon::new(ext, std::mem::take(&mut holes)));
            }
            exterior = Some(ring);
        } else {
            holes.push(ring);
        }
    }
    if let Some(ext) = exterior {
        polys.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polys)
}

#[cfg(test)]
mod tests {
    use geo::Coord;

    use super::rings_to_multipolygon;

    fn ring(pts: &[(f64, f64)]) -> Vec<Coord<f64>> {
        pts.iter().map(|&(x, y)| Coord { x, y }).collect()
    }

    #[test]
    fn clockwise_rings_start_new_polygons() {
        let outer = ring(&[(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0), (0.0, 0.0)]);
        let hole = ring(&[(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0), (1.0, 1.0)]);
        let second = ring(&[(5.0, 0.0), (5.0, 1.0), (6.0, 1.0), (6.0, 0.0)]);
        let mp = rings_to_multipolygon(vec![outer, hole, second]);
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert_eq!(mp.0[1].exterior().0.len(), 5);
    }
}
