//! Vector format reading and writing operations.

mod csv;
mod geojson;
mod shp;

pub(crate) use geojson::multipolygon_to_geojson;

use ahash::AHashSet;
use anyhow::{bail, Result};
use geo::MultiPolygon;
use polars::prelude::{Column, DataFrame};
use serde_json::{Map, Value};

use crate::{geom::{Crs, Geometries}, layer::{FeatureId, FeatureLayer, DEFAULT_ID_FIELD}};

/// One feature as read from disk, before typing its attributes.
pub(super) struct RawFeature {
    pub(super) id: Option<String>,
    pub(super) shape: MultiPolygon<f64>,
    pub(super) properties: Map<String, Value>,
}

/// Inferred storage type of an attribute column.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Kind { Empty, Bool, Int, Float, Text }

impl Kind {
    fn widen(self, value: &Value) -> Self {
        match (self, value) {
            (kind, Value::Null) => kind,
            (Kind::Empty | Kind::Bool, Value::Bool(_)) => Kind::Bool,
            (Kind::Empty | Kind::Int, Value::Number(n)) if n.is_i64() => Kind::Int,
            (Kind::Empty | Kind::Int | Kind::Float, Value::Number(_)) => Kind::Float,
            _ => Kind::Text,
        }
    }
}

/// Render an identifier value as text. Integral floats lose their ".0".
pub(super) fn json_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() { return Some(i.to_string()) }
            if let Some(u) = n.as_u64() { return Some(u.to_string()) }
            n.as_f64().map(|f| {
                if f.fract() == 0.0 && f.abs() < 1e15 { format!("{}", f as i64) } else { f.to_string() }
            })
        }
        _ => None,
    }
}

/// Build one typed column from the values of a property across all features.
fn build_column(name: &str, values: &[&Value]) -> Column {
    let kind = values.iter().fold(Kind::Empty, |kind, value| kind.widen(value));
    match kind {
        Kind::Bool => Column::new(name.into(),
            values.iter().map(|v| v.as_bool()).collect::<Vec<Option<bool>>>()),
        Kind::Int => Column::new(name.into(),
            values.iter().map(|v| v.as_i64()).collect::<Vec<Option<i64>>>()),
        Kind::Float | Kind::Empty => Column::new(name.into(),
            values.iter().map(|v| v.as_f64()).collect::<Vec<Option<f64>>>()),
        Kind::Text => Column::new(name.into(),
            values.iter()
                .map(|v| match v {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect::<Vec<Option<String>>>()),
    }
}

impl FeatureLayer {
    /// Type the attributes of raw features and assemble the layer.
    ///
    /// Identifier resolution: the `id_field` property when given; otherwise an existing
    /// `fid` property, the feature's own `id`, or finally the row index as text.
    pub(super) fn from_raw_features(features: Vec<RawFeature>, crs: Crs, id_field: Option<&str>) -> Result<Self> {
        // Property names in first-seen order.
        let mut seen = AHashSet::new();
        let mut keys = Vec::new();
        for feature in &features {
            for key in feature.properties.keys() {
                if seen.insert(key.clone()) { keys.push(key.clone()) }
            }
        }

        let id_field = id_field
            .or_else(|| seen.contains(DEFAULT_ID_FIELD).then_some(DEFAULT_ID_FIELD));

        let ids = match id_field {
            Some(field) => features.iter().enumerate()
                .map(|(i, feature)| match feature.properties.get(field).and_then(json_to_id) {
                    Some(id) => Ok(FeatureId::from(id)),
                    None => bail!("[layer::io] feature {i} has no usable {field:?} identifier"),
                })
                .collect::<Result<Vec<_>>>()?,
            None => features.iter().enumerate()
                .map(|(i, feature)| FeatureId::from(feature.id.clone().unwrap_or_else(|| i.to_string())))
                .collect(),
        };

        let null = Value::Null;
        let mut columns = keys.iter()
            .map(|key| {
                let values = features.iter()
                    .map(|feature| feature.properties.get(key).unwrap_or(&null))
                    .collect::<Vec<_>>();
                build_column(key, &values)
            })
            .collect::<Vec<_>>();

        let id_field = id_field.unwrap_or(DEFAULT_ID_FIELD);
        if !seen.contains(id_field) {
            columns.insert(0, Column::new(id_field.into(),
                ids.iter().map(|id| id.as_str()).collect::<Vec<_>>()));
        }

        let data = DataFrame::new(columns)?;
        let shapes = features.into_iter().map(|feature| feature.shape).collect();

        Self::new(id_field, ids, data, Geometries::new(shapes, crs))
    }
}
