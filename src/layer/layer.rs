use std::path::Path;

use ahash::AHashMap;
use anyhow::{anyhow, bail, ensure, Context, Result};
use geo::Rect;
use polars::{frame::DataFrame, prelude::DataType};

use crate::{geom::{Crs, Geometries}, layer::FeatureId};

/// Name of the identifier column created when no identifier field is requested.
pub const DEFAULT_ID_FIELD: &str = "fid";

/// An ordered polygon feature table: one geometry, one identifier and one attribute row per feature.
/// Row order and identifiers never change across reprojection and joins.
#[derive(Debug, Clone)]
pub struct FeatureLayer {
    id_field: String,
    ids: Vec<FeatureId>,
    index: AHashMap<FeatureId, usize>, // Map between identifiers and row positions.
    data: DataFrame,
    geoms: Geometries,
}

impl FeatureLayer {
    /// Assemble a layer, checking that every part has one entry per feature and identifiers are unique.
    pub(crate) fn new(id_field: &str, ids: Vec<FeatureId>, data: DataFrame, geoms: Geometries) -> Result<Self> {
        ensure!(ids.len() == geoms.len(),
            "[layer] {} identifiers for {} geometries", ids.len(), geoms.len());
        ensure!(data.height() == ids.len(),
            "[layer] attribute table has {} rows, expected {}", data.height(), ids.len());

        let mut index = AHashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if let Some(prev) = index.insert(id.clone(), i) {
                bail!("[layer] duplicate identifier {:?} in field {:?} (rows {} and {})", id.as_str(), id_field, prev, i);
            }
        }

        Ok(Self { id_field: id_field.to_string(), ids, index, data, geoms })
    }

    /// Read a layer from a GeoJSON (`.geojson`, `.json`) or ESRI shapefile (`.shp`).
    pub fn read(path: &Path, id_field: Option<&str>) -> Result<Self> {
        let ext = path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "geojson" | "json" => Self::read_geojson(path, id_field),
            "shp" => Self::read_shapefile(path, id_field),
            _ => bail!("[layer] unsupported vector format: {}", path.display()),
        }
    }

    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// Name of the attribute holding feature identifiers.
    #[inline] pub fn id_field(&self) -> &str { &self.id_field }

    #[inline] pub fn ids(&self) -> &[FeatureId] { &self.ids }

    /// Row position of a feature identifier.
    #[inline] pub fn position(&self, id: &FeatureId) -> Option<usize> { self.index.get(id).copied() }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    #[inline] pub(crate) fn data_mut(&mut self) -> &mut DataFrame { &mut self.data }

    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    #[inline] pub fn crs(&self) -> Crs { self.geoms.crs() }

    #[inline] pub fn bounds(&self) -> Option<Rect<f64>> { self.geoms.bounds() }

    /// Attribute column names, in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.data.get_column_names().iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.column(name).is_ok()
    }

    /// Numeric view of a column. Nulls, NaNs and non-numeric text become `None`.
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self.data.column(name)
            .with_context(|| format!("[layer] missing column {name:?}"))?
            .cast(&DataType::Float64)
            .with_context(|| format!("[layer] column {name:?} is not numeric"))?;

        Ok(column.f64()
            .with_context(|| format!("[layer] column {name:?} is not numeric"))?
            .into_iter()
            .map(|value| value.filter(|v| v.is_finite()))
            .collect())
    }

    /// Text view of a column, for categories and tooltips.
    pub fn column_strings(&self, name: &str) -> Result<Vec<Option<String>>> {
        let column = self.data.column(name)
            .with_context(|| format!("[layer] missing column {name:?}"))?
            .cast(&DataType::String)
            .with_context(|| format!("[layer] column {name:?} cannot be read as text"))?;

        Ok(column.str()
            .with_context(|| format!("[layer] column {name:?} cannot be read as text"))?
            .into_iter()
            .map(|value| value.map(str::to_string))
            .collect())
    }

    /// Return a copy of the layer with geometries in another CRS.
    pub fn to_crs(&self, crs: Crs) -> Result<Self> {
        let geoms = self.geoms.reproject(crs)
            .with_context(|| format!("[layer] failed to reproject layer to {crs}"))?;
        Ok(Self { geoms, ..self.clone() })
    }

    /// Check a set of required columns, naming every missing one.
    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        let missing = names.iter()
            .filter(|name| !self.has_column(name))
            .copied()
            .collect::<Vec<_>>();
        if missing.is_empty() { Ok(()) }
        else { Err(anyhow!("[layer] missing column(s): {}", missing.join(", "))) }
    }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};
    use polars::prelude::{Column, DataFrame};

    use super::FeatureLayer;
    use crate::{geom::{Crs, Geometries}, layer::FeatureId};

    fn unit_square(x: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0)]])
    }

    #[test]
    fn duplicate_identifiers_are_rejected() {
        let ids = vec![FeatureId::new("a"), FeatureId::new("a")];
        let data = DataFrame::new(vec![Column::new("fid".into(), &["a", "a"])]).unwrap();
        let geoms = Geometries::new(vec![unit_square(0.0), unit_square(1.0)], Crs::WGS84);
        let err = FeatureLayer::new("fid", ids, data, geoms).unwrap_err();
        assert!(err.to_string().contains("duplicate identifier"));
    }

    #[test]
    fn numeric_and_text_views() {
        let ids = vec![FeatureId::new("a"), FeatureId::new("b")];
        let data = DataFrame::new(vec![
            Column::new("fid".into(), &["a", "b"]),
            Column::new("LST".into(), &[Some(31.5), None]),
        ]).unwrap();
        let geoms = Geometries::new(vec![unit_square(0.0), unit_square(1.0)], Crs::WGS84);
        let layer = FeatureLayer::new("fid", ids, data, geoms).unwrap();

        assert_eq!(layer.column_values("LST").unwrap(), vec![Some(31.5), None]);
        assert_eq!(layer.column_strings("fid").unwrap(), vec![Some("a".to_string()), Some("b".to_string())]);
        assert_eq!(layer.position(&FeatureId::new("b")), Some(1));
        assert!(layer.require_columns(&["LST", "NDVI"]).is_err());
    }
}
