use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use polars::prelude::Column;
use serde::Serialize;
use tracing::{debug, warn};

use crate::layer::{FeatureId, FeatureLayer};

/// Outcome of joining one value column onto a layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JoinSummary {
    pub column: String,
    pub rows: usize,
    /// Rows that received a non-missing value.
    pub matched: usize,
    /// Rows left null.
    pub missing: usize,
    /// Input values whose identifier is not in the layer.
    pub unmatched_values: usize,
}

impl FeatureLayer {
    /// Attach per-feature values as column `name`, keyed by feature identifier.
    ///
    /// The layer keeps its row count and order. An existing column with the same name
    /// is replaced, rows without a value become null, and values for identifiers the
    /// layer does not contain are dropped and counted.
    pub fn join_column(&mut self, name: &str, values: &[(FeatureId, Option<f64>)]) -> Result<JoinSummary> {
        if name == self.id_field() {
            bail!("[layer::join] refusing to overwrite identifier column {name:?}");
        }

        let mut by_id = AHashMap::with_capacity(values.len());
        for (id, value) in values {
            if by_id.insert(id, *value).is_some() {
                bail!("[layer::join] duplicate identifier {:?} in values for {name:?}", id.as_str());
            }
        }

        let unmatched_values = by_id.keys()
            .filter(|&&id| self.position(id).is_none())
            .count();

        let joined = self.ids().iter()
            .map(|id| by_id.get(id).copied().flatten().filter(|v| v.is_finite()))
            .collect::<Vec<Option<f64>>>();

        let matched = joined.iter().filter(|v| v.is_some()).count();
        let rows = joined.len();

        self.data_mut()
            .with_column(Column::new(name.into(), joined))
            .with_context(|| format!("[layer::join] failed to attach column {name:?}"))?;

        let summary = JoinSummary {
            column: name.to_string(),
            rows,
            matched,
            missing: rows - matched,
            unmatched_values,
        };

        if unmatched_values > 0 {
            warn!("[layer::join] {name}: {unmatched_values} value(s) had identifiers not present in the layer");
        }
        debug!("[layer::join] {name}: {matched}/{rows} rows matched");

        Ok(summary)
    }
}
