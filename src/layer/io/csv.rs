use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use polars::{io::SerWriter, prelude::CsvWriter};

use crate::layer::FeatureLayer;

impl FeatureLayer {
    /// Write the attribute table (without geometry) to a CSV file.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("[layer::io::csv] Failed to create CSV file: {}", path.display()))?;
        CsvWriter::new(file)
            .finish(&mut self.data().clone())
            .with_context(|| format!("[layer::io::csv] Failed to write CSV to {:?}", path))
    }
}
