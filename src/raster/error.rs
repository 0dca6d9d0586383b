use std::path::PathBuf;

use thiserror::Error;

/// Failures while decoding, combining or compositing rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("unsupported raster format in {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("{path} has no georeferencing")]
    MissingGeoreference { path: PathBuf },

    #[error("band {band} out of range: {path} has {bands} band(s)")]
    BandOutOfRange { path: PathBuf, band: usize, bands: usize },

    #[error("grid mismatch: {0}")]
    GridMismatch(String),

    #[error("collection {collection} has no scenes{detail}")]
    EmptyCollection { collection: String, detail: String },

    #[error("invalid grid: {0}")]
    InvalidGrid(String),
}

impl RasterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Decode { path: path.into(), message: message.to_string() }
    }
}
