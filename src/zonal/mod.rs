//! Zonal statistics: pixel selection, per-polygon reduction and layer-wide extraction.

mod extract;
mod mask;
mod reduce;

pub use extract::{extract, ExtractionOptions, ExtractionReport};
pub use mask::{mask_indices, MaskMode};
pub use reduce::{zonal_mean, ZonalError, ZonalStat};
