#![doc = "Zonal raster statistics per polygon, joined onto a feature table and rendered as maps and plots."]
mod common;

pub mod geom;
pub mod layer;
pub mod pipeline;
pub mod raster;
pub mod render;
pub mod stats;
pub mod zonal;

#[doc(inline)]
pub use layer::{FeatureId, FeatureLayer};

#[doc(inline)]
pub use pipeline::{run, RunConfig, RunReport};
