//! Raster grids, file decoders, dated collections and image sources.

mod collection;
mod error;
mod io;
mod nodata;
mod raster;
mod source;
mod transform;

pub use collection::{scene_date, ImageCollection, Scene};
pub use error::RasterError;
pub use nodata::{NoData, Reducer, Rescale};
pub use raster::Raster;
#[cfg(feature = "download")]
pub use source::RemoteRaster;
pub use source::{CollectionSource, ImageSource, LocalRaster, Region};
pub use transform::{GeoTransform, Window};
