mod bbox;
mod crs;
mod geom;
mod proj;

pub use crs::Crs;
pub use geom::Geometries;
pub use proj::{reproject_rect, Transformer};
