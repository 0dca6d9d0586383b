mod feature_id;
pub(crate) mod io;
mod join;
mod layer;

pub use feature_id::FeatureId;
pub use join::JoinSummary;
pub use layer::{FeatureLayer, DEFAULT_ID_FIELD};
