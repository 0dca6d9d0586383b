use std::{fmt, sync::Arc};

use serde::{Serialize, Serializer};

/// Stable identifier of one feature in a layer.
/// Keeps the original identifier text (e.g. "79800001") without repeated owned Strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(Arc<str>);

impl FeatureId {
    pub fn new(id: &str) -> Self { Self(Arc::from(id)) }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for FeatureId {
    fn from(id: &str) -> Self { Self::new(id) }
}

impl From<String> for FeatureId {
    fn from(id: String) -> Self { Self(Arc::from(id)) }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for FeatureId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
