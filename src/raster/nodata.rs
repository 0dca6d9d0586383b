use serde::{Deserialize, Serialize};

/// Which pixel values count as missing.
/// Non-finite values and the file's declared nodata value are always missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoData {
    /// Zero or below is missing.
    #[default]
    NonPositive,
    /// Only the declared nodata value.
    Declared,
    /// An explicit sentinel value.
    Value(f64),
}

impl NoData {
    /// Check whether a pixel holds a usable value.
    #[inline]
    pub fn is_valid(&self, value: f64, declared: Option<f64>) -> bool {
        if !value.is_finite() { return false }
        if declared.is_some_and(|nd| value == nd) { return false }
        match *self {
            NoData::NonPositive => value > 0.0,
            NoData::Declared => true,
            NoData::Value(sentinel) => value != sentinel,
        }
    }

    /// Parse a command-line spelling: `non-positive`, `declared`, or a number.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "non-positive" | "nonpositive" => Some(Self::NonPositive),
            "declared" => Some(Self::Declared),
            other => other.parse::<f64>().ok().map(Self::Value),
        }
    }
}

/// Linear rescaling `value * scale + offset`, applied after compositing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rescale {
    pub scale: f64,
    pub offset: f64,
}

impl Default for Rescale {
    fn default() -> Self { Self { scale: 1.0, offset: 0.0 } }
}

impl Rescale {
    pub fn new(scale: f64, offset: f64) -> Self { Self { scale, offset } }

    #[inline] pub fn is_identity(&self) -> bool { self.scale == 1.0 && self.offset == 0.0 }

    /// Missing values stay missing.
    #[inline] pub fn apply(&self, value: f64) -> f64 { value * self.scale + self.offset }
}

/// How the scenes of a collection are combined into one image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// Per-pixel mean over the valid scene values.
    #[default]
    Mean,
    /// The earliest scene alone.
    First,
}
