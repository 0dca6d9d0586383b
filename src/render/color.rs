//! Colour ramps for choropleths and plots.

use std::fmt;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Simple RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self { Self { r, g, b } }

    /// From a packed `0xrrggbb` literal.
    pub const fn from_u32(rgb: u32) -> Self {
        Self { r: (rgb >> 16) as u8, g: (rgb >> 8) as u8, b: rgb as u8 }
    }

    /// Parse `#rrggbb` (the `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            bail!("[render::color] invalid colour {hex:?}, expected #rrggbb");
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16)
            .with_context(|| format!("[render::color] invalid colour {hex:?}"));
        Ok(Self { r: channel(0)?, g: channel(2)?, b: channel(4)? })
    }

    /// Linear interpolation in RGB space.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8;
        Self { r: mix(self.r, other.r), g: mix(self.g, other.g), b: mix(self.b, other.b) }
    }

    /// Relative luminance in [0, 1], for choosing legible text colours.
    pub fn luminance(&self) -> f64 {
        (0.2126 * self.r as f64 + 0.7152 * self.g as f64 + 0.0722 * self.b as f64) / 255.0
    }
}

impl fmt::Display for Rgb {
    /// Format as CSS hex: #rrggbb
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Fill for features without a value.
pub const MISSING_COLOR: Rgb = Rgb::new(0xcc, 0xcc, 0xcc);

const RD_YL_BU: [u32; 11] = [0xa50026, 0xd73027, 0xf46d43, 0xfdae61, 0xfee090, 0xffffbf, 0xe0f3f8, 0xabd9e9, 0x74add1, 0x4575b4, 0x313695];
const YL_GN: [u32; 9] = [0xffffe5, 0xf7fcb9, 0xd9f0a3, 0xaddd8e, 0x78c679, 0x41ab5d, 0x238443, 0x006837, 0x004529];
const YL_OR_RD: [u32; 9] = [0xffffcc, 0xffeda0, 0xfed976, 0xfeb24c, 0xfd8d3c, 0xfc4e2a, 0xe31a1c, 0xbd0026, 0x800026];
const RD_BU: [u32; 11] = [0x67001f, 0xb2182b, 0xd6604d, 0xf4a582, 0xfddbc7, 0xf7f7f7, 0xd1e5f0, 0x92c5de, 0x4393c3, 0x2166ac, 0x053061];
const BLUES: [u32; 9] = [0xf7fbff, 0xdeebf7, 0xc6dbef, 0x9ecae1, 0x6baed6, 0x4292c6, 0x2171b5, 0x08519c, 0x08306b];
const VIRIDIS: [u32; 9] = [0x440154, 0x472d7b, 0x3b528b, 0x2c728e, 0x21918c, 0x28ae80, 0x5ec962, 0xaddc30, 0xfde725];

/// How a palette is written in configuration: a known name or a list of `#rrggbb` stops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaletteSpec {
    Named(String),
    Stops(Vec<String>),
}

/// A continuous colour ramp through evenly spaced stops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PaletteSpec", into = "PaletteSpec")]
pub struct Palette {
    name: String,
    stops: Vec<Rgb>,
}

impl Palette {
    /// Look up a named palette. A `_r` suffix reverses it.
    pub fn named(name: &str) -> Result<Self> {
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let table: &[u32] = match base.to_ascii_lowercase().as_str() {
            "rdylbu" => &RD_YL_BU,
            "ylgn" => &YL_GN,
            "ylorrd" => &YL_OR_RD,
            "rdbu" => &RD_BU,
            "blues" => &BLUES,
            "viridis" => &VIRIDIS,
            _ => bail!("[render::color] unknown palette {name:?}"),
        };
        let mut stops = table.iter().map(|&rgb| Rgb::from_u32(rgb)).collect::<Vec<_>>();
        if reversed { stops.reverse() }
        Ok(Self { name: name.to_string(), stops })
    }

    /// Build a palette from custom `#rrggbb` stops (at least two).
    pub fn from_stops(stops: &[&str]) -> Result<Self> {
        if stops.len() < 2 {
            bail!("[render::color] a palette needs at least two stops");
        }
        let stops = stops.iter().map(|h| Rgb::from_hex(h)).collect::<Result<Vec<_>>>()?;
        Ok(Self { name: "custom".to_string(), stops })
    }

    #[inline] pub fn name(&self) -> &str { &self.name }

    #[inline] pub fn stops(&self) -> &[Rgb] { &self.stops }

    /// Colour at position `t` in [0, 1] (clamped).
    pub fn at(&self, t: f64) -> Rgb {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let segments = (self.stops.len() - 1) as f64;
        let pos = t * segments;
        let i = (pos.floor() as usize).min(self.stops.len() - 2);
        self.stops[i].lerp(self.stops[i + 1], pos - i as f64)
    }

    /// Colour of a value on the scale [vmin, vmax]; missing values are grey.
    pub fn color_for(&self, value: Option<f64>, vmin: f64, vmax: f64) -> Rgb {
        match value.filter(|v| v.is_finite()) {
            Some(v) => {
                let range = vmax - vmin;
                let t = if range > 0.0 { (v - vmin) / range } else { 0.5 };
                self.at(t)
            }
            None => MISSING_COLOR,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self { name: "YlOrRd".to_string(), stops: YL_OR_RD.iter().map(|&rgb| Rgb::from_u32(rgb)).collect() }
    }
}

impl TryFrom<PaletteSpec> for Palette {
    type Error = anyhow::Error;

    fn try_from(spec: PaletteSpec) -> Result<Self> {
        match spec {
            PaletteSpec::Named(name) => Self::named(&name),
            PaletteSpec::Stops(stops) => Self::from_stops(&stops.iter().map(String::as_str).collect::<Vec<_>>()),
        }
    }
}

impl From<Palette> for PaletteSpec {
    fn from(palette: Palette) -> Self {
        if palette.name == "custom" {
            PaletteSpec::Stops(palette.stops.iter().map(|c| c.to_string()).collect())
        } else {
            PaletteSpec::Named(palette.name)
        }
    }
}

/// Finite min and max of optional values.
pub fn value_range(values: &[Option<f64>]) -> Option<(f64, f64)> {
    values.iter().flatten().copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::{value_range, Palette, Rgb, MISSING_COLOR};

    #[test]
    fn hex_parsing_and_display() {
        let c = Rgb::from_hex("#fde725").unwrap();
        assert_eq!(c, Rgb::new(0xfd, 0xe7, 0x25));
        assert_eq!(c.to_string(), "#fde725");
        assert!(Rgb::from_hex("#12345").is_err());
        assert!(Rgb::from_hex("zzzzzz").is_err());
    }

    #[test]
    fn named_palettes_and_reversal() {
        let p = Palette::named("RdYlBu_r").unwrap();
        assert_eq!(p.at(0.0).to_string(), "#313695");
        assert_eq!(p.at(1.0).to_string(), "#a50026");
        assert!(Palette::named("Spectral_Plus").is_err());
    }

    #[test]
    fn ramp_hits_stops_and_interpolates() {
        let p = Palette::from_stops(&["#000000", "#ffffff"]).unwrap();
        assert_eq!(p.at(0.5), Rgb::new(128, 128, 128));
        assert_eq!(p.color_for(Some(10.0), 0.0, 10.0), Rgb::new(255, 255, 255));
        assert_eq!(p.color_for(Some(-5.0), 0.0, 10.0), Rgb::new(0, 0, 0));
        assert_eq!(p.color_for(None, 0.0, 10.0), MISSING_COLOR);
        assert_eq!(p.color_for(Some(f64::NAN), 0.0, 10.0), MISSING_COLOR);
    }

    #[test]
    fn ramp_is_monotone_between_monotone_stops() {
        let p = Palette::named("Blues").unwrap();
        let lum = (0..=20).map(|i| p.at(i as f64 / 20.0).luminance()).collect::<Vec<_>>();
        assert!(lum.windows(2).all(|w| w[1] <= w[0] + 1e-9));
    }

    #[test]
    fn palette_config_round_trip() {
        let p: Palette = serde_json::from_str(r##""YlOrRd""##).unwrap();
        assert_eq!(p.name(), "YlOrRd");
        let p: Palette = serde_json::from_str(r##"["#440154", "#fde725"]"##).unwrap();
        assert_eq!(p.stops().len(), 2);
        assert!(serde_json::from_str::<Palette>(r##"["#440154"]"##).is_err());
    }

    #[test]
    fn range_ignores_missing() {
        assert_eq!(value_range(&[None, Some(2.0), Some(f64::NAN), Some(-1.0)]), Some((-1.0, 2.0)));
        assert_eq!(value_range(&[None]), None);
    }
}
