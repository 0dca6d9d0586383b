use std::fmt;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Coordinate reference system, identified by its EPSG code.
/// Only the systems this toolkit actually meets are supported: geographic lon/lat
/// (WGS84, NAD83), Web Mercator and the WGS84 UTM zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    pub const WGS84: Crs = Crs { epsg: 4326 };
    pub const NAD83: Crs = Crs { epsg: 4269 };
    pub const WEB_MERCATOR: Crs = Crs { epsg: 3857 };

    /// Look up a supported CRS by EPSG code. Legacy aliases of Web Mercator are normalized.
    pub fn from_epsg(code: u32) -> Result<Self> {
        match code {
            4326 | 4269 | 3857 => Ok(Self { epsg: code }),
            900913 | 3785 | 102100 | 102113 => Ok(Self::WEB_MERCATOR),
            32601..=32660 | 32701..=32760 => Ok(Self { epsg: code }),
            _ => bail!("[geom::crs] unsupported EPSG code {code}"),
        }
    }

    /// Parse "EPSG:3857", "urn:ogc:def:crs:EPSG::3857", "urn:ogc:def:crs:OGC:1.3:CRS84" or "3857".
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.ends_with("CRS84") { return Ok(Self::WGS84) }

        let code = text.rsplit(':').next().unwrap_or(text);
        let code = code.parse::<u32>()
            .with_context(|| format!("[geom::crs] cannot parse CRS {text:?}"))?;
        Self::from_epsg(code)
    }

    /// Identify the CRS of an ESRI or OGC WKT projection string (`.prj` sidecars).
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        // The outermost AUTHORITY closes the string, so take the last one.
        let authority = Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#)?;
        if let Some(code) = authority.captures_iter(wkt).last().and_then(|c| c[1].parse::<u32>().ok()) {
            return Self::from_epsg(code);
        }

        let name = wkt.trim().to_ascii_lowercase();
        if name.starts_with("projcs") {
            if name.contains("mercator_auxiliary_sphere") || name.contains("pseudo-mercator") || name.contains("pseudo_mercator") {
                return Ok(Self::WEB_MERCATOR);
            }
            let utm = Regex::new(r"utm[_ ]zone[_ ](\d{1,2})\s*([ns])")?;
            if let Some(caps) = utm.captures(&name) {
                let zone = caps[1].parse::<u32>()?;
                let base = if &caps[2] == "s" { 32700 } else { 32600 };
                return Self::from_epsg(base + zone);
            }
            bail!("[geom::crs] unsupported projected CRS: {}", wkt.chars().take(80).collect::<String>());
        }

        if name.contains("north_american_1983") || name.contains("nad83") { Ok(Self::NAD83) }
        else { Ok(Self::WGS84) }
    }

    /// Pick the WGS84 UTM zone containing a lon/lat location.
    pub fn utm_for(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u32;
        let epsg = if lat >= 0.0 { 32600 + zone } else { 32700 + zone };
        Self { epsg }
    }

    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    /// Lon/lat in degrees.
    #[inline] pub fn is_geographic(&self) -> bool { matches!(self.epsg, 4326 | 4269) }

    #[inline] pub fn is_web_mercator(&self) -> bool { self.epsg == 3857 }

    /// UTM zone number and hemisphere, if this is a UTM CRS.
    pub(crate) fn utm_zone(&self) -> Option<(u32, bool)> {
        match self.epsg {
            32601..=32660 => Some((self.epsg - 32600, true)),
            32701..=32760 => Some((self.epsg - 32700, false)),
            _ => None,
        }
    }

    /// Minimal WKT carrying the EPSG authority, for `.prj` sidecars.
    pub fn to_wkt(&self) -> String {
        let kind = if self.is_geographic() { "GEOGCS" } else { "PROJCS" };
        format!("{kind}[\"EPSG:{0}\",AUTHORITY[\"EPSG\",\"{0}\"]]", self.epsg)
    }

    /// PROJ.4 definition string.
    pub fn proj4(&self) -> String {
        match self.epsg {
            4269 => "+proj=longlat +datum=NAD83 +no_defs +type=crs".to_string(),
            3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs +type=crs".to_string(),
            _ => match self.utm_zone() {
                Some((zone, north)) => {
                    let south = if north { "" } else { " +south" };
                    format!("+proj=utm +zone={zone}{south} +datum=WGS84 +units=m +no_defs +type=crs")
                }
                None => "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            },
        }
    }
}

impl Default for Crs {
    fn default() -> Self { Self::WGS84 }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl TryFrom<String> for Crs {
    type Error = anyhow::Error;

    fn try_from(text: String) -> Result<Self> { Self::parse(&text) }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self { crs.to_string() }
}
