use std::f64::consts::FRAC_PI_4;

use anyhow::{anyhow, Result};
use geo::{Coord, Rect};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::geom::Crs;

/// Spherical radius used by Web Mercator.
const MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of the square Web Mercator world.
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// One end of a coordinate transformation.
/// Every transformation pivots through WGS84 lon/lat degrees; NAD83 is treated as WGS84.
enum Frame {
    LonLat,
    Mercator,
    Projected { proj: Proj4, geog: Proj4 },
}

impl Frame {
    fn new(crs: Crs) -> Result<Self> {
        if crs.is_geographic() { return Ok(Self::LonLat) }
        if crs.is_web_mercator() { return Ok(Self::Mercator) }

        let proj_string = crs.proj4();
        let proj = Proj4::from_proj_string(&proj_string)
            .map_err(|e| anyhow!("[geom::proj] failed to build PROJ.4 {proj_string}: {e:?}"))?;
        let geog = Proj4::from_proj_string(&Crs::WGS84.proj4())
            .map_err(|e| anyhow!("[geom::proj] failed to build WGS84 PROJ.4: {e:?}"))?;
        Ok(Self::Projected { proj, geog })
    }

    fn to_lonlat(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        match self {
            Self::LonLat => Ok(coord),
            Self::Mercator => Ok(Coord {
                x: (coord.x / MERCATOR_RADIUS).to_degrees(),
                y: (2.0 * (coord.y / MERCATOR_RADIUS).exp().atan() - 2.0 * FRAC_PI_4).to_degrees(),
            }),
            Self::Projected { proj, geog } => {
                let mut point = (coord.x, coord.y, 0.0);
                transform(proj, geog, &mut point)
                    .map_err(|e| anyhow!("[geom::proj] inverse projection failed at ({}, {}): {e:?}", coord.x, coord.y))?;
                Ok(Coord { x: point.0.to_degrees(), y: point.1.to_degrees() })
            }
        }
    }

    fn from_lonlat(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        match self {
            Self::LonLat => Ok(coord),
            Self::Mercator => {
                let lat = coord.y.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
                Ok(Coord {
                    x: MERCATOR_RADIUS * coord.x.to_radians(),
                    y: MERCATOR_RADIUS * (FRAC_PI_4 + lat / 2.0).tan().ln(),
                })
            }
            Self::Projected { proj, geog } => {
                let mut point = (coord.x.to_radians(), coord.y.to_radians(), 0.0);
                transform(geog, proj, &mut point)
                    .map_err(|e| anyhow!("[geom::proj] projection failed at ({}, {}): {e:?}", coord.x, coord.y))?;
                Ok(Coord { x: point.0, y: point.1 })
            }
        }
    }
}

/// Reusable point transformation between two CRSs.
pub struct Transformer {
    identity: bool,
    from: Frame,
    to: Frame,
}

impl Transformer {
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        let identity = from == to
            || (from.is_geographic() && to.is_geographic());
        Ok(Self { identity, from: Frame::new(from)?, to: Frame::new(to)? })
    }

    #[inline] pub fn is_identity(&self) -> bool { self.identity }

    /// Transform a single coordinate.
    pub fn apply(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        if self.identity { return Ok(coord) }
        let lonlat = self.from.to_lonlat(coord)?;
        let out = self.to.from_lonlat(lonlat)?;
        if !(out.x.is_finite() && out.y.is_finite()) {
            return Err(anyhow!("[geom::proj] non-finite result for ({}, {})", coord.x, coord.y));
        }
        Ok(out)
    }
}

/// Reproject an envelope, densifying each edge so curved edges stay covered.
pub fn reproject_rect(rect: &Rect<f64>, from: Crs, to: Crs) -> Result<Rect<f64>> {
    const STEPS: usize = 8;
    let transformer = Transformer::new(from, to)?;
    if transformer.is_identity() { return Ok(*rect) }

    let (min, max) = (rect.min(), rect.max());
    let mut lo = Coord { x: f64::INFINITY, y: f64::INFINITY };
    let mut hi = Coord { x: f64::NEG_INFINITY, y: f64::NEG_INFINITY };

    for i in 0..=STEPS {
        let t = i as f64 / STEPS as f64;
        let x = min.x + (max.x - min.x) * t;
        let y = min.y + (max.y - min.y) * t;
        for coord in [
            Coord { x, y: min.y }, Coord { x, y: max.y },
            Coord { x: min.x, y }, Coord { x: max.x, y },
        ] {
            let c = transformer.apply(coord)?;
            lo.x = lo.x.min(c.x);
            lo.y = lo.y.min(c.y);
            hi.x = hi.x.max(c.x);
            hi.y = hi.y.max(c.y);
        }
    }

    Ok(Rect::new(lo, hi))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use geo::{Coord, Rect};

    use super::{reproject_rect, Transformer};
    use crate::geom::Crs;

    #[test]
    fn mercator_round_trip() {
        let fwd = Transformer::new(Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let inv = Transformer::new(Crs::WEB_MERCATOR, Crs::WGS84).unwrap();

        let jhb = Coord { x: 28.0473, y: -26.2041 };
        let projected = fwd.apply(jhb).unwrap();
        assert_abs_diff_eq!(projected.x, 3_122_211.15, epsilon = 0.01);
        assert!(projected.y < 0.0);

        let back = inv.apply(projected).unwrap();
        assert_abs_diff_eq!(back.x, jhb.x, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y, jhb.y, epsilon = 1e-9);
    }

    #[test]
    fn origin_maps_to_origin() {
        let fwd = Transformer::new(Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let origin = fwd.apply(Coord { x: 0.0, y: 0.0 }).unwrap();
        assert_abs_diff_eq!(origin.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(origin.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn geographic_datums_are_identity() {
        let t = Transformer::new(Crs::NAD83, Crs::WGS84).unwrap();
        assert!(t.is_identity());
    }

    #[test]
    fn rect_reprojection_contains_corners() {
        let rect = Rect::new(Coord { x: 27.85, y: -26.55 }, Coord { x: 28.15, y: -26.25 });
        let out = reproject_rect(&rect, Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let fwd = Transformer::new(Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let corner = fwd.apply(Coord { x: 28.15, y: -26.25 }).unwrap();
        assert!(out.max().x >= corner.x - 1e-6 && out.max().y >= corner.y - 1e-6);
    }
}
