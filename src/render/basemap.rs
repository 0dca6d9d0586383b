//! Map background and CartoDB Positron tile context.

use std::{io::Write, path::{Path, PathBuf}};

use anyhow::Result;
use geo::{Coord, Rect};

use crate::render::geometry::Viewport;

/// Fill behind every map frame.
pub const BACKGROUND: &str = "#F0F0F0";

/// Positron tile template for Leaflet pages.
pub(crate) const POSITRON_TEMPLATE: &str = "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png";

pub(crate) const POSITRON_ATTRIBUTION: &str =
    r#"&copy; <a href="https://www.openstreetmap.org/copyright">OpenStreetMap</a> contributors &copy; <a href="https://carto.com/attributions">CARTO</a>"#;

/// Opacity of tiles drawn under the polygons.
const TILE_OPACITY: f64 = 0.3;

/// Half the side of the square Web Mercator world, in metres.
const WORLD_HALF: f64 = 20_037_508.342_789_244;

const TILE_PIXELS: f64 = 256.0;

const MAX_ZOOM: u8 = 18;

/// Refuse extents that would need more tiles than this.
#[cfg_attr(not(feature = "download"), allow(dead_code))]
const MAX_TILES: usize = 64;

/// One slippy-map tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    /// Tile extent in Web Mercator metres.
    pub(crate) fn bounds(&self) -> Rect<f64> {
        let size = tile_size(self.z);
        let min_x = -WORLD_HALF + self.x as f64 * size;
        let max_y = WORLD_HALF - self.y as f64 * size;
        Rect::new(Coord { x: min_x, y: max_y - size }, Coord { x: min_x + size, y: max_y })
    }

    /// Location under a resources directory, also used as the SVG image reference.
    pub(crate) fn relative_path(&self) -> PathBuf {
        PathBuf::from("tiles").join(self.z.to_string()).join(self.x.to_string()).join(format!("{}.png", self.y))
    }

    #[cfg_attr(not(feature = "download"), allow(dead_code))]
    pub(crate) fn url(&self) -> String {
        format!("https://a.basemaps.cartocdn.com/light_all/{}/{}/{}.png", self.z, self.x, self.y)
    }
}

/// Side of a tile at `zoom`, in metres.
fn tile_size(zoom: u8) -> f64 {
    2.0 * WORLD_HALF / 2f64.powi(zoom as i32)
}

/// Zoom level whose tiles best match a drawing scale (SVG units per metre).
pub(crate) fn choose_zoom(scale: f64) -> u8 {
    if !(scale.is_finite() && scale > 0.0) { return 0 }
    let zoom = (2.0 * WORLD_HALF * scale / TILE_PIXELS).log2().round();
    zoom.clamp(0.0, MAX_ZOOM as f64) as u8
}

/// Tiles intersecting a Web Mercator extent.
pub(crate) fn tiles_covering(bounds: &Rect<f64>, zoom: u8) -> Vec<TileId> {
    let size = tile_size(zoom);
    let last = 2u32.pow(zoom as u32) - 1;
    let index = |v: f64| (v.floor().max(0.0) as u32).min(last);

    let (x0, x1) = (index((bounds.min().x + WORLD_HALF) / size), index((bounds.max().x + WORLD_HALF) / size));
    let (y0, y1) = (index((WORLD_HALF - bounds.max().y) / size), index((WORLD_HALF - bounds.min().y) / size));

    (y0..=y1)
        .flat_map(|y| (x0..=x1).map(move |x| TileId { z: zoom, x, y }))
        .collect()
}

/// Download (or reuse cached) tiles for a map viewport into `<dir>/tiles`.
#[cfg(feature = "download")]
pub(crate) fn fetch_tiles(dir: &Path, view: &Viewport) -> Result<Vec<TileId>> {
    use std::time::Duration;

    use anyhow::bail;
    use tracing::debug;

    use crate::common::download::{download_once, http_client};

    let mut zoom = choose_zoom(view.scale());
    let mut tiles = tiles_covering(&view.bounds(), zoom);
    while tiles.len() > MAX_TILES && zoom > 0 {
        zoom -= 1;
        tiles = tiles_covering(&view.bounds(), zoom);
    }
    if tiles.len() > MAX_TILES {
        bail!("[render::basemap] extent needs {} tiles", tiles.len());
    }

    let client = http_client(Duration::from_secs(20))?;
    let mut fetched = 0;
    for tile in &tiles {
        if download_once(&client, &tile.url(), &dir.join(tile.relative_path()))? {
            fetched += 1;
        }
    }
    debug!("[render::basemap] zoom {zoom}: {} tiles ({fetched} downloaded)", tiles.len());
    Ok(tiles)
}

#[cfg(not(feature = "download"))]
pub(crate) fn fetch_tiles(_dir: &Path, _view: &Viewport) -> Result<Vec<TileId>> {
    anyhow::bail!("[render::basemap] tile basemaps need the `download` feature")
}

/// Draw the background and any tiles, clipped to the drawn map area.
pub(crate) fn write_basemap(writer: &mut impl Write, view: &Viewport, tiles: &[TileId], clip_id: &str) -> Result<()> {
    let area = view.drawn_frame();
    writeln!(writer, r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{BACKGROUND}"/>"#,
        area.x, area.y, area.width, area.height)?;
    if tiles.is_empty() { return Ok(()) }

    writeln!(writer, r#"<defs><clipPath id="{clip_id}"><rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/></clipPath></defs>"#,
        area.x, area.y, area.width, area.height)?;
    writeln!(writer, r#"<g clip-path="url(#{clip_id})" opacity="{TILE_OPACITY}">"#)?;
    for tile in tiles {
        let bounds = tile.bounds();
        let (x0, y0) = view.project(&Coord { x: bounds.min().x, y: bounds.max().y });
        let (x1, y1) = view.project(&Coord { x: bounds.max().x, y: bounds.min().y });
        let href = tile.relative_path().to_string_lossy().replace('\\', "/");
        writeln!(writer, r#"<image xlink:href="{href}" x="{x0:.2}" y="{y0:.2}" width="{:.2}" height="{:.2}" preserveAspectRatio="none"/>"#,
            x1 - x0, y1 - y0)?;
    }
    writeln!(writer, "</g>")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use geo::{Coord, Rect};

    use super::{choose_zoom, tiles_covering, write_basemap, TileId};
    use crate::render::{geometry::{Frame, Viewport}, svg::SvgStringWriter};

    #[test]
    fn tile_bounds_tile_the_world() {
        let root = TileId { z: 0, x: 0, y: 0 }.bounds();
        assert!((root.width() - 2.0 * 20_037_508.342_789_244).abs() < 1e-6);
        let nw = TileId { z: 1, x: 0, y: 0 }.bounds();
        assert_eq!(nw.max().y, root.max().y);
        assert_eq!(nw.max().x, 0.0);
    }

    #[test]
    fn covering_tiles_for_johannesburg() {
        // Roughly 27.7..28.4 E, 26.5..25.9 S in Web Mercator metres.
        let bounds = Rect::new(Coord { x: 3_083_000.0, y: -3_060_000.0 }, Coord { x: 3_161_000.0, y: -2_990_000.0 });
        let tiles = tiles_covering(&bounds, 10);
        assert!(!tiles.is_empty() && tiles.len() <= 9);
        assert!(tiles.iter().all(|t| t.z == 10 && t.y > 512));
        assert_eq!(tiles[0].relative_path().to_string_lossy().replace('\\', "/"), format!("tiles/10/{}/{}.png", tiles[0].x, tiles[0].y));
    }

    #[test]
    fn zoom_tracks_scale() {
        assert_eq!(choose_zoom(256.0 / (2.0 * 20_037_508.342_789_244)), 0);
        assert!(choose_zoom(0.01) > choose_zoom(0.001));
        assert_eq!(choose_zoom(1e9), 18);
        assert_eq!(choose_zoom(f64::NAN), 0);
    }

    #[test]
    fn background_only_without_tiles() {
        let view = Viewport::fit(Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }), Frame::new(0.0, 0.0, 10.0, 10.0));
        let mut writer = SvgStringWriter::new();
        write_basemap(&mut writer, &view, &[], "clip0").unwrap();
        let svg = writer.into_string().unwrap();
        assert!(svg.contains("#F0F0F0"));
        assert!(!svg.contains("<image"));
    }
}
