//! Image output: SVG documents written as-is or rasterized to PNG.

use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;

use crate::common::fs::ensure_parent_exists;

/// Device pixels per SVG unit in PNG output.
const PNG_SCALE: f32 = 2.0;

/// Rasterize an SVG document to a PNG file.
/// Relative image references (basemap tiles) resolve against `resources_dir`.
pub fn write_png(svg: &str, path: &Path, resources_dir: Option<&Path>) -> Result<()> {
    let mut options = usvg::Options::default();
    options.resources_dir = resources_dir.map(Path::to_path_buf);
    options.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &options)
        .map_err(|e| anyhow!("[render::png] failed to parse SVG: {e}"))?;

    let size = tree.size().to_int_size();
    let (width, height) = (
        (size.width() as f32 * PNG_SCALE).ceil() as u32,
        (size.height() as f32 * PNG_SCALE).ceil() as u32,
    );
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("[render::png] invalid image size {width}x{height}"))?;
    resvg::render(&tree, tiny_skia::Transform::from_scale(PNG_SCALE, PNG_SCALE), &mut pixmap.as_mut());

    ensure_parent_exists(path)?;
    pixmap.save_png(path)
        .map_err(|e| anyhow!("[render::png] failed to write {}: {e}", path.display()))?;
    debug!("[render::png] wrote {} ({width}x{height})", path.display());
    Ok(())
}

/// Write a rendered map by extension: `.svg` as-is, `.png` rasterized.
pub fn write_map(path: &Path, svg: &str, resources_dir: Option<&Path>) -> Result<()> {
    let ext = path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "svg" => {
            ensure_parent_exists(path)?;
            fs::write(path, svg)
                .with_context(|| format!("[render] Failed to write {}", path.display()))
        }
        "png" => write_png(svg, path, resources_dir),
        _ => bail!("[render] unsupported image format: {} (expected .png or .svg)", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::write_map;

    const SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10" viewBox="0 0 20 10"><rect width="20" height="10" fill="#fde725"/></svg>"##;

    #[test]
    fn png_output_is_scaled_raster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maps/small.png");
        write_map(&path, SVG, None).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        // IHDR width and height, big-endian.
        assert_eq!(u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]), 40);
        assert_eq!(u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]), 20);
    }

    #[test]
    fn svg_output_is_verbatim_and_unknown_extensions_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.svg");
        write_map(&path, SVG, None).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SVG);
        assert!(write_map(&dir.path().join("map.gif"), SVG, None).is_err());
    }
}
