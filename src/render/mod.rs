//! Static maps, multi-panel figures, interactive pages, raster overlays and statistics plots.

mod basemap;
mod choropleth;
mod color;
mod geometry;
mod html;
mod legend;
mod overlay;
mod panels;
mod png;
mod statistics;
mod svg;

pub use basemap::BACKGROUND;
pub use choropleth::{render_choropleth_svg, ChoroplethStyle, MapOptions};
pub use color::{value_range, Palette, PaletteSpec, Rgb, MISSING_COLOR};
pub use html::{render_interactive_html, InteractiveSpec, TooltipField};
pub use overlay::{render_overlay_html, render_overlay_png, OverlaySpec};
pub use panels::render_panels_svg;
pub use png::{write_map, write_png};
pub use statistics::{render_statistics_svg, PanelTitles, StatisticsSpec};
