use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use zonalmap::{
    render::{render_choropleth_svg, render_interactive_html, write_map, ChoroplethStyle, InteractiveSpec, MapOptions, Palette, TooltipField},
    FeatureLayer,
};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::RenderArgs) -> Result<()> {
    let layer = FeatureLayer::read(&args.vector, args.id_field.as_deref())?;
    let palette = Palette::named(&args.palette)?;
    let label = args.label.clone().unwrap_or_else(|| args.column.clone());

    let is_html = args.output.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));

    if is_html {
        let mut spec = InteractiveSpec::new(&args.column, args.title.as_deref().unwrap_or(&args.column));
        spec.palette = palette;
        spec.legend_label = Some(label.clone());
        spec.tooltip = vec![
            TooltipField { field: layer.id_field().to_string(), alias: format!("{}:", layer.id_field()) },
            TooltipField { field: args.column.clone(), alias: format!("{label}:") },
        ];
        let html = render_interactive_html(&layer, &spec)?;
        return fs::write(&args.output, html)
            .with_context(|| format!("[render] Failed to write {}", args.output.display()));
    }

    let mut style = ChoroplethStyle::new(&args.column)
        .with_palette(palette)
        .with_legend_label(&label);
    style.title = args.title.clone();

    let tile_dir = args.output.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let options = MapOptions { basemap: args.basemap, tile_dir: Some(tile_dir), ..MapOptions::default() };

    let svg = render_choropleth_svg(&layer, &style, &options)?;
    write_map(&args.output, &svg, options.tile_dir.as_deref())
}
