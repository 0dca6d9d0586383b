use anyhow::{anyhow, bail, Result};
use zonalmap::{
    geom::Crs,
    raster::{ImageSource, LocalRaster, NoData, Region, Rescale},
    zonal::{extract, ExtractionOptions, MaskMode},
    FeatureLayer,
};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::ExtractArgs) -> Result<()> {
    let nodata = NoData::parse(&args.nodata)
        .ok_or_else(|| anyhow!("[extract] invalid --nodata {:?} (expected non-positive, declared or a number)", args.nodata))?;
    let crs = args.crs.as_deref().map(Crs::parse).transpose()?;

    let mut layer = FeatureLayer::read(&args.vector, args.id_field.as_deref())?;
    let region = Region::of_layer(&layer)?;

    let source = LocalRaster { path: args.raster.clone(), band: args.band, crs, nodata };
    let raster = source.composite(&region)?.rescaled(Rescale::new(args.scale, args.offset));

    let mode = if args.all_touched { MaskMode::AllTouched } else { MaskMode::Centers };
    let report = extract(&args.column, &raster, &layer, &ExtractionOptions { mode, nodata: NoData::Declared })?;
    report.log_summary();
    layer.join_column(&args.column, &report.values)?;

    let ext = args.output.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "geojson" | "json" => layer.to_crs(Crs::WGS84)?.write_geojson(&args.output),
        "csv" => layer.write_csv(&args.output),
        _ => bail!("[extract] unsupported output format: {} (expected .geojson or .csv)", args.output.display()),
    }
}
