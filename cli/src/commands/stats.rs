use anyhow::{anyhow, Result};
use zonalmap::{
    render::{render_statistics_svg, write_map, StatisticsSpec},
    FeatureLayer,
};

/// Pick an explicit column flag, or fall back to a position in `--columns`.
fn pick(flag: Option<&String>, columns: &[String], position: usize, name: &str) -> Result<String> {
    flag.or_else(|| columns.get(position))
        .cloned()
        .ok_or_else(|| anyhow!("[stats] give --{name} or at least {} columns", position + 1))
}

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::StatsArgs) -> Result<()> {
    let layer = FeatureLayer::read(&args.vector, None)?;

    let value = pick(None, &args.columns, 0, "columns")?;
    let x = pick(args.x.as_ref(), &args.columns, 1, "x")?;
    let y = pick(args.y.as_ref(), &args.columns, 2, "y")?;

    let mut spec = StatisticsSpec::new(&value, &x, &y);
    spec.hue = args.hue.clone();
    spec.group = args.group.clone();
    spec.correlation = args.columns.clone();
    if let Some(title) = &args.title {
        spec.title = title.clone();
    }

    let svg = render_statistics_svg(&layer, &spec)?;
    write_map(&args.output, &svg, None)
}
