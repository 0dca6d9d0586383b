use std::path::PathBuf;

/// Zonal statistics and choropleth CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "zonalmap", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run every step of a JSON run configuration
    Run(RunArgs),

    /// Reduce one raster per polygon and join the result as a column
    Extract(ExtractArgs),

    /// Draw one column as a static (png/svg) or interactive (html) map
    Render(RenderArgs),

    /// Draw the statistics figure for a set of columns
    Stats(StatsArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Run configuration (JSON)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Exit with an error if any step failed
    #[arg(long)]
    pub strict: bool,

    /// Write the run report as JSON
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub report: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// Input polygons (GeoJSON or shapefile)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub vector: PathBuf,

    /// Raster to reduce (GeoTIFF or ASCII grid)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub raster: PathBuf,

    /// Name of the new column
    #[arg(short, long)]
    pub column: String,

    /// Attribute holding feature identifiers
    #[arg(long)]
    pub id_field: Option<String>,

    /// Raster band (1-based)
    #[arg(long, default_value_t = 1)]
    pub band: usize,

    /// Raster CRS when the file does not declare one, e.g. EPSG:32735
    #[arg(long)]
    pub crs: Option<String>,

    /// Multiply valid pixels by this factor
    #[arg(long, default_value_t = 1.0)]
    pub scale: f64,

    /// Add this offset after scaling
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub offset: f64,

    /// Missing pixels: non-positive, declared, or a sentinel value
    #[arg(long, default_value = "non-positive", allow_hyphen_values = true)]
    pub nodata: String,

    /// Count every pixel the polygon touches, not only those whose centre it contains
    #[arg(long)]
    pub all_touched: bool,

    /// Output table (.geojson or .csv)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    /// Input polygons (GeoJSON or shapefile)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub vector: PathBuf,

    /// Column to map
    #[arg(short, long)]
    pub column: String,

    /// Attribute holding feature identifiers
    #[arg(long)]
    pub id_field: Option<String>,

    /// Named palette, e.g. YlOrRd, RdYlBu_r, YlGn, viridis
    #[arg(long, default_value = "YlOrRd")]
    pub palette: String,

    /// Map title, defaults to the column name
    #[arg(long)]
    pub title: Option<String>,

    /// Legend label, defaults to the column name
    #[arg(long)]
    pub label: Option<String>,

    /// Draw CartoDB Positron tiles under static maps
    #[arg(long)]
    pub basemap: bool,

    /// Output file (.png, .svg or .html)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct StatsArgs {
    /// Input polygons (GeoJSON or shapefile)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub vector: PathBuf,

    /// Columns to summarise; the first is the histogram value
    #[arg(long, value_delimiter = ',', required = true)]
    pub columns: Vec<String>,

    /// Scatter x column, defaults to the second column
    #[arg(long)]
    pub x: Option<String>,

    /// Scatter y column, defaults to the third column
    #[arg(long)]
    pub y: Option<String>,

    /// Scatter colour column, defaults to the first column
    #[arg(long)]
    pub hue: Option<String>,

    /// Categorical column for the boxplot
    #[arg(long)]
    pub group: Option<String>,

    /// Figure title
    #[arg(long)]
    pub title: Option<String>,

    /// Output file (.png or .svg)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,
}
