use std::fs;

use anyhow::{bail, Context, Result};
use tracing::info;
use zonalmap::RunConfig;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::RunArgs) -> Result<()> {
    info!("[run] loading configuration from {}", args.config.display());
    let config = RunConfig::load(&args.config)?;

    let report = zonalmap::run(&config)?;

    if let Some(path) = &args.report {
        let bytes = serde_json::to_vec_pretty(&report).context("[run] Failed to serialize report")?;
        fs::write(path, bytes)
            .with_context(|| format!("[run] Failed to write report {}", path.display()))?;
    }

    if args.strict && report.has_failures() {
        let steps = report.failures.iter().map(|f| f.step.as_str()).collect::<Vec<_>>().join(", ");
        bail!("[run] {} step(s) failed: {steps}", report.failures.len());
    }
    Ok(())
}
