mod cli;
mod commands;
mod logging;

use cli::{Cli, Commands};
use commands::{extract, render, run, stats};

pub fn main() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    logging::init(cli.verbose);
    match &cli.command {
        Commands::Run(args) => run::run(&cli, args),
        Commands::Extract(args) => extract::run(&cli, args),
        Commands::Render(args) => render::run(&cli, args),
        Commands::Stats(args) => stats::run(&cli, args),
    }
}
