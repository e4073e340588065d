use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use ferrous_bake::{bake, effective_level, init_logging, load_config};

#[derive(Parser, Debug)]
#[command(
    name = "ferrous_bake",
    version,
    about = "Bake fonts and sprites into a packed atlas and asset archive"
)]
struct Cli {
    /// Bake manifest (TOML).
    #[arg(value_name = "MANIFEST")]
    manifest: PathBuf,

    /// Overrides the manifest's `output`.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Log per-asset details.
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli.manifest)?;
    if let Some(output) = cli.output {
        config = config.with_output(output);
    }

    init_logging(effective_level(cli.verbose, config.log_level))
        .context("could not install the logger")?;

    let report = bake(&config)?;
    info!(
        "wrote {} ({} bytes, {} assets, atlas {}x{})",
        report.output.display(),
        report.bytes_written,
        report.asset_count,
        report.atlas_width,
        report.atlas_height
    );
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
