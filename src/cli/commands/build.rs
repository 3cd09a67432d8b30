//! Build command implementation

use std::fs;
use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::cli::output::format_totals;
use crate::pipeline::{Dashboard, PipelineConfig, world_summary};

/// Arguments for the `build` command
pub struct BuildArgs {
    /// Where to write the output tables; defaults to the data directory
    pub output_dir: Option<PathBuf>,
}

/// Handle the `build` command
pub fn handle_build(config: PipelineConfig, args: &BuildArgs) -> Result<(), CliError> {
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.data_dir.clone());
    let dashboard = Dashboard::open(config)?;
    let dataset = dashboard.dataset()?;

    fs::create_dir_all(&output_dir)
        .map_err(|e| CliError::FileWriteError(output_dir.clone(), e.to_string()))?;

    let series_path = output_dir.join("time_series.csv");
    dataset
        .time_series
        .write_csv(&series_path)
        .map_err(|e| CliError::FileWriteError(series_path.clone(), e.to_string()))?;

    let world_path = output_dir.join("world.csv");
    dataset
        .world
        .write_csv(&world_path)
        .map_err(|e| CliError::FileWriteError(world_path.clone(), e.to_string()))?;

    dataset.report.print_summary();
    eprintln!();
    eprintln!("Wrote {}", series_path.display());
    eprintln!("Wrote {}", world_path.display());

    if let Some(date) = dataset.world.last_update() {
        println!("World totals as of {}", date);
    }
    print!("{}", format_totals(&world_summary(&dataset.world)));
    Ok(())
}
