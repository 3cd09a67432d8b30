//! Sync command implementation

use crate::cli::error::CliError;
use crate::cli::output::format_sync_outcome;
use crate::fetch::Fetcher;
use crate::pipeline::{PipelineConfig, PipelineError, connect_upstream};

/// Handle the `sync` command
pub fn handle_sync(config: &PipelineConfig) -> Result<(), CliError> {
    config.validate().map_err(CliError::InvalidArgument)?;
    let client = connect_upstream(config)?;
    let fetcher = Fetcher::new(
        client,
        &config.data_dir,
        &config.marker_file,
        config.raw_sources(),
    );

    let outcome = fetcher.synchronize().map_err(PipelineError::from)?;
    print!("{}", format_sync_outcome(&outcome));
    Ok(())
}
