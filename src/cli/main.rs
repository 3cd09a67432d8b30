//! covid-dashboard-cli binary
//!
//! Runs the data pipeline behind the dashboard from the command line: keep the
//! raw exports in sync with upstream, rebuild the output tables, and print the
//! views the dashboard shows.

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use covid_dashboard::cli::commands::build::{BuildArgs, handle_build};
use covid_dashboard::cli::commands::query::{
    CountryArgs, WeeklyArgs, handle_country, handle_top, handle_weekly,
};
use covid_dashboard::cli::commands::sync::handle_sync;
use covid_dashboard::metrics::WeeklyAgg;
use covid_dashboard::pipeline::{PipelineConfig, UpstreamConfig};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "COVID-19 dashboard data pipeline")]
struct Cli {
    /// Path to a TOML pipeline configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding raw files, the version marker and reference tables
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Never contact the upstream repository
    #[arg(long, global = true)]
    offline: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the raw exports if the upstream version changed
    Sync,
    /// Run the pipeline and write time_series.csv and world.csv
    Build {
        /// Output directory (defaults to the data directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print one country's daily series
    Country {
        name: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Print the most affected countries
    Top {
        #[arg(short)]
        n: Option<usize>,
    },
    /// Print weekly trajectories; no names selects every country
    Weekly {
        countries: Vec<String>,
        /// Aggregate within a week: max or mean
        #[arg(long, default_value = "mean")]
        agg: WeeklyAgg,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if cli.offline {
        let upstream = config.upstream.clone();
        config = config.with_upstream(UpstreamConfig {
            enabled: false,
            ..upstream
        });
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Command::Sync => handle_sync(&config)?,
        Command::Build { output } => handle_build(config, &BuildArgs { output_dir: output })?,
        Command::Country { name, start, end } => {
            handle_country(config, &CountryArgs { name, start, end })?
        }
        Command::Top { n } => handle_top(config, n)?,
        Command::Weekly { countries, agg } => {
            handle_weekly(config, &WeeklyArgs { countries, agg })?
        }
    }
    Ok(())
}
