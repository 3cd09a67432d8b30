//! Read-only query commands: country, top, weekly

use chrono::NaiveDate;

use crate::cli::error::CliError;
use crate::cli::output::{format_country_header, format_ranked, format_series, format_weekly};
use crate::metrics::WeeklyAgg;
use crate::pipeline::{
    Dashboard, PipelineConfig, get_country_data, get_interval_data, get_most_affected,
    get_weekly_avg,
};

/// Arguments for the `country` command
pub struct CountryArgs {
    pub name: String,
    /// Defaults to the first date with a confirmed case
    pub start: Option<NaiveDate>,
    /// Defaults to the last reported date
    pub end: Option<NaiveDate>,
}

/// Arguments for the `weekly` command
pub struct WeeklyArgs {
    pub countries: Vec<String>,
    pub agg: WeeklyAgg,
}

/// Handle the `country` command
pub fn handle_country(config: PipelineConfig, args: &CountryArgs) -> Result<(), CliError> {
    let dashboard = Dashboard::open(config)?;
    let dataset = dashboard.dataset()?;
    let data = get_country_data(&dataset.time_series, &args.name)?;

    let default_start = data
        .first_case
        .or_else(|| data.series.first().map(|r| r.date))
        .unwrap_or(data.last_update);
    let start = args.start.unwrap_or(default_start);
    let end = args.end.unwrap_or(data.last_update);
    if start > end {
        return Err(CliError::InvalidArgument(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }

    print!("{}", format_country_header(&args.name, &data));
    print!("{}", format_series(get_interval_data(data.series, start, end)));
    Ok(())
}

/// Handle the `top` command
pub fn handle_top(config: PipelineConfig, n: Option<usize>) -> Result<(), CliError> {
    let n = n.unwrap_or(config.most_affected);
    if n == 0 {
        return Err(CliError::InvalidArgument("-n must be at least 1".to_string()));
    }
    let dashboard = Dashboard::open(config)?;
    let dataset = dashboard.dataset()?;

    print!("{}", format_ranked(&get_most_affected(&dataset.world, n)));
    Ok(())
}

/// Handle the `weekly` command
pub fn handle_weekly(config: PipelineConfig, args: &WeeklyArgs) -> Result<(), CliError> {
    let dashboard = Dashboard::open(config)?;
    let dataset = dashboard.dataset()?;

    let names: Vec<&str> = args.countries.iter().map(String::as_str).collect();
    for name in &names {
        if dataset.time_series.series(name).is_empty() {
            eprintln!("Warning: unknown country '{}' skipped", name);
        }
    }
    let table = get_weekly_avg(
        &dataset.time_series,
        &names,
        args.agg,
        &dashboard.config().weekly,
    );
    print!("{}", format_weekly(&table));
    Ok(())
}
