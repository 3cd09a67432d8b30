//! Read-only views over a built dataset
//!
//! These are the entry points the presentation layer calls. None of them
//! mutate their inputs; each returns a borrowed slice or a freshly built table.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::aggregate::build_world_snapshot;
use crate::metrics::{WeeklyAgg, WeeklyExclusion, resample_weekly};
use crate::models::{
    CaseStatus, DeltaRow, DeltaTable, EnrichedRow, EnrichedTimeSeries, RankedRow, RankedTable,
    RawCaseSnapshot, StatusCount, WeeklyTable, WorldRow, WorldSnapshot,
};
use crate::reference::ReferenceData;

/// The most recent delta per country
pub fn get_delta_confirmed(time_series: &EnrichedTimeSeries) -> DeltaTable {
    let rows = time_series
        .groups()
        .filter_map(|series| series.last())
        .map(|last| DeltaRow {
            country_region: last.country_region.clone(),
            date: last.date,
            delta_confirmed: last.delta_confirmed,
        })
        .collect();
    DeltaTable::new(rows)
}

/// Build the world snapshot from cleaned country rows and a delta table
pub fn get_world_source(
    countries: &[RawCaseSnapshot],
    delta: &DeltaTable,
    reference: &ReferenceData,
) -> WorldSnapshot {
    build_world_snapshot(countries, delta, reference)
}

/// One country's history with its first-case and last-reported dates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountryData<'a> {
    pub series: &'a [EnrichedRow],
    /// First date with a confirmed case; `None` if the country never had one
    pub first_case: Option<NaiveDate>,
    pub last_update: NaiveDate,
}

/// Look up a country's sub-series
pub fn get_country_data<'a>(
    time_series: &'a EnrichedTimeSeries,
    country: &str,
) -> PipelineResult<CountryData<'a>> {
    let series = time_series.series(country);
    let last = series
        .last()
        .ok_or_else(|| PipelineError::UnknownCountry(country.to_string()))?;
    let first_case = series.iter().find(|r| r.confirmed > 0).map(|r| r.date);
    Ok(CountryData {
        series,
        first_case,
        last_update: last.date,
    })
}

/// Restrict a date-sorted sub-series to `[start, end]`
///
/// An inverted range yields an empty slice.
pub fn get_interval_data(series: &[EnrichedRow], start: NaiveDate, end: NaiveDate) -> &[EnrichedRow] {
    if start > end {
        return &[];
    }
    let lo = series.partition_point(|r| r.date < start);
    let hi = series.partition_point(|r| r.date <= end);
    &series[lo..hi.max(lo)]
}

/// Weekly trajectory for the named countries
///
/// Unknown names are skipped. An empty list selects every country.
pub fn get_weekly_avg(
    time_series: &EnrichedTimeSeries,
    countries: &[&str],
    agg: WeeklyAgg,
    exclusion: &WeeklyExclusion,
) -> WeeklyTable {
    if countries.is_empty() {
        return resample_weekly(time_series.groups(), agg, exclusion);
    }
    let mut names: Vec<&str> = countries.to_vec();
    names.sort_unstable();
    names.dedup();
    let groups = names
        .into_iter()
        .map(|name| time_series.series(name))
        .filter(|series| !series.is_empty());
    resample_weekly(groups, agg, exclusion)
}

/// Active count for the ranking, repaired when the upstream figures disagree
fn reconciled_active(row: &WorldRow) -> i64 {
    let recovered = row.recovered.unwrap_or(0);
    match row.active {
        Some(active) if active + row.deaths + recovered == row.confirmed => active,
        _ => row.confirmed - row.deaths - recovered,
    }
}

/// Top `n` countries by confirmed count, one row per (country, status)
///
/// Ties on confirmed count keep name order.
pub fn get_most_affected(world: &WorldSnapshot, n: usize) -> RankedTable {
    let mut ranked: Vec<&WorldRow> = world.rows().iter().collect();
    ranked.sort_by(|a, b| b.confirmed.cmp(&a.confirmed));

    let rows = ranked
        .into_iter()
        .take(n)
        .flat_map(|row| {
            CaseStatus::breakdown().into_iter().map(move |status| {
                let count = match status {
                    CaseStatus::Active => reconciled_active(row),
                    CaseStatus::Recovered => row.recovered.unwrap_or(0),
                    CaseStatus::Deaths => row.deaths,
                    CaseStatus::Confirmed => row.confirmed,
                };
                RankedRow {
                    country_region: row.country_region.clone(),
                    status,
                    count,
                }
            })
        })
        .collect();
    RankedTable { rows }
}

/// Headline figures for one country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountrySummary {
    pub country_region: String,
    pub date: NaiveDate,
    pub population: Option<f64>,
    pub confirmed: i64,
    pub delta_confirmed: Option<i64>,
    pub deaths: i64,
    pub recovered: Option<i64>,
    pub active: Option<i64>,
    pub confirmed_pr_100k: Option<f64>,
    pub delta_pr_100k: Option<f64>,
    pub deaths_pr_100k: Option<f64>,
}

pub fn get_country_summary(world: &WorldSnapshot, country: &str) -> PipelineResult<CountrySummary> {
    let row = world
        .get(country)
        .ok_or_else(|| PipelineError::UnknownCountry(country.to_string()))?;
    Ok(CountrySummary {
        country_region: row.country_region.clone(),
        date: row.date,
        population: row.population,
        confirmed: row.confirmed,
        delta_confirmed: row.delta_confirmed,
        deaths: row.deaths,
        recovered: row.recovered,
        active: row.active,
        confirmed_pr_100k: row.confirmed_pr_100k,
        delta_pr_100k: row.delta_pr_100k,
        deaths_pr_100k: row.deaths_pr_100k,
    })
}

/// Worldwide totals in the order confirmed, active, deaths, recovered
pub fn world_summary(world: &WorldSnapshot) -> Vec<StatusCount> {
    let rows = world.rows();
    let total = |f: fn(&WorldRow) -> i64| rows.iter().map(f).sum::<i64>();
    vec![
        StatusCount {
            status: CaseStatus::Confirmed,
            count: total(|r| r.confirmed),
        },
        StatusCount {
            status: CaseStatus::Active,
            count: total(|r| r.active.unwrap_or(0)),
        },
        StatusCount {
            status: CaseStatus::Deaths,
            count: total(|r| r.deaths),
        },
        StatusCount {
            status: CaseStatus::Recovered,
            count: total(|r| r.recovered.unwrap_or(0)),
        },
    ]
}

/// Distinct country names in the series, sorted
pub fn unique_countries(time_series: &EnrichedTimeSeries) -> Vec<&str> {
    time_series.countries()
}

/// Rows of the selected countries for the infection heatmap, in selection order
///
/// Unknown names are skipped.
pub fn heatmap_selection<'a>(
    time_series: &'a EnrichedTimeSeries,
    countries: &[&str],
) -> Vec<&'a EnrichedRow> {
    let mut seen: Vec<&str> = Vec::with_capacity(countries.len());
    let mut rows = Vec::new();
    for &name in countries {
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);
        rows.extend(time_series.series(name));
    }
    rows
}

/// Columns the world map can be colored by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapMetric {
    #[default]
    ConfirmedPr100k,
    DeathsPr100k,
    Confirmed,
    Recovered,
}

impl MapMetric {
    pub fn all() -> [Self; 4] {
        [
            Self::ConfirmedPr100k,
            Self::DeathsPr100k,
            Self::Confirmed,
            Self::Recovered,
        ]
    }

    /// Snapshot column the metric reads
    pub fn column(&self) -> &'static str {
        match self {
            Self::ConfirmedPr100k => "confirmed_pr_100k",
            Self::DeathsPr100k => "deaths_pr_100k",
            Self::Confirmed => "confirmed",
            Self::Recovered => "recovered",
        }
    }

    /// Display title
    pub fn title(&self) -> &'static str {
        match self {
            Self::ConfirmedPr100k => "Cases pr. 100.000",
            Self::DeathsPr100k => "Deaths pr. 100.000",
            Self::Confirmed => "Confirmed cases",
            Self::Recovered => "Recovered patients",
        }
    }

    pub fn value(&self, row: &WorldRow) -> Option<f64> {
        match self {
            Self::ConfirmedPr100k => row.confirmed_pr_100k,
            Self::DeathsPr100k => row.deaths_pr_100k,
            Self::Confirmed => Some(row.confirmed as f64),
            Self::Recovered => row.recovered.map(|r| r as f64),
        }
    }
}

impl fmt::Display for MapMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for MapMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|m| m.column().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown map metric: {s}"))
    }
}
