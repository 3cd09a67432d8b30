//! Aggregation and join engine
//!
//! Turns cleaned rows into the two canonical tables:
//! - the enriched time series: federated rollup, reference joins, derived metrics
//! - the world snapshot: latest row per country with delta, population and rates

mod federated;
mod join;

use std::collections::BTreeMap;

use tracing::debug;

use crate::clean::split_federated;
use crate::metrics::{self, per_100k};
use crate::models::{
    DeltaTable, EnrichedTimeSeries, FederatedCountry, RawCaseSnapshot, RawTimeSeriesRow,
    WorldRow, WorldSnapshot,
};
use crate::reference::ReferenceData;

pub use federated::{merge_national, rollup_federated};
pub use join::{JoinedRow, infer_population, join_reference};

/// Roll up the federated country and join reference data
///
/// The output has one row per (country, date) and the same number of rows
/// the national merge produced; joins never add or drop rows.
pub fn aggregate_time_series(
    clean: Vec<RawTimeSeriesRow>,
    reference: &ReferenceData,
    federated: &FederatedCountry,
) -> Vec<JoinedRow> {
    let (countries, sub_national) = split_federated(clean, federated);
    let rollup = rollup_federated(&sub_national, federated);
    debug!(
        sub_national = sub_national.len(),
        national = rollup.len(),
        "Rolled up federated country"
    );
    let merged = merge_national(countries, rollup, federated);
    join_reference(merged, reference)
}

/// Build the enriched time series from the cleaned daily history
pub fn build_time_series(
    clean: Vec<RawTimeSeriesRow>,
    reference: &ReferenceData,
    federated: &FederatedCountry,
) -> EnrichedTimeSeries {
    metrics::derive(aggregate_time_series(clean, reference, federated))
}

/// Build the most recent cross-section from the cleaned country snapshot
///
/// Population comes from the reference table, or is inferred from the
/// incident rate where the reference has none.
pub fn build_world_snapshot(
    clean_cases: &[RawCaseSnapshot],
    delta: &DeltaTable,
    reference: &ReferenceData,
) -> WorldSnapshot {
    let mut latest: BTreeMap<&str, &RawCaseSnapshot> = BTreeMap::new();
    for row in clean_cases.iter().filter(|r| !r.is_sub_national()) {
        latest
            .entry(row.country_region.as_str())
            .and_modify(|kept| {
                if row.date >= kept.date {
                    *kept = row;
                }
            })
            .or_insert(row);
    }

    let rows = latest
        .into_values()
        .map(|row| {
            let (population, population_inferred) = match reference.population(&row.iso3) {
                Some(p) => (Some(p), false),
                None => {
                    let inferred = infer_population(row.confirmed, row.incident_rate);
                    (inferred, inferred.is_some())
                }
            };
            let delta_confirmed = delta.get(&row.country_region).map(|d| d.delta_confirmed);

            WorldRow {
                country_region: row.country_region.clone(),
                iso3: row.iso3.clone(),
                continent: reference.continent(&row.iso3).map(str::to_string),
                date: row.date,
                uid: row.uid,
                lat: row.lat,
                lon: row.lon,
                confirmed: row.confirmed,
                deaths: row.deaths,
                recovered: row.recovered,
                active: row.active,
                incident_rate: row.incident_rate,
                case_fatality_ratio: row.case_fatality_ratio,
                population,
                population_inferred,
                delta_confirmed,
                confirmed_pr_100k: per_100k(row.confirmed as f64, population),
                deaths_pr_100k: per_100k(row.deaths as f64, population),
                delta_pr_100k: delta_confirmed.and_then(|d| per_100k(d as f64, population)),
            }
        })
        .collect();

    WorldSnapshot::new(rows)
}
