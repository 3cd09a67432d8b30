//! Derived metrics over per-country time series
//!
//! Every metric is computed per country over that country's full history, on
//! rows sorted by date. Undefined values follow fixed conventions instead of
//! producing errors:
//!
//! - the first delta of a series is 0
//! - `log_*` is `ln(x)` for `x >= 1` and `x` itself below that, so zero-count
//!   days plot at 0 on a log axis instead of `-inf`
//! - rates are `None` without a positive population
//! - z-scores are `None` with fewer than two points or no spread

mod weekly;

use crate::aggregate::JoinedRow;
use crate::models::{EnrichedRow, EnrichedTimeSeries};

pub use weekly::{WeeklyAgg, WeeklyExclusion, resample_weekly, week_ending};

/// First differences; the first element is 0
pub fn deltas(values: &[i64]) -> Vec<i64> {
    if values.is_empty() {
        return Vec::new();
    }
    std::iter::once(0)
        .chain(values.windows(2).map(|w| w[1].saturating_sub(w[0])))
        .collect()
}

/// `ln(x)` for `x >= 1`, otherwise `x` unchanged
pub fn log_or_identity(x: f64) -> f64 {
    if x >= 1.0 { x.ln() } else { x }
}

/// Min-max scale into [0, 1]; a constant series maps to 0
pub fn min_max_scale(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    values
        .iter()
        .map(|v| if range > 0.0 { (v - min) / range } else { 0.0 })
        .collect()
}

/// Z-scores against the sample mean and standard deviation
pub fn z_scores(values: &[f64]) -> Vec<Option<f64>> {
    let n = values.len();
    if n < 2 {
        return vec![None; n];
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let sd = variance.sqrt();
    if sd == 0.0 || !sd.is_finite() {
        return vec![None; n];
    }
    values.iter().map(|v| Some((v - mean) / sd)).collect()
}

/// Divide by the series maximum; a non-positive maximum maps to 0
pub fn max_normalize(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .map(|v| if max > 0.0 { v / max } else { 0.0 })
        .collect()
}

/// Value per 100 000 population
pub fn per_100k(value: f64, population: Option<f64>) -> Option<f64> {
    match population {
        Some(p) if p > 0.0 && p.is_finite() => Some(value * 100_000.0 / p),
        _ => None,
    }
}

/// Compute every derived column for joined rows
///
/// Rows are sorted by (country, date) first; each country is one group.
pub fn derive(mut rows: Vec<JoinedRow>) -> EnrichedTimeSeries {
    rows.sort_by(|a, b| {
        a.row
            .country_region
            .cmp(&b.row.country_region)
            .then(a.row.date.cmp(&b.row.date))
    });

    let mut enriched = Vec::with_capacity(rows.len());
    for group in rows.chunk_by(|a, b| a.row.country_region == b.row.country_region) {
        enriched.extend(derive_group(group));
    }
    EnrichedTimeSeries::new(enriched)
}

fn derive_group(group: &[JoinedRow]) -> Vec<EnrichedRow> {
    let confirmed: Vec<i64> = group.iter().map(|j| j.row.confirmed).collect();
    let deaths: Vec<i64> = group.iter().map(|j| j.row.deaths).collect();
    let confirmed_f: Vec<f64> = confirmed.iter().map(|&c| c as f64).collect();

    let delta_confirmed = deltas(&confirmed);
    let delta_deaths = deltas(&deaths);
    let scaled = min_max_scale(&confirmed_f);
    let std = z_scores(&confirmed_f);
    let norm = max_normalize(&confirmed_f);

    group
        .iter()
        .enumerate()
        .map(|(i, joined)| {
            let row = &joined.row;
            EnrichedRow {
                country_region: row.country_region.clone(),
                iso3: row.iso3.clone(),
                continent: joined.continent.clone(),
                date: row.date,
                confirmed: row.confirmed,
                deaths: row.deaths,
                recovered: row.recovered,
                active: row.active,
                people_tested: row.people_tested,
                people_hospitalized: row.people_hospitalized,
                population: joined.population,
                delta_confirmed: delta_confirmed[i],
                delta_deaths: delta_deaths[i],
                log_confirmed: log_or_identity(confirmed_f[i]),
                log_delta_confirmed: log_or_identity(delta_confirmed[i] as f64),
                log_deaths: log_or_identity(row.deaths as f64),
                scaled_confirmed: scaled[i],
                std_confirmed: std[i],
                norm_confirmed: norm[i],
                confirmed_pr_100k: per_100k(confirmed_f[i], joined.population),
                deaths_pr_100k: per_100k(row.deaths as f64, joined.population),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_start_at_zero() {
        assert_eq!(deltas(&[0, 0, 5, 5, 12]), vec![0, 0, 5, 0, 7]);
        assert_eq!(deltas(&[3]), vec![0]);
        assert!(deltas(&[]).is_empty());
        // Corrections show up as negative deltas
        assert_eq!(deltas(&[10, 8]), vec![0, -2]);
    }

    #[test]
    fn test_log_or_identity() {
        assert_eq!(log_or_identity(0.0), 0.0);
        assert_eq!(log_or_identity(-4.0), -4.0);
        assert_eq!(log_or_identity(0.5), 0.5);
        assert_eq!(log_or_identity(1.0), 0.0);
        assert!((log_or_identity(12.0) - 12f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_min_max_scale() {
        assert_eq!(min_max_scale(&[2.0, 4.0, 6.0]), vec![0.0, 0.5, 1.0]);
        assert_eq!(min_max_scale(&[5.0, 5.0]), vec![0.0, 0.0]);
        assert!(min_max_scale(&[]).is_empty());
    }

    #[test]
    fn test_z_scores() {
        let z = z_scores(&[1.0, 2.0, 3.0]);
        assert_eq!(z[0], Some(-1.0));
        assert_eq!(z[1], Some(0.0));
        assert_eq!(z[2], Some(1.0));
        assert_eq!(z_scores(&[4.0]), vec![None]);
        assert_eq!(z_scores(&[4.0, 4.0]), vec![None, None]);
    }

    #[test]
    fn test_max_normalize() {
        assert_eq!(max_normalize(&[0.0, 5.0, 10.0]), vec![0.0, 0.5, 1.0]);
        assert_eq!(max_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_per_100k() {
        assert_eq!(per_100k(50.0, Some(1_000_000.0)), Some(5.0));
        assert_eq!(per_100k(50.0, None), None);
        assert_eq!(per_100k(50.0, Some(0.0)), None);
    }
}
