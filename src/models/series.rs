//! The enriched time series every view reads from

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::table::{self, TableError};

/// One (country, date) row after aggregation, reference joins and derived metrics
///
/// Rate and normalization columns are `None` where the value is undefined
/// (missing population, fewer than two observations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRow {
    pub country_region: String,
    pub iso3: String,
    pub continent: Option<String>,
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: Option<i64>,
    pub active: Option<i64>,
    pub people_tested: Option<i64>,
    pub people_hospitalized: Option<i64>,
    pub population: Option<f64>,
    pub delta_confirmed: i64,
    pub delta_deaths: i64,
    pub log_confirmed: f64,
    pub log_delta_confirmed: f64,
    pub log_deaths: f64,
    pub scaled_confirmed: f64,
    pub std_confirmed: Option<f64>,
    pub norm_confirmed: f64,
    pub confirmed_pr_100k: Option<f64>,
    pub deaths_pr_100k: Option<f64>,
}

/// Rows sorted by (country, date), exactly one per pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTimeSeries {
    rows: Vec<EnrichedRow>,
}

impl EnrichedTimeSeries {
    /// Wrap rows, sorting them by (country, date)
    pub fn new(mut rows: Vec<EnrichedRow>) -> Self {
        rows.sort_by(|a, b| {
            a.country_region
                .cmp(&b.country_region)
                .then(a.date.cmp(&b.date))
        });
        Self { rows }
    }

    /// All rows
    pub fn rows(&self) -> &[EnrichedRow] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The contiguous series for one country, empty if absent
    pub fn series(&self, country: &str) -> &[EnrichedRow] {
        let start = self
            .rows
            .partition_point(|r| r.country_region.as_str() < country);
        let end = self
            .rows
            .partition_point(|r| r.country_region.as_str() <= country);
        &self.rows[start..end]
    }

    /// Iterate over per-country groups in name order
    pub fn groups(&self) -> impl Iterator<Item = &[EnrichedRow]> {
        self.rows
            .chunk_by(|a, b| a.country_region == b.country_region)
    }

    /// Distinct country names in order
    pub fn countries(&self) -> Vec<&str> {
        self.groups().map(|g| g[0].country_region.as_str()).collect()
    }

    /// Serialize to CSV
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, TableError> {
        table::to_csv_bytes(&self.rows)
    }

    /// Write to a CSV file
    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        table::write_csv(&self.rows, path)
    }
}

impl From<Vec<EnrichedRow>> for EnrichedTimeSeries {
    fn from(rows: Vec<EnrichedRow>) -> Self {
        Self::new(rows)
    }
}
