//! Cross-sectional tables: latest delta per country and the world snapshot

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::table::{self, TableError};

/// Most recent single-day delta for one country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaRow {
    pub country_region: String,
    pub date: NaiveDate,
    pub delta_confirmed: i64,
}

/// One [`DeltaRow`] per country, sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaTable {
    rows: Vec<DeltaRow>,
}

impl DeltaTable {
    pub fn new(mut rows: Vec<DeltaRow>) -> Self {
        rows.sort_by(|a, b| a.country_region.cmp(&b.country_region));
        Self { rows }
    }

    pub fn rows(&self) -> &[DeltaRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a country's latest delta
    pub fn get(&self, country: &str) -> Option<&DeltaRow> {
        self.rows
            .binary_search_by(|r| r.country_region.as_str().cmp(country))
            .ok()
            .map(|i| &self.rows[i])
    }
}

/// One country in the most recent cross-section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldRow {
    pub country_region: String,
    pub iso3: String,
    pub continent: Option<String>,
    pub date: NaiveDate,
    pub uid: Option<i64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: Option<i64>,
    pub active: Option<i64>,
    pub incident_rate: Option<f64>,
    pub case_fatality_ratio: Option<f64>,
    pub population: Option<f64>,
    /// Population was backed out of the incident rate rather than looked up
    pub population_inferred: bool,
    pub delta_confirmed: Option<i64>,
    pub confirmed_pr_100k: Option<f64>,
    pub deaths_pr_100k: Option<f64>,
    pub delta_pr_100k: Option<f64>,
}

/// One [`WorldRow`] per country, sorted by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    rows: Vec<WorldRow>,
}

impl WorldSnapshot {
    pub fn new(mut rows: Vec<WorldRow>) -> Self {
        rows.sort_by(|a, b| a.country_region.cmp(&b.country_region));
        Self { rows }
    }

    pub fn rows(&self) -> &[WorldRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a country by display name
    pub fn get(&self, country: &str) -> Option<&WorldRow> {
        self.rows
            .binary_search_by(|r| r.country_region.as_str().cmp(country))
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Most recent update date across all countries
    pub fn last_update(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|r| r.date).max()
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, TableError> {
        table::to_csv_bytes(&self.rows)
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        table::write_csv(&self.rows, path)
    }
}
