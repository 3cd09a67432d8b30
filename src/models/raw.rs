//! Cleaned upstream rows
//!
//! These are the typed forms of the three raw exports after header
//! normalization, date parsing and ISO3 validation.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One row of a cross-sectional snapshot (`cases.csv`, `cases_country.csv`)
///
/// One row per country, or per sub-national unit for the federated country.
/// Superseded wholesale by the next fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCaseSnapshot {
    pub country_region: String,
    pub province_state: Option<String>,
    pub admin2: Option<String>,
    pub iso3: String,
    pub last_update: NaiveDateTime,
    pub date: NaiveDate,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: Option<i64>,
    pub active: Option<i64>,
    pub incident_rate: Option<f64>,
    pub case_fatality_ratio: Option<f64>,
    pub people_tested: Option<i64>,
    pub people_hospitalized: Option<i64>,
    pub uid: Option<i64>,
}

impl RawCaseSnapshot {
    /// Whether this row describes a sub-national unit
    pub fn is_sub_national(&self) -> bool {
        self.province_state.is_some()
    }
}

/// One row of the time-series export (`cases_time.csv`)
///
/// One row per country (or sub-national unit) per reporting day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTimeSeriesRow {
    pub country_region: String,
    pub province_state: Option<String>,
    pub iso3: String,
    /// Full upstream timestamp, used to pick the latest report within a day
    pub last_update: NaiveDateTime,
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: Option<i64>,
    pub active: Option<i64>,
    /// Upstream-reported daily deltas; summed by the federated rollup
    pub delta_confirmed: Option<i64>,
    pub delta_recovered: Option<i64>,
    pub incident_rate: Option<f64>,
    pub people_tested: Option<i64>,
    pub people_hospitalized: Option<i64>,
    pub uid: Option<i64>,
    pub report_date: Option<NaiveDate>,
}

impl RawTimeSeriesRow {
    /// Whether this row describes a sub-national unit
    pub fn is_sub_national(&self) -> bool {
        self.province_state.is_some()
    }
}

/// The one country reported at sub-national granularity
///
/// Identity fields are lost when its sub-national rows are summed, so they are
/// re-attached from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedCountry {
    /// Display name used by the case-count source
    pub name: String,
    /// ISO3 join key
    pub iso3: String,
    /// Upstream numeric identifier for the national series
    pub uid: i64,
}

impl Default for FederatedCountry {
    fn default() -> Self {
        Self {
            name: "US".to_string(),
            iso3: "USA".to_string(),
            uid: 840,
        }
    }
}

impl FederatedCountry {
    /// Check whether a row's country is the federated one
    pub fn matches(&self, country_region: &str) -> bool {
        self.name == country_region
    }
}
