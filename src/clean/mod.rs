//! Cleaning and normalization of the raw upstream exports
//!
//! Per table: headers are normalized and renamed to canonical names, date
//! fields are collapsed to calendar days, non-country rows are dropped, and
//! rows are sorted by (entity, date). When the upstream reports an entity
//! more than once on the same day only the latest report is kept.
//!
//! Empty `confirmed`/`deaths` cells read as zero; every other count stays
//! `None` when empty.

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{FederatedCountry, RawCaseSnapshot, RawTimeSeriesRow};
use crate::table::{Column, ColumnRename, RawTable, Row, TableError, normalize_iso3};

const SNAPSHOT_RENAMES: &[ColumnRename] = &[
    ("long", "lon"),
    ("mortality_rate", "case_fatality_ratio"),
    ("incidence_rate", "incident_rate"),
];

const TIME_SERIES_RENAMES: &[ColumnRename] = &[
    ("last_update", "date"),
    ("incidence_rate", "incident_rate"),
    ("report_date_string", "report_date"),
];

/// The three raw exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Sub-national snapshot (`cases.csv`)
    Cases,
    /// Per-country snapshot (`cases_country.csv`)
    CountrySnapshot,
    /// Daily history (`cases_time.csv`)
    TimeSeries,
}

impl TableKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cases => "cases",
            Self::CountrySnapshot => "cases_country",
            Self::TimeSeries => "cases_time",
        }
    }

    /// Source-specific column renames
    pub fn renames(&self) -> &'static [ColumnRename] {
        match self {
            Self::Cases | Self::CountrySnapshot => SNAPSHOT_RENAMES,
            Self::TimeSeries => TIME_SERIES_RENAMES,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Filters applied while cleaning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanOptions {
    /// Entities that are not countries (cruise ships, the Holy See)
    pub excluded_entities: Vec<String>,
}

impl CleanOptions {
    fn is_excluded(&self, country: &str, province: Option<&str>) -> bool {
        self.excluded_entities
            .iter()
            .any(|e| e == country || province == Some(e.as_str()))
    }
}

/// What cleaning did to one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    pub kind: TableKind,
    pub input_rows: usize,
    pub dropped_missing_name: usize,
    pub dropped_missing_iso3: usize,
    pub dropped_excluded: usize,
    pub collapsed_duplicates: usize,
}

impl CleanReport {
    fn new(kind: TableKind, input_rows: usize) -> Self {
        Self {
            kind,
            input_rows,
            dropped_missing_name: 0,
            dropped_missing_iso3: 0,
            dropped_excluded: 0,
            collapsed_duplicates: 0,
        }
    }

    /// Rows that survived cleaning
    pub fn output_rows(&self) -> usize {
        self.input_rows
            - self.dropped_missing_name
            - self.dropped_missing_iso3
            - self.dropped_excluded
            - self.collapsed_duplicates
    }

    fn log(&self) {
        if self.dropped_missing_name > 0 {
            warn!(
                table = self.kind.name(),
                dropped = self.dropped_missing_name,
                "Dropped rows without a country name"
            );
        }
        if self.dropped_missing_iso3 > 0 {
            warn!(
                table = self.kind.name(),
                dropped = self.dropped_missing_iso3,
                "Dropped rows without a valid ISO3 code"
            );
        }
        info!(
            table = self.kind.name(),
            rows = self.output_rows(),
            excluded = self.dropped_excluded,
            collapsed = self.collapsed_duplicates,
            "Cleaned table"
        );
    }
}

/// Cleaned rows plus the cleaning report
#[derive(Debug, Clone, PartialEq)]
pub struct CleanTable<T> {
    pub rows: Vec<T>,
    pub report: CleanReport,
}

/// Output of [`clean`], typed by table kind
#[derive(Debug, Clone, PartialEq)]
pub enum CleanOutput {
    Snapshot(CleanTable<RawCaseSnapshot>),
    TimeSeries(CleanTable<RawTimeSeriesRow>),
}

impl CleanOutput {
    pub fn report(&self) -> &CleanReport {
        match self {
            Self::Snapshot(t) => &t.report,
            Self::TimeSeries(t) => &t.report,
        }
    }
}

/// Read a raw export with the renames for its kind
pub fn read_raw(path: &Path, kind: TableKind) -> Result<RawTable, TableError> {
    RawTable::read(path, kind.renames())
}

/// Clean a raw table of the given kind
pub fn clean(
    raw: &RawTable,
    kind: TableKind,
    options: &CleanOptions,
) -> Result<CleanOutput, TableError> {
    match kind {
        TableKind::Cases | TableKind::CountrySnapshot => {
            clean_snapshot(raw, kind, options).map(CleanOutput::Snapshot)
        }
        TableKind::TimeSeries => clean_time_series(raw, options).map(CleanOutput::TimeSeries),
    }
}

/// Clean a cross-sectional snapshot (`cases.csv` or `cases_country.csv`)
pub fn clean_snapshot(
    raw: &RawTable,
    kind: TableKind,
    options: &CleanOptions,
) -> Result<CleanTable<RawCaseSnapshot>, TableError> {
    let country = raw.column("country_region")?;
    let iso3 = raw.column("iso3")?;
    let last_update = raw.column("last_update")?;
    let confirmed = raw.column("confirmed")?;
    let deaths = raw.column("deaths")?;
    let province = raw.optional_column("province_state");
    let admin2 = raw.optional_column("admin2");
    let lat = raw.optional_column("lat");
    let lon = raw.optional_column("lon");
    let recovered = raw.optional_column("recovered");
    let active = raw.optional_column("active");
    let incident_rate = raw.optional_column("incident_rate");
    let case_fatality_ratio = raw.optional_column("case_fatality_ratio");
    let people_tested = raw.optional_column("people_tested");
    let people_hospitalized = raw.optional_column("people_hospitalized");
    let uid = raw.optional_column("uid");

    let mut report = CleanReport::new(kind, raw.len());
    let mut rows = Vec::with_capacity(raw.len());

    for row in raw.rows() {
        let Some(name) = row.text(&country) else {
            report.dropped_missing_name += 1;
            continue;
        };
        let province_state = row.text_opt(province.as_ref());
        if options.is_excluded(&name, province_state.as_deref()) {
            report.dropped_excluded += 1;
            continue;
        }
        let Some(code) = normalize_iso3(row.cell(&iso3)) else {
            report.dropped_missing_iso3 += 1;
            continue;
        };
        let timestamp = required_timestamp(&row, &last_update)?;

        rows.push(RawCaseSnapshot {
            country_region: name,
            province_state,
            admin2: row.text_opt(admin2.as_ref()),
            iso3: code,
            last_update: timestamp,
            date: timestamp.date(),
            lat: row.float_opt(lat.as_ref())?,
            lon: row.float_opt(lon.as_ref())?,
            confirmed: row.count(&confirmed)?.unwrap_or(0),
            deaths: row.count(&deaths)?.unwrap_or(0),
            recovered: row.count_opt(recovered.as_ref())?,
            active: row.count_opt(active.as_ref())?,
            incident_rate: row.float_opt(incident_rate.as_ref())?,
            case_fatality_ratio: row.float_opt(case_fatality_ratio.as_ref())?,
            people_tested: row.count_opt(people_tested.as_ref())?,
            people_hospitalized: row.count_opt(people_hospitalized.as_ref())?,
            uid: row.count_opt(uid.as_ref())?,
        });
    }

    report.collapsed_duplicates = sort_and_collapse(&mut rows);
    report.log();
    Ok(CleanTable { rows, report })
}

/// Clean the daily history (`cases_time.csv`)
pub fn clean_time_series(
    raw: &RawTable,
    options: &CleanOptions,
) -> Result<CleanTable<RawTimeSeriesRow>, TableError> {
    let country = raw.column("country_region")?;
    let iso3 = raw.column("iso3")?;
    let date = raw.column("date")?;
    let confirmed = raw.column("confirmed")?;
    let deaths = raw.column("deaths")?;
    let province = raw.optional_column("province_state");
    let recovered = raw.optional_column("recovered");
    let active = raw.optional_column("active");
    let delta_confirmed = raw.optional_column("delta_confirmed");
    let delta_recovered = raw.optional_column("delta_recovered");
    let incident_rate = raw.optional_column("incident_rate");
    let people_tested = raw.optional_column("people_tested");
    let people_hospitalized = raw.optional_column("people_hospitalized");
    let uid = raw.optional_column("uid");
    let report_date = raw.optional_column("report_date");

    let mut report = CleanReport::new(TableKind::TimeSeries, raw.len());
    let mut rows = Vec::with_capacity(raw.len());

    for row in raw.rows() {
        let Some(name) = row.text(&country) else {
            report.dropped_missing_name += 1;
            continue;
        };
        let province_state = row.text_opt(province.as_ref());
        if options.is_excluded(&name, province_state.as_deref()) {
            report.dropped_excluded += 1;
            continue;
        }
        let Some(code) = normalize_iso3(row.cell(&iso3)) else {
            report.dropped_missing_iso3 += 1;
            continue;
        };
        let timestamp = required_timestamp(&row, &date)?;

        rows.push(RawTimeSeriesRow {
            country_region: name,
            province_state,
            iso3: code,
            last_update: timestamp,
            date: timestamp.date(),
            confirmed: row.count(&confirmed)?.unwrap_or(0),
            deaths: row.count(&deaths)?.unwrap_or(0),
            recovered: row.count_opt(recovered.as_ref())?,
            active: row.count_opt(active.as_ref())?,
            delta_confirmed: row.count_opt(delta_confirmed.as_ref())?,
            delta_recovered: row.count_opt(delta_recovered.as_ref())?,
            incident_rate: row.float_opt(incident_rate.as_ref())?,
            people_tested: row.count_opt(people_tested.as_ref())?,
            people_hospitalized: row.count_opt(people_hospitalized.as_ref())?,
            uid: row.count_opt(uid.as_ref())?,
            report_date: row.day_opt(report_date.as_ref())?,
        });
    }

    report.collapsed_duplicates = sort_and_collapse(&mut rows);
    report.log();
    Ok(CleanTable { rows, report })
}

/// Separate the federated country's sub-national rows from the per-country rows
///
/// Returns `(per_country, sub_national)`; relative order is kept in both.
pub fn split_federated(
    rows: Vec<RawTimeSeriesRow>,
    federated: &FederatedCountry,
) -> (Vec<RawTimeSeriesRow>, Vec<RawTimeSeriesRow>) {
    rows.into_iter()
        .partition(|r| !(federated.matches(&r.country_region) && r.is_sub_national()))
}

fn required_timestamp(row: &Row<'_>, column: &Column) -> Result<NaiveDateTime, TableError> {
    row.timestamp(column)?
        .ok_or_else(|| row.error(column, "missing date"))
}

/// Rows that share an entity-day key
trait EntityDay {
    fn key(&self) -> (&str, Option<&str>, Option<&str>, NaiveDate);
    fn reported_at(&self) -> NaiveDateTime;
}

impl EntityDay for RawCaseSnapshot {
    fn key(&self) -> (&str, Option<&str>, Option<&str>, NaiveDate) {
        (
            &self.country_region,
            self.province_state.as_deref(),
            self.admin2.as_deref(),
            self.date,
        )
    }

    fn reported_at(&self) -> NaiveDateTime {
        self.last_update
    }
}

impl EntityDay for RawTimeSeriesRow {
    fn key(&self) -> (&str, Option<&str>, Option<&str>, NaiveDate) {
        (
            &self.country_region,
            self.province_state.as_deref(),
            None,
            self.date,
        )
    }

    fn reported_at(&self) -> NaiveDateTime {
        self.last_update
    }
}

/// Sort by entity then day, keeping the latest report per entity-day; returns rows removed
fn sort_and_collapse<T: EntityDay>(rows: &mut Vec<T>) -> usize {
    rows.sort_by(|a, b| match a.key().cmp(&b.key()) {
        Ordering::Equal => b.reported_at().cmp(&a.reported_at()),
        other => other,
    });
    let before = rows.len();
    rows.dedup_by(|later, kept| later.key() == kept.key());
    before - rows.len()
}
