//! Presentation-facing tables derived from the enriched series

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One (country, week) point of a trajectory plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRow {
    pub country_region: String,
    /// The Sunday closing the calendar week
    pub week_ending: NaiveDate,
    pub log_confirmed: f64,
    pub log_delta_confirmed: f64,
}

/// Weekly resampled rows sorted by (country, week)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTable {
    pub rows: Vec<WeeklyRow>,
}

impl WeeklyTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct countries present, in order
    pub fn countries(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .rows
            .iter()
            .map(|r| r.country_region.as_str())
            .collect();
        names.dedup();
        names
    }
}

/// Case status used by the ranking and summary views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Confirmed,
    Active,
    Recovered,
    Deaths,
}

impl CaseStatus {
    /// Statuses a confirmed total splits into, in display order
    pub fn breakdown() -> [Self; 3] {
        [Self::Active, Self::Recovered, Self::Deaths]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Active => "active",
            Self::Recovered => "recovered",
            Self::Deaths => "deaths",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One (country, status) pair of the most-affected ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedRow {
    pub country_region: String,
    pub status: CaseStatus,
    pub count: i64,
}

/// Long-format ranking, countries ordered by confirmed count descending
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedTable {
    pub rows: Vec<RankedRow>,
}

impl RankedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ranked country names, most affected first
    pub fn countries(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .rows
            .iter()
            .map(|r| r.country_region.as_str())
            .collect();
        names.dedup();
        names
    }
}

/// A labelled total for summary bar charts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: CaseStatus,
    pub count: i64,
}
