//! Data models for the pipeline tables
//!
//! Rows flow raw → enriched → snapshot/views. Every table type keeps its rows
//! in a documented sort order so groupwise transforms can rely on it.

pub mod raw;
pub mod series;
pub mod snapshot;
pub mod views;

pub use raw::{FederatedCountry, RawCaseSnapshot, RawTimeSeriesRow};
pub use series::{EnrichedRow, EnrichedTimeSeries};
pub use snapshot::{DeltaRow, DeltaTable, WorldRow, WorldSnapshot};
pub use views::{CaseStatus, RankedRow, RankedTable, StatusCount, WeeklyRow, WeeklyTable};
