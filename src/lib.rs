//! COVID-19 Dashboard - data pipeline behind the dashboard views
//!
//! Provides:
//! - Change-gated synchronization of the raw upstream exports
//! - Reference tables (population, ISO codes, continents) with editable patches
//! - Cleaning, federated rollup and reference joins
//! - Derived per-country metrics and weekly resampling
//! - A memoized dashboard facade and the query functions the views call

pub mod aggregate;
pub mod clean;
pub mod cli;
pub mod fetch;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod reference;
pub mod table;

// Re-export commonly used types
pub use fetch::{FetchError, FetchResult, Fetcher, SyncOutcome, UpstreamClient};
pub use models::{
    CaseStatus, DeltaTable, EnrichedRow, EnrichedTimeSeries, FederatedCountry, RankedTable,
    WeeklyTable, WorldRow, WorldSnapshot,
};
pub use pipeline::{Dashboard, Dataset, PipelineConfig, PipelineError, PipelineResult};
pub use reference::{ReferenceData, ReferenceError};
pub use table::TableError;
