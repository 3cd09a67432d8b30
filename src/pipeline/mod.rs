//! End-to-end pipeline from raw exports to dashboard-ready tables
//!
//! This module ties the components together:
//! - Configuration of data locations, upstream endpoints and filters
//! - A staged executor producing a [`Dataset`] with a per-stage report
//! - A memoized [`Dashboard`] facade that rebuilds only when local data changes
//! - Read-only query functions over a built dataset
//!
//! # Example
//!
//! ```rust,ignore
//! use covid_dashboard::pipeline::{Dashboard, PipelineConfig, get_most_affected};
//!
//! let config = PipelineConfig::from_toml_file("dashboard.toml".as_ref())?;
//! let dashboard = Dashboard::open(config)?;
//!
//! dashboard.synchronize()?;
//! let dataset = dashboard.dataset()?;
//! let ranked = get_most_affected(&dataset.world, 10);
//! ```
//!
//! # Pipeline Stages
//!
//! 1. **Load**: Read the three raw exports
//! 2. **Clean**: Normalize names and types, drop rows without an ISO3 code
//! 3. **Aggregate**: Roll up the federated country, join reference tables
//! 4. **Derive**: Deltas, logs, scaling and per-capita rates
//! 5. **Snapshot**: Latest delta per country and the world cross-section

mod cache;
mod config;
mod dashboard;
mod error;
mod executor;
mod queries;
mod report;

pub use cache::{CacheToken, Memo};
pub use config::{PipelineConfig, PipelineStage, RawFiles, ReferenceFiles, UpstreamConfig};
pub use dashboard::{Dashboard, connect_upstream};
pub use error::{PipelineError, PipelineResult};
pub use executor::{Dataset, PipelineExecutor, run_pipeline};
pub use queries::{
    CountryData, CountrySummary, MapMetric, get_country_data, get_country_summary,
    get_delta_confirmed, get_interval_data, get_most_affected, get_weekly_avg, get_world_source,
    heatmap_selection, unique_countries, world_summary,
};
pub use report::{PipelineReport, PipelineStatus, StageOutput};
