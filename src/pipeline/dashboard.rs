//! Long-lived facade the presentation layer holds
//!
//! A [`Dashboard`] owns the reference data (loaded once), the fetcher and the
//! memoized dataset. Every read goes through [`Dashboard::dataset`], which
//! reuses the last result while the marker and raw files are unchanged.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, info_span, warn};

use super::cache::{CacheToken, Memo};
use super::config::PipelineConfig;
use super::error::{PipelineError, PipelineResult};
use super::executor::{Dataset, run_pipeline};
use super::queries;
use crate::clean::TableKind;
use crate::fetch::{Fetcher, SyncOutcome, UNKNOWN_VERSION, UpstreamClient};
use crate::models::{DeltaTable, EnrichedTimeSeries, RawCaseSnapshot, WorldSnapshot};
use crate::reference::ReferenceData;

const RAW_KINDS: [TableKind; 3] = [
    TableKind::Cases,
    TableKind::CountrySnapshot,
    TableKind::TimeSeries,
];

pub struct Dashboard {
    config: PipelineConfig,
    reference: Arc<ReferenceData>,
    fetcher: Fetcher,
    memo: Memo<Dataset>,
}

impl Dashboard {
    /// Load reference data and connect to the configured upstream
    pub fn open(config: PipelineConfig) -> PipelineResult<Self> {
        let client = connect_upstream(&config)?;
        Self::with_client(config, client)
    }

    /// Like [`Dashboard::open`] with an explicit upstream client
    pub fn with_client(
        config: PipelineConfig,
        client: Box<dyn UpstreamClient>,
    ) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::Config)?;
        let reference = ReferenceData::load(&config.reference_paths())?;
        Ok(Self::with_reference(config, reference, client))
    }

    /// Build from reference data the caller already holds
    pub fn with_reference(
        config: PipelineConfig,
        reference: ReferenceData,
        client: Box<dyn UpstreamClient>,
    ) -> Self {
        let fetcher = Fetcher::new(
            client,
            &config.data_dir,
            &config.marker_file,
            config.raw_sources(),
        );
        Self {
            config,
            reference: Arc::new(reference),
            fetcher,
            memo: Memo::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Pull new raw files if upstream moved; an update invalidates the cached dataset
    pub fn synchronize(&self) -> PipelineResult<SyncOutcome> {
        let outcome = self.fetcher.synchronize()?;
        if outcome.is_updated() {
            self.memo.invalidate();
        }
        Ok(outcome)
    }

    /// The current dataset, rebuilt only when the local files changed
    ///
    /// If rebuilding fails and an earlier dataset exists, that one is
    /// returned instead.
    pub fn dataset(&self) -> PipelineResult<Arc<Dataset>> {
        match self.refresh() {
            Ok(dataset) => Ok(dataset),
            Err(e) => match self.memo.last_value() {
                Some(last) => {
                    warn!(
                        error = %e,
                        run_id = %last.report.run_id,
                        "Rebuild failed, serving last good dataset"
                    );
                    Ok(last)
                }
                None => Err(e),
            },
        }
    }

    fn refresh(&self) -> PipelineResult<Arc<Dataset>> {
        // Held across hashing and reading so a sync cannot swap files in between
        let _guard = self.fetcher.lock_files();
        let token = self.cache_token()?;
        self.memo.get_or_try_insert(&token, || {
            let _span = info_span!("rebuild_dataset", token = %token.short()).entered();
            let dataset = run_pipeline(&self.config, &self.reference)?;
            info!(
                run_id = %dataset.report.run_id,
                rows = dataset.time_series.len(),
                "Dataset rebuilt"
            );
            Ok(dataset)
        })
    }

    fn cache_token(&self) -> PipelineResult<CacheToken> {
        let marker = self.fetcher.marker();
        let version = if marker.path().exists() {
            marker.read()?
        } else {
            UNKNOWN_VERSION.to_string()
        };
        let paths: Vec<PathBuf> = RAW_KINDS.iter().map(|k| self.config.raw_path(*k)).collect();
        CacheToken::compute(&version, paths.iter().map(PathBuf::as_path))
    }

    /// Drop the cached dataset so the next read rebuilds
    pub fn invalidate(&self) {
        self.memo.invalidate();
    }

    /// The enriched time series
    pub fn get_time_series(&self) -> PipelineResult<EnrichedTimeSeries> {
        Ok(self.dataset()?.time_series.clone())
    }

    /// The world snapshot joined against `delta`
    pub fn get_world_source(&self, delta: &DeltaTable) -> PipelineResult<WorldSnapshot> {
        let dataset = self.dataset()?;
        Ok(queries::get_world_source(
            &dataset.country_snapshot,
            delta,
            &self.reference,
        ))
    }

    /// Sub-national rows of the federated country
    pub fn get_us_cases(&self) -> PipelineResult<Vec<RawCaseSnapshot>> {
        Ok(self.dataset()?.us_cases.clone())
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("data_dir", &self.config.data_dir)
            .field("fetcher", &self.fetcher)
            .field("memo", &self.memo)
            .finish()
    }
}

/// The upstream client the configuration asks for
#[cfg(feature = "http")]
pub fn connect_upstream(config: &PipelineConfig) -> PipelineResult<Box<dyn UpstreamClient>> {
    use std::time::Duration;

    use crate::fetch::{HttpUpstream, OfflineUpstream};

    if !config.upstream.enabled {
        return Ok(Box::new(OfflineUpstream));
    }
    let client = HttpUpstream::new(
        config.upstream.version_url.clone(),
        config.upstream.version_length,
        Duration::from_secs(config.upstream.timeout_secs),
    )?;
    Ok(Box::new(client))
}

/// The upstream client the configuration asks for
#[cfg(not(feature = "http"))]
pub fn connect_upstream(config: &PipelineConfig) -> PipelineResult<Box<dyn UpstreamClient>> {
    if config.upstream.enabled {
        warn!("Built without the http feature, running offline");
    }
    Ok(Box::new(crate::fetch::OfflineUpstream))
}
