//! Pipeline executor for running the full transformation

use std::time::Instant;

use tracing::{error, info, info_span};
use uuid::Uuid;

use super::config::{PipelineConfig, PipelineStage};
use super::error::{PipelineError, PipelineResult};
use super::queries::{get_delta_confirmed, get_world_source};
use super::report::{PipelineReport, StageOutput};
use crate::aggregate::aggregate_time_series;
use crate::clean::{TableKind, clean_snapshot, clean_time_series, read_raw};
use crate::metrics;
use crate::models::{DeltaTable, EnrichedTimeSeries, RawCaseSnapshot, WorldSnapshot};
use crate::reference::ReferenceData;

/// Everything one pipeline run produces
#[derive(Debug, Clone)]
pub struct Dataset {
    /// The canonical enriched time series
    pub time_series: EnrichedTimeSeries,
    /// Most recent delta per country
    pub delta: DeltaTable,
    /// Most recent cross-section per country
    pub world: WorldSnapshot,
    /// Sub-national snapshot rows of the federated country
    pub us_cases: Vec<RawCaseSnapshot>,
    /// Cleaned country snapshot the world table was built from
    pub country_snapshot: Vec<RawCaseSnapshot>,
    /// Stage records
    pub report: PipelineReport,
}

/// Runs every stage on the local flat files
pub struct PipelineExecutor<'a> {
    config: &'a PipelineConfig,
    reference: &'a ReferenceData,
    report: PipelineReport,
}

impl<'a> PipelineExecutor<'a> {
    /// Create a new pipeline executor
    pub fn new(config: &'a PipelineConfig, reference: &'a ReferenceData) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::Config)?;
        Ok(Self {
            config,
            reference,
            report: PipelineReport::new(Uuid::new_v4().to_string()),
        })
    }

    /// Report of the latest run; after a failed run it names the failing stage
    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    /// Run the pipeline
    ///
    /// Each call starts a fresh report. The dataset carries a copy of it, and
    /// on failure the report stays readable through [`Self::report`].
    pub fn run(&mut self) -> PipelineResult<Dataset> {
        self.report = PipelineReport::new(Uuid::new_v4().to_string());
        let _span = info_span!("pipeline_run", run_id = %self.report.run_id).entered();
        let start = Instant::now();
        info!(
            run_id = %self.report.run_id,
            data_dir = %self.config.data_dir.display(),
            "Starting pipeline"
        );

        let config = self.config;
        let reference = self.reference;
        let report = &mut self.report;

        let (cases_raw, country_raw, time_raw) = run_stage(report, PipelineStage::Load, || {
            let cases = read_raw(&config.raw_path(TableKind::Cases), TableKind::Cases)?;
            let country = read_raw(
                &config.raw_path(TableKind::CountrySnapshot),
                TableKind::CountrySnapshot,
            )?;
            let time = read_raw(&config.raw_path(TableKind::TimeSeries), TableKind::TimeSeries)?;
            let output = StageOutput::success(cases.len() + country.len() + time.len())
                .with_metadata("cases", serde_json::json!(cases.len()))
                .with_metadata("cases_country", serde_json::json!(country.len()))
                .with_metadata("cases_time", serde_json::json!(time.len()));
            Ok(((cases, country, time), output))
        })?;

        let (us_cases, countries, time_rows) = run_stage(report, PipelineStage::Clean, || {
            let options = config.clean_options();
            let cases = clean_snapshot(&cases_raw, TableKind::Cases, &options)?;
            let country = clean_snapshot(&country_raw, TableKind::CountrySnapshot, &options)?;
            let time = clean_time_series(&time_raw, &options)?;

            let reports = [&cases.report, &country.report, &time.report];
            let missing_name: usize = reports.iter().map(|r| r.dropped_missing_name).sum();
            let missing_iso3: usize = reports.iter().map(|r| r.dropped_missing_iso3).sum();
            let dropped: usize = reports
                .iter()
                .map(|r| r.input_rows - r.output_rows())
                .sum();
            let rows: usize = reports.iter().map(|r| r.output_rows()).sum();

            let us_cases: Vec<RawCaseSnapshot> = cases
                .rows
                .into_iter()
                .filter(|r| config.federated.matches(&r.country_region))
                .collect();

            let output = StageOutput::success(rows)
                .with_dropped(dropped)
                .with_metadata("dropped_missing_name", serde_json::json!(missing_name))
                .with_metadata("dropped_missing_iso3", serde_json::json!(missing_iso3));
            Ok(((us_cases, country.rows, time.rows), output))
        })?;

        let joined = run_stage(report, PipelineStage::Aggregate, || {
            let joined = aggregate_time_series(time_rows, reference, &config.federated);
            let without_population = joined.iter().filter(|j| j.population.is_none()).count();
            let output = StageOutput::success(joined.len())
                .with_metadata("rows_without_population", serde_json::json!(without_population));
            Ok((joined, output))
        })?;

        let time_series = run_stage(report, PipelineStage::Derive, || {
            let series = metrics::derive(joined);
            let output = StageOutput::success(series.len())
                .with_metadata("countries", serde_json::json!(series.countries().len()));
            Ok((series, output))
        })?;

        let (delta, world) = run_stage(report, PipelineStage::Snapshot, || {
            let delta = get_delta_confirmed(&time_series);
            let world = get_world_source(&countries, &delta, reference);
            let inferred = world.rows().iter().filter(|r| r.population_inferred).count();
            let output = StageOutput::success(world.len())
                .with_metadata("population_inferred", serde_json::json!(inferred));
            Ok(((delta, world), output))
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        self.report.complete(duration_ms);
        info!(
            run_id = %self.report.run_id,
            duration_ms,
            rows = time_series.len(),
            countries = world.len(),
            "Pipeline completed"
        );

        Ok(Dataset {
            time_series,
            delta,
            world,
            us_cases,
            country_snapshot: countries,
            report: self.report.clone(),
        })
    }
}

/// Run one stage inside its span, recording the output or the failure
fn run_stage<T>(
    report: &mut PipelineReport,
    stage: PipelineStage,
    f: impl FnOnce() -> PipelineResult<(T, StageOutput)>,
) -> PipelineResult<T> {
    let _span = info_span!("pipeline_stage", stage = stage.name()).entered();
    let start = Instant::now();

    match f() {
        Ok((value, output)) => {
            let output = output.with_duration(start.elapsed().as_millis() as u64);
            info!(
                stage = stage.name(),
                rows = output.rows,
                dropped = output.dropped,
                duration_ms = output.duration_ms,
                "Stage completed"
            );
            report.complete_stage(stage, output);
            Ok(value)
        }
        Err(e) => {
            error!(stage = stage.name(), error = %e, "Stage failed");
            report.fail(stage, e.to_string());
            Err(e)
        }
    }
}

/// Run the pipeline once with the given configuration and reference data
pub fn run_pipeline(config: &PipelineConfig, reference: &ReferenceData) -> PipelineResult<Dataset> {
    PipelineExecutor::new(config, reference)?.run()
}
