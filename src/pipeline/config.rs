//! Pipeline configuration types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::clean::{CleanOptions, TableKind};
use crate::fetch::RawSource;
use crate::metrics::WeeklyExclusion;
use crate::models::FederatedCountry;
use crate::reference::ReferencePaths;
use crate::table::is_valid_iso3;

const JHU_DATA: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/web-data/data";

/// Main pipeline configuration
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding raw files, the version marker and reference tables
    pub data_dir: PathBuf,
    /// Local file names of the raw exports
    pub raw_files: RawFiles,
    /// Version marker file name
    pub marker_file: String,
    /// Reference table file names
    pub reference_files: ReferenceFiles,
    /// TOML file replacing the built-in reference patches
    pub patches_file: Option<PathBuf>,
    /// Remote repository settings
    pub upstream: UpstreamConfig,
    /// The country reported at sub-national granularity
    pub federated: FederatedCountry,
    /// Entities dropped while cleaning
    pub excluded_entities: Vec<String>,
    /// Countries left out of weekly trajectories
    pub weekly: WeeklyExclusion,
    /// Size of the most-affected ranking
    pub most_affected: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            raw_files: RawFiles::default(),
            marker_file: "last_commit.txt".to_string(),
            reference_files: ReferenceFiles::default(),
            patches_file: None,
            upstream: UpstreamConfig::default(),
            federated: FederatedCountry::default(),
            excluded_entities: vec![
                "Diamond Princess".to_string(),
                "MS Zaandam".to_string(),
                "Holy See".to_string(),
            ],
            weekly: WeeklyExclusion::default(),
            most_affected: 10,
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline config
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> PipelineResult<Self> {
        toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Load a TOML file
    pub fn from_toml_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io_with_path(path, "reading config", e))?;
        toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Set the data directory
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Set the upstream settings
    pub fn with_upstream(mut self, upstream: UpstreamConfig) -> Self {
        self.upstream = upstream;
        self
    }

    /// Set the reference patch file
    pub fn with_patches_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.patches_file = Some(path.into());
        self
    }

    /// Set the entities dropped while cleaning
    pub fn with_excluded_entities(mut self, entities: Vec<String>) -> Self {
        self.excluded_entities = entities;
        self
    }

    /// Set the weekly exclusion rule
    pub fn with_weekly_exclusion(mut self, weekly: WeeklyExclusion) -> Self {
        self.weekly = weekly;
        self
    }

    /// Set the size of the most-affected ranking
    pub fn with_most_affected(mut self, n: usize) -> Self {
        self.most_affected = n;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.marker_file.trim().is_empty() {
            return Err("Marker file name must not be empty".to_string());
        }
        self.upstream.validate()?;

        if !is_valid_iso3(&self.federated.iso3) {
            return Err(format!(
                "Federated country ISO3 '{}' must be three uppercase letters",
                self.federated.iso3
            ));
        }
        if self.federated.name.trim().is_empty() {
            return Err("Federated country name must not be empty".to_string());
        }
        if self.most_affected == 0 {
            return Err("most_affected must be at least 1".to_string());
        }
        Ok(())
    }

    /// Local path of a raw export
    pub fn raw_path(&self, kind: TableKind) -> PathBuf {
        self.data_dir.join(self.raw_files.name(kind))
    }

    /// Local path of the version marker
    pub fn marker_path(&self) -> PathBuf {
        self.data_dir.join(&self.marker_file)
    }

    /// Reference table locations, relative names resolved against `data_dir`
    pub fn reference_paths(&self) -> ReferencePaths {
        ReferencePaths {
            population: self.data_dir.join(&self.reference_files.population),
            iso_codes: self.data_dir.join(&self.reference_files.iso_codes),
            continents: self.data_dir.join(&self.reference_files.continents),
            patches: self.patches_file.as_ref().map(|p| self.data_dir.join(p)),
        }
    }

    /// The three raw exports with their upstream URLs
    pub fn raw_sources(&self) -> Vec<RawSource> {
        [
            (TableKind::Cases, &self.upstream.cases_url),
            (TableKind::CountrySnapshot, &self.upstream.cases_country_url),
            (TableKind::TimeSeries, &self.upstream.cases_time_url),
        ]
        .into_iter()
        .map(|(kind, url)| RawSource::new(self.raw_files.name(kind), url.clone()))
        .collect()
    }

    /// Cleaning filters
    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            excluded_entities: self.excluded_entities.clone(),
        }
    }
}

/// Local file names of the raw exports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFiles {
    pub cases: String,
    pub cases_country: String,
    pub cases_time: String,
}

impl Default for RawFiles {
    fn default() -> Self {
        Self {
            cases: "cases.csv".to_string(),
            cases_country: "cases_country.csv".to_string(),
            cases_time: "cases_time.csv".to_string(),
        }
    }
}

impl RawFiles {
    pub fn name(&self, kind: TableKind) -> &str {
        match kind {
            TableKind::Cases => &self.cases,
            TableKind::CountrySnapshot => &self.cases_country,
            TableKind::TimeSeries => &self.cases_time,
        }
    }
}

/// Reference table file names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceFiles {
    pub population: String,
    pub iso_codes: String,
    pub continents: String,
}

impl Default for ReferenceFiles {
    fn default() -> Self {
        Self {
            population: "worldbank-population-2018.csv".to_string(),
            iso_codes: "iso-codes.csv".to_string(),
            continents: "continent_mapping.csv".to_string(),
        }
    }
}

/// Remote repository settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Query the network at all
    pub enabled: bool,
    pub cases_url: String,
    pub cases_country_url: String,
    pub cases_time_url: String,
    /// Git ref endpoint returning `{"object": {"sha": ...}}`
    pub version_url: String,
    /// Characters of the commit hash kept as the version
    pub version_length: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cases_url: format!("{}/cases.csv", JHU_DATA),
            cases_country_url: format!("{}/cases_country.csv", JHU_DATA),
            cases_time_url: format!("{}/cases_time.csv", JHU_DATA),
            version_url: "https://api.github.com/repos/CSSEGISandData/COVID-19/git/refs/heads/web-data"
                .to_string(),
            version_length: 7,
            timeout_secs: 30,
        }
    }
}

impl UpstreamConfig {
    /// Settings that never touch the network
    pub fn offline() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Validate URLs and limits
    pub fn validate(&self) -> Result<(), String> {
        for (name, url) in [
            ("cases_url", &self.cases_url),
            ("cases_country_url", &self.cases_country_url),
            ("cases_time_url", &self.cases_time_url),
            ("version_url", &self.version_url),
        ] {
            if url.trim().is_empty() {
                return Err(format!("upstream.{} must not be empty", name));
            }
        }
        if self.version_length == 0 {
            return Err("upstream.version_length must be at least 1".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("upstream.timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// Stage 1: Read the raw exports
    Load,
    /// Stage 2: Normalize and filter rows
    Clean,
    /// Stage 3: Federated rollup and reference joins
    Aggregate,
    /// Stage 4: Per-country derived metrics
    Derive,
    /// Stage 5: Latest deltas and the world snapshot
    Snapshot,
}

impl PipelineStage {
    /// Get all stages in execution order
    pub fn all() -> Vec<Self> {
        vec![
            Self::Load,
            Self::Clean,
            Self::Aggregate,
            Self::Derive,
            Self::Snapshot,
        ]
    }

    /// Get stage name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Clean => "clean",
            Self::Aggregate => "aggregate",
            Self::Derive => "derive",
            Self::Snapshot => "snapshot",
        }
    }

    /// Get stage description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Load => "Read raw exports",
            Self::Clean => "Normalize columns, dates and entities",
            Self::Aggregate => "Roll up sub-national rows and join reference data",
            Self::Derive => "Compute per-country derived metrics",
            Self::Snapshot => "Build latest deltas and the world snapshot",
        }
    }

    /// Get stage index (1-based)
    pub fn index(&self) -> usize {
        match self {
            Self::Load => 1,
            Self::Clean => 2,
            Self::Aggregate => 3,
            Self::Derive => 4,
            Self::Snapshot => 5,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "load" | "1" => Ok(Self::Load),
            "clean" | "2" => Ok(Self::Clean),
            "aggregate" | "3" => Ok(Self::Aggregate),
            "derive" | "4" => Ok(Self::Derive),
            "snapshot" | "5" => Ok(Self::Snapshot),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.marker_file, "last_commit.txt");
        assert_eq!(config.federated.iso3, "USA");
        assert_eq!(config.most_affected, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_config_builder() {
        let config = PipelineConfig::new()
            .with_data_dir("/srv/covid")
            .with_most_affected(5)
            .with_upstream(UpstreamConfig::offline());

        assert_eq!(
            config.raw_path(TableKind::TimeSeries),
            PathBuf::from("/srv/covid/cases_time.csv")
        );
        assert_eq!(config.marker_path(), PathBuf::from("/srv/covid/last_commit.txt"));
        assert_eq!(config.most_affected, 5);
        assert!(!config.upstream.enabled);
    }

    #[test]
    fn test_partial_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
data_dir = "/tmp/covid"
excluded_entities = ["Diamond Princess"]

[upstream]
timeout_secs = 5

[weekly]
countries = ["Tinyland"]
"#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/covid"));
        assert_eq!(config.excluded_entities.len(), 1);
        assert_eq!(config.upstream.timeout_secs, 5);
        assert_eq!(config.upstream.version_length, 7);
        assert_eq!(config.weekly.countries, vec!["Tinyland".to_string()]);
        assert_eq!(config.weekly.min_total_confirmed, 100);
        assert_eq!(config.raw_files.cases_country, "cases_country.csv");
    }

    #[test]
    fn test_invalid_toml() {
        let err = PipelineConfig::from_toml_str("most_affected = \"ten\"").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = PipelineConfig::default();
        config.upstream.cases_url = String::new();
        assert!(config.validate().unwrap_err().contains("cases_url"));

        let mut config = PipelineConfig::default();
        config.federated.iso3 = "us".to_string();
        assert!(config.validate().is_err());

        let config = PipelineConfig::default().with_most_affected(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_raw_sources() {
        let sources = PipelineConfig::default().raw_sources();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[2].file_name, "cases_time.csv");
        assert!(sources[2].url.ends_with("/cases_time.csv"));
    }

    #[test]
    fn test_pipeline_stage_parse() {
        assert_eq!("load".parse::<PipelineStage>().unwrap(), PipelineStage::Load);
        assert_eq!("4".parse::<PipelineStage>().unwrap(), PipelineStage::Derive);
        assert!("invalid".parse::<PipelineStage>().is_err());
        assert_eq!(PipelineStage::Snapshot.index(), 5);
        assert_eq!(PipelineStage::all().len(), 5);
    }
}
