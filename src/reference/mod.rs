//! Static reference data
//!
//! Population, ISO country codes and continents are loaded once into a
//! [`ReferenceData`] value and handed to the pipeline by reference. ISO3 is
//! the join key throughout; display names are only used to resolve rows of
//! tables that carry no code.

mod error;
mod loaders;
mod patches;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

pub use error::{ReferenceError, ReferenceResult};
pub use loaders::{
    IsoCode, PopulationRecord, load_continents, load_iso_codes, load_population,
};
pub use patches::ReferencePatches;

/// Locations of the reference files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePaths {
    pub population: PathBuf,
    pub iso_codes: PathBuf,
    pub continents: PathBuf,
    /// TOML file replacing the built-in [`ReferencePatches`]
    pub patches: Option<PathBuf>,
}

/// A country across the three coordinate systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    pub iso3: String,
    pub name: String,
    pub population: Option<f64>,
    pub continent: Option<String>,
}

/// Read-only lookup tables keyed by ISO3
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    names: BTreeMap<String, String>,
    populations: BTreeMap<String, f64>,
    continents: BTreeMap<String, String>,
    name_to_iso3: BTreeMap<String, String>,
    patches_version: String,
}

impl ReferenceData {
    /// Load all three reference files
    pub fn load(paths: &ReferencePaths) -> ReferenceResult<Self> {
        let _span = info_span!("load_reference").entered();

        let patches = match &paths.patches {
            Some(path) => ReferencePatches::load(path)?,
            None => ReferencePatches::default(),
        };
        info!(patches_version = %patches.version, "Using reference patches");

        let iso_codes = load_iso_codes(&paths.iso_codes, &patches)?;
        let population = load_population(&paths.population)?;
        let continents = load_continents(&paths.continents, &patches)?;

        let data = Self::from_parts(iso_codes, population, continents, &patches.version);
        info!(
            countries = data.names.len(),
            populations = data.populations.len(),
            continents = data.continents.len(),
            "Loaded reference data"
        );
        Ok(data)
    }

    /// Assemble reference data from already loaded tables
    pub fn from_parts(
        iso_codes: Vec<IsoCode>,
        population: Vec<PopulationRecord>,
        continents: BTreeMap<String, String>,
        patches_version: &str,
    ) -> Self {
        let mut names = BTreeMap::new();
        let mut name_to_iso3 = BTreeMap::new();
        for code in iso_codes {
            if names.contains_key(&code.iso3) {
                debug!(iso3 = %code.iso3, name = %code.name, "Duplicate ISO3 code, keeping first");
                continue;
            }
            if let Some(iso_name) = code.iso_name {
                name_to_iso3.entry(iso_name).or_insert_with(|| code.iso3.clone());
            }
            name_to_iso3
                .entry(code.name.clone())
                .or_insert_with(|| code.iso3.clone());
            names.insert(code.iso3, code.name);
        }

        let mut populations = BTreeMap::new();
        let mut unresolved = 0usize;
        for record in population {
            let iso3 = record
                .iso3
                .or_else(|| name_to_iso3.get(&record.name).cloned());
            match (iso3, record.population) {
                (Some(iso3), Some(value)) => {
                    populations.entry(iso3).or_insert(value);
                }
                (None, Some(_)) => unresolved += 1,
                _ => {}
            }
        }
        if unresolved > 0 {
            debug!(unresolved, "Population rows without a resolvable ISO3 code");
        }

        Self {
            names,
            populations,
            continents,
            name_to_iso3,
            patches_version: patches_version.to_string(),
        }
    }

    /// Reference data with no entries
    pub fn empty() -> Self {
        Self::default()
    }

    /// Everything known about one ISO3 code
    pub fn entity(&self, iso3: &str) -> Option<ReferenceEntity> {
        let name = self.names.get(iso3);
        let population = self.population(iso3);
        let continent = self.continent(iso3);
        if name.is_none() && population.is_none() && continent.is_none() {
            return None;
        }
        Some(ReferenceEntity {
            iso3: iso3.to_string(),
            name: name.cloned().unwrap_or_else(|| iso3.to_string()),
            population,
            continent: continent.map(str::to_string),
        })
    }

    pub fn population(&self, iso3: &str) -> Option<f64> {
        self.populations.get(iso3).copied()
    }

    pub fn continent(&self, iso3: &str) -> Option<&str> {
        self.continents.get(iso3).map(String::as_str)
    }

    /// Resolve a display name (case-count or ISO spelling) to ISO3
    pub fn iso3_for_name(&self, name: &str) -> Option<&str> {
        self.name_to_iso3.get(name).map(String::as_str)
    }

    /// Number of countries in the ISO table
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn patches_version(&self) -> &str {
        &self.patches_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_reference(dir: &TempDir) -> ReferencePaths {
        let population = dir.path().join("worldbank-population-2018.csv");
        let iso_codes = dir.path().join("iso-codes.csv");
        let continents = dir.path().join("continent_mapping.csv");
        fs::write(
            &population,
            "country_region,2018\nNorway,5314336\nRussian Federation,144478050\n",
        )
        .unwrap();
        fs::write(
            &iso_codes,
            "country_region,iso3\nNorway,NOR\nRussian Federation,RUS\n",
        )
        .unwrap();
        fs::write(&continents, "continent,iso3\nEurope,NOR\nEurope,RUS\nAsia,RUS\n").unwrap();
        ReferencePaths {
            population,
            iso_codes,
            continents,
            patches: None,
        }
    }

    #[test]
    fn test_load_joins_by_iso3() {
        let dir = TempDir::new().unwrap();
        let data = ReferenceData::load(&write_reference(&dir)).unwrap();

        let russia = data.entity("RUS").unwrap();
        assert_eq!(russia.name, "Russia");
        assert_eq!(russia.population, Some(144478050.0));
        assert_eq!(russia.continent.as_deref(), Some("Europe"));

        assert_eq!(data.iso3_for_name("Russia"), Some("RUS"));
        assert_eq!(data.iso3_for_name("Russian Federation"), Some("RUS"));
        assert_eq!(data.len(), 2);
        assert!(data.entity("XXX").is_none());
        // Injected territory is known by continent alone
        assert_eq!(data.continent("XKX"), Some("Europe"));
    }

    #[test]
    fn test_load_with_patch_file() {
        let dir = TempDir::new().unwrap();
        let mut paths = write_reference(&dir);
        let patches = dir.path().join("patches.toml");
        fs::write(&patches, "version = \"test\"\n[country_aliases]\n").unwrap();
        paths.patches = Some(patches);

        let data = ReferenceData::load(&paths).unwrap();
        assert_eq!(data.patches_version(), "test");
        assert_eq!(data.entity("RUS").unwrap().name, "Russian Federation");
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = TempDir::new().unwrap();
        let mut paths = write_reference(&dir);
        paths.iso_codes = dir.path().join("missing.csv");
        let err = ReferenceData::load(&paths).unwrap_err();
        assert!(err.to_string().contains("missing.csv"));
    }
}
