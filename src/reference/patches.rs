//! Versioned data-cleaning patches for the reference tables
//!
//! The case-count source and the ISO/population sources disagree on country
//! names, and the continent table is missing one territory and maps one code
//! to two continents. These corrections live here as data, not logic. They
//! track upstream naming at a point in time and need revisiting when the
//! upstream naming changes; bump `version` when editing them.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{ReferenceError, ReferenceResult};

const BUILTIN_VERSION: &str = "2020-04";

const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("Russian Federation", "Russia"),
    ("Bolivia (Plurinational State of)", "Bolivia"),
    ("Korea, Republic of", "Korea, South"),
    ("Brunei Darussalam", "Brunei"),
    ("Moldova, Republic of", "Moldova"),
    (
        "United Kingdom of Great Britain and Northern Ireland",
        "United Kingdom",
    ),
    ("Syrian Arab Republic", "Syria"),
    ("Venezuela (Bolivarian Republic of)", "Venezuela"),
    ("Tanzania, United Republic of", "Tanzania"),
    ("Iran (Islamic Republic of)", "Iran"),
    ("Côte d'Ivoire", "Cote d'Ivoire"),
    ("Myanmar", "Burma"),
    ("Congo", "Congo (Brazzaville)"),
    ("Congo, Democratic Republic of the", "Congo (Kinshasa)"),
    ("Lao People's Democratic Republic", "Laos"),
    ("Taiwan, Province of China", "Taiwan*"),
    ("United States of America", "US"),
    ("Viet Nam", "Vietnam"),
    ("Palestine, State of", "West Bank and Gaza"),
];

/// Explicit, externally editable corrections applied while loading reference data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencePatches {
    /// Identifies this set of patches in logs
    pub version: String,
    /// ISO table name → name used by the case-count source
    pub country_aliases: BTreeMap<String, String>,
    /// ISO3 → continent entries missing from the continent table
    pub continent_injections: BTreeMap<String, String>,
    /// Label used for codes that map to more than one continent
    pub continent_conflict_label: String,
}

impl Default for ReferencePatches {
    fn default() -> Self {
        Self {
            version: BUILTIN_VERSION.to_string(),
            country_aliases: BUILTIN_ALIASES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            continent_injections: BTreeMap::from([("XKX".to_string(), "Europe".to_string())]),
            continent_conflict_label: "Europe".to_string(),
        }
    }
}

impl ReferencePatches {
    /// Parse patches from TOML; missing sections fall back to the built-in defaults
    pub fn from_toml_str(content: &str, source: &Path) -> ReferenceResult<Self> {
        toml::from_str(content).map_err(|e| ReferenceError::Patches {
            path: source.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load patches from a TOML file
    pub fn load(path: &Path) -> ReferenceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ReferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Name the case-count source uses for an ISO table name
    pub fn alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.country_aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_patches() {
        let patches = ReferencePatches::default();
        assert_eq!(patches.country_aliases.len(), 19);
        assert_eq!(patches.alias("Congo"), "Congo (Brazzaville)");
        assert_eq!(patches.alias("United States of America"), "US");
        assert_eq!(patches.alias("Norway"), "Norway");
        assert_eq!(
            patches.continent_injections.get("XKX").map(String::as_str),
            Some("Europe")
        );
    }

    #[test]
    fn test_from_toml_replaces_sections() {
        let toml = r#"
version = "2021-01"

[country_aliases]
"Czechia" = "Czech Republic"
"#;
        let patches = ReferencePatches::from_toml_str(toml, Path::new("patches.toml")).unwrap();
        assert_eq!(patches.version, "2021-01");
        assert_eq!(patches.country_aliases.len(), 1);
        assert_eq!(patches.alias("Czechia"), "Czech Republic");
        // Untouched sections keep their defaults
        assert_eq!(patches.continent_conflict_label, "Europe");
        assert!(patches.continent_injections.contains_key("XKX"));
    }

    #[test]
    fn test_invalid_toml_names_file() {
        let err =
            ReferencePatches::from_toml_str("version = [", Path::new("patches.toml")).unwrap_err();
        assert!(err.to_string().contains("patches.toml"));
    }
}
