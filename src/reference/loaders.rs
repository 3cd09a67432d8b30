//! Readers for the three static reference tables

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::error::{ReferenceError, ReferenceResult};
use super::patches::ReferencePatches;
use crate::table::{ColumnRename, RawTable, normalize_iso3};

static YEAR_COLUMN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").unwrap());

const POPULATION_RENAMES: &[ColumnRename] = &[
    ("country_name", "country_region"),
    ("country", "country_region"),
    ("name", "country_region"),
    ("country_code", "iso3"),
];

const ISO_RENAMES: &[ColumnRename] = &[
    ("name", "country_region"),
    ("country", "country_region"),
    ("alpha_3", "iso3"),
    ("code", "iso3"),
];

const CONTINENT_RENAMES: &[ColumnRename] = &[
    ("three_letter_country_code", "iso3"),
    ("continent_name", "continent"),
];

/// One row of the ISO code table after alias substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoCode {
    /// Name as spelled by the case-count source
    pub name: String,
    /// Name as spelled in the ISO table, when an alias replaced it
    pub iso_name: Option<String>,
    pub iso3: String,
}

/// One row of the population table
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRecord {
    pub name: String,
    pub iso3: Option<String>,
    pub population: Option<f64>,
}

/// Load the population table
pub fn load_population(path: &Path) -> ReferenceResult<Vec<PopulationRecord>> {
    population_from_table(&RawTable::read(path, POPULATION_RENAMES)?)
}

/// Load the ISO code table, applying the name aliases in `patches`
pub fn load_iso_codes(path: &Path, patches: &ReferencePatches) -> ReferenceResult<Vec<IsoCode>> {
    iso_codes_from_table(&RawTable::read(path, ISO_RENAMES)?, patches)
}

/// Load the ISO3 → continent table, applying the injections and conflict rule in `patches`
pub fn load_continents(
    path: &Path,
    patches: &ReferencePatches,
) -> ReferenceResult<BTreeMap<String, String>> {
    continents_from_table(&RawTable::read(path, CONTINENT_RENAMES)?, patches)
}

pub(crate) fn population_from_table(table: &RawTable) -> ReferenceResult<Vec<PopulationRecord>> {
    let name_col = table.column("country_region")?;
    let iso3_col = table.optional_column("iso3");

    // Most recent year first; a blank cell falls back to the year before
    let mut value_cols = Vec::new();
    if let Some(col) = table.optional_column("population") {
        value_cols.push(col);
    }
    let mut years: Vec<&String> = table
        .headers()
        .iter()
        .filter(|h| YEAR_COLUMN.is_match(h))
        .collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    for year in years {
        value_cols.extend(table.optional_column(year));
    }
    if value_cols.is_empty() {
        return Err(ReferenceError::NoPopulationColumn(table.path().to_path_buf()));
    }

    let mut records = Vec::with_capacity(table.len());
    for row in table.rows() {
        let Some(name) = row.text(&name_col) else {
            continue;
        };
        let mut population = None;
        for col in &value_cols {
            if let Some(value) = row.float(col)? {
                population = Some(value);
                break;
            }
        }
        records.push(PopulationRecord {
            name,
            iso3: iso3_col.as_ref().and_then(|c| normalize_iso3(row.cell(c))),
            population,
        });
    }

    debug!(file = %table.path().display(), rows = records.len(), "Loaded population table");
    Ok(records)
}

pub(crate) fn iso_codes_from_table(
    table: &RawTable,
    patches: &ReferencePatches,
) -> ReferenceResult<Vec<IsoCode>> {
    let name_col = table.column("country_region")?;
    let iso3_col = table.column("iso3")?;

    let mut codes = Vec::with_capacity(table.len());
    let mut skipped = 0usize;
    for row in table.rows() {
        let (Some(raw_name), Some(iso3)) = (row.text(&name_col), normalize_iso3(row.cell(&iso3_col)))
        else {
            skipped += 1;
            continue;
        };
        let name = patches.alias(&raw_name).to_string();
        let iso_name = (name != raw_name).then_some(raw_name);
        codes.push(IsoCode {
            name,
            iso_name,
            iso3,
        });
    }

    if skipped > 0 {
        debug!(file = %table.path().display(), skipped, "Skipped ISO rows without a name or code");
    }
    Ok(codes)
}

pub(crate) fn continents_from_table(
    table: &RawTable,
    patches: &ReferencePatches,
) -> ReferenceResult<BTreeMap<String, String>> {
    let iso3_col = table.column("iso3")?;
    let continent_col = table.column("continent")?;

    let mut continents: BTreeMap<String, String> = BTreeMap::new();
    let mut conflicts = Vec::new();
    for row in table.rows() {
        let (Some(iso3), Some(continent)) =
            (normalize_iso3(row.cell(&iso3_col)), row.text(&continent_col))
        else {
            continue;
        };
        match continents.entry(iso3) {
            Entry::Vacant(slot) => {
                slot.insert(continent);
            }
            Entry::Occupied(mut slot) => {
                if *slot.get() != continent {
                    conflicts.push(slot.key().clone());
                    slot.insert(patches.continent_conflict_label.clone());
                }
            }
        }
    }

    if !conflicts.is_empty() {
        conflicts.dedup();
        warn!(
            codes = ?conflicts,
            label = %patches.continent_conflict_label,
            "Collapsed ISO3 codes mapped to several continents"
        );
    }

    for (iso3, continent) in &patches.continent_injections {
        continents
            .entry(iso3.clone())
            .or_insert_with(|| continent.clone());
    }

    Ok(continents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(content: &str, renames: &[ColumnRename]) -> RawTable {
        RawTable::from_reader(content.as_bytes(), "reference.csv", renames).unwrap()
    }

    #[test]
    fn test_population_uses_latest_year() {
        let t = table(
            "Country Name,Country Code,2017,2018\nNorway,NOR,5276968,5314336\nEritrea,ERI,3200000,\n",
            POPULATION_RENAMES,
        );
        let records = population_from_table(&t).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].iso3.as_deref(), Some("NOR"));
        assert_eq!(records[0].population, Some(5314336.0));
        // Blank 2018 cell falls back to 2017
        assert_eq!(records[1].population, Some(3200000.0));
    }

    #[test]
    fn test_population_named_column() {
        let t = table(
            "country_region,population\nNorway,5314336\n",
            POPULATION_RENAMES,
        );
        let records = population_from_table(&t).unwrap();
        assert_eq!(records[0].iso3, None);
        assert_eq!(records[0].population, Some(5314336.0));
    }

    #[test]
    fn test_population_without_value_column() {
        let t = table("country_region,notes\nNorway,x\n", POPULATION_RENAMES);
        assert!(matches!(
            population_from_table(&t),
            Err(ReferenceError::NoPopulationColumn(_))
        ));
    }

    #[test]
    fn test_iso_codes_apply_aliases() {
        let t = table(
            "name,alpha_3\nRussian Federation,RUS\nNorway,NOR\nKosovo,\n",
            ISO_RENAMES,
        );
        let codes = iso_codes_from_table(&t, &ReferencePatches::default()).unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].name, "Russia");
        assert_eq!(codes[0].iso_name.as_deref(), Some("Russian Federation"));
        assert_eq!(codes[1].name, "Norway");
        assert_eq!(codes[1].iso_name, None);
    }

    #[test]
    fn test_continents_collapse_conflicts_and_inject() {
        let t = table(
            "Continent_Name,Three_Letter_Country_Code\nAsia,CYP\nEurope,CYP\nEurope,NOR\nEurope,NOR\nAsia,TUR\nEurope,TUR\n",
            CONTINENT_RENAMES,
        );
        let mut patches = ReferencePatches::default();
        patches.continent_conflict_label = "Europe".to_string();
        let continents = continents_from_table(&t, &patches).unwrap();

        assert_eq!(continents.get("CYP").map(String::as_str), Some("Europe"));
        assert_eq!(continents.get("TUR").map(String::as_str), Some("Europe"));
        assert_eq!(continents.get("NOR").map(String::as_str), Some("Europe"));
        assert_eq!(continents.get("XKX").map(String::as_str), Some("Europe"));
    }

    #[test]
    fn test_injection_does_not_override_source() {
        let t = table("continent,iso3\nAsia,XKX\n", CONTINENT_RENAMES);
        let continents = continents_from_table(&t, &ReferencePatches::default()).unwrap();
        assert_eq!(continents.get("XKX").map(String::as_str), Some("Asia"));
    }
}
