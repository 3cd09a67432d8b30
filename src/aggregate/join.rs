//! Left joins against the reference tables

use serde::Serialize;

use crate::models::RawTimeSeriesRow;
use crate::reference::ReferenceData;

/// A time-series row with its reference columns attached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRow {
    pub row: RawTimeSeriesRow,
    pub population: Option<f64>,
    pub continent: Option<String>,
}

/// Attach population and continent by ISO3
///
/// Left join: every input row yields exactly one output row, with `None`
/// where the reference has no match.
pub fn join_reference(rows: Vec<RawTimeSeriesRow>, reference: &ReferenceData) -> Vec<JoinedRow> {
    rows.into_iter()
        .map(|row| JoinedRow {
            population: reference.population(&row.iso3),
            continent: reference.continent(&row.iso3).map(str::to_string),
            row,
        })
        .collect()
}

/// Back population out of an incident rate (cases per 100 000)
///
/// `None` when the rate is missing, zero, negative or not finite.
pub fn infer_population(confirmed: i64, incident_rate: Option<f64>) -> Option<f64> {
    match incident_rate {
        Some(rate) if rate > 0.0 && rate.is_finite() => Some(confirmed as f64 * 100_000.0 / rate),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_population() {
        assert_eq!(infer_population(500, Some(10.0)), Some(5_000_000.0));
        assert_eq!(infer_population(500, Some(0.0)), None);
        assert_eq!(infer_population(500, None), None);
        assert_eq!(infer_population(500, Some(f64::NAN)), None);
    }
}
