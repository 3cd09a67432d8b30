//! Output formatting for CLI

use crate::fetch::SyncOutcome;
use crate::models::{CaseStatus, EnrichedRow, RankedTable, StatusCount, WeeklyTable};
use crate::pipeline::CountryData;

fn opt_f64(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

/// Format a sync outcome
pub fn format_sync_outcome(outcome: &SyncOutcome) -> String {
    let mut output = format!("{}\n", outcome);
    if let SyncOutcome::Updated { files, .. } = outcome {
        for file in files {
            output.push_str(&format!("  - {}\n", file.display()));
        }
    }
    output
}

/// Header line for a country view
pub fn format_country_header(country: &str, data: &CountryData<'_>) -> String {
    match data.first_case {
        Some(first) => format!(
            "{}: first case {}, last update {}\n",
            country, first, data.last_update
        ),
        None => format!("{}: no confirmed cases, last update {}\n", country, data.last_update),
    }
}

/// Format a per-day series
pub fn format_series(rows: &[EnrichedRow]) -> String {
    let mut output = format!(
        "{:<10}  {:>12}  {:>10}  {:>10}  {:>12}\n",
        "date", "confirmed", "deaths", "new", "per 100k"
    );
    for row in rows {
        output.push_str(&format!(
            "{:<10}  {:>12}  {:>10}  {:>10}  {:>12}\n",
            row.date.to_string(),
            row.confirmed,
            row.deaths,
            row.delta_confirmed,
            opt_f64(row.confirmed_pr_100k)
        ));
    }
    output
}

/// Format the most-affected ranking, one line per country
pub fn format_ranked(ranked: &RankedTable) -> String {
    let mut output = format!(
        "{:<4}{:<32}  {:>12}  {:>12}  {:>10}\n",
        "#", "country", "active", "recovered", "deaths"
    );
    for (idx, country) in ranked.countries().into_iter().enumerate() {
        let count = |status: CaseStatus| {
            ranked
                .rows
                .iter()
                .find(|r| r.country_region == country && r.status == status)
                .map_or(0, |r| r.count)
        };
        output.push_str(&format!(
            "{:<4}{:<32}  {:>12}  {:>12}  {:>10}\n",
            idx + 1,
            country,
            count(CaseStatus::Active),
            count(CaseStatus::Recovered),
            count(CaseStatus::Deaths)
        ));
    }
    output
}

/// Format a weekly trajectory table
pub fn format_weekly(table: &WeeklyTable) -> String {
    if table.is_empty() {
        return "No countries left after weekly exclusion\n".to_string();
    }
    let mut output = format!(
        "{:<32}  {:<10}  {:>14}  {:>14}\n",
        "country", "week", "log confirmed", "log new"
    );
    for row in &table.rows {
        output.push_str(&format!(
            "{:<32}  {:<10}  {:>14.3}  {:>14.3}\n",
            row.country_region,
            row.week_ending.to_string(),
            row.log_confirmed,
            row.log_delta_confirmed
        ));
    }
    output
}

/// Format worldwide totals
pub fn format_totals(totals: &[StatusCount]) -> String {
    totals
        .iter()
        .map(|t| format!("{:<10} {:>14}\n", t.status.name(), t.count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RankedRow;
    use std::path::PathBuf;

    #[test]
    fn test_format_sync_outcome_lists_files() {
        let outcome = SyncOutcome::Updated {
            version: "abc1234".to_string(),
            files: vec![PathBuf::from("data/cases.csv")],
        };
        let output = format_sync_outcome(&outcome);
        assert!(output.contains("abc1234"));
        assert!(output.contains("data/cases.csv"));
    }

    #[test]
    fn test_format_ranked_pivots_statuses() {
        let rows = CaseStatus::breakdown()
            .into_iter()
            .zip([350, 100, 50])
            .map(|(status, count)| RankedRow {
                country_region: "Ruritania".to_string(),
                status,
                count,
            })
            .collect();
        let output = format_ranked(&RankedTable { rows });
        let line = output.lines().nth(1).unwrap();
        assert!(line.starts_with("1"));
        assert!(line.contains("Ruritania"));
        assert!(line.contains("350"));
        assert!(line.ends_with("50"));
    }

    #[test]
    fn test_format_weekly_empty() {
        let output = format_weekly(&WeeklyTable::default());
        assert!(output.contains("No countries"));
    }
}
