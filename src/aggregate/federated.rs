//! National rollup for the country reported at sub-national granularity

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{FederatedCountry, RawTimeSeriesRow};

#[derive(Debug, Default)]
struct DayTotals {
    confirmed: i64,
    deaths: i64,
    recovered: Option<i64>,
    active: Option<i64>,
    delta_confirmed: Option<i64>,
    delta_recovered: Option<i64>,
    people_tested: Option<i64>,
    people_hospitalized: Option<i64>,
    last_update: Option<NaiveDateTime>,
    report_date: Option<NaiveDate>,
}

fn add(total: &mut Option<i64>, value: Option<i64>) {
    if let Some(v) = value {
        *total = Some(total.unwrap_or(0).saturating_add(v));
    }
}

impl DayTotals {
    fn add(&mut self, row: &RawTimeSeriesRow) {
        self.confirmed = self.confirmed.saturating_add(row.confirmed);
        self.deaths = self.deaths.saturating_add(row.deaths);
        add(&mut self.recovered, row.recovered);
        add(&mut self.active, row.active);
        add(&mut self.delta_confirmed, row.delta_confirmed);
        add(&mut self.delta_recovered, row.delta_recovered);
        add(&mut self.people_tested, row.people_tested);
        add(&mut self.people_hospitalized, row.people_hospitalized);
        self.last_update = self.last_update.max(Some(row.last_update));
        self.report_date = self.report_date.max(Some(row.report_date.unwrap_or(row.date)));
    }
}

/// Sum sub-national rows into one national row per date
///
/// Additive fields are summed; the as-of report date is the maximum across
/// units. Identity fields are re-attached from `federated`. Non-additive
/// fields (incident rate) are left empty.
pub fn rollup_federated(
    sub_national: &[RawTimeSeriesRow],
    federated: &FederatedCountry,
) -> Vec<RawTimeSeriesRow> {
    let mut by_date: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();
    for row in sub_national {
        by_date.entry(row.date).or_default().add(row);
    }

    by_date
        .into_iter()
        .map(|(date, totals)| RawTimeSeriesRow {
            country_region: federated.name.clone(),
            province_state: None,
            iso3: federated.iso3.clone(),
            last_update: totals
                .last_update
                .unwrap_or_else(|| date.and_time(chrono::NaiveTime::default())),
            date,
            confirmed: totals.confirmed,
            deaths: totals.deaths,
            recovered: totals.recovered,
            active: totals.active,
            delta_confirmed: totals.delta_confirmed,
            delta_recovered: totals.delta_recovered,
            incident_rate: None,
            people_tested: totals.people_tested,
            people_hospitalized: totals.people_hospitalized,
            uid: Some(federated.uid),
            report_date: totals.report_date,
        })
        .collect()
}

/// Union rolled-up rows with the per-country rows, sorted by (country, date)
///
/// A national row of the federated country is replaced by the rollup on any
/// date the rollup covers.
pub fn merge_national(
    countries: Vec<RawTimeSeriesRow>,
    rollup: Vec<RawTimeSeriesRow>,
    federated: &FederatedCountry,
) -> Vec<RawTimeSeriesRow> {
    let covered: BTreeSet<NaiveDate> = rollup.iter().map(|r| r.date).collect();

    let mut merged: Vec<RawTimeSeriesRow> = countries
        .into_iter()
        .filter(|r| !(federated.matches(&r.country_region) && covered.contains(&r.date)))
        .chain(rollup)
        .collect();
    merged.sort_by(|a, b| {
        a.country_region
            .cmp(&b.country_region)
            .then(a.date.cmp(&b.date))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn state(name: &str, day: u32, confirmed: i64, tested: Option<i64>) -> RawTimeSeriesRow {
        let date = NaiveDate::from_ymd_opt(2020, 4, day).unwrap();
        RawTimeSeriesRow {
            country_region: "US".to_string(),
            province_state: Some(name.to_string()),
            iso3: "USA".to_string(),
            last_update: date.and_hms_opt(12, 0, 0).unwrap(),
            date,
            confirmed,
            deaths: 1,
            recovered: None,
            active: None,
            delta_confirmed: Some(confirmed / 2),
            delta_recovered: None,
            incident_rate: Some(10.0),
            people_tested: tested,
            people_hospitalized: None,
            uid: Some(84000001),
            report_date: Some(date),
        }
    }

    #[test]
    fn test_rollup_sums_by_date() {
        let rows = vec![
            state("Alabama", 1, 10, Some(100)),
            state("Alaska", 1, 20, None),
            state("Alabama", 2, 5, Some(50)),
            state("Alaska", 2, 15, Some(70)),
        ];
        let national = rollup_federated(&rows, &FederatedCountry::default());

        assert_eq!(national.len(), 2);
        assert_eq!(national[0].confirmed, 30);
        assert_eq!(national[0].deaths, 2);
        assert_eq!(national[0].delta_confirmed, Some(15));
        assert_eq!(national[0].people_tested, Some(100));
        assert_eq!(national[0].recovered, None);
        assert_eq!(national[0].province_state, None);
        assert_eq!(national[0].uid, Some(840));
        assert_eq!(national[0].incident_rate, None);
        assert_eq!(national[1].confirmed, 20);
        assert_eq!(national[1].people_tested, Some(120));
    }

    #[test]
    fn test_rollup_saturates_huge_counts() {
        let rows = vec![state("Alabama", 1, i64::MAX, None), state("Alaska", 1, 5, None)];
        let national = rollup_federated(&rows, &FederatedCountry::default());

        assert_eq!(national.len(), 1);
        assert_eq!(national[0].confirmed, i64::MAX);
        assert_eq!(national[0].deaths, 2);
    }

    #[test]
    fn test_merge_replaces_national_rows_on_covered_dates() {
        let federated = FederatedCountry::default();
        let mut national_day1 = state("x", 1, 999, None);
        national_day1.province_state = None;
        let mut national_day3 = state("x", 3, 77, None);
        national_day3.province_state = None;
        let mut norway = state("x", 1, 3, None);
        norway.country_region = "Norway".to_string();
        norway.province_state = None;

        let rollup = rollup_federated(&[state("Alabama", 1, 10, None)], &federated);
        let merged = merge_national(vec![national_day3, norway, national_day1], rollup, &federated);

        let keys: Vec<_> = merged
            .iter()
            .map(|r| (r.country_region.as_str(), r.date.day0() + 1, r.confirmed))
            .collect();
        assert_eq!(keys, vec![("Norway", 1, 3), ("US", 1, 10), ("US", 3, 77)]);
    }
}
