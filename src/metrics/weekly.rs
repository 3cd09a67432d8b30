//! Weekly resampling for trajectory plots

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{EnrichedRow, WeeklyRow, WeeklyTable};

/// Aggregate applied to `log_confirmed` within a week
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeeklyAgg {
    Max,
    #[default]
    Mean,
}

impl fmt::Display for WeeklyAgg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Max => write!(f, "max"),
            Self::Mean => write!(f, "mean"),
        }
    }
}

impl FromStr for WeeklyAgg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "max" => Ok(Self::Max),
            "mean" | "avg" => Ok(Self::Mean),
            _ => Err(format!("Unknown weekly aggregate: {}", s)),
        }
    }
}

/// Which countries to leave out of weekly trajectories
///
/// Small case counts make week-over-week ratios jumpy; countries whose final
/// confirmed total is below `min_total_confirmed`, or that are listed by
/// name, are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyExclusion {
    pub min_total_confirmed: i64,
    pub countries: Vec<String>,
}

impl Default for WeeklyExclusion {
    fn default() -> Self {
        Self {
            min_total_confirmed: 100,
            countries: Vec::new(),
        }
    }
}

impl WeeklyExclusion {
    /// Exclude nothing
    pub fn none() -> Self {
        Self {
            min_total_confirmed: 0,
            countries: Vec::new(),
        }
    }

    /// Whether a country's series should be left out
    pub fn excludes(&self, series: &[EnrichedRow]) -> bool {
        let Some(last) = series.last() else {
            return true;
        };
        last.confirmed < self.min_total_confirmed
            || self.countries.iter().any(|c| *c == last.country_region)
    }
}

/// The Sunday ending the calendar week containing `date`
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let offset = (7 - date.weekday().num_days_from_sunday()) % 7;
    date + Days::new(u64::from(offset))
}

#[derive(Default)]
struct WeekAcc {
    log_confirmed_sum: f64,
    log_confirmed_max: f64,
    log_delta_sum: f64,
    count: usize,
}

/// Resample per-country series to calendar weeks ending Sunday
///
/// `log_confirmed` is aggregated with `agg`, `log_delta_confirmed` is always
/// the mean. Weeks without observations produce no row.
pub fn resample_weekly<'a>(
    groups: impl IntoIterator<Item = &'a [EnrichedRow]>,
    agg: WeeklyAgg,
    exclusion: &WeeklyExclusion,
) -> WeeklyTable {
    let mut rows = Vec::new();

    for series in groups {
        if exclusion.excludes(series) {
            if let Some(first) = series.first() {
                debug!(country = %first.country_region, "Excluded from weekly trajectory");
            }
            continue;
        }

        let mut weeks: BTreeMap<NaiveDate, WeekAcc> = BTreeMap::new();
        for row in series {
            let acc = weeks.entry(week_ending(row.date)).or_insert_with(|| WeekAcc {
                log_confirmed_max: f64::NEG_INFINITY,
                ..WeekAcc::default()
            });
            acc.log_confirmed_sum += row.log_confirmed;
            acc.log_confirmed_max = acc.log_confirmed_max.max(row.log_confirmed);
            acc.log_delta_sum += row.log_delta_confirmed;
            acc.count += 1;
        }

        let country = &series[0].country_region;
        rows.extend(weeks.into_iter().map(|(week_ending, acc)| {
            let n = acc.count as f64;
            WeeklyRow {
                country_region: country.clone(),
                week_ending,
                log_confirmed: match agg {
                    WeeklyAgg::Max => acc.log_confirmed_max,
                    WeeklyAgg::Mean => acc.log_confirmed_sum / n,
                },
                log_delta_confirmed: acc.log_delta_sum / n,
            }
        }));
    }

    rows.sort_by(|a, b| {
        a.country_region
            .cmp(&b.country_region)
            .then(a.week_ending.cmp(&b.week_ending))
    });
    WeeklyTable { rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    fn row(country: &str, date: NaiveDate, confirmed: i64, log_c: f64, log_d: f64) -> EnrichedRow {
        EnrichedRow {
            country_region: country.to_string(),
            iso3: "NOR".to_string(),
            continent: None,
            date,
            confirmed,
            deaths: 0,
            recovered: None,
            active: None,
            people_tested: None,
            people_hospitalized: None,
            population: None,
            delta_confirmed: 0,
            delta_deaths: 0,
            log_confirmed: log_c,
            log_delta_confirmed: log_d,
            log_deaths: 0.0,
            scaled_confirmed: 0.0,
            std_confirmed: None,
            norm_confirmed: 0.0,
            confirmed_pr_100k: None,
            deaths_pr_100k: None,
        }
    }

    #[test]
    fn test_week_ending_is_sunday() {
        // 2020-03-01 was a Sunday
        assert_eq!(week_ending(day(1)), day(1));
        assert_eq!(week_ending(day(2)), day(8));
        assert_eq!(week_ending(day(7)), day(8));
        assert_eq!(week_ending(day(8)), day(8));
    }

    #[test]
    fn test_resample_max_and_mean() {
        let series = vec![
            row("Norway", day(2), 200, 1.0, 2.0),
            row("Norway", day(3), 300, 3.0, 4.0),
            row("Norway", day(10), 400, 5.0, 6.0),
        ];

        let max = resample_weekly([series.as_slice()], WeeklyAgg::Max, &WeeklyExclusion::none());
        assert_eq!(max.len(), 2);
        assert_eq!(max.rows[0].week_ending, day(8));
        assert_eq!(max.rows[0].log_confirmed, 3.0);
        assert_eq!(max.rows[0].log_delta_confirmed, 3.0);
        assert_eq!(max.rows[1].week_ending, day(15));

        let mean = resample_weekly([series.as_slice()], WeeklyAgg::Mean, &WeeklyExclusion::none());
        assert_eq!(mean.rows[0].log_confirmed, 2.0);
    }

    #[test]
    fn test_exclusion_rules() {
        let small = vec![row("Tinyland", day(2), 12, 0.0, 0.0)];
        let listed = vec![row("Listed", day(2), 5000, 0.0, 0.0)];
        let kept = vec![row("Norway", day(2), 5000, 0.0, 0.0)];
        let exclusion = WeeklyExclusion {
            min_total_confirmed: 100,
            countries: vec!["Listed".to_string()],
        };

        let table = resample_weekly(
            [small.as_slice(), listed.as_slice(), kept.as_slice()],
            WeeklyAgg::Mean,
            &exclusion,
        );
        assert_eq!(table.countries(), vec!["Norway"]);
    }

    #[test]
    fn test_parse_agg() {
        assert_eq!("max".parse::<WeeklyAgg>().unwrap(), WeeklyAgg::Max);
        assert_eq!("MEAN".parse::<WeeklyAgg>().unwrap(), WeeklyAgg::Mean);
        assert!("median".parse::<WeeklyAgg>().is_err());
    }
}
