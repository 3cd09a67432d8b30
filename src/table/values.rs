//! Cell value parsing
//!
//! Parsers return `Ok(None)` for empty cells and `Err(message)` for text that
//! cannot be read as the requested type. The caller attaches file, line and
//! column context.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO3_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%y %H:%M",
    "%m/%d/%Y %H:%M",
];

// Two-digit years must be tried first: `%Y` happily reads "20" as year 20.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];

fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed.eq_ignore_ascii_case("null")
}

/// Parse a count cell; float text such as `"12.0"` is rounded
///
/// Float text outside the `i64` range is rejected rather than saturated.
pub fn parse_count(raw: &str) -> Result<Option<i64>, String> {
    if is_missing(raw) {
        return Ok(None);
    }
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(Some(value));
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => {
            let rounded = value.round();
            // i64::MAX as f64 rounds up to 2^63, which is already out of range
            if rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
                Ok(Some(rounded as i64))
            } else {
                Err(format!("count out of range: '{}'", trimmed))
            }
        }
        _ => Err(format!("expected a count, found '{}'", trimmed)),
    }
}

/// Parse a floating point cell
pub fn parse_float(raw: &str) -> Result<Option<f64>, String> {
    if is_missing(raw) {
        return Ok(None);
    }
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        Ok(_) => Ok(None),
        Err(_) => Err(format!("expected a number, found '{}'", trimmed)),
    }
}

/// Parse a timestamp cell, keeping sub-day precision
///
/// Date-only values are read as midnight.
pub fn parse_timestamp(raw: &str) -> Result<Option<NaiveDateTime>, String> {
    if is_missing(raw) {
        return Ok(None);
    }
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(dt.naive_local()));
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Some(dt));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(Some(date.and_time(NaiveTime::default())));
        }
    }

    Err(format!("expected a date or timestamp, found '{}'", trimmed))
}

/// Parse a date-like cell at calendar-day granularity
pub fn parse_day(raw: &str) -> Result<Option<NaiveDate>, String> {
    Ok(parse_timestamp(raw)?.map(|dt| dt.date()))
}

/// Upper-case and validate an ISO 3166-1 alpha-3 code
///
/// Returns `None` for anything that is not three ASCII letters; such rows
/// are cruise ships and aggregate entities rather than countries.
pub fn normalize_iso3(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    if ISO3_REGEX.is_match(&code) {
        Some(code)
    } else {
        None
    }
}

/// Check whether a code is already a canonical ISO3 code
pub fn is_valid_iso3(code: &str) -> bool {
    ISO3_REGEX.is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("42"), Ok(Some(42)));
        assert_eq!(parse_count(" 42 "), Ok(Some(42)));
        assert_eq!(parse_count("12.0"), Ok(Some(12)));
        assert_eq!(parse_count("-3"), Ok(Some(-3)));
        assert_eq!(parse_count(""), Ok(None));
        assert_eq!(parse_count("NaN"), Ok(None));
        assert!(parse_count("many").is_err());
        assert!(parse_count("1e19").is_err());
        assert!(parse_count("-1e19").is_err());
        assert_eq!(parse_count("1e6"), Ok(Some(1_000_000)));
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("12.5"), Ok(Some(12.5)));
        assert_eq!(parse_float(""), Ok(None));
        assert!(parse_float("abc").is_err());
    }

    #[test]
    fn test_parse_day_strips_time_of_day() {
        let expected = NaiveDate::from_ymd_opt(2020, 3, 23);
        assert_eq!(parse_day("2020-03-23 23:19:34"), Ok(expected));
        assert_eq!(parse_day("2020-03-23T23:19:34Z"), Ok(expected));
        assert_eq!(parse_day("2020-03-23 01:02:03.456"), Ok(expected));
        assert_eq!(parse_day("2020-03-23"), Ok(expected));
        assert_eq!(parse_day("3/23/20"), Ok(expected));
        assert_eq!(parse_day("3/23/2020"), Ok(expected));
        assert_eq!(parse_day("3/23/20 14:05"), Ok(expected));
        assert_eq!(parse_day(""), Ok(None));
        assert!(parse_day("yesterday").is_err());
    }

    #[test]
    fn test_parse_timestamp_keeps_order_within_day() {
        let early = parse_timestamp("2020-03-23 01:00:00").unwrap().unwrap();
        let late = parse_timestamp("2020-03-23 23:00:00").unwrap().unwrap();
        assert!(early < late);
        assert_eq!(early.date(), late.date());
    }

    #[test]
    fn test_normalize_iso3() {
        assert_eq!(normalize_iso3("nor"), Some("NOR".to_string()));
        assert_eq!(normalize_iso3(" USA "), Some("USA".to_string()));
        assert_eq!(normalize_iso3(""), None);
        assert_eq!(normalize_iso3("XX"), None);
        assert_eq!(normalize_iso3("US1"), None);
        assert!(is_valid_iso3("DNK"));
        assert!(!is_valid_iso3("dnk"));
    }
}
