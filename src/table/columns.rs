//! Column name normalization

/// A source-specific rename applied after header normalization: `(from, to)`
pub type ColumnRename = (&'static str, &'static str);

/// Normalize a header to a lower-snake-case identifier
///
/// Runs of characters that are not ASCII alphanumerics collapse to a single
/// `_`, and leading/trailing separators are removed:
///
/// ```
/// use covid_dashboard::table::clean_name;
///
/// assert_eq!(clean_name("Country_Region"), "country_region");
/// assert_eq!(clean_name("Long_"), "long");
/// assert_eq!(clean_name(" People Tested "), "people_tested");
/// ```
pub fn clean_name(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    let mut pending_separator = false;

    for c in header.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    out
}

/// Normalize every header and apply the rename table
///
/// A rename is skipped when its target name is already present, so a file
/// that already uses the canonical name is left alone.
pub fn normalize_headers<'a>(
    headers: impl IntoIterator<Item = &'a str>,
    renames: &[ColumnRename],
) -> Vec<String> {
    let mut normalized: Vec<String> = headers.into_iter().map(clean_name).collect();

    for (from, to) in renames {
        if normalized.iter().any(|h| h == to) {
            continue;
        }
        if let Some(header) = normalized.iter_mut().find(|h| h.as_str() == *from) {
            *header = (*to).to_string();
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("Country_Region"), "country_region");
        assert_eq!(clean_name("Last_Update"), "last_update");
        assert_eq!(clean_name("Long_"), "long");
        assert_eq!(clean_name("ISO3"), "iso3");
        assert_eq!(clean_name("Case-Fatality Ratio"), "case_fatality_ratio");
        assert_eq!(clean_name("__weird  (name)__"), "weird_name");
        assert_eq!(clean_name("2018"), "2018");
        assert_eq!(clean_name(""), "");
    }

    #[test]
    fn test_normalize_headers_with_renames() {
        let headers = vec!["Country_Region", "Last_Update", "Long_", "Lat"];
        let renames = [("long", "lon"), ("last_update", "date")];
        assert_eq!(
            normalize_headers(headers, &renames),
            vec!["country_region", "date", "lon", "lat"]
        );
    }

    #[test]
    fn test_rename_skipped_when_target_exists() {
        let headers = vec!["Date", "Last_Update"];
        let renames = [("last_update", "date")];
        assert_eq!(normalize_headers(headers, &renames), vec!["date", "last_update"]);
    }
}
