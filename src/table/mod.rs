//! Flat-file table I/O
//!
//! Raw upstream exports and reference tables are read into a [`RawTable`]:
//! headers normalized to lower-snake-case, a per-table rename map applied,
//! and every record kept as text until a typed accessor on [`Row`] parses it.
//! Parse failures name the offending file, line and column.
//!
//! Output tables are written with `csv` + `serde`, nulls as empty cells.

mod columns;
mod values;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use columns::{ColumnRename, clean_name, normalize_headers};
pub use values::{
    is_valid_iso3, normalize_iso3, parse_count, parse_day, parse_float, parse_timestamp,
};

/// Errors raised while reading or writing flat files
#[derive(Error, Debug)]
pub enum TableError {
    /// IO error with path context
    #[error("IO error with {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV structure
    #[error("CSV error in {}: {message}", .path.display())]
    Csv { path: PathBuf, message: String },

    /// A required column is absent after normalization
    #[error("Missing column '{column}' in {}", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    /// A cell could not be parsed
    #[error("Invalid value in {} at line {line}, column '{column}': {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        column: String,
        message: String,
    },

    /// Serializing an output table failed
    #[error("Failed to write table: {0}")]
    Write(String),
}

impl TableError {
    /// The file the error refers to, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            TableError::Io { path, .. }
            | TableError::Csv { path, .. }
            | TableError::MissingColumn { path, .. }
            | TableError::Parse { path, .. } => Some(path),
            TableError::Write(_) => None,
        }
    }
}

/// A located column in a [`RawTable`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    index: usize,
    name: String,
}

impl Column {
    /// Normalized column name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A CSV file held in memory with normalized headers
#[derive(Debug, Clone)]
pub struct RawTable {
    path: PathBuf,
    headers: Vec<String>,
    records: Vec<csv::StringRecord>,
}

impl RawTable {
    /// Read a CSV file, normalizing headers and applying `renames`
    pub fn read(path: &Path, renames: &[ColumnRename]) -> Result<Self, TableError> {
        let file = File::open(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, path, renames)
    }

    /// Read CSV content from any reader; `source` names it in errors
    pub fn from_reader<R: Read>(
        reader: R,
        source: impl Into<PathBuf>,
        renames: &[ColumnRename],
    ) -> Result<Self, TableError> {
        let path = source.into();
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let csv_error = |e: csv::Error, path: &Path| TableError::Csv {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let raw_headers = rdr.headers().map_err(|e| csv_error(e, &path))?.clone();
        let headers = normalize_headers(raw_headers.iter(), renames);

        let records = rdr
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| csv_error(e, &path))?;

        debug!(
            file = %path.display(),
            rows = records.len(),
            columns = headers.len(),
            "Read table"
        );

        Ok(Self {
            path,
            headers,
            records,
        })
    }

    /// Source path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Normalized headers
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no data records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Locate a required column
    pub fn column(&self, name: &str) -> Result<Column, TableError> {
        self.optional_column(name)
            .ok_or_else(|| TableError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
    }

    /// Locate an optional column
    pub fn optional_column(&self, name: &str) -> Option<Column> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|index| Column {
                index,
                name: name.to_string(),
            })
    }

    /// Iterate over the data records
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.records.iter().enumerate().map(move |(i, record)| Row {
            path: &self.path,
            record,
            // Header is line 1
            line: record.position().map(|p| p.line()).unwrap_or(i as u64 + 2),
        })
    }
}

/// One record of a [`RawTable`] with typed accessors
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    path: &'a Path,
    record: &'a csv::StringRecord,
    line: u64,
}

impl<'a> Row<'a> {
    /// 1-based line number in the source file
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Raw trimmed text of a cell; short records read as empty
    pub fn cell(&self, column: &Column) -> &'a str {
        self.record.get(column.index).unwrap_or("").trim()
    }

    /// Non-empty text of a cell
    pub fn text(&self, column: &Column) -> Option<String> {
        let value = self.cell(column);
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    /// Text of an optional column
    pub fn text_opt(&self, column: Option<&Column>) -> Option<String> {
        column.and_then(|c| self.text(c))
    }

    /// Parse a count cell
    pub fn count(&self, column: &Column) -> Result<Option<i64>, TableError> {
        parse_count(self.cell(column)).map_err(|message| self.error(column, message))
    }

    /// Parse a count cell of an optional column
    pub fn count_opt(&self, column: Option<&Column>) -> Result<Option<i64>, TableError> {
        column.map_or(Ok(None), |c| self.count(c))
    }

    /// Parse a float cell
    pub fn float(&self, column: &Column) -> Result<Option<f64>, TableError> {
        parse_float(self.cell(column)).map_err(|message| self.error(column, message))
    }

    /// Parse a float cell of an optional column
    pub fn float_opt(&self, column: Option<&Column>) -> Result<Option<f64>, TableError> {
        column.map_or(Ok(None), |c| self.float(c))
    }

    /// Parse a timestamp cell
    pub fn timestamp(&self, column: &Column) -> Result<Option<NaiveDateTime>, TableError> {
        parse_timestamp(self.cell(column)).map_err(|message| self.error(column, message))
    }

    /// Parse a date cell at day granularity
    pub fn day(&self, column: &Column) -> Result<Option<NaiveDate>, TableError> {
        parse_day(self.cell(column)).map_err(|message| self.error(column, message))
    }

    /// Parse a date cell of an optional column
    pub fn day_opt(&self, column: Option<&Column>) -> Result<Option<NaiveDate>, TableError> {
        column.map_or(Ok(None), |c| self.day(c))
    }

    /// Build a parse error located at this row and `column`
    pub fn error(&self, column: &Column, message: impl Into<String>) -> TableError {
        TableError::Parse {
            path: self.path.to_path_buf(),
            line: self.line,
            column: column.name.clone(),
            message: message.into(),
        }
    }
}

/// Serialize rows to CSV bytes
pub fn to_csv_bytes<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, TableError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| TableError::Write(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| TableError::Write(e.to_string()))
}

/// Serialize rows to a CSV file
pub fn write_csv<T: Serialize>(rows: &[T], path: &Path) -> Result<(), TableError> {
    let bytes = to_csv_bytes(rows)?;
    std::fs::write(path, bytes).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(content: &str) -> RawTable {
        RawTable::from_reader(content.as_bytes(), "fixture.csv", &[("long", "lon")]).unwrap()
    }

    #[test]
    fn test_read_normalizes_headers() {
        let t = table("Country_Region,Long_,Confirmed\nNorway,10.7,5\n");
        assert_eq!(t.headers(), &["country_region", "lon", "confirmed"]);
        assert_eq!(t.len(), 1);
        assert!(t.column("lon").is_ok());
    }

    #[test]
    fn test_missing_column_names_file_and_column() {
        let t = table("Country_Region\nNorway\n");
        let err = t.column("confirmed").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("confirmed"));
        assert!(msg.contains("fixture.csv"));
    }

    #[test]
    fn test_parse_error_names_line_and_column() {
        let t = table("country_region,confirmed\nNorway,5\nSweden,lots\n");
        let col = t.column("confirmed").unwrap();
        let rows: Vec<_> = t.rows().collect();
        assert_eq!(rows[0].count(&col).unwrap(), Some(5));

        let err = rows[1].count(&col).unwrap_err();
        match err {
            TableError::Parse { line, column, .. } => {
                assert_eq!(line, 3);
                assert_eq!(column, "confirmed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_record_reads_as_empty() {
        let t = table("country_region,confirmed\nNorway\n");
        let col = t.column("confirmed").unwrap();
        let row = t.rows().next().unwrap();
        assert_eq!(row.count(&col).unwrap(), None);
    }

    #[test]
    fn test_to_csv_bytes_writes_nulls_as_empty() {
        #[derive(Serialize)]
        struct Out {
            name: &'static str,
            value: Option<f64>,
        }
        let bytes = to_csv_bytes(&[
            Out {
                name: "a",
                value: Some(1.5),
            },
            Out {
                name: "b",
                value: None,
            },
        ])
        .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "name,value\na,1.5\nb,\n");
    }
}
