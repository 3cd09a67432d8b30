//! Error types for reference data loading

use std::path::PathBuf;

use thiserror::Error;

use crate::table::TableError;

/// Errors raised while loading reference tables or the patch file
#[derive(Error, Debug)]
pub enum ReferenceError {
    /// A reference table could not be read
    #[error(transparent)]
    Table(#[from] TableError),

    /// The population table has neither a `population` nor a year column
    #[error("No population column in {}: expected 'population' or a year such as '2018'", .0.display())]
    NoPopulationColumn(PathBuf),

    /// The patch file is not valid
    #[error("Invalid reference patches in {}: {message}", .path.display())]
    Patches { path: PathBuf, message: String },

    /// IO error with path context
    #[error("IO error with {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for reference loading
pub type ReferenceResult<T> = Result<T, ReferenceError>;
