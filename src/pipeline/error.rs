//! Error types for pipeline operations
//!
//! Component errors chain into [`PipelineError`] so callers get one type to
//! match on, while [`PipelineError::user_message`] renders a message with a
//! hint for CLI output.

use std::path::PathBuf;

use thiserror::Error;

use crate::fetch::FetchError;
use crate::reference::ReferenceError;
use crate::table::TableError;

/// Errors that can occur during pipeline execution
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream synchronization failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A raw table could not be read or parsed
    #[error(transparent)]
    Table(#[from] TableError),

    /// Reference data could not be loaded
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// A country lookup found nothing
    #[error("Unknown country: {0}")]
    UnknownCountry(String),

    /// IO error with path context
    #[error("IO error with {}: {message}", .path.display())]
    IoWithPath {
        path: PathBuf,
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Create an IO error with path context
    pub fn io_with_path(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::IoWithPath {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Check if this error is recoverable (retry, or fall back to the last good data)
    pub fn is_recoverable(&self) -> bool {
        match self {
            PipelineError::Fetch(e) => e.is_recoverable(),
            PipelineError::UnknownCountry(_) | PipelineError::IoWithPath { .. } => true,
            PipelineError::Table(TableError::Io { .. }) => true,
            PipelineError::Config(_)
            | PipelineError::Table(_)
            | PipelineError::Reference(_) => false,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Config(msg) => {
                format!("Configuration error: {msg}\n\nHint: Check your pipeline configuration file.")
            }
            PipelineError::Fetch(e) => {
                format!(
                    "{e}\n\nHint: Local data was left untouched. Check your network connection and retry."
                )
            }
            PipelineError::Table(TableError::Io { path, .. }) => {
                format!(
                    "{self}\n\nHint: Run `sync` to download {} or check --data-dir.",
                    path.display()
                )
            }
            PipelineError::Table(e) => {
                format!("{e}\n\nHint: The upstream export format may have changed.")
            }
            PipelineError::Reference(e) => {
                format!("{e}\n\nHint: Check the reference tables and patch file in the data directory.")
            }
            PipelineError::UnknownCountry(name) => {
                format!("Unknown country: {name}\n\nHint: Country names follow the case-count source, e.g. 'US' or 'Korea, South'.")
            }
            PipelineError::IoWithPath { .. } => self.to_string(),
        }
    }
}
