//! CLI error type

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::PipelineError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to write {path}: {1}", path = .0.display())]
    FileWriteError(PathBuf, String),

    #[error("{0}")]
    NetworkError(String),

    #[error("{0}")]
    PipelineError(String),
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Fetch(_) => CliError::NetworkError(e.user_message()),
            other => CliError::PipelineError(other.user_message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;

    #[test]
    fn test_from_pipeline_error_keeps_hint() {
        let err: CliError = PipelineError::UnknownCountry("Atlantis".to_string()).into();
        let msg = err.to_string();
        assert!(msg.contains("Atlantis"));
        assert!(msg.contains("Hint:"));

        let err: CliError = PipelineError::Fetch(FetchError::HttpStatus {
            url: "https://example.org/cases.csv".to_string(),
            status: 503,
        })
        .into();
        assert!(matches!(err, CliError::NetworkError(_)));
    }
}
