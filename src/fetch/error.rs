//! Error types for upstream synchronization

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while talking to the upstream repository or persisting its files
#[derive(Error, Debug)]
pub enum FetchError {
    /// The version endpoint could not be queried
    #[error("Version check failed: {0}")]
    VersionCheck(String),

    /// A request failed before a response arrived
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// The server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// The version response did not contain the expected identifier
    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    /// No client is configured for remote access
    #[error("Upstream access unavailable: {0}")]
    Unavailable(String),

    /// IO error with path context
    #[error("IO error with {}: {message}", .path.display())]
    IoWithPath {
        path: PathBuf,
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

impl FetchError {
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

    /// Whether a retry could succeed
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FetchError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FetchError::HttpStatus {
            url: "https://example.org/cases.csv".to_string(),
            status: 503,
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("cases.csv"));
    }

    #[test]
    fn test_io_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = FetchError::io_with_path("/data/last_commit.txt", "writing marker", io_err);
        let display = err.to_string();
        assert!(display.contains("/data/last_commit.txt"));
        assert!(display.contains("writing marker"));
        assert!(err.is_recoverable());
    }
}
