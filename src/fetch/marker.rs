//! Persisted upstream version marker

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{FetchError, FetchResult};

/// Value written when no version has been seen yet
pub const UNKNOWN_VERSION: &str = "unknown";

/// Single-line file recording the last downloaded upstream version
#[derive(Debug, Clone)]
pub struct VersionMarker {
    path: PathBuf,
}

impl VersionMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the marker, creating it with [`UNKNOWN_VERSION`] if absent
    pub fn read_or_init(&self) -> FetchResult<String> {
        if !self.path.exists() {
            debug!(file = %self.path.display(), "Creating version marker");
            self.write(UNKNOWN_VERSION)?;
            return Ok(UNKNOWN_VERSION.to_string());
        }
        self.read()
    }

    /// Read the marker without creating it
    pub fn read(&self) -> FetchResult<String> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            FetchError::io_with_path(&self.path, "reading version marker", e)
        })?;
        let value = content.trim();
        if value.is_empty() {
            Ok(UNKNOWN_VERSION.to_string())
        } else {
            Ok(value.to_string())
        }
    }

    /// Replace the marker through a temporary file and rename
    pub fn write(&self, version: &str) -> FetchResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    FetchError::io_with_path(parent, "creating data directory", e)
                })?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, format!("{}\n", version))
            .map_err(|e| FetchError::io_with_path(&tmp, "writing version marker", e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| FetchError::io_with_path(&self.path, "replacing version marker", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_absent_marker_is_created_unknown() {
        let dir = TempDir::new().unwrap();
        let marker = VersionMarker::new(dir.path().join("last_commit.txt"));

        assert_eq!(marker.read_or_init().unwrap(), UNKNOWN_VERSION);
        assert!(marker.path().exists());
        assert_eq!(marker.read().unwrap(), UNKNOWN_VERSION);
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let marker = VersionMarker::new(dir.path().join("last_commit.txt"));

        marker.write("abc1234").unwrap();
        assert_eq!(marker.read_or_init().unwrap(), "abc1234");
        assert!(!dir.path().join("last_commit.tmp").exists());
    }

    #[test]
    fn test_empty_marker_reads_unknown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_commit.txt");
        fs::write(&path, "").unwrap();
        assert_eq!(VersionMarker::new(path).read().unwrap(), UNKNOWN_VERSION);
    }
}
