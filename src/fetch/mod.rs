//! Source fetcher
//!
//! Keeps the local copies of the raw upstream exports in step with the remote
//! repository. A download happens only when the upstream content version
//! differs from the persisted [`VersionMarker`].
//!
//! Failure policy:
//! - a failed version check is logged and reported as
//!   [`SyncOutcome::VersionUnavailable`]; local data is left as is
//! - a failed download is returned as a [`FetchError`]; every table is
//!   first written to a `.part` file and the live files are only replaced
//!   once all of them arrived; the live files are backed up while they are
//!   swapped so a failed rename restores the previous set
//!
//! The fetcher owns the lock that serializes synchronization against readers
//! of the raw files (see [`Fetcher::lock_files`]).

mod client;
mod error;
mod marker;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

#[cfg(test)]
pub use client::MockUpstream;
#[cfg(feature = "http")]
pub use client::HttpUpstream;
pub use client::{OfflineUpstream, UpstreamClient, extract_version};
pub use error::{FetchError, FetchResult};
pub use marker::{UNKNOWN_VERSION, VersionMarker};

/// One raw export: where it lives upstream and which local file mirrors it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSource {
    pub file_name: String,
    pub url: String,
}

impl RawSource {
    pub fn new(file_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            url: url.into(),
        }
    }
}

/// Result of a synchronization attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local files already match the upstream version
    UpToDate { version: String },
    /// The upstream version could not be determined; nothing was touched
    VersionUnavailable { reason: String },
    /// New files were downloaded and the marker advanced
    Updated { version: String, files: Vec<PathBuf> },
}

impl SyncOutcome {
    /// Whether new data landed on disk
    pub fn is_updated(&self) -> bool {
        matches!(self, SyncOutcome::Updated { .. })
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpToDate { version } => {
                write!(f, "Data from version '{}' already downloaded", version)
            }
            Self::VersionUnavailable { reason } => {
                write!(f, "No update: upstream version unavailable ({})", reason)
            }
            Self::Updated { version, files } => {
                write!(f, "Downloaded {} files for version '{}'", files.len(), version)
            }
        }
    }
}

/// Downloads raw exports when the upstream version changes
pub struct Fetcher {
    client: Box<dyn UpstreamClient>,
    data_dir: PathBuf,
    sources: Vec<RawSource>,
    marker: VersionMarker,
    lock: Mutex<()>,
}

impl Fetcher {
    /// Create a fetcher writing into `data_dir`
    pub fn new(
        client: Box<dyn UpstreamClient>,
        data_dir: impl Into<PathBuf>,
        marker_file: &str,
        sources: Vec<RawSource>,
    ) -> Self {
        let data_dir = data_dir.into();
        let marker = VersionMarker::new(data_dir.join(marker_file));
        Self {
            client,
            data_dir,
            sources,
            marker,
            lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn marker(&self) -> &VersionMarker {
        &self.marker
    }

    pub fn sources(&self) -> &[RawSource] {
        &self.sources
    }

    /// Local path of a source
    pub fn local_path(&self, source: &RawSource) -> PathBuf {
        self.data_dir.join(&source.file_name)
    }

    /// Hold this guard while reading raw files so a concurrent sync cannot swap them mid-read
    pub fn lock_files(&self) -> MutexGuard<'_, ()> {
        // The guarded state is on disk and each file is replaced atomically
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bring local files up to the latest upstream version
    pub fn synchronize(&self) -> FetchResult<SyncOutcome> {
        let _span = info_span!("synchronize", data_dir = %self.data_dir.display()).entered();
        let _guard = self.lock_files();

        let version = match self.client.latest_version() {
            Ok(version) => version,
            Err(e) => {
                warn!(error = %e, "Failed to get most recent upstream version, keeping local data");
                return Ok(SyncOutcome::VersionUnavailable {
                    reason: e.to_string(),
                });
            }
        };

        let current = self.marker.read_or_init()?;
        if current == version {
            info!(version = %version, "Local data is up to date");
            return Ok(SyncOutcome::UpToDate { version });
        }

        info!(
            previous = %current,
            version = %version,
            files = self.sources.len(),
            "New upstream data available"
        );

        let parts = self.download_all()?;
        let files = self.commit(parts)?;
        self.marker.write(&version)?;

        info!(version = %version, files = files.len(), "Downloads complete");
        Ok(SyncOutcome::Updated { version, files })
    }

    /// Download every source to a `.part` file; on failure remove what was written
    fn download_all(&self) -> FetchResult<Vec<(PathBuf, PathBuf)>> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| FetchError::io_with_path(&self.data_dir, "creating data directory", e))?;

        let mut parts = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let live = self.local_path(source);
            let part = part_path(&live);

            let result = self.client.download(&source.url).and_then(|bytes| {
                debug!(file = %source.file_name, bytes = bytes.len(), "Downloaded");
                fs::write(&part, bytes)
                    .map_err(|e| FetchError::io_with_path(&part, "writing download", e))
            });

            if let Err(e) = result {
                warn!(file = %source.file_name, error = %e, "Download failed, discarding partial files");
                let _ = fs::remove_file(&part);
                for (written, _) in &parts {
                    let _ = fs::remove_file(written);
                }
                return Err(e);
            }
            parts.push((part, live));
        }
        Ok(parts)
    }

    /// Rename downloaded parts over the live files
    ///
    /// Live files are copied to `.bak` first. If any rename fails the
    /// replaced files are restored from their backups and every remaining
    /// part is removed, so the live set is either all old or all new.
    fn commit(&self, parts: Vec<(PathBuf, PathBuf)>) -> FetchResult<Vec<PathBuf>> {
        let mut backups: Vec<Option<PathBuf>> = Vec::with_capacity(parts.len());
        for (_, live) in &parts {
            if !live.is_file() {
                backups.push(None);
                continue;
            }
            let bak = backup_path(live);
            if let Err(e) = fs::copy(live, &bak) {
                discard(backups.iter().flatten());
                discard(parts.iter().map(|(part, _)| part));
                let _ = fs::remove_file(&bak);
                return Err(FetchError::io_with_path(live, "backing up raw file", e));
            }
            backups.push(Some(bak));
        }

        let mut files: Vec<PathBuf> = Vec::with_capacity(parts.len());
        for (part, live) in &parts {
            if let Err(e) = fs::rename(part, live) {
                warn!(file = %live.display(), error = %e, "Replacing raw file failed, restoring previous files");
                for (restored, bak) in files.iter().zip(&backups) {
                    match bak {
                        Some(bak) => {
                            let _ = fs::rename(bak, restored);
                        }
                        None => {
                            let _ = fs::remove_file(restored);
                        }
                    }
                }
                discard(backups.iter().flatten());
                discard(parts.iter().map(|(part, _)| part));
                return Err(FetchError::io_with_path(live, "replacing raw file", e));
            }
            files.push(live.clone());
        }

        discard(backups.iter().flatten());
        Ok(files)
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("data_dir", &self.data_dir)
            .field("sources", &self.sources)
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}

fn part_path(live: &Path) -> PathBuf {
    with_suffix(live, ".part")
}

fn backup_path(live: &Path) -> PathBuf {
    with_suffix(live, ".bak")
}

fn with_suffix(live: &Path, suffix: &str) -> PathBuf {
    let mut name = live.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Best-effort removal; paths that are already gone are ignored
fn discard<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sources() -> Vec<RawSource> {
        vec![
            RawSource::new("cases.csv", "https://example.org/cases.csv"),
            RawSource::new("cases_country.csv", "https://example.org/cases_country.csv"),
            RawSource::new("cases_time.csv", "https://example.org/cases_time.csv"),
        ]
    }

    fn full_mock(version: &str) -> MockUpstream {
        MockUpstream::new(version)
            .with_body("https://example.org/cases.csv", "a\n1\n")
            .with_body("https://example.org/cases_country.csv", "b\n2\n")
            .with_body("https://example.org/cases_time.csv", "c\n3\n")
    }

    #[test]
    fn test_sync_downloads_on_new_version() {
        let dir = TempDir::new().unwrap();
        let fetcher = Fetcher::new(
            Box::new(full_mock("abc1234")),
            dir.path(),
            "last_commit.txt",
            sources(),
        );

        let outcome = fetcher.synchronize().unwrap();
        assert!(outcome.is_updated());
        assert_eq!(
            fs::read_to_string(dir.path().join("cases_time.csv")).unwrap(),
            "c\n3\n"
        );
        assert_eq!(fetcher.marker().read().unwrap(), "abc1234");
        assert!(!dir.path().join("cases.csv.part").exists());
    }

    #[test]
    fn test_sync_skips_when_marker_matches() {
        let dir = TempDir::new().unwrap();
        VersionMarker::new(dir.path().join("last_commit.txt"))
            .write("abc1234")
            .unwrap();
        let fetcher = Fetcher::new(
            Box::new(full_mock("abc1234")),
            dir.path(),
            "last_commit.txt",
            sources(),
        );

        let outcome = fetcher.synchronize().unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::UpToDate {
                version: "abc1234".to_string()
            }
        );
        assert!(!dir.path().join("cases.csv").exists());
    }

    #[test]
    fn test_version_failure_is_no_update() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cases.csv"), "old\n").unwrap();
        let fetcher = Fetcher::new(
            Box::new(MockUpstream::failing()),
            dir.path(),
            "last_commit.txt",
            sources(),
        );

        let outcome = fetcher.synchronize().unwrap();
        assert!(matches!(outcome, SyncOutcome::VersionUnavailable { .. }));
        assert_eq!(fs::read_to_string(dir.path().join("cases.csv")).unwrap(), "old\n");
        assert!(!dir.path().join("last_commit.txt").exists());
    }

    #[test]
    fn test_partial_download_leaves_live_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cases.csv"), "old\n").unwrap();
        VersionMarker::new(dir.path().join("last_commit.txt"))
            .write("old0000")
            .unwrap();

        // The time-series body is missing, so the third download fails
        let client = MockUpstream::new("new1111")
            .with_body("https://example.org/cases.csv", "new\n")
            .with_body("https://example.org/cases_country.csv", "new\n");
        let fetcher = Fetcher::new(Box::new(client), dir.path(), "last_commit.txt", sources());

        let err = fetcher.synchronize().unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
        assert_eq!(fs::read_to_string(dir.path().join("cases.csv")).unwrap(), "old\n");
        assert_eq!(fetcher.marker().read().unwrap(), "old0000");
        assert!(!dir.path().join("cases.csv.part").exists());
        assert!(!dir.path().join("cases_country.csv.part").exists());
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/data/cases.csv")),
            PathBuf::from("/data/cases.csv.part")
        );
    }
}
