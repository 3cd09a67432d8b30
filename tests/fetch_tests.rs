//! Source fetcher tests

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use covid_dashboard::fetch::{
    FetchError, FetchResult, Fetcher, RawSource, SyncOutcome, UNKNOWN_VERSION, UpstreamClient,
};
use tempfile::TempDir;

const MARKER: &str = "last_commit.txt";

/// Serves fixed bodies; a missing version makes the version check fail
struct StubUpstream {
    version: Option<String>,
    bodies: HashMap<String, Vec<u8>>,
    downloads: Arc<AtomicUsize>,
}

impl StubUpstream {
    fn new(version: Option<&str>) -> Self {
        Self {
            version: version.map(str::to_string),
            bodies: HashMap::new(),
            downloads: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn serve(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }
}

impl UpstreamClient for StubUpstream {
    fn latest_version(&self) -> FetchResult<String> {
        self.version
            .clone()
            .ok_or_else(|| FetchError::VersionCheck("connection refused".to_string()))
    }

    fn download(&self, url: &str) -> FetchResult<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Network {
                url: url.to_string(),
                message: "connection reset".to_string(),
            })
    }
}

fn sources() -> Vec<RawSource> {
    vec![
        RawSource::new("cases.csv", "https://upstream.test/cases.csv"),
        RawSource::new("cases_country.csv", "https://upstream.test/cases_country.csv"),
        RawSource::new("cases_time.csv", "https://upstream.test/cases_time.csv"),
    ]
}

fn full_stub(version: &str) -> StubUpstream {
    StubUpstream::new(Some(version))
        .serve("https://upstream.test/cases.csv", "new cases\n")
        .serve("https://upstream.test/cases_country.csv", "new country\n")
        .serve("https://upstream.test/cases_time.csv", "new time\n")
}

fn write_old_files(dir: &Path) {
    fs::write(dir.join("cases.csv"), "old cases\n").unwrap();
    fs::write(dir.join("cases_country.csv"), "old country\n").unwrap();
    fs::write(dir.join("cases_time.csv"), "old time\n").unwrap();
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

#[test]
fn test_version_check_failure_leaves_files_untouched() {
    let dir = TempDir::new().unwrap();
    write_old_files(dir.path());
    let before: Vec<Vec<u8>> = ["cases.csv", "cases_country.csv", "cases_time.csv"]
        .iter()
        .map(|name| fs::read(dir.path().join(name)).unwrap())
        .collect();

    let stub = StubUpstream::new(None);
    let downloads = Arc::clone(&stub.downloads);
    let fetcher = Fetcher::new(Box::new(stub), dir.path(), MARKER, sources());

    let outcome = fetcher.synchronize().unwrap();
    assert!(matches!(outcome, SyncOutcome::VersionUnavailable { .. }));
    assert!(!outcome.is_updated());
    assert_eq!(downloads.load(Ordering::SeqCst), 0);

    let after: Vec<Vec<u8>> = ["cases.csv", "cases_country.csv", "cases_time.csv"]
        .iter()
        .map(|name| fs::read(dir.path().join(name)).unwrap())
        .collect();
    assert_eq!(before, after);
    assert!(!dir.path().join(MARKER).exists());
}

#[test]
fn test_new_version_downloads_then_skips() {
    let dir = TempDir::new().unwrap();
    write_old_files(dir.path());

    let stub = full_stub("abc1234");
    let downloads = Arc::clone(&stub.downloads);
    let fetcher = Fetcher::new(Box::new(stub), dir.path(), MARKER, sources());

    let outcome = fetcher.synchronize().unwrap();
    match &outcome {
        SyncOutcome::Updated { version, files } => {
            assert_eq!(version, "abc1234");
            assert_eq!(files.len(), 3);
        }
        other => panic!("expected an update, got {other:?}"),
    }
    assert_eq!(read(dir.path(), "cases_time.csv"), "new time\n");
    assert_eq!(fetcher.marker().read().unwrap(), "abc1234");

    let again = fetcher.synchronize().unwrap();
    assert_eq!(
        again,
        SyncOutcome::UpToDate {
            version: "abc1234".to_string()
        }
    );
    assert_eq!(downloads.load(Ordering::SeqCst), 3);
}

#[test]
fn test_partial_download_failure_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    write_old_files(dir.path());

    let stub = StubUpstream::new(Some("def5678"))
        .serve("https://upstream.test/cases.csv", "new cases\n")
        .serve("https://upstream.test/cases_country.csv", "new country\n");
    let fetcher = Fetcher::new(Box::new(stub), dir.path(), MARKER, sources());

    let err = fetcher.synchronize().unwrap_err();
    assert!(err.is_recoverable());
    assert!(err.to_string().contains("cases_time.csv"));

    assert_eq!(read(dir.path(), "cases.csv"), "old cases\n");
    assert_eq!(read(dir.path(), "cases_country.csv"), "old country\n");
    assert_eq!(read(dir.path(), "cases_time.csv"), "old time\n");
    assert_eq!(fetcher.marker().read().unwrap(), UNKNOWN_VERSION);

    let leftovers: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty(), "partial files left: {leftovers:?}");
}

#[test]
fn test_first_sync_creates_data_dir() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");

    let fetcher = Fetcher::new(Box::new(full_stub("0a1b2c3")), &data_dir, MARKER, sources());
    let outcome = fetcher.synchronize().unwrap();

    assert!(outcome.is_updated());
    assert_eq!(read(&data_dir, "cases.csv"), "new cases\n");
    assert_eq!(read(&data_dir, MARKER).trim(), "0a1b2c3");
}

#[test]
fn test_failed_replace_restores_previous_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("cases.csv"), "old cases\n").unwrap();
    fs::write(dir.path().join("cases_time.csv"), "old time\n").unwrap();
    // A non-empty directory cannot be replaced by a file rename
    let blocked = dir.path().join("cases_country.csv");
    fs::create_dir(&blocked).unwrap();
    fs::write(blocked.join("keep.txt"), "x").unwrap();

    let fetcher = Fetcher::new(Box::new(full_stub("fed9876")), dir.path(), MARKER, sources());

    let err = fetcher.synchronize().unwrap_err();
    assert!(err.to_string().contains("cases_country.csv"));

    assert_eq!(read(dir.path(), "cases.csv"), "old cases\n");
    assert_eq!(read(dir.path(), "cases_time.csv"), "old time\n");
    assert!(blocked.join("keep.txt").exists());
    assert_eq!(fetcher.marker().read().unwrap(), UNKNOWN_VERSION);

    let leftovers: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".part") || name.ends_with(".bak"))
        .collect();
    assert!(leftovers.is_empty(), "temporary files left: {leftovers:?}");
}
