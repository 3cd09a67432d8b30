//! Upstream client trait and implementations
//!
//! The fetcher only needs two things from the remote repository: the current
//! content version and the bytes behind a URL. `UpstreamClient` is that seam;
//! `HttpUpstream` is the network implementation and `OfflineUpstream` is used
//! when the crate is built without HTTP support or the network is disabled.

#[cfg(feature = "http")]
use std::time::Duration;

use super::error::{FetchError, FetchResult};

/// Access to the remote data repository
pub trait UpstreamClient: Send + Sync {
    /// Query the current upstream content version (e.g. a short commit hash)
    fn latest_version(&self) -> FetchResult<String>;

    /// Download the body behind `url`
    fn download(&self, url: &str) -> FetchResult<Vec<u8>>;
}

/// Client for a git-hosted repository behind an HTTP API
#[cfg(feature = "http")]
pub struct HttpUpstream {
    client: reqwest::blocking::Client,
    version_url: String,
    version_length: usize,
}

#[cfg(feature = "http")]
impl HttpUpstream {
    /// Create a client with a request timeout
    pub fn new(
        version_url: impl Into<String>,
        version_length: usize,
        timeout: Duration,
    ) -> FetchResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                FetchError::Unavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            version_url: version_url.into(),
            version_length,
        })
    }

    fn get(&self, url: &str) -> FetchResult<reqwest::blocking::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

#[cfg(feature = "http")]
impl UpstreamClient for HttpUpstream {
    fn latest_version(&self) -> FetchResult<String> {
        let body: serde_json::Value = self
            .get(&self.version_url)?
            .json()
            .map_err(|e| FetchError::MalformedResponse {
                url: self.version_url.clone(),
                message: e.to_string(),
            })?;

        extract_version(&body, self.version_length).ok_or_else(|| {
            FetchError::MalformedResponse {
                url: self.version_url.clone(),
                message: "missing 'object.sha'".to_string(),
            }
        })
    }

    fn download(&self, url: &str) -> FetchResult<Vec<u8>> {
        let bytes = self.get(url)?.bytes().map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

/// Read the version identifier from a git ref response, truncated to `length` characters
pub fn extract_version(body: &serde_json::Value, length: usize) -> Option<String> {
    let sha = body.get("object")?.get("sha")?.as_str()?;
    if sha.is_empty() {
        return None;
    }
    Some(sha.chars().take(length).collect())
}

/// A client that never reaches the network
#[derive(Debug, Clone, Default)]
pub struct OfflineUpstream;

impl UpstreamClient for OfflineUpstream {
    fn latest_version(&self) -> FetchResult<String> {
        Err(FetchError::Unavailable(
            "running offline, no upstream client configured".to_string(),
        ))
    }

    fn download(&self, url: &str) -> FetchResult<Vec<u8>> {
        Err(FetchError::Unavailable(format!(
            "running offline, cannot download {}",
            url
        )))
    }
}

/// A mock upstream for testing
#[cfg(test)]
pub struct MockUpstream {
    version: Option<String>,
    bodies: std::collections::HashMap<String, Vec<u8>>,
    downloads: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockUpstream {
    /// Create a mock reporting `version`
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            bodies: std::collections::HashMap::new(),
            downloads: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Create a mock whose version check fails
    pub fn failing() -> Self {
        Self {
            version: None,
            bodies: std::collections::HashMap::new(),
            downloads: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Serve `body` for `url`; unknown URLs fail with 404
    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    /// Number of download calls made
    pub fn download_count(&self) -> usize {
        self.downloads.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl UpstreamClient for MockUpstream {
    fn latest_version(&self) -> FetchResult<String> {
        self.version
            .clone()
            .ok_or_else(|| FetchError::VersionCheck("Mock failure".to_string()))
    }

    fn download(&self, url: &str) -> FetchResult<Vec<u8>> {
        self.downloads
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
    }
}
