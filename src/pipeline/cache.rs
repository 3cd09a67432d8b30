//! Memoization keyed by the content of the local data files

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};

use super::error::{PipelineError, PipelineResult};

/// Identifies one state of the local data: version marker plus raw file bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheToken(String);

impl CacheToken {
    /// Hash the marker value and the named files; absent files hash as absent
    pub fn compute<'a>(
        marker: &str,
        files: impl IntoIterator<Item = &'a Path>,
    ) -> PipelineResult<Self> {
        let mut hasher = Sha256::new();
        hasher.update(marker.as_bytes());
        for path in files {
            hasher.update(path.as_os_str().as_encoded_bytes());
            match fs::read(path) {
                Ok(content) => {
                    hasher.update(b"\x01");
                    hasher.update(Sha256::digest(&content));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => hasher.update(b"\x00"),
                Err(e) => return Err(PipelineError::io_with_path(path, "hashing raw file", e)),
            }
        }
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for logs
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for CacheToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Slot<T> {
    token: Option<CacheToken>,
    value: Arc<T>,
}

/// A single-entry function-result cache
///
/// Holds the last computed value and the token it was computed for. A lookup
/// with a different token recomputes. [`Memo::invalidate`] forces the next
/// lookup to recompute while keeping the stale value reachable through
/// [`Memo::last_value`].
pub struct Memo<T> {
    slot: Mutex<Option<Slot<T>>>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `token`, computing and storing it on a miss
    ///
    /// A failed computation leaves the previous entry in place.
    pub fn get_or_try_insert<E>(
        &self,
        token: &CacheToken,
        compute: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = slot.as_ref() {
            if entry.token.as_ref() == Some(token) {
                return Ok(Arc::clone(&entry.value));
            }
        }

        let value = Arc::new(compute()?);
        *slot = Some(Slot {
            token: Some(token.clone()),
            value: Arc::clone(&value),
        });
        Ok(value)
    }

    /// Whether a lookup with `token` would hit
    pub fn is_fresh(&self, token: &CacheToken) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .is_some_and(|entry| entry.token.as_ref() == Some(token))
    }

    /// The most recently computed value, fresh or not
    pub fn last_value(&self) -> Option<Arc<T>> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(|entry| Arc::clone(&entry.value))
    }

    /// Force the next lookup to recompute
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = slot.as_mut() {
            entry.token = None;
        }
    }
}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Memo")
            .field("token", &slot.as_ref().and_then(|e| e.token.as_ref()))
            .field("has_value", &slot.is_some())
            .finish()
    }
}
