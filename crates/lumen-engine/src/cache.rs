//! Session-scoped dataset cache
//!
//! Holds exactly one dataset snapshot at a time. Writes replace the snapshot
//! wholesale; readers always get either the old or the new snapshot in full.

use lumen_domain::Dataset;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

/// Immutable point-in-time view of the cached dataset
///
/// Cloning is cheap; the dataset itself is shared.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The cached dataset (empty before the first successful refresh)
    pub dataset: Arc<Dataset>,

    /// Monotonic version; 0 means nothing has been loaded yet
    pub version: u64,

    /// When this snapshot was stored
    pub stored_at: Option<SystemTime>,
}

impl Snapshot {
    fn initial() -> Self {
        Self {
            dataset: Arc::new(Dataset::empty()),
            version: 0,
            stored_at: None,
        }
    }

    /// Whether a refresh has ever succeeded
    pub fn is_loaded(&self) -> bool {
        self.version > 0
    }
}

/// Freshness of the cached data, for the presentation layer's staleness indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheStatus {
    /// No refresh has succeeded yet (initial load pending)
    Pending {
        /// Error from the most recent failed attempt, if any
        last_error: Option<String>,
    },

    /// The most recent refresh succeeded
    Fresh,

    /// The most recent refresh failed; the last good snapshot is still served
    Stale {
        /// Error from the most recent failed attempt
        last_error: String,
    },
}

#[derive(Debug)]
struct CacheInner {
    snapshot: Snapshot,
    last_error: Option<String>,
}

/// Session cache holding the latest dataset snapshot
///
/// # Examples
///
/// ```
/// use lumen_engine::SessionCache;
/// use lumen_domain::Dataset;
///
/// let cache = SessionCache::new();
/// assert!(cache.read().dataset.is_empty());
///
/// let version = cache.write(Dataset::empty());
/// assert_eq!(cache.read().version, version);
/// ```
#[derive(Debug)]
pub struct SessionCache {
    inner: RwLock<CacheInner>,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                snapshot: Snapshot::initial(),
                last_error: None,
            }),
        }
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current snapshot
    pub fn read(&self) -> Snapshot {
        self.read_inner().snapshot.clone()
    }

    /// Current snapshot version
    pub fn version(&self) -> u64 {
        self.read_inner().snapshot.version
    }

    /// Replace the snapshot with `dataset`, returning the new version
    ///
    /// The previous snapshot is discarded entirely; nothing is merged.
    pub fn write(&self, dataset: Dataset) -> u64 {
        let mut inner = self.write_inner();
        let version = inner.snapshot.version + 1;
        inner.snapshot = Snapshot {
            dataset: Arc::new(dataset),
            version,
            stored_at: Some(SystemTime::now()),
        };
        inner.last_error = None;
        version
    }

    /// Note a failed refresh; the snapshot is left untouched
    pub fn record_failure(&self, error: impl Into<String>) {
        self.write_inner().last_error = Some(error.into());
    }

    /// Freshness of the cached data
    pub fn status(&self) -> CacheStatus {
        let inner = self.read_inner();
        match (&inner.last_error, inner.snapshot.is_loaded()) {
            (error, false) => CacheStatus::Pending {
                last_error: error.clone(),
            },
            (None, true) => CacheStatus::Fresh,
            (Some(error), true) => CacheStatus::Stale {
                last_error: error.clone(),
            },
        }
    }
}
