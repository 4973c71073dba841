//! Dependency graph between inputs and derived views
//!
//! Each view declares the inputs it depends on. A view's memo is stamped with
//! the versions of exactly those inputs; it is recomputed only when one of
//! them changed. Invalidations are published to subscribers so a presentation
//! layer knows which views to re-request.
//!
//! | View | Depends on |
//! |------|------------|
//! | Overview | Dataset |
//! | Detail | Dataset, Selection |

use crate::detail::DetailView;
use crate::overview::OverviewView;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// An input a view can depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    /// The cached dataset snapshot
    Dataset,
    /// The selection state
    Selection,
}

/// A derived view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    /// World map overview
    Overview,
    /// Comparison chart for the selected entity
    Detail,
}

impl ViewKind {
    /// All views
    pub const ALL: [ViewKind; 2] = [ViewKind::Overview, ViewKind::Detail];

    /// Declared dependencies of this view
    pub fn dependencies(&self) -> &'static [Dependency] {
        match self {
            ViewKind::Overview => &[Dependency::Dataset],
            ViewKind::Detail => &[Dependency::Dataset, Dependency::Selection],
        }
    }

    /// Whether this view depends on `dependency`
    pub fn depends_on(&self, dependency: Dependency) -> bool {
        self.dependencies().contains(&dependency)
    }
}

/// Versions of all inputs at one moment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Versions {
    /// Dataset snapshot version
    pub dataset: u64,
    /// Selection state version
    pub selection: u64,
}

impl Versions {
    /// Project onto the dependencies of `view`; undeclared inputs read as 0
    pub fn stamp_for(&self, view: ViewKind) -> Versions {
        Versions {
            dataset: if view.depends_on(Dependency::Dataset) { self.dataset } else { 0 },
            selection: if view.depends_on(Dependency::Selection) { self.selection } else { 0 },
        }
    }
}

/// Notification that a view's inputs changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewEvent {
    /// View to recompute
    pub view: ViewKind,
    /// Input that changed
    pub cause: Dependency,
    /// New version of that input
    pub version: u64,
}

struct Memo<T> {
    stamp: Option<Versions>,
    value: Option<Arc<T>>,
    recomputes: u64,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            stamp: None,
            value: None,
            recomputes: 0,
        }
    }
}

fn memoized<T>(slot: &Mutex<Memo<T>>, stamp: Versions, compute: impl FnOnce() -> T) -> Arc<T> {
    {
        let memo = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if memo.stamp == Some(stamp) {
            if let Some(value) = &memo.value {
                return Arc::clone(value);
            }
        }
    }

    // Computed outside the lock so projections can run concurrently
    let value = Arc::new(compute());

    let mut memo = slot.lock().unwrap_or_else(PoisonError::into_inner);
    memo.stamp = Some(stamp);
    memo.value = Some(Arc::clone(&value));
    memo.recomputes += 1;
    value
}

/// Memoized views plus the invalidation channel
pub struct ViewGraph {
    overview: Mutex<Memo<OverviewView>>,
    detail: Mutex<Memo<DetailView>>,
    events: broadcast::Sender<ViewEvent>,
}

impl ViewGraph {
    /// Create a graph whose event channel buffers `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            overview: Mutex::new(Memo::default()),
            detail: Mutex::new(Memo::default()),
            events,
        }
    }

    /// Subscribe to view invalidations
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    /// Publish that `dependency` moved to `version`
    ///
    /// Every view declaring that dependency is reported as changed.
    pub fn invalidate(&self, dependency: Dependency, version: u64) {
        for view in ViewKind::ALL.into_iter().filter(|v| v.depends_on(dependency)) {
            tracing::trace!("{:?} invalidated by {:?} v{}", view, dependency, version);
            // No subscribers is fine
            let _ = self.events.send(ViewEvent {
                view,
                cause: dependency,
                version,
            });
        }
    }

    /// Overview for `versions`, recomputed only if its dependencies moved
    pub fn overview(&self, versions: Versions, compute: impl FnOnce() -> OverviewView) -> Arc<OverviewView> {
        memoized(&self.overview, versions.stamp_for(ViewKind::Overview), compute)
    }

    /// Detail view for `versions`, recomputed only if its dependencies moved
    pub fn detail(&self, versions: Versions, compute: impl FnOnce() -> DetailView) -> Arc<DetailView> {
        memoized(&self.detail, versions.stamp_for(ViewKind::Detail), compute)
    }

    /// How many times a view has been computed
    pub fn recompute_count(&self, view: ViewKind) -> u64 {
        match view {
            ViewKind::Overview => self.overview.lock().unwrap_or_else(PoisonError::into_inner).recomputes,
            ViewKind::Detail => self.detail.lock().unwrap_or_else(PoisonError::into_inner).recomputes,
        }
    }
}
