//! Per-session engine
//!
//! A [`Session`] owns one cache, one selection state, one view graph and one
//! running refresh scheduler. Nothing is shared between sessions except the
//! read-only entity catalog.

use crate::cache::{CacheStatus, SessionCache};
use crate::detail::{project_detail, DetailView};
use crate::graph::{Dependency, Versions, ViewEvent, ViewGraph};
use crate::overview::{project_overview, OverviewView};
use crate::scheduler::{RefreshEvent, RefreshScheduler, RefreshState, SchedulerHandle, TriggerOutcome};
use crate::selection::{SelectionStore, VersionedSelection};
use crate::{EngineConfig, EngineError, RefreshMetrics};
use lumen_domain::traits::DatasetSource;
use lumen_domain::{EntityCatalog, EntityCode, YearRange};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Load the entity catalog from `source`, dropping excluded and invalid rows
///
/// Called once at startup; the result is shared by every session.
pub async fn load_catalog<S, E>(source: &S, exclusions: &[E]) -> Result<EntityCatalog, EngineError>
where
    S: DatasetSource,
    S::Error: Display,
    E: AsRef<str>,
{
    let rows = source
        .fetch_entities()
        .await
        .map_err(|e| EngineError::Source(e.to_string()))?;
    let total = rows.len();
    let catalog = EntityCatalog::from_reference(rows, exclusions);

    tracing::info!(
        "Loaded entity catalog: {} entities ({} reference rows dropped)",
        catalog.len(),
        total - catalog.len()
    );
    Ok(catalog)
}

/// Everything a status indicator needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// Freshness of the cached data
    pub cache: CacheStatus,

    /// Current snapshot version
    pub version: u64,

    /// Scheduler state
    pub refresh: RefreshState,

    /// Scheduler counters
    pub metrics: RefreshMetrics,
}

/// One user session
pub struct Session {
    catalog: Arc<EntityCatalog>,
    cache: Arc<SessionCache>,
    selection: SelectionStore,
    graph: Arc<ViewGraph>,
    scheduler: SchedulerHandle,
}

impl Session {
    /// Start a session and its refresh scheduler
    ///
    /// The first refresh begins immediately; until it succeeds both views
    /// project from an empty dataset. Must be called inside a tokio runtime.
    pub fn start<S>(source: Arc<S>, catalog: Arc<EntityCatalog>, config: &EngineConfig) -> Result<Self, EngineError>
    where
        S: DatasetSource + Send + Sync + 'static,
        S::Error: Display + Send,
    {
        let bounds = config.year_bounds()?;
        let cache = Arc::new(SessionCache::new());
        let graph = Arc::new(ViewGraph::new(config.event_capacity));

        let scheduler = RefreshScheduler::new(
            source,
            Arc::clone(&cache),
            Arc::clone(&graph),
            catalog.codes(),
            config,
        )?
        .spawn();

        tracing::debug!("Session started ({} entities, {})", catalog.len(), bounds.full_range());

        Ok(Self {
            catalog,
            cache,
            selection: SelectionStore::new(bounds),
            graph,
            scheduler,
        })
    }

    /// Entity catalog shared with other sessions
    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    /// Overview for the current snapshot
    pub fn overview(&self) -> Arc<OverviewView> {
        self.versioned_overview().0
    }

    /// Overview together with the snapshot version it was projected from
    pub fn versioned_overview(&self) -> (Arc<OverviewView>, u64) {
        let snapshot = self.cache.read();
        let versions = Versions {
            dataset: snapshot.version,
            selection: self.selection.version(),
        };
        let view = self
            .graph
            .overview(versions, || project_overview(&snapshot.dataset, &self.catalog));
        (view, snapshot.version)
    }

    /// Detail view for the current snapshot and selection
    ///
    /// Both inputs are read once up front, so a refresh or selection change
    /// landing mid-projection cannot produce a mixed result.
    pub fn detail(&self) -> Arc<DetailView> {
        let snapshot = self.cache.read();
        let VersionedSelection { selection, version } = self.selection.current();
        let versions = Versions {
            dataset: snapshot.version,
            selection: version,
        };
        self.graph
            .detail(versions, || project_detail(&snapshot.dataset, &selection, &self.catalog))
    }

    /// Current selection
    pub fn selection(&self) -> VersionedSelection {
        self.selection.current()
    }

    /// Select an entity (a click on the overview)
    ///
    /// Codes are not checked against the catalog; an entity without data
    /// yields [`DetailView::NoData`].
    pub fn select_entity(&self, entity: EntityCode) -> u64 {
        tracing::debug!("Entity selected: {}", entity);
        let version = self.selection.select_entity(entity);
        self.graph.invalidate(Dependency::Selection, version);
        version
    }

    /// Change the year range
    ///
    /// Out-of-bounds endpoints are clamped. An inverted range is rejected and
    /// the previous selection stays in effect.
    pub fn select_years(&self, from: u16, to: u16) -> Result<YearRange, EngineError> {
        let (years, version) = self.selection.select_years(from, to).map_err(|e| {
            tracing::warn!("Rejected year range {}-{}: {}", from, to, e);
            e
        })?;
        tracing::debug!("Year range selected: {}", years);
        self.graph.invalidate(Dependency::Selection, version);
        Ok(years)
    }

    /// Ask for a refresh now
    pub fn refresh_now(&self) -> TriggerOutcome {
        self.scheduler.refresh_now()
    }

    /// Cache freshness and scheduler state
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            cache: self.cache.status(),
            version: self.cache.version(),
            refresh: self.scheduler.state(),
            metrics: self.scheduler.metrics(),
        }
    }

    /// Subscribe to view invalidations
    pub fn subscribe_views(&self) -> broadcast::Receiver<ViewEvent> {
        self.graph.subscribe()
    }

    /// Subscribe to refresh outcomes
    pub fn subscribe_refresh(&self) -> broadcast::Receiver<RefreshEvent> {
        self.scheduler.subscribe()
    }

    /// End the session, stopping its scheduler
    ///
    /// An in-flight fetch is cancelled and never written.
    pub async fn end(&self) -> Result<(), EngineError> {
        self.scheduler.shutdown().await?;
        tracing::debug!("Session ended");
        Ok(())
    }
}
