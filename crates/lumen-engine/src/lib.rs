//! Lumen Engine
//!
//! Reactive session engine: keeps a dataset snapshot fresh in the background
//! and derives the overview and detail views from it plus the user's selection.
//!
//! # Overview
//!
//! Each session owns:
//! - **SessionCache**: the latest dataset snapshot, replaced wholesale on refresh
//! - **RefreshScheduler**: periodic `Idle -> Fetching -> Idle` cycle against a [`DatasetSource`]
//! - **SelectionStore**: selected entity and year range
//! - **ViewGraph**: memoized views plus invalidation events
//!
//! # Dependency graph
//!
//! ```text
//! RefreshScheduler --> SessionCache --+--> Overview
//!                                     |
//! SelectionStore ---------------------+--> Detail
//! ```
//!
//! A refresh invalidates both views. A selection change invalidates only the
//! detail view. A failed refresh invalidates nothing.
//!
//! # Usage
//!
//! ```no_run
//! use lumen_engine::{load_catalog, EngineConfig, Session};
//! use lumen_domain::{EntityCode, DEFAULT_ENTITY_EXCLUSIONS};
//! use lumen_source::MockSource;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(MockSource::sample());
//!     let catalog = Arc::new(load_catalog(source.as_ref(), DEFAULT_ENTITY_EXCLUSIONS).await?);
//!     let session = Session::start(source, catalog, &EngineConfig::default())?;
//!
//!     session.select_entity(EntityCode::new("USA")?);
//!     session.select_years(2005, 2010)?;
//!     println!("{}", session.detail().title());
//!
//!     session.end().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [engine]
//! refresh_interval_secs = 60
//! min_year = 2004
//! max_year = 2020
//! entity_exclusions = ["XKX", "PRK"]
//! event_capacity = 64
//! ```
//!
//! [`DatasetSource`]: lumen_domain::traits::DatasetSource

#![warn(missing_docs)]

mod error;
mod config;
mod metrics;
mod cache;
mod selection;
mod overview;
mod detail;
mod graph;
mod scheduler;
mod session;

pub use error::EngineError;
pub use config::EngineConfig;
pub use metrics::RefreshMetrics;
pub use cache::{CacheStatus, SessionCache, Snapshot};
pub use selection::{SelectionStore, VersionedSelection};
pub use overview::{project_overview, MapPoint, OverviewView};
pub use detail::{project_detail, DetailChart, DetailView, Series, SeriesPoint};
pub use graph::{Dependency, Versions, ViewEvent, ViewGraph, ViewKind};
pub use scheduler::{CycleOutcome, RefreshEvent, RefreshScheduler, RefreshState, SchedulerHandle, TriggerOutcome};
pub use session::{load_catalog, Session, SessionStatus};
