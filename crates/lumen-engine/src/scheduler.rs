//! Background refresh scheduler
//!
//! Runs `Idle -> Fetching -> Idle` on a fixed interval. A successful fetch
//! replaces the cached snapshot in one write; a failed one leaves it alone and
//! is reported as [`RefreshEvent::Failed`]. At most one fetch runs at a time;
//! ticks or manual triggers that arrive while fetching are dropped.

use crate::cache::SessionCache;
use crate::graph::{Dependency, ViewGraph};
use crate::{EngineConfig, EngineError, RefreshMetrics};
use lumen_domain::traits::DatasetSource;
use lumen_domain::{EntityCode, YearBounds};
use serde::Serialize;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Scheduler state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// Waiting for the next tick
    Idle,
    /// A fetch is in progress
    Fetching,
}

/// Notification published after every completed refresh cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RefreshEvent {
    /// The cache now holds a new snapshot
    Succeeded {
        /// New snapshot version
        version: u64,
        /// Records in the new snapshot
        records: usize,
    },

    /// The fetch failed; the last good snapshot is still served
    Failed {
        /// Source error message
        error: String,
        /// Failures since the last success
        consecutive_failures: u64,
    },
}

/// Result of a single refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Snapshot replaced
    Refreshed {
        /// New snapshot version
        version: u64,
    },
    /// Fetch failed, snapshot kept
    Failed(String),
    /// Dropped because another fetch was running
    Skipped,
}

/// Result of a manual refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// The scheduler will run a cycle
    Queued,
    /// A fetch is already running (or queued); the request was dropped
    Dropped,
}

struct SchedulerShared {
    fetching: AtomicBool,
    metrics: Mutex<RefreshMetrics>,
    events: broadcast::Sender<RefreshEvent>,
}

impl SchedulerShared {
    fn metrics(&self) -> MutexGuard<'_, RefreshMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> RefreshState {
        if self.fetching.load(Ordering::Acquire) {
            RefreshState::Fetching
        } else {
            RefreshState::Idle
        }
    }

    fn publish(&self, event: RefreshEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Marks the scheduler as fetching; returns to idle on drop, including when
/// the cycle is cancelled mid-fetch
struct FetchGuard<'a>(&'a AtomicBool);

impl<'a> FetchGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic refresh of a session cache from a data source
///
/// # Examples
///
/// ```no_run
/// use lumen_engine::{EngineConfig, RefreshScheduler, SessionCache, ViewGraph};
/// use lumen_source::MockSource;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = EngineConfig::default();
///     let cache = Arc::new(SessionCache::new());
///     let graph = Arc::new(ViewGraph::new(config.event_capacity));
///     let scheduler = RefreshScheduler::new(
///         Arc::new(MockSource::sample()),
///         cache,
///         graph,
///         Vec::new(),
///         &config,
///     )?;
///
///     let handle = scheduler.spawn();
///     handle.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct RefreshScheduler<S> {
    source: Arc<S>,
    cache: Arc<SessionCache>,
    graph: Arc<ViewGraph>,
    entities: Vec<EntityCode>,
    bounds: YearBounds,
    interval: Duration,
    shared: Arc<SchedulerShared>,
}

impl<S> RefreshScheduler<S>
where
    S: DatasetSource + Send + Sync + 'static,
    S::Error: Display + Send,
{
    /// Create a scheduler refreshing `entities` into `cache`
    pub fn new(
        source: Arc<S>,
        cache: Arc<SessionCache>,
        graph: Arc<ViewGraph>,
        entities: Vec<EntityCode>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            source,
            cache,
            graph,
            entities,
            bounds: config.year_bounds()?,
            interval: config.refresh_interval(),
            shared: Arc::new(SchedulerShared {
                fetching: AtomicBool::new(false),
                metrics: Mutex::new(RefreshMetrics::new()),
                events,
            }),
        })
    }

    /// Current state
    pub fn state(&self) -> RefreshState {
        self.shared.state()
    }

    /// Snapshot of the metrics
    pub fn metrics(&self) -> RefreshMetrics {
        self.shared.metrics().clone()
    }

    /// Subscribe to refresh notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.shared.events.subscribe()
    }

    /// Run one refresh cycle now
    ///
    /// Returns [`CycleOutcome::Skipped`] without touching the source if a
    /// fetch is already running.
    pub async fn cycle(&self) -> CycleOutcome {
        let Some(_guard) = FetchGuard::try_acquire(&self.shared.fetching) else {
            self.shared.metrics().record_skip();
            tracing::warn!("Refresh dropped: fetch already in progress");
            return CycleOutcome::Skipped;
        };

        tracing::debug!("Starting refresh cycle ({} entities)", self.entities.len());
        let start = Instant::now();
        let result = self.source.fetch_dataset(&self.entities, self.bounds).await;
        let elapsed = start.elapsed();

        match result {
            Ok(dataset) => {
                let records = dataset.len();
                let version = self.cache.write(dataset);
                self.graph.invalidate(Dependency::Dataset, version);
                self.shared.metrics().record_success(elapsed);

                tracing::info!(
                    "Refresh completed: {} records (snapshot v{}, {:?})",
                    records,
                    version,
                    elapsed
                );
                self.shared.publish(RefreshEvent::Succeeded { version, records });
                CycleOutcome::Refreshed { version }
            }
            Err(e) => {
                let error = e.to_string();
                self.cache.record_failure(error.clone());
                let consecutive_failures = {
                    let mut metrics = self.shared.metrics();
                    metrics.record_failure(elapsed);
                    metrics.consecutive_failures
                };

                tracing::warn!(
                    "Refresh failed ({} in a row), serving last snapshot: {}",
                    consecutive_failures,
                    error
                );
                self.shared.publish(RefreshEvent::Failed {
                    error: error.clone(),
                    consecutive_failures,
                });
                CycleOutcome::Failed(error)
            }
        }
    }

    /// Run for a specific number of ticks (useful for testing)
    ///
    /// The first tick fires immediately.
    pub async fn run_cycles(&self, cycles: usize) -> Vec<CycleOutcome> {
        let mut ticker = interval(self.interval);
        let mut outcomes = Vec::with_capacity(cycles);

        for cycle in 0..cycles {
            ticker.tick().await;
            tracing::debug!("Refresh tick {}/{}", cycle + 1, cycles);
            outcomes.push(self.cycle().await);
        }

        outcomes
    }

    /// Run until `shutdown` fires or its sender is dropped
    ///
    /// Each tick (or manual trigger) spawns a cycle unless one is still
    /// running, in which case the tick is dropped. On shutdown an in-flight
    /// fetch is aborted before it can write.
    pub async fn run(self: Arc<Self>, mut triggers: mpsc::Receiver<()>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<JoinHandle<CycleOutcome>> = None;

        tracing::info!("Refresh scheduler started (interval: {:?})", self.interval);

        loop {
            let trigger = tokio::select! {
                _ = ticker.tick() => "timer",
                Some(()) = triggers.recv() => "manual",
                _ = shutdown.changed() => break,
            };

            if in_flight.as_ref().is_some_and(|task| !task.is_finished()) {
                self.shared.metrics().record_skip();
                tracing::warn!("Refresh tick dropped ({}): fetch already in progress", trigger);
                continue;
            }

            let this = Arc::clone(&self);
            in_flight = Some(tokio::spawn(async move { this.cycle().await }));
        }

        // Wait for the abort to land so nothing is written after shutdown returns
        if let Some(task) = in_flight {
            task.abort();
            let _ = task.await;
        }

        tracing::info!("Refresh scheduler stopped. Final metrics:\n{}", self.metrics().summary());
    }

    /// Spawn [`run`](Self::run) on the current tokio runtime
    pub fn spawn(self) -> SchedulerHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);

        let task = tokio::spawn(Arc::new(self).run(trigger_rx, shutdown_rx));

        SchedulerHandle {
            triggers: trigger_tx,
            shutdown: shutdown_tx,
            task: Mutex::new(Some(task)),
            shared,
        }
    }
}

/// Handle to a spawned scheduler
///
/// Dropping the handle stops the scheduler.
pub struct SchedulerHandle {
    triggers: mpsc::Sender<()>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<SchedulerShared>,
}

impl SchedulerHandle {
    /// Ask for a refresh outside the regular interval
    pub fn refresh_now(&self) -> TriggerOutcome {
        if self.shared.state() == RefreshState::Fetching {
            self.shared.metrics().record_skip();
            tracing::warn!("Manual refresh dropped: fetch already in progress");
            return TriggerOutcome::Dropped;
        }

        match self.triggers.try_send(()) {
            Ok(()) => TriggerOutcome::Queued,
            Err(_) => TriggerOutcome::Dropped,
        }
    }

    /// Current state
    pub fn state(&self) -> RefreshState {
        self.shared.state()
    }

    /// Snapshot of the metrics
    pub fn metrics(&self) -> RefreshMetrics {
        self.shared.metrics().clone()
    }

    /// Subscribe to refresh notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.shared.events.subscribe()
    }

    /// Stop the scheduler and wait for it to finish
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        // The task may already be gone
        let _ = self.shutdown.send(true);

        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            task.await.map_err(|e| {
                tracing::error!("Refresh scheduler task failed: {}", e);
                EngineError::Worker(e.to_string())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_domain::{Dataset, Metric, Record};
    use lumen_source::{MockFailure, MockSource};

    fn code(s: &str) -> EntityCode {
        EntityCode::new(s).unwrap()
    }

    fn setup(source: MockSource) -> (RefreshScheduler<MockSource>, Arc<SessionCache>) {
        let config = EngineConfig::default();
        let cache = Arc::new(SessionCache::new());
        let graph = Arc::new(ViewGraph::new(config.event_capacity));
        let scheduler = RefreshScheduler::new(
            Arc::new(source),
            Arc::clone(&cache),
            graph,
            vec![code("USA"), code("KEN")],
            &config,
        )
        .unwrap();
        (scheduler, cache)
    }

    #[tokio::test]
    async fn test_scheduler_creation() {
        let (scheduler, _) = setup(MockSource::sample());
        assert_eq!(scheduler.state(), RefreshState::Idle);
        assert_eq!(scheduler.metrics(), RefreshMetrics::default());
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let config = EngineConfig {
            refresh_interval_secs: 0,
            ..Default::default()
        };
        let result = RefreshScheduler::new(
            Arc::new(MockSource::sample()),
            Arc::new(SessionCache::new()),
            Arc::new(ViewGraph::new(8)),
            Vec::new(),
            &config,
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn test_successful_cycle_replaces_snapshot() {
        let (scheduler, cache) = setup(MockSource::sample());
        let mut events = scheduler.subscribe();

        let outcome = scheduler.cycle().await;

        assert_eq!(outcome, CycleOutcome::Refreshed { version: 1 });
        assert_eq!(cache.read().dataset.entities().len(), 2);
        assert_eq!(
            events.recv().await.unwrap(),
            RefreshEvent::Succeeded { version: 1, records: 10 }
        );
        assert_eq!(scheduler.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_snapshot() {
        let source = MockSource::sample();
        let (scheduler, cache) = setup(source.clone());

        scheduler.cycle().await;
        let before = cache.read();

        source.fail_with(MockFailure::Unavailable);
        let mut events = scheduler.subscribe();
        let outcome = scheduler.cycle().await;

        assert!(matches!(outcome, CycleOutcome::Failed(ref msg) if msg.contains("unavailable")));
        let after = cache.read();
        assert_eq!(after.version, before.version);
        assert_eq!(*after.dataset, *before.dataset);
        assert!(matches!(
            events.recv().await.unwrap(),
            RefreshEvent::Failed { consecutive_failures: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_format_error_is_recovered() {
        let source = MockSource::sample();
        source.fail_with(MockFailure::Format);
        let (scheduler, cache) = setup(source);

        let outcome = scheduler.cycle().await;
        assert!(matches!(outcome, CycleOutcome::Failed(_)));
        assert!(cache.read().dataset.is_empty());
        assert_eq!(scheduler.metrics().failures, 1);
    }

    #[tokio::test]
    async fn test_no_merge_with_prior_snapshot() {
        let source = MockSource::sample();
        let (scheduler, cache) = setup(source.clone());
        scheduler.cycle().await;

        let replacement = Dataset::new(vec![
            Record::new(code("KEN"), 2019).with_value(Metric::ElectricityAccess, Some(70.0)),
        ]);
        source.set_dataset(replacement.clone());
        scheduler.cycle().await;

        assert_eq!(*cache.read().dataset, replacement);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cycle_is_dropped() {
        let source = MockSource::sample();
        source.set_delay(Some(Duration::from_secs(10)));
        let (scheduler, _) = setup(source.clone());
        let scheduler = Arc::new(scheduler);

        let first = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.cycle().await }
        });
        while scheduler.state() != RefreshState::Fetching {
            tokio::task::yield_now().await;
        }

        assert_eq!(scheduler.cycle().await, CycleOutcome::Skipped);
        assert_eq!(first.await.unwrap(), CycleOutcome::Refreshed { version: 1 });
        assert_eq!(source.call_count(), 1);
        assert_eq!(scheduler.metrics().skipped, 1);
        assert_eq!(scheduler.state(), RefreshState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cycles_continues_after_failure() {
        let source = MockSource::sample();
        source.fail_with(MockFailure::Unavailable);
        let (scheduler, cache) = setup(source);

        let outcomes = scheduler.run_cycles(3).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| matches!(o, CycleOutcome::Failed(_))));
        assert_eq!(scheduler.metrics().consecutive_failures, 3);
        assert!(cache.read().dataset.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_scheduler_refreshes_on_interval() {
        let source = MockSource::sample();
        let (scheduler, cache) = setup(source.clone());
        let mut events = scheduler.subscribe();
        let handle = scheduler.spawn();

        // First tick fires immediately
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Succeeded { version: 1, .. }));

        source.fail_with(MockFailure::Unavailable);
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Failed { .. }));
        assert_eq!(cache.read().version, 1);

        source.recover();
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Succeeded { version: 2, .. }));

        handle.shutdown().await.unwrap();
        assert_eq!(handle.metrics().cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_trigger() {
        let source = MockSource::sample();
        let (scheduler, _) = setup(source.clone());
        let mut events = scheduler.subscribe();
        let handle = scheduler.spawn();

        events.recv().await.unwrap();
        assert_eq!(handle.refresh_now(), TriggerOutcome::Queued);
        assert!(matches!(events.recv().await.unwrap(), RefreshEvent::Succeeded { version: 2, .. }));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_trigger_dropped_while_fetching() {
        let source = MockSource::sample();
        source.set_delay(Some(Duration::from_secs(30)));
        let (scheduler, _) = setup(source.clone());
        let handle = scheduler.spawn();

        while handle.state() != RefreshState::Fetching {
            tokio::task::yield_now().await;
        }
        assert_eq!(handle.refresh_now(), TriggerOutcome::Dropped);
        assert_eq!(handle.metrics().skipped, 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ticks_dropped_while_fetching() {
        let source = MockSource::sample();
        source.set_delay(Some(Duration::from_secs(150)));
        let (scheduler, cache) = setup(source.clone());
        let handle = scheduler.spawn();

        // Fetch runs 0s-150s; ticks at 60s and 120s are dropped, 180s starts a new fetch
        tokio::time::sleep(Duration::from_secs(181)).await;

        assert_eq!(source.call_count(), 2);
        let metrics = handle.metrics();
        assert_eq!(metrics.skipped, 2);
        assert_eq!(metrics.cycles, 1);
        assert_eq!(cache.read().version, 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_waits_for_in_flight_fetch() {
        let source = MockSource::sample();
        source.set_delay(Some(Duration::from_secs(30)));
        let (scheduler, cache) = setup(source.clone());
        let handle = scheduler.spawn();

        while handle.state() != RefreshState::Fetching {
            tokio::task::yield_now().await;
        }
        handle.shutdown().await.unwrap();

        assert_eq!(handle.state(), RefreshState::Idle);
        assert_eq!(cache.read().version, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_fetch_leaves_cache_untouched() {
        let source = MockSource::sample();
        source.set_delay(Some(Duration::from_secs(30)));
        let (scheduler, cache) = setup(source.clone());
        let handle = scheduler.spawn();

        while handle.state() != RefreshState::Fetching {
            tokio::task::yield_now().await;
        }
        handle.shutdown().await.unwrap();

        assert_eq!(cache.read().version, 0);
        assert!(cache.read().dataset.is_empty());
    }
}
