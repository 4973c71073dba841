//! Registry of live sessions.
//!
//! Each session gets its own engine started from a shared factory; sessions
//! are addressed by a time-ordered UUID. Sessions nobody has touched for the
//! idle timeout are ended by [`SessionRegistry::evict_idle`].

use lumen_domain::traits::DatasetSource;
use lumen_domain::EntityCatalog;
use lumen_engine::{EngineConfig, EngineError, Session};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use uuid::Uuid;

/// Idle timeout used unless configured otherwise
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Registry error
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// Engine failed to start or stop
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

type SessionFactory = dyn Fn() -> Result<Session, EngineError> + Send + Sync;

struct Entry {
    session: Arc<Session>,
    last_access: Mutex<Instant>,
}

impl Entry {
    fn new(session: Session) -> Self {
        Self {
            session: Arc::new(session),
            last_access: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_access.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_access.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Session registry
pub struct SessionRegistry {
    factory: Box<SessionFactory>,
    catalog: Arc<EntityCatalog>,
    idle_timeout: Duration,
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl SessionRegistry {
    /// Create a registry whose sessions refresh from `source`
    pub fn new<S>(source: Arc<S>, catalog: Arc<EntityCatalog>, config: EngineConfig) -> Self
    where
        S: DatasetSource + Send + Sync + 'static,
        S::Error: Display + Send,
    {
        let factory_catalog = Arc::clone(&catalog);
        Self {
            factory: Box::new(move || Session::start(Arc::clone(&source), Arc::clone(&factory_catalog), &config)),
            catalog,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// End sessions that go unused for `timeout`
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Idle timeout after which a session is evicted
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Entity catalog shared by all sessions
    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    /// Start a new session and return its id
    ///
    /// Must be called inside a tokio runtime.
    pub fn create(&self) -> Result<Uuid, RegistryError> {
        let session = (self.factory)()?;
        let id = Uuid::now_v7();

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Entry::new(session));

        tracing::info!("Session {} started", id);
        Ok(id)
    }

    /// Look up a live session and mark it as used
    pub fn get(&self, id: Uuid) -> Result<Arc<Session>, RegistryError> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions.get(&id).ok_or(RegistryError::SessionNotFound(id))?;
        entry.touch();
        Ok(Arc::clone(&entry.session))
    }

    /// End a session and forget it
    pub async fn remove(&self, id: Uuid) -> Result<(), RegistryError> {
        let entry = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or(RegistryError::SessionNotFound(id))?;

        entry.session.end().await?;
        tracing::info!("Session {} ended", id);
        Ok(())
    }

    /// End every session unused for longer than the idle timeout
    ///
    /// Returns the number of sessions evicted.
    pub async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(Uuid, Entry)> = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, entry)| entry.idle_for(now) >= self.idle_timeout)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        let evicted = expired.len();
        for (id, entry) in expired {
            tracing::info!("Session {} idle for {:?}, ending", id, entry.idle_for(now));
            end_logged(id, &entry.session).await;
        }
        evicted
    }

    /// Run [`evict_idle`](Self::evict_idle) every `period` until aborted
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle().await;
                if evicted > 0 {
                    tracing::debug!("Evicted {} idle sessions ({} live)", evicted, self.len());
                }
            }
        })
    }

    /// End every session
    pub async fn shutdown(&self) {
        let sessions: Vec<(Uuid, Entry)> = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        for (id, entry) in sessions {
            end_logged(id, &entry.session).await;
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no session is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn end_logged(id: Uuid, session: &Session) {
    if let Err(e) = session.end().await {
        tracing::warn!("Session {} did not stop cleanly: {}", id, e);
    }
}
