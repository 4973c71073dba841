//! Lumen Server
//!
//! HTTP surface over the session engine. Each client starts a session, then
//! reads the overview and detail views and drives the selection.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod registry;
pub mod responses;

use config::ServerConfig;
use handlers::{create_router, AppState};
use lumen_domain::traits::DatasetSource;
use lumen_engine::{load_catalog, EngineError};
use lumen_source::{MockSource, SourceError, WorldBankSource};
use registry::SessionRegistry;
use std::fmt::Display;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Source could not be constructed
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Engine failed to start (e.g. the entity catalog could not be loaded)
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Which data source sessions refresh from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// World Bank indicators API
    WorldBank,
    /// Built-in sample data, no network
    Mock,
}

/// Build application state: source, entity catalog and session registry
///
/// The entity catalog is loaded once here and shared by every session.
pub async fn build_state(config: &ServerConfig, kind: SourceKind) -> Result<AppState, ServerError> {
    let registry = match kind {
        SourceKind::WorldBank => {
            let source = WorldBankSource::new(config.source.endpoint.clone(), config.source.timeout())?
                .with_max_retries(config.source.max_retries);
            registry_for(Arc::new(source), config).await?
        }
        SourceKind::Mock => registry_for(Arc::new(MockSource::sample()), config).await?,
    };

    Ok(AppState {
        registry: Arc::new(registry),
    })
}

async fn registry_for<S>(source: Arc<S>, config: &ServerConfig) -> Result<SessionRegistry, ServerError>
where
    S: DatasetSource + Send + Sync + 'static,
    S::Error: Display + Send,
{
    let catalog = load_catalog(source.as_ref(), config.engine.entity_exclusions.as_slice()).await?;
    Ok(SessionRegistry::new(source, Arc::new(catalog), config.engine.clone())
        .with_idle_timeout(config.session_idle_timeout()))
}

/// Start the HTTP server
///
/// Runs until Ctrl+C, then ends every live session. Sessions left unused for
/// `session_idle_secs` are ended in the background while serving.
pub async fn start_server(config: ServerConfig, kind: SourceKind) -> Result<(), ServerError> {
    info!("Starting Lumen server");
    info!("Bind address: {}", config.bind_addr());
    info!("Source: {:?} ({})", kind, config.source.endpoint);
    info!("Refresh interval: {} seconds", config.engine.refresh_interval_secs);
    info!("Session idle timeout: {} seconds", config.session_idle_secs);

    let state = build_state(&config, kind).await?;
    let registry = Arc::clone(&state.registry);
    let sweeper = Arc::clone(&registry).spawn_sweeper(config.session_sweep_interval());
    let app = create_router(state);

    // Bind and serve
    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Server listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    sweeper.abort();
    info!("Shutting down {} sessions", registry.len());
    registry.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
    }
}
