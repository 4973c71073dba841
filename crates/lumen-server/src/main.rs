//! Lumen server binary
//!
//! Starts the HTTP server over the session engine.

use anyhow::Context;
use clap::Parser;
use lumen_server::{config::ServerConfig, start_server, SourceKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Lumen - electricity access and infant mortality explorer
#[derive(Debug, Parser)]
#[command(name = "lumen-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "LUMEN_CONFIG")]
    config: Option<PathBuf>,

    /// Serve built-in sample data instead of calling the World Bank API
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (log to stderr)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            tracing::warn!("No config file specified, using defaults");
            ServerConfig::default()
        }
    };

    let kind = if cli.mock {
        SourceKind::Mock
    } else {
        SourceKind::WorldBank
    };

    start_server(config, kind).await?;
    Ok(())
}
