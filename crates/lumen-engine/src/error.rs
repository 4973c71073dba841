//! Error types for engine operations

use lumen_domain::SelectionError;
use thiserror::Error;

/// Errors that can occur during engine operations
///
/// Source failures during refresh never surface here: the scheduler records
/// them on the cache and keeps serving the last good snapshot.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected selection change
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    /// Data source error outside the refresh cycle (e.g. loading the entity catalog)
    #[error("Source error: {0}")]
    Source(String),

    /// Worker error (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),
}
