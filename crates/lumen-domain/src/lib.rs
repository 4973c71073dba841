//! Lumen Domain Layer
//!
//! Core domain model for the Lumen dashboard engine. It defines the value
//! objects and trait interfaces that the source, engine and server layers
//! depend upon.
//!
//! ## Key Concepts
//!
//! - **Entity**: A tracked country with a stable code and display name
//! - **Record**: One data point for an entity at a specific year
//! - **Dataset**: The full collection of records for a session
//! - **Metric**: One of the two tracked indicators (electricity access, infant mortality)
//! - **Selection**: The selected entity and year range driving the detail view
//!
//! ## Architecture
//!
//! - Only `thiserror` for error types
//! - Pure value types only; no I/O
//! - Trait definitions for the remote data source live in [`traits`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod metric;
pub mod record;
pub mod selection;
pub mod traits;

// Re-exports for convenience
pub use entity::{Entity, EntityCatalog, EntityCode, EntityReference, DEFAULT_ENTITY_EXCLUSIONS};
pub use metric::Metric;
pub use record::{Dataset, Record, Year};
pub use selection::{Selection, SelectionError, YearBounds, YearRange};
