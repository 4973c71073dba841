//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::{Dataset, EntityCode, EntityReference, YearBounds};
use std::future::Future;

/// Trait for retrieving the remote dataset
///
/// Implemented by the infrastructure layer (lumen-source). Implementations do
/// no caching of their own; every call goes to the source.
pub trait DatasetSource {
    /// Error type for source operations
    type Error;

    /// Fetch the raw entity reference list
    fn fetch_entities(&self) -> impl Future<Output = Result<Vec<EntityReference>, Self::Error>> + Send;

    /// Fetch all records for `entities` within `years`
    ///
    /// Entities with no data in range contribute no records; that is not an error.
    fn fetch_dataset(
        &self,
        entities: &[EntityCode],
        years: YearBounds,
    ) -> impl Future<Output = Result<Dataset, Self::Error>> + Send;
}
