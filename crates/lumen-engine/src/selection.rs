//! Versioned selection state
//!
//! Holds the selected entity and year range for a session. Every accepted
//! mutation bumps the version so dependent views know to recompute.

use crate::EngineError;
use lumen_domain::{EntityCode, Selection, YearBounds, YearRange};
use std::sync::{PoisonError, RwLock};

/// A selection together with the version it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedSelection {
    /// Selection contents
    pub selection: Selection,

    /// Version of the selection state when read
    pub version: u64,
}

/// Session selection state
///
/// Reads return a consistent copy; a projection working from that copy never
/// sees a half-applied change.
#[derive(Debug)]
pub struct SelectionStore {
    bounds: YearBounds,
    inner: RwLock<VersionedSelection>,
}

impl SelectionStore {
    /// Create selection state with no entity and the full year range
    pub fn new(bounds: YearBounds) -> Self {
        Self {
            bounds,
            inner: RwLock::new(VersionedSelection {
                selection: Selection::new(bounds),
                version: 0,
            }),
        }
    }

    /// Year bounds range changes are clamped to
    pub fn bounds(&self) -> YearBounds {
        self.bounds
    }

    /// Consistent copy of the current selection
    pub fn current(&self) -> VersionedSelection {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Current version
    pub fn version(&self) -> u64 {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).version
    }

    /// Entity-selection event: set the entity, keep the year range
    ///
    /// Returns the new version.
    pub fn select_entity(&self, entity: EntityCode) -> u64 {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.selection.entity = Some(entity);
        inner.version += 1;
        inner.version
    }

    /// Range-change event: set the year range, keep the entity
    ///
    /// Out-of-bounds endpoints are clamped; an inverted range is rejected and
    /// leaves the state untouched. Returns the accepted range and new version.
    pub fn select_years(&self, from: u16, to: u16) -> Result<(YearRange, u64), EngineError> {
        let years = YearRange::new(from, to, self.bounds)?;

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.selection.years = years;
        inner.version += 1;
        Ok((years, inner.version))
    }
}
