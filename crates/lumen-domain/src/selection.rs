//! Selection module - year bounds, year ranges and the user's selection state

use crate::{EntityCode, Year};
use std::fmt;
use thiserror::Error;

/// Error for invalid year bounds or ranges
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// Requested range has `from > to` after clamping into bounds
    #[error("Invalid year range: {from} > {to}")]
    InvalidRange {
        /// Requested start year
        from: Year,
        /// Requested end year
        to: Year,
    },

    /// Year bounds with `min > max`
    #[error("Invalid year bounds: {min} > {max}")]
    InvalidBounds {
        /// Lower bound
        min: Year,
        /// Upper bound
        max: Year,
    },
}

/// Fixed inclusive year interval `[min, max]` covered by the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct YearBounds {
    min: Year,
    max: Year,
}

impl YearBounds {
    /// Default lower bound
    pub const DEFAULT_MIN: Year = 2004;

    /// Default upper bound
    pub const DEFAULT_MAX: Year = 2020;

    /// Create bounds, rejecting `min > max`
    pub fn new(min: Year, max: Year) -> Result<Self, SelectionError> {
        if min > max {
            return Err(SelectionError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    /// Lower bound (inclusive)
    pub fn min(&self) -> Year {
        self.min
    }

    /// Upper bound (inclusive)
    pub fn max(&self) -> Year {
        self.max
    }

    /// Whether a year falls inside the bounds
    pub fn contains(&self, year: Year) -> bool {
        (self.min..=self.max).contains(&year)
    }

    /// Clamp a year into the bounds
    pub fn clamp(&self, year: Year) -> Year {
        year.clamp(self.min, self.max)
    }

    /// The range spanning the whole bounds
    pub fn full_range(&self) -> YearRange {
        YearRange {
            from: self.min,
            to: self.max,
        }
    }
}

impl Default for YearBounds {
    fn default() -> Self {
        Self {
            min: Self::DEFAULT_MIN,
            max: Self::DEFAULT_MAX,
        }
    }
}

/// Inclusive year range `[from, to]` within some [`YearBounds`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct YearRange {
    from: Year,
    to: Year,
}

impl YearRange {
    /// Create a range within `bounds`
    ///
    /// Endpoints outside the bounds are clamped into them. A range that is
    /// inverted after clamping is rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use lumen_domain::{YearBounds, YearRange};
    ///
    /// let bounds = YearBounds::new(2004, 2020).unwrap();
    ///
    /// let range = YearRange::new(1990, 2030, bounds).unwrap();
    /// assert_eq!((range.from(), range.to()), (2004, 2020));
    ///
    /// assert!(YearRange::new(2010, 2005, bounds).is_err());
    /// ```
    pub fn new(from: Year, to: Year, bounds: YearBounds) -> Result<Self, SelectionError> {
        let clamped_from = bounds.clamp(from);
        let clamped_to = bounds.clamp(to);
        if clamped_from > clamped_to {
            return Err(SelectionError::InvalidRange { from, to });
        }
        Ok(Self {
            from: clamped_from,
            to: clamped_to,
        })
    }

    /// Start year (inclusive)
    pub fn from(&self) -> Year {
        self.from
    }

    /// End year (inclusive)
    pub fn to(&self) -> Year {
        self.to
    }

    /// Whether a year falls inside the range
    pub fn contains(&self, year: Year) -> bool {
        (self.from..=self.to).contains(&year)
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// The two user-controlled inputs of the detail view
///
/// The entity is set by a click on the overview and never cleared
/// automatically. The year range defaults to the full bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Selected entity, if any
    pub entity: Option<EntityCode>,

    /// Selected year range
    pub years: YearRange,
}

impl Selection {
    /// Initial selection: no entity, full year range
    pub fn new(bounds: YearBounds) -> Self {
        Self {
            entity: None,
            years: bounds.full_range(),
        }
    }

    /// Builder-style entity setter
    pub fn with_entity(mut self, entity: EntityCode) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Builder-style range setter
    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = years;
        self
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::new(YearBounds::default())
    }
}
