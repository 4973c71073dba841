//! Configuration for the engine
//!
//! Defines the refresh interval, year bounds and entity exclusions.

use crate::EngineError;
use lumen_domain::{YearBounds, DEFAULT_ENTITY_EXCLUSIONS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a session's engine
///
/// # Examples
///
/// ```
/// use lumen_engine::EngineConfig;
///
/// // Default configuration (refresh every minute, 2004-2020)
/// let config = EngineConfig::default();
/// assert_eq!(config.refresh_interval_secs, 60);
///
/// // Fast refresh for demos
/// let config = EngineConfig::fast();
/// assert_eq!(config.refresh_interval_secs, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How often to refresh the dataset (in seconds)
    /// Default: 60 seconds
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// First year covered by the dataset
    /// Default: 2004
    #[serde(default = "default_min_year")]
    pub min_year: u16,

    /// Last year covered by the dataset
    /// Default: 2020
    #[serde(default = "default_max_year")]
    pub max_year: u16,

    /// Entity codes never tracked (disputed or unrecognized territories)
    /// Default: [`DEFAULT_ENTITY_EXCLUSIONS`]
    #[serde(default = "default_entity_exclusions")]
    pub entity_exclusions: Vec<String>,

    /// Buffer size of the event channels; slow subscribers skip ahead
    /// Default: 64
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_min_year() -> u16 {
    YearBounds::DEFAULT_MIN
}

fn default_max_year() -> u16 {
    YearBounds::DEFAULT_MAX
}

fn default_entity_exclusions() -> Vec<String> {
    DEFAULT_ENTITY_EXCLUSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_event_capacity() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            min_year: default_min_year(),
            max_year: default_max_year(),
            entity_exclusions: default_entity_exclusions(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineConfig {
    /// Fast refresh configuration (every 5 seconds)
    ///
    /// Suitable for demos against the mock source.
    pub fn fast() -> Self {
        Self {
            refresh_interval_secs: 5,
            ..Self::default()
        }
    }

    /// Get refresh interval as Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Get the configured year bounds
    pub fn year_bounds(&self) -> Result<YearBounds, EngineError> {
        YearBounds::new(self.min_year, self.max_year)
            .map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.refresh_interval_secs == 0 {
            return Err(EngineError::Config(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(EngineError::Config(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        self.year_bounds()?;
        Ok(())
    }
}
