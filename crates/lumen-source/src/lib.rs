//! Lumen Data Source Layer
//!
//! Implementations of the `DatasetSource` trait from `lumen-domain`.
//!
//! # Sources
//!
//! - `MockSource`: Deterministic in-memory source for testing and demos
//! - `WorldBankSource`: World Bank indicators API integration
//!
//! # Examples
//!
//! ```
//! use lumen_source::MockSource;
//! use lumen_domain::traits::DatasetSource;
//! use lumen_domain::{EntityCode, YearBounds};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let source = MockSource::sample();
//! let usa = EntityCode::new("USA").unwrap();
//! let dataset = source.fetch_dataset(&[usa], YearBounds::default()).await.unwrap();
//! assert!(!dataset.is_empty());
//! # }
//! ```

#![warn(missing_docs)]

pub mod worldbank;

use lumen_domain::traits::DatasetSource;
use lumen_domain::{Dataset, EntityCode, EntityReference, Metric, Record, YearBounds};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

pub use worldbank::WorldBankSource;

/// Errors that can occur while fetching from a data source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network or remote failure
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// Response does not match the expected shape
    #[error("Source format error: {0}")]
    Format(String),
}

/// Failure mode a [`MockSource`] can be switched into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Fail with [`SourceError::Unavailable`]
    Unavailable,
    /// Fail with [`SourceError::Format`]
    Format,
}

#[derive(Debug, Default)]
struct MockState {
    entities: Vec<EntityReference>,
    dataset: Dataset,
    failure: Option<MockFailure>,
    delay: Option<Duration>,
    call_count: usize,
}

/// Mock data source for deterministic testing
///
/// Serves a fixed entity list and dataset without any network calls. Clones
/// share state, so a test can keep a handle while the engine owns another.
///
/// # Examples
///
/// ```
/// use lumen_source::{MockFailure, MockSource};
///
/// let source = MockSource::sample();
/// source.fail_with(MockFailure::Unavailable);
/// source.recover();
/// assert_eq!(source.call_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    state: Arc<Mutex<MockState>>,
}

impl MockSource {
    /// Create a mock serving the given reference list and dataset
    pub fn new(entities: Vec<EntityReference>, dataset: Dataset) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                entities,
                dataset,
                ..Default::default()
            })),
        }
    }

    /// A small built-in dataset, used by tests and the server's `--mock` mode
    pub fn sample() -> Self {
        let entities = vec![
            EntityReference::new("USA", "United States", "Washington D.C."),
            EntityReference::new("IND", "India", "New Delhi"),
            EntityReference::new("KEN", "Kenya", "Nairobi"),
            EntityReference::new("NER", "Niger", "Niamey"),
            EntityReference::new("WLD", "World", ""),
            EntityReference::new("XKX", "Kosovo", "Pristina"),
        ];

        let series: [(&str, [(f64, f64); 5]); 4] = [
            ("USA", [(85.0, 6.9), (87.0, 6.8), (89.0, 6.7), (100.0, 6.6), (100.0, 6.5)]),
            ("IND", [(64.0, 55.3), (66.0, 53.1), (67.9, 51.0), (70.2, 49.0), (72.6, 47.1)]),
            ("KEN", [(15.0, 58.4), (16.0, 55.2), (18.0, 52.3), (20.0, 49.8), (23.0, 47.5)]),
            ("NER", [(7.0, 79.4), (7.5, 76.9), (8.1, 74.3), (8.7, 71.6), (9.3, 69.0)]),
        ];

        let mut records = Vec::new();
        for (code, values) in series {
            let Ok(entity) = EntityCode::new(code) else {
                continue;
            };
            for (offset, (access, mortality)) in values.into_iter().enumerate() {
                records.push(
                    Record::new(entity.clone(), 2004 + offset as u16)
                        .with_value(Metric::ElectricityAccess, Some(access))
                        .with_value(Metric::InfantMortality, Some(mortality)),
                );
            }
        }

        Self::new(entities, Dataset::new(records))
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the dataset served by subsequent fetches
    pub fn set_dataset(&self, dataset: Dataset) {
        self.lock().dataset = dataset;
    }

    /// Make every subsequent fetch fail with the given failure
    pub fn fail_with(&self, failure: MockFailure) {
        self.lock().failure = Some(failure);
    }

    /// Stop failing
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Delay every dataset fetch (simulates a slow remote)
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    /// Number of dataset fetches attempted so far
    pub fn call_count(&self) -> usize {
        self.lock().call_count
    }

    fn check_failure(failure: Option<MockFailure>) -> Result<(), SourceError> {
        match failure {
            Some(MockFailure::Unavailable) => {
                Err(SourceError::Unavailable("Mock source unavailable".to_string()))
            }
            Some(MockFailure::Format) => {
                Err(SourceError::Format("Mock malformed response".to_string()))
            }
            None => Ok(()),
        }
    }
}

impl DatasetSource for MockSource {
    type Error = SourceError;

    fn fetch_entities(&self) -> impl Future<Output = Result<Vec<EntityReference>, Self::Error>> + Send {
        let result = {
            let state = self.lock();
            Self::check_failure(state.failure).map(|()| state.entities.clone())
        };
        async move { result }
    }

    fn fetch_dataset(
        &self,
        entities: &[EntityCode],
        years: YearBounds,
    ) -> impl Future<Output = Result<Dataset, Self::Error>> + Send {
        let wanted: BTreeSet<EntityCode> = entities.iter().cloned().collect();
        let state = Arc::clone(&self.state);

        async move {
            let delay = {
                let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                guard.call_count += 1;
                guard.delay
            };

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            Self::check_failure(guard.failure)?;

            let records = guard
                .dataset
                .records()
                .iter()
                .filter(|r| wanted.contains(&r.entity) && years.contains(r.year))
                .cloned()
                .collect();
            Ok(Dataset::new(records))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> EntityCode {
        EntityCode::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_mock_serves_requested_entities_only() {
        let source = MockSource::sample();
        let dataset = source
            .fetch_dataset(&[code("USA")], YearBounds::default())
            .await
            .unwrap();

        assert_eq!(dataset.len(), 5);
        assert!(dataset.records().iter().all(|r| r.entity == code("USA")));
    }

    #[tokio::test]
    async fn test_mock_respects_year_bounds() {
        let source = MockSource::sample();
        let bounds = YearBounds::new(2005, 2006).unwrap();
        let dataset = source.fetch_dataset(&[code("KEN")], bounds).await.unwrap();

        let years: Vec<_> = dataset.records().iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2005, 2006]);
    }

    #[tokio::test]
    async fn test_mock_entity_without_data_is_not_an_error() {
        let source = MockSource::sample();
        let dataset = source
            .fetch_dataset(&[code("ZZZ")], YearBounds::default())
            .await
            .unwrap();
        assert!(dataset.is_empty());
    }

    #[tokio::test]
    async fn test_mock_failure_modes() {
        let source = MockSource::sample();

        source.fail_with(MockFailure::Unavailable);
        let result = source.fetch_dataset(&[code("USA")], YearBounds::default()).await;
        assert!(matches!(result, Err(SourceError::Unavailable(_))));

        source.fail_with(MockFailure::Format);
        let result = source.fetch_entities().await;
        assert!(matches!(result, Err(SourceError::Format(_))));

        source.recover();
        assert!(source.fetch_entities().await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_call_count_shared_between_clones() {
        let source = MockSource::sample();
        let handle = source.clone();

        source.fetch_dataset(&[], YearBounds::default()).await.unwrap();
        source.fetch_dataset(&[], YearBounds::default()).await.unwrap();

        assert_eq!(handle.call_count(), 2);
    }
}
