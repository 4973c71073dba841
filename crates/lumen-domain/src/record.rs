//! Record module - data points and the dataset that holds them

use crate::{EntityCode, Metric};
use std::collections::BTreeSet;

/// Calendar year
pub type Year = u16;

/// One data point: an entity at a year, with a value per metric
///
/// A metric value may be absent (the upstream source has no observation).
/// Absent is never the same as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Entity this record belongs to
    pub entity: EntityCode,

    /// Observation year
    pub year: Year,

    /// Access to electricity (% of population)
    pub electricity_access: Option<f64>,

    /// Infant mortality (per 1,000 live births)
    pub infant_mortality: Option<f64>,
}

impl Record {
    /// Create a record with no metric values
    pub fn new(entity: EntityCode, year: Year) -> Self {
        Self {
            entity,
            year,
            electricity_access: None,
            infant_mortality: None,
        }
    }

    /// Builder-style setter for one metric value
    pub fn with_value(mut self, metric: Metric, value: Option<f64>) -> Self {
        self.set_value(metric, value);
        self
    }

    /// Set one metric value
    pub fn set_value(&mut self, metric: Metric, value: Option<f64>) {
        match metric {
            Metric::ElectricityAccess => self.electricity_access = value,
            Metric::InfantMortality => self.infant_mortality = value,
        }
    }

    /// Get one metric value
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::ElectricityAccess => self.electricity_access,
            Metric::InfantMortality => self.infant_mortality,
        }
    }
}

/// Ordered collection of records for all tracked entities across the year range
///
/// There is not necessarily a record for every (entity, year) pair. Records
/// are kept sorted by entity code, then year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    /// Create a dataset, sorting records into canonical order
    ///
    /// # Examples
    ///
    /// ```
    /// use lumen_domain::{Dataset, EntityCode, Record};
    ///
    /// let usa = EntityCode::new("USA").unwrap();
    /// let dataset = Dataset::new(vec![
    ///     Record::new(usa.clone(), 2006),
    ///     Record::new(usa.clone(), 2004),
    /// ]);
    /// assert_eq!(dataset.records()[0].year, 2004);
    /// ```
    pub fn new(mut records: Vec<Record>) -> Self {
        records.sort_by(|a, b| a.entity.cmp(&b.entity).then(a.year.cmp(&b.year)));
        Self { records }
    }

    /// The empty dataset ("no data yet")
    pub fn empty() -> Self {
        Self::default()
    }

    /// All records in canonical order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Records for a single entity, in year order
    pub fn for_entity<'a>(&'a self, entity: &'a EntityCode) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| &r.entity == entity)
    }

    /// Codes of all entities with at least one record
    pub fn entities(&self) -> BTreeSet<EntityCode> {
        self.records.iter().map(|r| r.entity.clone()).collect()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> EntityCode {
        EntityCode::new(s).unwrap()
    }

    #[test]
    fn test_canonical_order() {
        let dataset = Dataset::new(vec![
            Record::new(code("USA"), 2005),
            Record::new(code("CAN"), 2010),
            Record::new(code("USA"), 2004),
        ]);

        let order: Vec<_> = dataset
            .records()
            .iter()
            .map(|r| (r.entity.as_str().to_string(), r.year))
            .collect();
        assert_eq!(
            order,
            vec![
                ("CAN".to_string(), 2010),
                ("USA".to_string(), 2004),
                ("USA".to_string(), 2005),
            ]
        );
    }

    #[test]
    fn test_absent_values_stay_absent() {
        let record = Record::new(code("USA"), 2004).with_value(Metric::ElectricityAccess, Some(85.0));
        assert_eq!(record.value(Metric::ElectricityAccess), Some(85.0));
        assert_eq!(record.value(Metric::InfantMortality), None);
    }

    #[test]
    fn test_for_entity() {
        let usa = code("USA");
        let dataset = Dataset::new(vec![
            Record::new(usa.clone(), 2004),
            Record::new(code("CAN"), 2004),
            Record::new(usa.clone(), 2005),
        ]);

        assert_eq!(dataset.for_entity(&usa).count(), 2);
        assert_eq!(dataset.for_entity(&code("ZZZ")).count(), 0);
    }

    #[test]
    fn test_empty() {
        let dataset = Dataset::empty();
        assert!(dataset.is_empty());
        assert!(dataset.entities().is_empty());
    }
}
