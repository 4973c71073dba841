//! Entity module - tracked countries and the reference list they come from

use std::collections::BTreeMap;
use std::fmt;

/// Entity codes excluded from the reference list regardless of other attributes.
///
/// Disputed or unrecognized territories that the upstream source lists as
/// countries but that the dashboard does not track:
///
/// | Code | Name |
/// |------|------|
/// | `XKX` | Kosovo |
/// | `PRK` | Korea, Dem. People's Rep. |
///
/// Deployments can override this list through configuration.
pub const DEFAULT_ENTITY_EXCLUSIONS: &[&str] = &["XKX", "PRK"];

/// Stable entity identifier (ISO 3166-1 alpha-3 style, e.g. `USA`)
///
/// Codes are normalized to uppercase so that `usa` and `USA` name the same entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityCode(String);

impl EntityCode {
    /// Create a new entity code
    ///
    /// # Errors
    /// Returns error if the code is empty or contains non-alphanumeric characters
    ///
    /// # Examples
    ///
    /// ```
    /// use lumen_domain::EntityCode;
    ///
    /// let code = EntityCode::new("usa").unwrap();
    /// assert_eq!(code.as_str(), "USA");
    /// assert!(EntityCode::new("").is_err());
    /// ```
    pub fn new(value: impl AsRef<str>) -> Result<Self, String> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err("Entity code cannot be empty".to_string());
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("Invalid entity code: {}", value));
        }
        Ok(Self(value.to_ascii_uppercase()))
    }

    /// Get the code as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tracked entity: code plus display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Unique code
    pub code: EntityCode,

    /// Non-empty display name
    pub name: String,
}

/// One raw row of the entity reference list, as served by the data source
///
/// Rows are unvalidated; [`EntityCatalog::from_reference`] decides which ones
/// become entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReference {
    /// Raw code
    pub code: String,

    /// Raw display name
    pub name: String,

    /// Capital city; empty for aggregates (regions, income groups)
    pub capital_city: String,
}

impl EntityReference {
    /// Create a new reference row
    pub fn new(code: impl Into<String>, name: impl Into<String>, capital_city: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            capital_city: capital_city.into(),
        }
    }
}

/// The fixed set of entities tracked for a session
///
/// Keyed by code; codes are unique and names are non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityCatalog {
    entities: BTreeMap<EntityCode, String>,
}

impl EntityCatalog {
    /// Build a catalog from the raw reference list
    ///
    /// A row is dropped when its code is invalid, its name or capital city is
    /// empty, or its code appears in `exclusions`. On duplicate codes the first
    /// row wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use lumen_domain::{EntityCatalog, EntityReference, DEFAULT_ENTITY_EXCLUSIONS};
    ///
    /// let rows = vec![
    ///     EntityReference::new("USA", "United States", "Washington D.C."),
    ///     EntityReference::new("WLD", "World", ""),
    ///     EntityReference::new("XKX", "Kosovo", "Pristina"),
    /// ];
    /// let catalog = EntityCatalog::from_reference(rows, DEFAULT_ENTITY_EXCLUSIONS);
    /// assert_eq!(catalog.len(), 1);
    /// ```
    pub fn from_reference<I, S>(rows: I, exclusions: &[S]) -> Self
    where
        I: IntoIterator<Item = EntityReference>,
        S: AsRef<str>,
    {
        let mut entities = BTreeMap::new();

        for row in rows {
            let Ok(code) = EntityCode::new(&row.code) else {
                continue;
            };
            let name = row.name.trim();
            if name.is_empty() || row.capital_city.trim().is_empty() {
                continue;
            }
            if exclusions
                .iter()
                .any(|excluded| excluded.as_ref().eq_ignore_ascii_case(code.as_str()))
            {
                continue;
            }
            entities.entry(code).or_insert_with(|| name.to_string());
        }

        Self { entities }
    }

    /// Build a catalog directly from already-validated entities
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut map = BTreeMap::new();
        for entity in entities {
            map.entry(entity.code).or_insert(entity.name);
        }
        Self { entities: map }
    }

    /// Display name for a code, if the code is tracked
    pub fn name(&self, code: &EntityCode) -> Option<&str> {
        self.entities.get(code).map(String::as_str)
    }

    /// Whether a code is tracked
    pub fn contains(&self, code: &EntityCode) -> bool {
        self.entities.contains_key(code)
    }

    /// All tracked codes, sorted
    pub fn codes(&self) -> Vec<EntityCode> {
        self.entities.keys().cloned().collect()
    }

    /// Iterate over tracked entities in code order
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().map(|(code, name)| Entity {
            code: code.clone(),
            name: name.clone(),
        })
    }

    /// Number of tracked entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_normalization() {
        let code = EntityCode::new(" can ").unwrap();
        assert_eq!(code.as_str(), "CAN");
        assert_eq!(code.to_string(), "CAN");
    }

    #[test]
    fn test_code_rejects_garbage() {
        assert!(EntityCode::new("").is_err());
        assert!(EntityCode::new("U;SA").is_err());
    }

    #[test]
    fn test_catalog_filters_missing_attributes() {
        let rows = vec![
            EntityReference::new("USA", "United States", "Washington D.C."),
            EntityReference::new("EAS", "East Asia & Pacific", ""),
            EntityReference::new("FRA", "", "Paris"),
            EntityReference::new("", "Nowhere", "Nowhere City"),
        ];

        let catalog = EntityCatalog::from_reference(rows, DEFAULT_ENTITY_EXCLUSIONS);
        assert_eq!(catalog.codes(), vec![EntityCode::new("USA").unwrap()]);
    }

    #[test]
    fn test_catalog_applies_exclusions() {
        let rows = vec![
            EntityReference::new("XKX", "Kosovo", "Pristina"),
            EntityReference::new("PRK", "Korea, Dem. People's Rep.", "Pyongyang"),
            EntityReference::new("KOR", "Korea, Rep.", "Seoul"),
        ];

        let catalog = EntityCatalog::from_reference(rows, DEFAULT_ENTITY_EXCLUSIONS);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.name(&EntityCode::new("KOR").unwrap()), Some("Korea, Rep."));
    }

    #[test]
    fn test_catalog_custom_exclusions() {
        let rows = vec![
            EntityReference::new("XKX", "Kosovo", "Pristina"),
            EntityReference::new("USA", "United States", "Washington D.C."),
        ];

        let catalog = EntityCatalog::from_reference(rows, &["usa"]);
        assert!(catalog.contains(&EntityCode::new("XKX").unwrap()));
        assert!(!catalog.contains(&EntityCode::new("USA").unwrap()));
    }

    #[test]
    fn test_catalog_first_duplicate_wins() {
        let rows = vec![
            EntityReference::new("USA", "United States", "Washington D.C."),
            EntityReference::new("usa", "Duplicate", "Elsewhere"),
        ];

        let catalog = EntityCatalog::from_reference(rows, DEFAULT_ENTITY_EXCLUSIONS);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.name(&EntityCode::new("USA").unwrap()), Some("United States"));
    }
}
