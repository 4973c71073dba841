//! Overview projection - one map point per entity with data

use lumen_domain::{Dataset, EntityCatalog, EntityCode};

/// A located marker on the world map
///
/// Carries identity only; no metric value is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapPoint {
    /// Entity code (map location key)
    pub code: EntityCode,

    /// Display name shown on hover
    pub name: String,
}

/// The overview view: the set of entities present in the snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverviewView {
    /// Points sorted by code
    pub points: Vec<MapPoint>,
}

impl OverviewView {
    /// Whether a point exists for `code`
    pub fn contains(&self, code: &EntityCode) -> bool {
        self.points
            .binary_search_by(|point| point.code.cmp(code))
            .is_ok()
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no points ("no data yet" before the first load)
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Project the overview from a dataset snapshot
///
/// Emits one point per entity with at least one record, whatever its metric
/// values. Names come from `catalog`; an uncatalogued code is its own name.
pub fn project_overview(dataset: &Dataset, catalog: &EntityCatalog) -> OverviewView {
    let points = dataset
        .entities()
        .into_iter()
        .map(|code| {
            let name = catalog
                .name(&code)
                .map(str::to_string)
                .unwrap_or_else(|| code.to_string());
            MapPoint { code, name }
        })
        .collect();

    OverviewView { points }
}
