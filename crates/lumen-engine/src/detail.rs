//! Detail projection - dual time series for the selected entity and years
//!
//! The result is either a chart or one of two named placeholder states:
//!
//! | State | When |
//! |-------|------|
//! | `NoSelection` | no entity selected yet |
//! | `NoData` | the entity has no records, or none inside the year range |
//! | `Chart` | at least one record survives both filters |

use lumen_domain::{Dataset, EntityCatalog, EntityCode, Metric, Record, Selection, Year, YearRange};

/// One point of a series; `value` is `None` when the record has no observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// Observation year
    pub year: Year,

    /// Observed value, if any
    pub value: Option<f64>,
}

/// One metric's points over the surviving years, sorted by year
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Metric plotted by this series
    pub metric: Metric,

    /// Points in ascending year order
    pub points: Vec<SeriesPoint>,
}

impl Series {
    /// Fixed vertical axis range for this series
    pub fn y_range(&self) -> (f64, f64) {
        self.metric.display_range()
    }
}

/// Chart contents for a selected entity
#[derive(Debug, Clone, PartialEq)]
pub struct DetailChart {
    /// Selected entity
    pub entity: EntityCode,

    /// Display name of the entity
    pub entity_name: String,

    /// Selected year range (the shared x axis)
    pub years: YearRange,

    /// One series per tracked metric, aligned on the same years
    pub series: Vec<Series>,
}

impl DetailChart {
    /// Series for one metric
    pub fn series(&self, metric: Metric) -> Option<&Series> {
        self.series.iter().find(|s| s.metric == metric)
    }

    /// Shared x axis range
    pub fn x_range(&self) -> (Year, Year) {
        (self.years.from(), self.years.to())
    }
}

/// Result of the detail projection
#[derive(Debug, Clone, PartialEq)]
pub enum DetailView {
    /// No entity selected
    NoSelection,

    /// The selected entity has no records in the selected years
    NoData {
        /// Selected entity
        entity: EntityCode,
        /// Selected year range
        years: YearRange,
    },

    /// Two-series comparison chart
    Chart(DetailChart),
}

impl DetailView {
    /// Title shown above the chart or placeholder
    pub fn title(&self) -> String {
        match self {
            DetailView::NoSelection => "Select a country on the map".to_string(),
            DetailView::NoData { entity, .. } => {
                format!("No data available for {} in selected years", entity)
            }
            DetailView::Chart(chart) => format!(
                "Electricity Access & Infant Mortality in {}, {}-{}",
                chart.entity,
                chart.years.from(),
                chart.years.to()
            ),
        }
    }

    /// Whether this is a placeholder rather than a chart
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, DetailView::Chart(_))
    }
}

/// Project the detail view from one snapshot and one selection
///
/// Years in range without a record contribute no point to either series;
/// nothing is interpolated or zero-filled.
pub fn project_detail(dataset: &Dataset, selection: &Selection, catalog: &EntityCatalog) -> DetailView {
    let Some(entity) = selection.entity.as_ref() else {
        return DetailView::NoSelection;
    };
    let years = selection.years;
    let no_data = || DetailView::NoData {
        entity: entity.clone(),
        years,
    };

    let for_entity: Vec<&Record> = dataset.for_entity(entity).collect();
    if for_entity.is_empty() {
        return no_data();
    }

    let mut in_range: Vec<&Record> = for_entity
        .into_iter()
        .filter(|r| years.contains(r.year))
        .collect();
    if in_range.is_empty() {
        return no_data();
    }
    in_range.sort_by_key(|r| r.year);

    let series = Metric::ALL
        .into_iter()
        .map(|metric| Series {
            metric,
            points: in_range
                .iter()
                .map(|r| SeriesPoint {
                    year: r.year,
                    value: r.value(metric),
                })
                .collect(),
        })
        .collect();

    DetailView::Chart(DetailChart {
        entity: entity.clone(),
        entity_name: catalog
            .name(entity)
            .map(str::to_string)
            .unwrap_or_else(|| entity.to_string()),
        years,
        series,
    })
}
