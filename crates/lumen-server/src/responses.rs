//! JSON bodies for the session endpoints.
//!
//! Engine views are converted here into flat, presentation-ready shapes:
//! labels, colors and axis ranges travel with the data.

use lumen_domain::{Metric, Year};
use lumen_engine::{DetailView, OverviewView, TriggerOutcome, VersionedSelection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response to session creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreated {
    /// Session identifier used in every other route
    pub id: Uuid,
}

/// One map marker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapPointResponse {
    /// Entity code (location key)
    pub code: String,

    /// Hover text
    pub name: String,
}

/// Overview body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewResponse {
    /// Snapshot version the points were projected from
    pub version: u64,

    /// Markers sorted by code
    pub points: Vec<MapPointResponse>,
}

impl OverviewResponse {
    /// Convert an overview projected from snapshot `version`
    pub fn new(view: &OverviewView, version: u64) -> Self {
        Self {
            version,
            points: view
                .points
                .iter()
                .map(|p| MapPointResponse {
                    code: p.code.to_string(),
                    name: p.name.clone(),
                })
                .collect(),
        }
    }
}

/// One chart point; `value` is null when the year has no observation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointResponse {
    /// Year
    pub year: Year,
    /// Value, if observed
    pub value: Option<f64>,
}

/// One chart series with its styling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesResponse {
    /// Indicator code
    pub indicator: String,

    /// Axis label
    pub label: String,

    /// Line color
    pub color: String,

    /// Fixed vertical axis range
    pub y_range: (f64, f64),

    /// Points in year order
    pub points: Vec<PointResponse>,
}

/// Detail body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailResponse {
    /// `no_selection`, `no_data` or `chart`
    pub state: String,

    /// Title line for the chart or placeholder
    pub title: String,

    /// Selected entity, if any
    pub entity: Option<String>,

    /// Display name of the selected entity (charts only)
    pub entity_name: Option<String>,

    /// Horizontal axis label (charts only)
    pub x_label: Option<String>,

    /// Horizontal axis range of the selected years (absent with no selection)
    pub x_range: Option<(Year, Year)>,

    /// One series per metric (charts only)
    pub series: Vec<SeriesResponse>,
}

impl From<&DetailView> for DetailResponse {
    fn from(view: &DetailView) -> Self {
        let title = view.title();
        match view {
            DetailView::NoSelection => Self {
                state: "no_selection".to_string(),
                title,
                entity: None,
                entity_name: None,
                x_label: None,
                x_range: None,
                series: Vec::new(),
            },
            DetailView::NoData { entity, years } => Self {
                state: "no_data".to_string(),
                title,
                entity: Some(entity.to_string()),
                entity_name: None,
                x_label: None,
                x_range: Some((years.from(), years.to())),
                series: Vec::new(),
            },
            DetailView::Chart(chart) => Self {
                state: "chart".to_string(),
                title,
                entity: Some(chart.entity.to_string()),
                entity_name: Some(chart.entity_name.clone()),
                x_label: Some("Year".to_string()),
                x_range: Some(chart.x_range()),
                series: chart
                    .series
                    .iter()
                    .map(|s| SeriesResponse {
                        indicator: s.metric.indicator().to_string(),
                        label: s.metric.label().to_string(),
                        color: s.metric.color().to_string(),
                        y_range: s.y_range(),
                        points: s
                            .points
                            .iter()
                            .map(|p| PointResponse {
                                year: p.year,
                                value: p.value,
                            })
                            .collect(),
                    })
                    .collect(),
            },
        }
    }
}

impl DetailResponse {
    /// Series for one metric
    pub fn series(&self, metric: Metric) -> Option<&SeriesResponse> {
        self.series.iter().find(|s| s.indicator == metric.indicator())
    }
}

/// Entity selection request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectEntityRequest {
    /// Entity code, case-insensitive
    pub code: String,
}

/// Year range request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectYearsRequest {
    /// First year
    pub from: Year,
    /// Last year
    pub to: Year,
}

/// Selection state after a change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResponse {
    /// Selected entity, if any
    pub entity: Option<String>,

    /// First selected year (after clamping)
    pub from: Year,

    /// Last selected year (after clamping)
    pub to: Year,

    /// Selection version
    pub version: u64,
}

impl From<&VersionedSelection> for SelectionResponse {
    fn from(current: &VersionedSelection) -> Self {
        Self {
            entity: current.selection.entity.as_ref().map(ToString::to_string),
            from: current.selection.years.from(),
            to: current.selection.years.to(),
            version: current.version,
        }
    }
}

/// Manual refresh result
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    /// Whether the refresh was queued or dropped
    pub outcome: TriggerOutcome,
}
