//! World Bank Source Implementation
//!
//! Fetches indicator series and the country reference list from the World
//! Bank v2 API.
//!
//! # Features
//!
//! - Async HTTP communication with the World Bank API
//! - One request series per tracked metric, merged on (entity, year)
//! - Pagination until the last page
//! - Retry logic with exponential backoff
//! - Timeout handling
//!
//! # Response shape
//!
//! Every endpoint answers with a two-element JSON array `[meta, rows]`, where
//! `rows` is `null` when the query matched nothing. API-level errors come back
//! as a one-element array whose object carries a `message` list.
//!
//! # Examples
//!
//! ```no_run
//! use lumen_source::WorldBankSource;
//! use std::time::Duration;
//!
//! let source = WorldBankSource::new("https://api.worldbank.org", Duration::from_secs(30)).unwrap();
//! ```

use crate::SourceError;
use lumen_domain::traits::DatasetSource;
use lumen_domain::{Dataset, EntityCode, EntityReference, Metric, Record, Year, YearBounds};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

/// Default World Bank API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.worldbank.org";

/// Default timeout for API requests (30 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts per request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Rows requested per page
pub const DEFAULT_PER_PAGE: u32 = 20_000;

/// Rows requested per page for the country list (about 300 rows exist)
const COUNTRY_PER_PAGE: u32 = 400;

/// World Bank API data source
pub struct WorldBankSource {
    endpoint: String,
    client: reqwest::Client,
    max_retries: u32,
    per_page: u32,
}

/// Pagination metadata (first array element)
#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(deserialize_with = "flexible_u32")]
    page: u32,
    #[serde(deserialize_with = "flexible_u32")]
    pages: u32,
}

/// One indicator observation
#[derive(Debug, Deserialize)]
struct IndicatorRow {
    #[serde(rename = "countryiso3code", default)]
    country_code: String,
    date: String,
    value: Option<f64>,
}

/// One row of the country list
#[derive(Debug, Deserialize)]
struct CountryRow {
    id: String,
    name: String,
    #[serde(rename = "capitalCity", default)]
    capital_city: String,
}

/// The API is inconsistent about numbers vs numeric strings in metadata
fn flexible_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(u32),
        Str(String),
    }

    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Split a response body into pagination metadata and rows
fn parse_page<T: DeserializeOwned>(body: Value) -> Result<(PageMeta, Vec<T>), SourceError> {
    let Value::Array(mut parts) = body else {
        return Err(SourceError::Format("Expected a JSON array".to_string()));
    };

    if parts.len() == 1 {
        if let Some(messages) = parts[0].get("message") {
            return Err(SourceError::Format(format!("API error: {}", messages)));
        }
    }
    if parts.len() != 2 {
        return Err(SourceError::Format(format!(
            "Expected [meta, rows], got {} elements",
            parts.len()
        )));
    }

    let rows = parts.pop().unwrap_or(Value::Null);
    let meta = parts.pop().unwrap_or(Value::Null);

    let meta: PageMeta = serde_json::from_value(meta)
        .map_err(|e| SourceError::Format(format!("Invalid page metadata: {}", e)))?;
    let rows: Vec<T> = match rows {
        Value::Null => Vec::new(),
        other => serde_json::from_value(other)
            .map_err(|e| SourceError::Format(format!("Invalid rows: {}", e)))?,
    };

    Ok((meta, rows))
}

/// Merge per-metric observations into records keyed by (entity, year)
///
/// Rows for codes outside `wanted` (regional aggregates) or years outside
/// `years` are dropped.
fn merge_rows(
    merged: &mut BTreeMap<(EntityCode, Year), Record>,
    metric: Metric,
    rows: Vec<IndicatorRow>,
    wanted: &BTreeSet<EntityCode>,
    years: YearBounds,
) -> Result<(), SourceError> {
    for row in rows {
        let Ok(entity) = EntityCode::new(&row.country_code) else {
            continue;
        };
        if !wanted.contains(&entity) {
            continue;
        }

        let year: Year = row
            .date
            .trim()
            .parse()
            .map_err(|_| SourceError::Format(format!("Invalid year: {}", row.date)))?;
        if !years.contains(year) {
            continue;
        }

        merged
            .entry((entity.clone(), year))
            .or_insert_with(|| Record::new(entity, year))
            .set_value(metric, row.value);
    }
    Ok(())
}

impl WorldBankSource {
    /// Create a new World Bank source
    ///
    /// # Parameters
    ///
    /// - `endpoint`: API base URL (e.g., "https://api.worldbank.org")
    /// - `timeout`: Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Unavailable` if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            per_page: DEFAULT_PER_PAGE,
        })
    }

    /// Create a source against the public endpoint with default settings
    pub fn default_endpoint() -> Result<Self, SourceError> {
        Self::new(DEFAULT_ENDPOINT, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Set the maximum number of attempts per request
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the page size
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// GET a JSON body, retrying transport failures and non-success statuses
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, SourceError> {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            match self.client.get(url).query(query).send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        return response
                            .json::<Value>()
                            .await
                            .map_err(|e| SourceError::Format(format!("Failed to parse response: {}", e)));
                    }
                    let status = response.status();
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    last_error = Some(SourceError::Unavailable(format!(
                        "HTTP {}: {}",
                        status, error_text
                    )));
                }
                Err(e) => {
                    last_error = Some(SourceError::Unavailable(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                // Exponential backoff: 1s, 2s, 4s, etc.
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                tracing::debug!("Retrying {} in {:?} (attempt {})", url, delay, attempts + 1);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| SourceError::Unavailable("Max retries exceeded".to_string())))
    }

    /// Fetch every page of a paginated endpoint
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        mut query: Vec<(&str, String)>,
    ) -> Result<Vec<T>, SourceError> {
        let mut rows = Vec::new();
        let mut page = 1u32;
        query.push(("page", page.to_string()));

        loop {
            if let Some(last) = query.last_mut() {
                last.1 = page.to_string();
            }
            let body = self.get_json(url, &query).await?;
            let (meta, mut page_rows) = parse_page::<T>(body)?;
            rows.append(&mut page_rows);

            if meta.pages == 0 || meta.page >= meta.pages {
                break;
            }
            page = meta.page + 1;
        }

        Ok(rows)
    }

    /// Download the country reference list
    pub async fn download_entities(&self) -> Result<Vec<EntityReference>, SourceError> {
        let url = format!("{}/v2/country", self.endpoint);
        let query = vec![
            ("format", "json".to_string()),
            ("per_page", COUNTRY_PER_PAGE.to_string()),
        ];

        let rows: Vec<CountryRow> = self.get_all_pages(&url, query).await?;
        tracing::debug!("Fetched {} reference rows", rows.len());

        Ok(rows
            .into_iter()
            .map(|row| EntityReference::new(row.id, row.name, row.capital_city))
            .collect())
    }

    /// Download all tracked metrics for `entities` within `years`
    pub async fn download_dataset(
        &self,
        entities: &[EntityCode],
        years: YearBounds,
    ) -> Result<Dataset, SourceError> {
        if entities.is_empty() {
            return Ok(Dataset::empty());
        }

        let wanted: BTreeSet<EntityCode> = entities.iter().cloned().collect();
        let codes = wanted
            .iter()
            .map(EntityCode::as_str)
            .collect::<Vec<_>>()
            .join(";");

        let mut merged = BTreeMap::new();
        for metric in Metric::ALL {
            let url = format!(
                "{}/v2/country/{}/indicator/{}",
                self.endpoint,
                codes,
                metric.indicator()
            );
            let query = vec![
                ("format", "json".to_string()),
                ("date", format!("{}:{}", years.min(), years.max())),
                ("per_page", self.per_page.to_string()),
            ];

            let rows: Vec<IndicatorRow> = self.get_all_pages(&url, query).await?;
            tracing::debug!("Fetched {} rows for {}", rows.len(), metric.indicator());
            merge_rows(&mut merged, metric, rows, &wanted, years)?;
        }

        Ok(Dataset::new(merged.into_values().collect()))
    }
}

impl DatasetSource for WorldBankSource {
    type Error = SourceError;

    fn fetch_entities(&self) -> impl Future<Output = Result<Vec<EntityReference>, Self::Error>> + Send {
        self.download_entities()
    }

    fn fetch_dataset(
        &self,
        entities: &[EntityCode],
        years: YearBounds,
    ) -> impl Future<Output = Result<Dataset, Self::Error>> + Send {
        self.download_dataset(entities, years)
    }
}
