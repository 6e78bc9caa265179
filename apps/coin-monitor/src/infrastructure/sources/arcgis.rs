//! ArcGIS daily statistics adapter.

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{SourceError, StatsSource};
use crate::domain::DailyStats;
use crate::infrastructure::http::failure_parts;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    attributes: Attributes,
}

#[derive(Debug, Deserialize)]
struct Attributes {
    #[serde(rename = "ZAKAZENIA_DZIENNE")]
    daily_infections: Option<u32>,
}

/// Statistics source backed by an ArcGIS feature query.
#[derive(Debug, Clone)]
pub struct ArcgisStatsSource {
    client: reqwest::Client,
    url: String,
}

impl ArcgisStatsSource {
    /// Create a source querying `url`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl StatsSource for ArcgisStatsSource {
    #[tracing::instrument(skip(self), name = "arcgis_fetch")]
    async fn fetch(&self) -> Result<DailyStats, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::RequestFailed {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let (status, body) = failure_parts(response).await;
            return Err(SourceError::RequestFailed {
                message: format!("status {status}: {body}"),
            });
        }

        let body: QueryResponse =
            response
                .json()
                .await
                .map_err(|e| SourceError::InvalidResponse {
                    message: e.to_string(),
                })?;

        body.features
            .first()
            .and_then(|feature| feature.attributes.daily_infections)
            .map(DailyStats::new)
            .ok_or_else(|| SourceError::InvalidResponse {
                message: "missing ZAKAZENIA_DZIENNE".to_string(),
            })
    }
}
