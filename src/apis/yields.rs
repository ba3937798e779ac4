/// Yields API client
///
/// Endpoints implemented:
/// 1. /chart/{pool_id} - Daily TVL and APY history for one pool
use crate::apis::client::HttpClient;
use crate::apis::stats::{ApiStats, ApiStatsTracker};
use crate::config::ApiConfig;
use crate::errors::{HistoryError, HistoryResult};
use crate::history::{ChartSource, DataPoint};
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    #[serde(default)]
    status: Option<String>,
    data: Vec<DataPoint>,
}

pub struct YieldsClient {
    http_client: HttpClient,
    base_url: String,
    stats: Arc<ApiStatsTracker>,
}

impl YieldsClient {
    pub fn new(config: &ApiConfig) -> HistoryResult<Self> {
        Ok(Self {
            http_client: HttpClient::new(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            stats: Arc::new(ApiStatsTracker::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_stats(&self) -> ApiStats {
        self.stats.get_stats().await
    }

    /// Fetch the full daily series for `pool_id`
    pub async fn fetch_pool_chart(&self, pool_id: &str) -> HistoryResult<Vec<DataPoint>> {
        let start = Instant::now();
        let url = format!("{}/chart/{}", self.base_url, pool_id);

        logger::debug(LogTag::Api, &format!("GET {}", url));

        let response = self
            .http_client
            .client()
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                self.stats.record_network_error();
                HistoryError::Network {
                    id: pool_id.to_string(),
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let elapsed = start.elapsed().as_millis() as f64;
            self.stats.record_request(false, elapsed).await;
            return Err(HistoryError::Http {
                id: pool_id.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            self.stats.record_network_error();
            HistoryError::Network {
                id: pool_id.to_string(),
                message: e.to_string(),
            }
        })?;
        let elapsed = start.elapsed().as_millis() as f64;

        match parse_chart_response(pool_id, &body) {
            Ok(points) => {
                self.stats.record_request(true, elapsed).await;
                logger::debug(
                    LogTag::Api,
                    &format!("{} returned {} points in {:.0}ms", pool_id, points.len(), elapsed),
                );
                Ok(points)
            }
            Err(e) => {
                self.stats.record_request(false, elapsed).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ChartSource for YieldsClient {
    async fn fetch_chart(&self, id: &str) -> HistoryResult<Vec<DataPoint>> {
        self.fetch_pool_chart(id).await
    }
}

/// Decode a `/chart` body into points sorted by timestamp
pub fn parse_chart_response(pool_id: &str, body: &str) -> HistoryResult<Vec<DataPoint>> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| HistoryError::InvalidResponse {
            id: pool_id.to_string(),
            message: e.to_string(),
        })?;

    if let Some(status) = response.status.as_deref() {
        if status != "success" {
            logger::warning(
                LogTag::Api,
                &format!("Chart for {} returned status '{}'", pool_id, status),
            );
        }
    }

    let mut points = response.data;
    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}
