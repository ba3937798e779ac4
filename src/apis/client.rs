/// Shared HTTP client for the history APIs
use crate::errors::{HistoryError, HistoryResult};
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("pool-history/", env!("CARGO_PKG_VERSION"));

/// HTTP client wrapper with a fixed request timeout
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout_secs: u64) -> HistoryResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HistoryError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}
