/// Request statistics for API clients
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Requests that never got a response (transport failures)
    pub network_errors: u64,
    pub average_response_time_ms: f64,
}

impl ApiStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64 * 100.0
        }
    }
}

pub struct ApiStatsTracker {
    stats: RwLock<ApiStats>,
    total_response_time_ms: RwLock<f64>,
    network_errors: AtomicU64,
}

impl ApiStatsTracker {
    pub fn new() -> Self {
        Self {
            stats: RwLock::new(ApiStats::default()),
            total_response_time_ms: RwLock::new(0.0),
            network_errors: AtomicU64::new(0),
        }
    }

    /// Record a request that received a response
    pub async fn record_request(&self, success: bool, response_time_ms: f64) {
        let mut total_time = self.total_response_time_ms.write().await;
        let mut stats = self.stats.write().await;

        stats.total_requests += 1;
        if success {
            stats.successful_requests += 1;
        } else {
            stats.failed_requests += 1;
        }

        *total_time += response_time_ms;
        stats.average_response_time_ms = *total_time / stats.total_requests as f64;
    }

    pub fn record_network_error(&self) {
        self.network_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn get_stats(&self) -> ApiStats {
        let mut stats = self.stats.read().await.clone();
        stats.network_errors = self.network_errors.load(Ordering::Relaxed);
        stats
    }
}

impl Default for ApiStatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracks_counts_and_average() {
        let tracker = ApiStatsTracker::new();
        tracker.record_request(true, 100.0).await;
        tracker.record_request(false, 300.0).await;
        tracker.record_network_error();

        let stats = tracker.get_stats().await;
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.successful_requests, 1);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.network_errors, 1);
        assert_eq!(stats.average_response_time_ms, 200.0);
        assert_eq!(stats.success_rate(), 50.0);
    }
}
