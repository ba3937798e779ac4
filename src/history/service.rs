// Pool history service: wires store, caches, fetcher and batch pipeline

use super::batch::BatchPipeline;
use super::cancel::CancelToken;
use super::clock::{Clock, SystemClock};
use super::fetcher::{ChartSource, HistoryFetcher};
use super::metrics_cache::MetricsCache;
use super::storage::{SqliteStorage, StorageBackend};
use super::store::HistoryStore;
use super::types::{BatchProgress, DataPoint};
use crate::apis::YieldsClient;
use crate::config::Config;
use crate::errors::HistoryResult;
use crate::logger::{self, LogTag};
use std::collections::HashMap;
use std::sync::Arc;

/// One explicitly constructed instance of the whole engine
///
/// Components share the same store; cloning the `Arc`s out of the service
/// is fine, they stay consistent with each other.
pub struct HistoryService {
    store: Arc<HistoryStore>,
    metrics: Arc<MetricsCache>,
    fetcher: Arc<HistoryFetcher>,
    batch: Arc<BatchPipeline>,
}

impl HistoryService {
    pub fn new(
        config: &Config,
        backend: Arc<dyn StorageBackend>,
        source: Arc<dyn ChartSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(HistoryStore::new(
            backend,
            clock,
            &config.history,
            config.storage.storage_key.clone(),
        ));
        let metrics = MetricsCache::attach(Arc::clone(&store));
        let fetcher = Arc::new(HistoryFetcher::new(source, Arc::clone(&store)));
        let batch = Arc::new(BatchPipeline::new(Arc::clone(&fetcher), config.batch.delay()));

        Self {
            store,
            metrics,
            fetcher,
            batch,
        }
    }

    /// SQLite storage, the yields API and the wall clock, as configured
    ///
    /// The API client is returned alongside so callers can read its stats.
    pub fn from_config(config: &Config) -> HistoryResult<(Self, Arc<YieldsClient>)> {
        let backend = Arc::new(SqliteStorage::new(
            &config.storage.database_path,
            config.storage.quota_bytes,
        )?);
        let client = Arc::new(YieldsClient::new(&config.api)?);

        logger::info(
            LogTag::System,
            &format!(
                "History service ready (db: {}, api: {})",
                config.storage.database_path,
                client.base_url()
            ),
        );

        let service = Self::new(config, backend, client.clone(), Arc::new(SystemClock));
        Ok((service, client))
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsCache> {
        &self.metrics
    }

    pub fn fetcher(&self) -> &Arc<HistoryFetcher> {
        &self.fetcher
    }

    pub fn batch(&self) -> &Arc<BatchPipeline> {
        &self.batch
    }

    pub async fn fetch_with_cache(
        &self,
        id: &str,
        force_refresh: bool,
    ) -> HistoryResult<Vec<DataPoint>> {
        self.fetcher.fetch_with_cache(id, force_refresh).await
    }

    pub async fn fetch_many<S, F>(
        &self,
        ids: &[S],
        on_progress: F,
        force_refresh: bool,
        cancel: &CancelToken,
    ) -> HashMap<String, Vec<DataPoint>>
    where
        S: AsRef<str>,
        F: FnMut(BatchProgress),
    {
        self.batch
            .fetch_many(ids, on_progress, force_refresh, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::clock::ManualClock;
    use crate::history::fetcher::test_support::MockChartSource;
    use crate::history::storage::MemoryStorage;
    use crate::history::types::FetchStatus;
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn test_batch_populates_metrics() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let points: Vec<DataPoint> = (0..10)
            .rev()
            .map(|ago| DataPoint::new(now - Duration::days(ago), 1_000.0, 10.0).with_split(Some(8.0), None))
            .collect();
        let source = MockChartSource::default()
            .with_series("a", points.clone())
            .with_series("b", points[..3].to_vec());

        let mut config = Config::default();
        config.batch.delay_ms = 1;
        let service = HistoryService::new(
            &config,
            Arc::new(MemoryStorage::new(1024 * 1024)),
            Arc::new(source),
            Arc::new(ManualClock::new(now)),
        );

        let mut statuses = Vec::new();
        service
            .fetch_many(&["a", "b"], |p| statuses.push(p.status), false, &CancelToken::new())
            .await;

        assert_eq!(statuses, vec![FetchStatus::Fetching, FetchStatus::Fetching]);
        let all = service.metrics().get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, "a");
        assert_eq!(all[0].1.risk_adjusted_yield, 7.2);

        // A later write for the same id is reflected by the metrics cache
        service.store().put("a", points[..2].to_vec()).unwrap();
        assert!(service.metrics().get("a").is_none());
    }

    #[test]
    fn test_from_config_uses_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.database_path = dir
            .path()
            .join("history.db")
            .to_string_lossy()
            .into_owned();

        let (service, client) = HistoryService::from_config(&config).unwrap();

        assert_eq!(client.base_url(), "https://yields.llama.fi");
        assert!(service.store().ids().is_empty());
        assert!(dir.path().join("history.db").exists());
    }
}
