// Single-pool fetch with store read-through

use super::store::HistoryStore;
use super::types::{DataPoint, WriteOutcome};
use crate::errors::HistoryResult;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::sync::Arc;

/// Remote source of daily pool series
#[async_trait]
pub trait ChartSource: Send + Sync {
    async fn fetch_chart(&self, id: &str) -> HistoryResult<Vec<DataPoint>>;
}

/// Where a `fetch_with_cache` result came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOrigin {
    Cache,
    Network(WriteOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub points: Vec<DataPoint>,
    pub origin: FetchOrigin,
}

impl FetchOutcome {
    pub fn from_cache(&self) -> bool {
        matches!(self.origin, FetchOrigin::Cache)
    }
}

pub struct HistoryFetcher {
    source: Arc<dyn ChartSource>,
    store: Arc<HistoryStore>,
}

impl HistoryFetcher {
    pub fn new(source: Arc<dyn ChartSource>, store: Arc<HistoryStore>) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// Always hits the remote source; nothing is written
    pub async fn fetch_one(&self, id: &str) -> HistoryResult<Vec<DataPoint>> {
        logger::debug(LogTag::Fetcher, &format!("Fetching chart for {}", id));

        match self.source.fetch_chart(id).await {
            Ok(points) => {
                logger::debug(
                    LogTag::Fetcher,
                    &format!("Received {} points for {}", points.len(), id),
                );
                Ok(points)
            }
            Err(e) => {
                logger::warning(LogTag::Fetcher, &format!("Fetch failed for {}: {}", id, e));
                Err(e)
            }
        }
    }

    /// Points for `id`, served from a fresh stored record when allowed
    pub async fn fetch_with_cache(
        &self,
        id: &str,
        force_refresh: bool,
    ) -> HistoryResult<Vec<DataPoint>> {
        Ok(self.fetch_with_cache_detailed(id, force_refresh).await?.points)
    }

    /// Same as `fetch_with_cache`, also reporting cache use and the write outcome
    ///
    /// Fetched points are returned as received; the stored copy is trimmed
    /// to the retention window.
    pub async fn fetch_with_cache_detailed(
        &self,
        id: &str,
        force_refresh: bool,
    ) -> HistoryResult<FetchOutcome> {
        if !force_refresh {
            let now = self.store.now();
            if let Some(record) = self.store.get(id) {
                if record.is_fresh(now, self.store.ttl()) {
                    logger::verbose(
                        LogTag::Fetcher,
                        &format!("Cache hit for {} ({} points)", id, record.points.len()),
                    );
                    return Ok(FetchOutcome {
                        points: record.points,
                        origin: FetchOrigin::Cache,
                    });
                }
            }
        }

        let points = self.fetch_one(id).await?;
        let outcome = self.store.put(id, points.clone())?;

        if let Some(report) = &outcome.eviction {
            logger::warning(
                LogTag::Fetcher,
                &format!(
                    "Storing {} required evicting {} records",
                    id,
                    report.evicted.len()
                ),
            );
        }

        Ok(FetchOutcome {
            points,
            origin: FetchOrigin::Network(outcome),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::MockChartSource;
    use super::*;
    use crate::config::HistoryConfig;
    use crate::errors::HistoryError;
    use crate::history::clock::{Clock, ManualClock};
    use crate::history::storage::MemoryStorage;
    use chrono::{Duration, TimeZone, Utc};

    fn setup(source: MockChartSource) -> (HistoryFetcher, Arc<MockChartSource>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
        let store = Arc::new(HistoryStore::new(
            Arc::new(MemoryStorage::new(1024 * 1024)),
            clock.clone(),
            &HistoryConfig::default(),
            "history",
        ));
        let source = Arc::new(source);
        (HistoryFetcher::new(source.clone(), store), source, clock)
    }

    fn points(clock: &ManualClock, days: i64) -> Vec<DataPoint> {
        (0..days)
            .rev()
            .map(|ago| DataPoint::new(clock.now() - Duration::days(ago), 500.0, 4.0))
            .collect()
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_uses_cache() {
        let clock_seed = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let series = points(&clock_seed, 10);
        let (fetcher, source, clock) = setup(MockChartSource::default().with_series("p", series.clone()));

        let first = fetcher.fetch_with_cache_detailed("p", false).await.unwrap();
        clock.advance(Duration::hours(23));
        let second = fetcher.fetch_with_cache_detailed("p", false).await.unwrap();

        assert!(!first.from_cache());
        assert!(second.from_cache());
        assert_eq!(first.points, series);
        assert_eq!(second.points, series);
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_record_is_refetched() {
        let (fetcher, source, clock) = setup(MockChartSource::default());

        fetcher.fetch_with_cache("p", false).await.unwrap();
        clock.advance(Duration::hours(24));
        fetcher.fetch_with_cache("p", false).await.unwrap();

        assert_eq!(source.calls_for("p"), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let (fetcher, source, _clock) = setup(MockChartSource::default());

        fetcher.fetch_with_cache("p", false).await.unwrap();
        let forced = fetcher.fetch_with_cache_detailed("p", true).await.unwrap();

        assert!(!forced.from_cache());
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_prior_record() {
        let (fetcher, source, clock) = setup(MockChartSource::default());
        source.series.lock().insert("p".to_string(), points(&clock, 3));
        fetcher.fetch_with_cache("p", false).await.unwrap();
        let before = fetcher.store().get("p").unwrap();

        source.failing.lock().insert("p".to_string());
        let err = fetcher.fetch_with_cache("p", true).await.unwrap_err();

        assert!(matches!(err, HistoryError::Http { status: 500, .. }));
        assert_eq!(fetcher.store().get("p"), Some(before));
    }

    #[tokio::test]
    async fn test_fetch_one_never_writes() {
        let (fetcher, source, clock) = setup(MockChartSource::default());
        source.series.lock().insert("p".to_string(), points(&clock, 3));

        let fetched = fetcher.fetch_one("p").await.unwrap();

        assert_eq!(fetched.len(), 3);
        assert!(fetcher.store().get("p").is_none());
    }
}
