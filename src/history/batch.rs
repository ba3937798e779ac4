// Sequential, rate-limited batch fetching
//
// Items are processed one at a time with a fixed pause between requests so
// the remote API is never hit in bursts. A cancel token is checked before
// every item and interrupts the pause; the request already in flight is
// allowed to finish and its result is kept.

use super::cancel::CancelToken;
use super::fetcher::HistoryFetcher;
use super::types::{BatchProgress, DataPoint, FetchStatus};
use crate::logger::{self, LogTag};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct BatchPipeline {
    fetcher: Arc<HistoryFetcher>,
    delay: Duration,
    running: AtomicBool,
}

/// Clears the running flag when a run ends, including on early return
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl BatchPipeline {
    pub fn new(fetcher: Arc<HistoryFetcher>, delay: Duration) -> Self {
        Self {
            fetcher,
            delay,
            running: AtomicBool::new(false),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// True while a `fetch_many` call is in progress
    ///
    /// Informational only; concurrent runs are not prevented.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Fetch every id in order, reporting progress once per settled id
    ///
    /// Failed ids map to an empty series and do not stop the batch. When
    /// cancelled, the ids processed so far are returned.
    pub async fn fetch_many<S, F>(
        &self,
        ids: &[S],
        mut on_progress: F,
        force_refresh: bool,
        cancel: &CancelToken,
    ) -> HashMap<String, Vec<DataPoint>>
    where
        S: AsRef<str>,
        F: FnMut(BatchProgress),
    {
        let _guard = RunningGuard::start(&self.running);
        let total = ids.len();
        let mut results = HashMap::with_capacity(total);

        logger::info(
            LogTag::Batch,
            &format!("Starting batch of {} pools (force_refresh={})", total, force_refresh),
        );

        for (index, id) in ids.iter().enumerate() {
            let id = id.as_ref();

            if cancel.is_cancelled() {
                logger::info(
                    LogTag::Batch,
                    &format!("Batch cancelled after {} of {} pools", index, total),
                );
                return results;
            }

            let status = match self.fetcher.fetch_with_cache_detailed(id, force_refresh).await {
                Ok(outcome) => {
                    let status = if outcome.from_cache() {
                        FetchStatus::Cached
                    } else {
                        FetchStatus::Fetching
                    };
                    results.insert(id.to_string(), outcome.points);
                    status
                }
                Err(e) => {
                    logger::error(LogTag::Batch, &format!("Failed to fetch {}: {}", id, e));
                    results.insert(id.to_string(), Vec::new());
                    FetchStatus::Error
                }
            };

            logger::debug(
                LogTag::Batch,
                &format!("[{}/{}] {} -> {}", index + 1, total, id, status),
            );
            on_progress(BatchProgress {
                current: index + 1,
                total,
                id: id.to_string(),
                status,
            });

            let is_last = index + 1 == total;
            if !is_last && !cancel.is_cancelled() {
                cancel.sleep(self.delay).await;
            }
        }

        logger::info(LogTag::Batch, &format!("Batch of {} pools finished", total));
        results
    }
}

/// Tally of progress events for a finished or cancelled run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub cached: usize,
    pub fetched: usize,
    pub failed: usize,
    pub failed_ids: Vec<String>,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, progress: &BatchProgress) {
        match progress.status {
            FetchStatus::Cached => self.cached += 1,
            FetchStatus::Fetching => self.fetched += 1,
            FetchStatus::Error => {
                self.failed += 1;
                self.failed_ids.push(progress.id.clone());
            }
        }
    }

    pub fn processed(&self) -> usize {
        self.cached + self.fetched + self.failed
    }

    /// Fewer ids settled than were requested
    pub fn cancelled(&self) -> bool {
        self.processed() < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryConfig;
    use crate::errors::HistoryResult;
    use crate::history::clock::{Clock, ManualClock};
    use crate::history::fetcher::test_support::MockChartSource;
    use crate::history::fetcher::ChartSource;
    use crate::history::storage::MemoryStorage;
    use crate::history::store::HistoryStore;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::time::Instant;

    fn pipeline(
        source: MockChartSource,
        delay: Duration,
    ) -> (Arc<BatchPipeline>, Arc<MockChartSource>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
        let store = Arc::new(HistoryStore::new(
            Arc::new(MemoryStorage::new(1024 * 1024)),
            clock.clone(),
            &HistoryConfig::default(),
            "history",
        ));
        let source = Arc::new(source);
        let fetcher = Arc::new(HistoryFetcher::new(source.clone(), store));
        (Arc::new(BatchPipeline::new(fetcher, delay)), source, clock)
    }

    fn series(clock: &ManualClock) -> Vec<DataPoint> {
        vec![DataPoint::new(clock.now() - ChronoDuration::days(1), 100.0, 3.0)]
    }

    #[tokio::test]
    async fn test_error_in_middle_does_not_stop_batch() {
        let (batch, source, clock) = pipeline(
            MockChartSource::default().failing_for("b"),
            Duration::from_millis(1),
        );
        source.series.lock().insert("a".to_string(), series(&clock));
        source.series.lock().insert("c".to_string(), series(&clock));

        let mut events = Vec::new();
        let results = batch
            .fetch_many(&["a", "b", "c"], |p| events.push(p), false, &CancelToken::new())
            .await;

        let statuses: Vec<FetchStatus> = events.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![FetchStatus::Fetching, FetchStatus::Error, FetchStatus::Fetching]
        );
        assert_eq!(events.iter().map(|p| p.current).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(events.iter().all(|p| p.total == 3));
        assert_eq!(results.len(), 3);
        assert!(results["b"].is_empty());
        assert_eq!(results["a"].len(), 1);
        assert_eq!(source.call_count(), 3);
        assert!(!batch.is_running());
    }

    #[tokio::test]
    async fn test_cached_ids_report_cached() {
        let (batch, source, _clock) = pipeline(MockChartSource::default(), Duration::from_millis(1));
        let token = CancelToken::new();

        batch.fetch_many(&["a"], |_| {}, false, &token).await;
        let mut events = Vec::new();
        batch.fetch_many(&["a"], |p| events.push(p), false, &token).await;

        assert_eq!(events[0].status, FetchStatus::Cached);
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_after_second_item_skips_rest() {
        let (batch, source, _clock) = pipeline(MockChartSource::default(), Duration::from_millis(5));
        let token = CancelToken::new();
        let canceller = token.clone();

        let mut events = Vec::new();
        let results = batch
            .fetch_many(
                &["p1", "p2", "p3", "p4", "p5"],
                |p| {
                    if p.current == 2 {
                        canceller.cancel();
                    }
                    events.push(p);
                },
                false,
                &token,
            )
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(results.len(), 2);
        assert!(results.contains_key("p1") && results.contains_key("p2"));
        assert_eq!(source.calls_for("p3"), 0);
        assert_eq!(source.calls_for("p4"), 0);
        assert_eq!(source.calls_for("p5"), 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_delay() {
        let (batch, source, _clock) = pipeline(MockChartSource::default(), Duration::from_secs(30));
        let token = CancelToken::new();
        let canceller = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let results = batch
            .fetch_many(&["p1", "p2"], |_| {}, false, &token)
            .await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(results.len(), 1);
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_fetch_is_kept_after_cancel() {
        /// Holds the request open until the batch is cancelled
        struct WaitsForCancel {
            token: CancelToken,
            calls: parking_lot::Mutex<Vec<String>>,
        }

        #[async_trait::async_trait]
        impl ChartSource for WaitsForCancel {
            async fn fetch_chart(&self, id: &str) -> HistoryResult<Vec<DataPoint>> {
                self.calls.lock().push(id.to_string());
                self.token.cancelled().await;
                let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
                Ok(vec![DataPoint::new(now - ChronoDuration::days(1), 100.0, 3.0)])
            }
        }

        let token = CancelToken::new();
        let source = Arc::new(WaitsForCancel {
            token: token.clone(),
            calls: parking_lot::Mutex::new(Vec::new()),
        });
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
        let store = Arc::new(HistoryStore::new(
            Arc::new(MemoryStorage::new(1024 * 1024)),
            clock,
            &HistoryConfig::default(),
            "history",
        ));
        let fetcher = Arc::new(HistoryFetcher::new(source.clone(), Arc::clone(&store)));
        let batch = BatchPipeline::new(fetcher, Duration::from_millis(1));

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let mut events = Vec::new();
        let results = batch
            .fetch_many(&["p1", "p2", "p3"], |p| events.push(p), false, &token)
            .await;

        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["p1"]);
        assert_eq!(results["p1"].len(), 1);
        assert_eq!(store.get("p1").map(|r| r.points.len()), Some(1));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, FetchStatus::Fetching);
        assert_eq!(*source.calls.lock(), vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (batch, source, _clock) = pipeline(MockChartSource::default(), Duration::from_millis(1));
        let ids: Vec<String> = Vec::new();
        let results = batch.fetch_many(&ids, |_| {}, false, &CancelToken::new()).await;
        assert!(results.is_empty());
        assert_eq!(source.call_count(), 0);
    }

    #[test]
    fn test_summary_tally() {
        let mut summary = BatchSummary::new(4);
        for (id, status) in [
            ("a", FetchStatus::Cached),
            ("b", FetchStatus::Fetching),
            ("c", FetchStatus::Error),
        ] {
            summary.record(&BatchProgress {
                current: 0,
                total: 4,
                id: id.to_string(),
                status,
            });
        }

        assert_eq!((summary.cached, summary.fetched, summary.failed), (1, 1, 1));
        assert_eq!(summary.failed_ids, vec!["c".to_string()]);
        assert!(summary.cancelled());
    }
}
