// Pool History Module
// Caches per-pool daily TVL/APY series, fetches them with rate-limited
// batches, and derives risk/return metrics from the stored history.

mod batch;
mod cancel;
mod clock;
mod eviction;
mod fetcher;
mod metrics;
mod metrics_cache;
mod mirror;
mod service;
mod storage;
mod store;
mod types;

pub use batch::{BatchPipeline, BatchSummary};
pub use cancel::CancelToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use eviction::EvictionManager;
pub use fetcher::{ChartSource, FetchOrigin, FetchOutcome, HistoryFetcher};
pub use metrics::{calculate as calculate_metrics, round_to, MIN_DATA_POINTS};
pub use metrics_cache::{CacheMetrics, MetricsCache};
pub use mirror::StoreMirror;
pub use service::HistoryService;
pub use storage::{MemoryStorage, SqliteStorage, StorageBackend};
pub use store::{GenerationCounter, HistoryStore, InvalidationScope, StoreListener};
pub use types::{
    BatchProgress, DataPoint, EvictionReport, EvictionStage, FetchStatus, HistoryMap,
    PoolMetrics, SeriesRecord, StoreStats, WriteOutcome,
};
