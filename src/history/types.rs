// Core types for the pool history module

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Decoded store contents: pool id -> series record
pub type HistoryMap = HashMap<String, SeriesRecord>;

/// One daily observation of a pool, as delivered by the chart endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub tvl_usd: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub apy: f64,
    #[serde(default)]
    pub apy_base: Option<f64>,
    #[serde(default)]
    pub apy_reward: Option<f64>,
}

impl DataPoint {
    pub fn new(timestamp: DateTime<Utc>, tvl_usd: f64, apy: f64) -> Self {
        Self {
            timestamp,
            tvl_usd,
            apy,
            apy_base: None,
            apy_reward: None,
        }
    }

    pub fn with_split(mut self, apy_base: Option<f64>, apy_reward: Option<f64>) -> Self {
        self.apy_base = apy_base;
        self.apy_reward = apy_reward;
        self
    }

    /// Base yield, falling back to total APY when the split is unknown
    pub fn base_apy(&self) -> f64 {
        self.apy_base.unwrap_or(self.apy)
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Stored series for one pool
///
/// `points` is ascending by timestamp and only covers the retention window
/// that applied when the record was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRecord {
    pub id: String,
    pub points: Vec<DataPoint>,
    pub fetched_at: DateTime<Utc>,
}

impl SeriesRecord {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

/// Derived risk/return statistics for one pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMetrics {
    /// Mean base APY over the trailing 90 days
    pub base90: f64,
    /// Population standard deviation of base APY over the same window
    pub volatility: f64,
    /// Share of total APY that is base yield, 0..=100
    pub organic_pct: u8,
    /// TVL change over the trailing 30 days, percent, 1 decimal
    pub tvl_change_30d: f64,
    /// 2 decimals
    pub risk_adjusted_yield: f64,
    /// Length of the full stored series
    pub data_points: usize,
    pub oldest_date: NaiveDate,
}

/// Per-id result reported by the batch pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// Served from a fresh stored record
    Cached,
    /// Fetched from the API and written to the store
    Fetching,
    Error,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Cached => "cached",
            FetchStatus::Fetching => "fetching",
            FetchStatus::Error => "error",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// 1-based position of `id` in the batch
    pub current: usize,
    pub total: usize,
    pub id: String,
    pub status: FetchStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionStage {
    /// The fixed-size batch of oldest records was enough
    OldestBatch,
    /// Half of the remaining records had to go as well
    HalfRemaining,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionReport {
    pub stage: EvictionStage,
    /// Evicted ids, oldest first
    pub evicted: Vec<String>,
}

/// Result of a successful store write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub generation: u64,
    /// Other records dropped because their TTL had run out
    pub pruned: Vec<String>,
    /// Present only when the write needed eviction to fit
    pub eviction: Option<EvictionReport>,
}

impl WriteOutcome {
    pub fn recovered_from_pressure(&self) -> bool {
        self.eviction.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub records: usize,
    pub total_points: usize,
    pub stale_records: usize,
    pub bytes: usize,
    pub oldest_fetch: Option<DateTime<Utc>>,
    pub newest_fetch: Option<DateTime<Utc>>,
}
