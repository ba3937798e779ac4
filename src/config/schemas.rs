/// Configuration schemas - every section defined once with its defaults
///
/// Each struct is declared with `config_struct!`, so a TOML file only has to
/// mention the values it changes.
use crate::config_struct;
use chrono::Duration;

// ============================================================================
// HISTORY CONFIGURATION
// ============================================================================

config_struct! {
    /// Freshness and windowing rules for cached pool series
    pub struct HistoryConfig {
        /// A stored series is stale once it is this old
        ttl_hours: i64 = 24,

        /// Points older than this (relative to the write instant) are trimmed
        window_days: i64 = 90,

        /// Lifetime of the decoded in-memory mirror of the store
        mirror_ttl_ms: u64 = 1000,

        /// Records removed by the first eviction pass
        eviction_first_pass: usize = 10,
    }
}

impl HistoryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::hours(self.ttl_hours)
    }

    pub fn window(&self) -> Duration {
        Duration::days(self.window_days)
    }

    pub fn mirror_ttl(&self) -> Duration {
        Duration::milliseconds(self.mirror_ttl_ms as i64)
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

config_struct! {
    /// Remote yields API
    pub struct ApiConfig {
        base_url: String = "https://yields.llama.fi".to_string(),
        timeout_secs: u64 = 20,
    }
}

// ============================================================================
// BATCH CONFIGURATION
// ============================================================================

config_struct! {
    /// Batch pipeline pacing
    pub struct BatchConfig {
        /// Fixed wait between two consecutive ids of a batch
        delay_ms: u64 = 1500,
    }
}

impl BatchConfig {
    pub fn delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.delay_ms)
    }
}

// ============================================================================
// STORAGE CONFIGURATION
// ============================================================================

config_struct! {
    /// Durable storage for the history map
    pub struct StorageConfig {
        database_path: String = "data/pool_history.db".to_string(),

        /// Key under which the whole serialized map lives
        storage_key: String = "pool_history_cache".to_string(),

        /// Byte budget shared by all keys in the store
        quota_bytes: usize = 5 * 1024 * 1024,
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    pub struct Config {
        history: HistoryConfig = HistoryConfig::default(),
        api: ApiConfig = ApiConfig::default(),
        batch: BatchConfig = BatchConfig::default(),
        storage: StorageConfig = StorageConfig::default(),
    }
}
