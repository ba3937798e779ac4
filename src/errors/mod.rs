/// Error types for the pool history engine
///
/// `HistoryError` is what every public operation returns; `StorageError` is
/// the narrower vocabulary of storage backends, converted at the store
/// boundary.
use thiserror::Error;

pub type HistoryResult<T> = Result<T, HistoryError>;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Network error fetching {id}: {message}")]
    Network { id: String, message: String },

    #[error("HTTP {status} fetching {id}")]
    Http { id: String, status: u16 },

    #[error("Invalid response for {id}: {message}")]
    InvalidResponse { id: String, message: String },

    #[error("Storage capacity exceeded writing '{key}': {requested} bytes requested, quota {quota} bytes")]
    Capacity {
        key: String,
        requested: usize,
        quota: usize,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HistoryError {
    /// Errors raised by the remote API rather than by local storage
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            HistoryError::Network { .. }
                | HistoryError::Http { .. }
                | HistoryError::InvalidResponse { .. }
        )
    }

    pub fn is_capacity(&self) -> bool {
        matches!(self, HistoryError::Capacity { .. })
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Quota exceeded for '{key}': {requested} bytes requested, quota {quota} bytes")]
    QuotaExceeded {
        key: String,
        requested: usize,
        quota: usize,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<StorageError> for HistoryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::QuotaExceeded {
                key,
                requested,
                quota,
            } => HistoryError::Capacity {
                key,
                requested,
                quota,
            },
            other => HistoryError::Storage(other.to_string()),
        }
    }
}
