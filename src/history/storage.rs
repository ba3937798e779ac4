// Storage backends for the history store
//
// A backend is a small string key/value medium with a byte quota. The store
// keeps its whole map under a single key, so a write either fits entirely
// or fails with `QuotaExceeded`.

use crate::errors::StorageError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

pub trait StorageBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Fails with `StorageError::QuotaExceeded` when the new value would push
    /// total usage past the quota; the previous value is kept in that case.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Bytes used by all keys and values
    fn used_bytes(&self) -> Result<usize, StorageError>;

    fn quota_bytes(&self) -> usize;
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

fn check_quota(key: &str, value: &str, used_by_others: usize, quota: usize) -> Result<(), StorageError> {
    let requested = entry_size(key, value);
    if used_by_others + requested > quota {
        return Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            requested,
            quota,
        });
    }
    Ok(())
}

// ==================== SQLite ====================

/// SQLite-backed key/value table
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    quota_bytes: usize,
}

impl SqliteStorage {
    /// Open (or create) the database file and its table
    pub fn new<P: AsRef<Path>>(path: P, quota_bytes: usize) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Backend(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn, quota_bytes)
    }

    pub fn in_memory(quota_bytes: usize) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?, quota_bytes)
    }

    fn from_connection(conn: Connection, quota_bytes: usize) -> Result<Self, StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            quota_bytes,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Backend(format!("Lock error: {}", e)))
    }
}

impl StorageBackend for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;

        let used_by_others: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM kv_store WHERE key != ?1",
            params![key],
            |row| row.get(0),
        )?;
        check_quota(key, value, used_by_others.max(0) as usize, self.quota_bytes)?;

        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn used_bytes(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let used: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM kv_store",
            [],
            |row| row.get(0),
        )?;
        Ok(used.max(0) as usize)
    }

    fn quota_bytes(&self) -> usize {
        self.quota_bytes
    }
}

// ==================== In-memory ====================

/// Process-local backend with the same quota rules as `SqliteStorage`
#[derive(Debug)]
pub struct MemoryStorage {
    data: parking_lot::Mutex<HashMap<String, String>>,
    quota_bytes: usize,
}

impl MemoryStorage {
    pub fn new(quota_bytes: usize) -> Self {
        Self {
            data: parking_lot::Mutex::new(HashMap::new()),
            quota_bytes,
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut data = self.data.lock();
        let used_by_others: usize = data
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| entry_size(k, v))
            .sum();
        check_quota(key, value, used_by_others, self.quota_bytes)?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.data.lock().remove(key);
        Ok(())
    }

    fn used_bytes(&self) -> Result<usize, StorageError> {
        Ok(self.data.lock().iter().map(|(k, v)| entry_size(k, v)).sum())
    }

    fn quota_bytes(&self) -> usize {
        self.quota_bytes
    }
}
