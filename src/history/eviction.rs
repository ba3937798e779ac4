// Quota recovery for store writes
//
// Only entered after a write was rejected for capacity. Policy, in order:
//   1. drop the `first_pass` oldest records (by fetchedAt) and retry
//   2. drop half of what is left (rounded up, oldest first) and retry
//   3. give up and surface the capacity error
// The record being written is never a candidate.

use super::storage::StorageBackend;
use super::types::{EvictionReport, EvictionStage, HistoryMap};
use crate::errors::{HistoryError, HistoryResult};
use crate::logger::{self, LogTag};

pub struct EvictionManager {
    first_pass: usize,
}

impl EvictionManager {
    pub fn new(first_pass: usize) -> Self {
        Self { first_pass }
    }

    /// Persist `records` under `key`, evicting from `records` as needed
    ///
    /// On success `records` reflects exactly what was written. On failure the
    /// backend still holds its previous value.
    pub fn write_with_eviction(
        &self,
        backend: &dyn StorageBackend,
        key: &str,
        records: &mut HistoryMap,
        protected_id: &str,
    ) -> HistoryResult<Option<EvictionReport>> {
        match try_write(backend, key, records) {
            Ok(()) => return Ok(None),
            Err(HistoryError::Capacity { requested, quota, .. }) => {
                logger::warning(
                    LogTag::Eviction,
                    &format!(
                        "Write of '{}' rejected ({} bytes, quota {}), evicting {} oldest of {} records",
                        key,
                        requested,
                        quota,
                        self.first_pass,
                        records.len()
                    ),
                );
            }
            Err(e) => return Err(e),
        }

        let mut evicted = remove_oldest(records, protected_id, self.first_pass);

        match try_write(backend, key, records) {
            Ok(()) => {
                logger::info(
                    LogTag::Eviction,
                    &format!("Recovered after evicting {} records", evicted.len()),
                );
                return Ok(Some(EvictionReport {
                    stage: EvictionStage::OldestBatch,
                    evicted,
                }));
            }
            Err(HistoryError::Capacity { .. }) => {}
            Err(e) => return Err(e),
        }

        let remaining = records.keys().filter(|id| id.as_str() != protected_id).count();
        let second_pass = (remaining + 1) / 2;
        logger::warning(
            LogTag::Eviction,
            &format!(
                "Still over quota, evicting {} of {} remaining records",
                second_pass, remaining
            ),
        );
        evicted.extend(remove_oldest(records, protected_id, second_pass));

        match try_write(backend, key, records) {
            Ok(()) => {
                logger::info(
                    LogTag::Eviction,
                    &format!("Recovered after evicting {} records", evicted.len()),
                );
                Ok(Some(EvictionReport {
                    stage: EvictionStage::HalfRemaining,
                    evicted,
                }))
            }
            Err(e) => {
                logger::error(
                    LogTag::Eviction,
                    &format!("Eviction could not recover capacity for '{}': {}", key, e),
                );
                Err(e)
            }
        }
    }
}

fn try_write(backend: &dyn StorageBackend, key: &str, records: &HistoryMap) -> HistoryResult<()> {
    let payload = serde_json::to_string(records)?;
    backend.set_item(key, &payload)?;
    Ok(())
}

/// Remove up to `count` records with the oldest `fetched_at`, skipping `protected_id`
fn remove_oldest(records: &mut HistoryMap, protected_id: &str, count: usize) -> Vec<String> {
    let mut candidates: Vec<(chrono::DateTime<chrono::Utc>, String)> = records
        .iter()
        .filter(|(id, _)| id.as_str() != protected_id)
        .map(|(id, record)| (record.fetched_at, id.clone()))
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .take(count)
        .map(|(_, id)| {
            records.remove(&id);
            logger::debug(LogTag::Eviction, &format!("Evicted {}", id));
            id
        })
        .collect()
}
