// Short-lived decoded copy of the whole store
//
// Several reads in quick succession (a table rendering every row, a bulk
// metrics sort) would otherwise decode the full JSON map once per read.
// Reads that land before `invalidate` may see the previous snapshot; every
// store write invalidates synchronously, so the next read is fresh.

use super::clock::Clock;
use super::types::HistoryMap;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

struct MirrorSlot {
    loaded_at: DateTime<Utc>,
    records: Arc<HistoryMap>,
}

pub struct StoreMirror {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<MirrorSlot>>,
}

impl StoreMirror {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            slot: Mutex::new(None),
        }
    }

    /// Return the mirrored map, reloading through `load` once it has expired
    pub fn get_or_load<F>(&self, load: F) -> Arc<HistoryMap>
    where
        F: FnOnce() -> HistoryMap,
    {
        let now = self.clock.now();
        let mut slot = self.slot.lock();

        if let Some(current) = slot.as_ref() {
            let age = now - current.loaded_at;
            if age >= Duration::zero() && age < self.ttl {
                return Arc::clone(&current.records);
            }
        }

        let records = Arc::new(load());
        *slot = Some(MirrorSlot {
            loaded_at: now,
            records: Arc::clone(&records),
        });
        records
    }

    pub fn invalidate(&self) {
        *self.slot.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::clock::ManualClock;
    use std::cell::Cell;

    fn mirror_with_clock() -> (StoreMirror, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mirror = StoreMirror::new(Duration::milliseconds(1000), clock.clone());
        (mirror, clock)
    }

    #[test]
    fn test_reuses_snapshot_within_ttl() {
        let (mirror, clock) = mirror_with_clock();
        let loads = Cell::new(0);

        mirror.get_or_load(|| {
            loads.set(loads.get() + 1);
            HistoryMap::new()
        });
        clock.advance(Duration::milliseconds(500));
        mirror.get_or_load(|| {
            loads.set(loads.get() + 1);
            HistoryMap::new()
        });

        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn test_reloads_after_ttl() {
        let (mirror, clock) = mirror_with_clock();
        let loads = Cell::new(0);

        mirror.get_or_load(|| {
            loads.set(loads.get() + 1);
            HistoryMap::new()
        });
        clock.advance(Duration::milliseconds(1000));
        mirror.get_or_load(|| {
            loads.set(loads.get() + 1);
            HistoryMap::new()
        });

        assert_eq!(loads.get(), 2);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let (mirror, _clock) = mirror_with_clock();
        let loads = Cell::new(0);

        mirror.get_or_load(|| {
            loads.set(loads.get() + 1);
            HistoryMap::new()
        });
        mirror.invalidate();
        mirror.get_or_load(|| {
            loads.set(loads.get() + 1);
            HistoryMap::new()
        });

        assert_eq!(loads.get(), 2);
    }
}
