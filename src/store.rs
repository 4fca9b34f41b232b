//! In-memory store of the latest health record per resource.

use ahash::AHashMap as HashMap;
use std::sync::{PoisonError, RwLock};

use crate::health::HealthRecord;

/// Latest `HealthRecord` keyed by canonical resource identifier.
///
/// Records are replaced as a whole, so readers never see a record mixing
/// fields of two observations. Snapshots are copies and are not affected by
/// later writes.
#[derive(Default)]
pub struct HealthStore {
    records: RwLock<HashMap<String, HealthRecord>>,
}

impl HealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record for `record.id`.
    pub fn upsert(&self, record: HealthRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.id.clone(), record);
    }

    /// Returns a copy of all records, ordered by resource identifier.
    pub fn snapshot(&self) -> Vec<HealthRecord> {
        let mut snapshot: Vec<HealthRecord> = {
            let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
            records.values().cloned().collect()
        };
        snapshot.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot
    }

    pub fn get(&self, id: &str) -> Option<HealthRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
