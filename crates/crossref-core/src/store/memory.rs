//! In-process partition store.

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::errors::CrossRefResult;
use crate::store::PartitionStore;

/// Store backed by an insertion-ordered map.  Useful for hosts that persist
/// elsewhere and for tests.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<IndexMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl PartitionStore for MemoryStore {
    fn get_raw(&self, partition: &str, key: &str) -> CrossRefResult<Option<String>> {
        let records = self.records.lock();
        Ok(records
            .get(&(partition.to_string(), key.to_string()))
            .cloned())
    }

    fn set_raw(&self, partition: &str, key: &str, value: &str) -> CrossRefResult<()> {
        self.records
            .lock()
            .insert((partition.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn unset(&self, partition: &str, key: &str) -> CrossRefResult<()> {
        self.records
            .lock()
            .shift_remove(&(partition.to_string(), key.to_string()));
        Ok(())
    }

    fn enumerate_raw(&self, key: &str) -> CrossRefResult<Vec<(String, String)>> {
        let records = self.records.lock();
        Ok(records
            .iter()
            .filter(|((_, k), _)| k == key)
            .map(|((partition, _), value)| (partition.clone(), value.clone()))
            .collect())
    }
}
