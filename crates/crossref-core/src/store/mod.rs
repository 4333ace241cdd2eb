//! Keyed per-partition persistence.
//!
//! Records are JSON text keyed by `(partition, key)`.  The typed helpers
//! layer serde on top of the raw methods.

pub mod database;
pub mod memory;
pub mod schema;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::CrossRefResult;

pub use database::SqliteStore;
pub use memory::MemoryStore;

/// External key-value store holding data per partition.
pub trait PartitionStore {
    fn get_raw(&self, partition: &str, key: &str) -> CrossRefResult<Option<String>>;

    fn set_raw(&self, partition: &str, key: &str, value: &str) -> CrossRefResult<()>;

    /// Remove the record.  Missing records are not an error.
    fn unset(&self, partition: &str, key: &str) -> CrossRefResult<()>;

    /// Every `(partition, value)` stored under `key`.
    fn enumerate_raw(&self, key: &str) -> CrossRefResult<Vec<(String, String)>>;

    fn get<T: DeserializeOwned>(&self, partition: &str, key: &str) -> CrossRefResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get_raw(partition, key)? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn set<T: Serialize>(&self, partition: &str, key: &str, value: &T) -> CrossRefResult<()>
    where
        Self: Sized,
    {
        let text = serde_json::to_string(value)?;
        self.set_raw(partition, key, &text)
    }

    fn enumerate_all<T: DeserializeOwned>(&self, key: &str) -> CrossRefResult<Vec<T>>
    where
        Self: Sized,
    {
        self.enumerate_raw(key)?
            .into_iter()
            .map(|(_, text)| serde_json::from_str(&text).map_err(Into::into))
            .collect()
    }
}

impl<S: PartitionStore + ?Sized> PartitionStore for std::sync::Arc<S> {
    fn get_raw(&self, partition: &str, key: &str) -> CrossRefResult<Option<String>> {
        (**self).get_raw(partition, key)
    }

    fn set_raw(&self, partition: &str, key: &str, value: &str) -> CrossRefResult<()> {
        (**self).set_raw(partition, key, value)
    }

    fn unset(&self, partition: &str, key: &str) -> CrossRefResult<()> {
        (**self).unset(partition, key)
    }

    fn enumerate_raw(&self, key: &str) -> CrossRefResult<Vec<(String, String)>> {
        (**self).enumerate_raw(key)
    }
}
