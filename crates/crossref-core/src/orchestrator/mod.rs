//! Per-partition restore status, persistence and host lifecycle wiring.
//!
//! The orchestrator owns the status table and the per-pair outcome map for
//! every partition it has seen.  All mutating operations take `&mut self`;
//! the host and store it talks to are injected.

pub mod lifecycle;
pub mod merge;
pub mod restore;
pub mod status;

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, error, info, warn};

use crate::config::CrossRefConfig;
use crate::diagnostics::{DiagnosticSink, Severity, TracingSink};
use crate::errors::{CrossRefError, CrossRefResult};
use crate::graph::PartitionHost;
use crate::models::{
    PartitionReferenceCollection, PartitionStatus, ReferencePair, REFERENCES_KEY,
};
use crate::store::PartitionStore;

pub use lifecycle::{PlayModeChange, SaveDecision};
pub use merge::merge_pairs;
pub use restore::{PairRestoreResult, RestorePass, RestoreStep};
pub use status::{PartitionReferenceState, ReferenceRecord};

type SavedCallback = Box<dyn Fn(&PartitionReferenceCollection) + Send + Sync>;

pub struct Orchestrator<H: PartitionHost, S: PartitionStore> {
    host: H,
    store: S,
    config: CrossRefConfig,
    sink: Arc<dyn DiagnosticSink + Send + Sync>,
    states: IndexMap<String, PartitionReferenceState>,
    saved_subscribers: Vec<SavedCallback>,
    ignored: IndexSet<String>,
    building: bool,
    initialized: bool,
}

impl<H: PartitionHost, S: PartitionStore> Orchestrator<H, S> {
    pub fn new(host: H, store: S) -> Self {
        Self {
            host,
            store,
            config: CrossRefConfig::default(),
            sink: Arc::new(TracingSink),
            states: IndexMap::new(),
            saved_subscribers: Vec::new(),
            ignored: IndexSet::new(),
            building: false,
            initialized: false,
        }
    }

    pub fn with_config(mut self, config: CrossRefConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink + Send + Sync>) -> Self {
        self.sink = sink;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CrossRefConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CrossRefConfig {
        &mut self.config
    }

    /// Register a callback fired after every successful save.
    pub fn subscribe_saved<F>(&mut self, callback: F)
    where
        F: Fn(&PartitionReferenceCollection) + Send + Sync + 'static,
    {
        self.saved_subscribers.push(Box::new(callback));
    }

    // -- persistence ------------------------------------------------------

    /// The persisted collection for `path`, if one was ever saved.
    pub fn load(&self, path: &str) -> CrossRefResult<Option<PartitionReferenceCollection>> {
        self.store.get(path, REFERENCES_KEY)
    }

    /// Every persisted collection that holds at least one pair.
    pub fn enumerate(&self) -> CrossRefResult<Vec<PartitionReferenceCollection>> {
        let all: Vec<PartitionReferenceCollection> = self.store.enumerate_all(REFERENCES_KEY)?;
        Ok(all.into_iter().filter(|c| !c.is_empty()).collect())
    }

    /// Persist `pairs` as the complete set for `path`.
    ///
    /// Rejected unless the partition was restored without errors; use
    /// [`save_unchecked`](Self::save_unchecked) to bypass the check.
    pub fn save(&mut self, path: &str, pairs: Vec<ReferencePair>) -> CrossRefResult<()> {
        if !self.can_be_saved(path) {
            let err = CrossRefError::SaveRejected {
                partition: path.to_string(),
                status: self.status(path),
                has_errors: self.has_errors(path),
            };
            error!("{err}");
            self.sink.report(Severity::Error, &err.to_string(), None);
            return Err(err);
        }
        self.save_unchecked(path, pairs)
    }

    pub fn save_unchecked(&mut self, path: &str, pairs: Vec<ReferencePair>) -> CrossRefResult<()> {
        let collection = PartitionReferenceCollection::new(path, pairs);
        self.store.set(path, REFERENCES_KEY, &collection)?;
        info!(
            "Saved {} cross-partition references for {path}",
            collection.references.len()
        );

        if let Some(state) = self.states.get_mut(path) {
            state.reset_outcomes();
        }
        for callback in &self.saved_subscribers {
            callback(&collection);
        }
        Ok(())
    }

    /// Drop the persisted pair whose variable matches `pair.variable`.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, pair: &ReferencePair) -> CrossRefResult<bool> {
        let path = pair.variable.partition_path();
        let Some(mut collection) = self.load(path)? else {
            return Ok(false);
        };
        let Some(index) = collection
            .references
            .iter()
            .position(|r| r.variable == pair.variable)
        else {
            return Ok(false);
        };

        collection.references.remove(index);
        self.store.set(path, REFERENCES_KEY, &collection)?;
        for state in self.states.values_mut() {
            state.records.shift_remove(&pair.variable);
        }
        debug!("Removed cross-partition reference {}", pair.variable);
        Ok(true)
    }

    /// Forget every persisted pair for `path`.
    pub fn remove_partition(&mut self, path: &str) -> CrossRefResult<()> {
        self.store.unset(path, REFERENCES_KEY)?;
        debug!("Removed all cross-partition references for {path}");
        Ok(())
    }

    /// Write "no value" through every persisted variable of `path`, then
    /// mark it `Cleared`.
    pub fn clear_partition(&mut self, path: &str) {
        for pair in self.load_or_empty(path) {
            let cleared = pair.variable.clear(&self.host);
            if !cleared.is_success() {
                debug!("Could not clear {}: {}", pair.variable, cleared.outcome);
            }
        }
        self.state_mut(path).status = PartitionStatus::Cleared;
    }

    /// Clear every loaded partition.
    pub fn clear_all(&mut self) {
        for partition in self.host.loaded_partitions() {
            self.clear_partition(partition.path());
        }
    }

    /// Persisted pairs for `path`.  Read failures are logged and treated as
    /// an empty collection.
    fn load_or_empty(&self, path: &str) -> Vec<ReferencePair> {
        match self.load(path) {
            Ok(Some(collection)) => collection.references,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Could not load cross-partition references for {path}: {e}");
                Vec::new()
            }
        }
    }

    fn state_mut(&mut self, path: &str) -> &mut PartitionReferenceState {
        self.states.entry(path.to_string()).or_default()
    }
}
