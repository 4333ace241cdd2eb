//! Host lifecycle hooks.
//!
//! Hosts call these from their own open/close/save/build/play events.  Live
//! cross-partition handles must never be serialized by the host, so saving
//! clears every loaded partition and the matching "saved" hook restores them.

use tracing::{debug, error};

use crate::diagnostics::Severity;
use crate::errors::CrossRefResult;
use crate::graph::PartitionHost;
use crate::models::PartitionStatus;
use crate::orchestrator::Orchestrator;
use crate::store::PartitionStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayModeChange {
    ExitingEditMode,
    EnteredPlayMode,
    ExitingPlayMode,
    EnteredEditMode,
}

impl PlayModeChange {
    pub fn is_entered(self) -> bool {
        matches!(
            self,
            PlayModeChange::EnteredPlayMode | PlayModeChange::EnteredEditMode
        )
    }
}

/// What the saving hook did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveDecision {
    /// Merged pairs were persisted.
    Saved(usize),
    /// Ignored partition, running build, or partition not loaded.
    Skipped,
    /// The partition cannot be saved in its current state.
    Rejected,
}

impl<H: PartitionHost, S: PartitionStore> Orchestrator<H, S> {
    /// Clear and restore every loaded partition.  Runs once; later calls are
    /// no-ops.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.clear_all();
        self.restore_all();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Exclude `path` from the saving hook, or include it again.
    pub fn ignore(&mut self, path: &str, ignore: bool) {
        if ignore {
            self.ignored.insert(path.to_string());
        } else {
            self.ignored.shift_remove(path);
        }
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored.contains(path)
    }

    pub fn is_building(&self) -> bool {
        self.building
    }

    pub fn on_partition_opened(&mut self, path: &str) {
        debug!("Partition opened: {path}");
        self.restore_all();
    }

    pub fn on_partition_closed(&mut self, path: &str) {
        debug!("Partition closed: {path}");
        self.restore_all();
    }

    /// Persist the merged reference set of `path`, then clear every loaded
    /// partition so the host serializes no live cross-partition handles.
    pub fn on_partition_saving(&mut self, path: &str) -> CrossRefResult<SaveDecision> {
        if self.building || self.ignored.contains(path) {
            return Ok(SaveDecision::Skipped);
        }
        let Some(partition) = self.host.partition(path) else {
            return Ok(SaveDecision::Skipped);
        };

        if !self.can_be_saved(path) {
            if self.status(path) == PartitionStatus::Restored {
                let message = format!(
                    "Cannot save cross-partition references in '{path}' since it had errors \
                     when last restored; resolve these to save new references"
                );
                error!("{message}");
                self.sink.report(Severity::Error, &message, None);
            }
            return Ok(SaveDecision::Rejected);
        }

        let merged = self.merge_on_save(&partition)?;
        let count = merged.len();
        self.save_unchecked(path, merged)?;
        self.clear_all();
        Ok(SaveDecision::Saved(count))
    }

    pub fn on_partition_saved(&mut self, path: &str) {
        debug!("Partition saved: {path}");
        self.restore_all();
    }

    /// Clear live bindings before a build, unless the build is only the host
    /// entering play mode.
    pub fn on_pre_build(&mut self, entering_play_mode: bool) {
        self.building = true;
        if !entering_play_mode {
            self.clear_all();
        }
    }

    pub fn on_post_build(&mut self) {
        self.building = false;
        self.restore_all();
    }

    pub fn on_play_mode_changed(&mut self, change: PlayModeChange) {
        debug!("Play mode changed: {change:?}");
        self.clear_all();
        if change.is_entered() {
            self.restore_all();
        }
    }
}
