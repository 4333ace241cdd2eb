//! Per-partition status table and the queries over it.

use std::fmt;

use indexmap::IndexMap;

use crate::graph::{EntityHandle, PartitionHost};
use crate::models::{PartitionStatus, ReferenceDescriptor, ResolutionOutcome};
use crate::orchestrator::Orchestrator;
use crate::store::PartitionStore;

/// Outcome recorded for one persisted variable during the last restore.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceRecord {
    pub outcome: ResolutionOutcome,
    /// Entity owning the variable, when the variable resolved.
    pub source: Option<EntityHandle>,
    pub component: Option<String>,
    pub member: Option<String>,
    pub index: Option<usize>,
}

impl ReferenceRecord {
    pub fn new(
        variable: &ReferenceDescriptor,
        outcome: ResolutionOutcome,
        source: Option<EntityHandle>,
    ) -> Self {
        Self {
            outcome,
            source,
            component: variable.component_type().map(str::to_string),
            member: variable.field().map(str::to_string),
            index: variable.slot().map(|s| s.index()),
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.outcome.is_success()
    }
}

impl fmt::Display for ReferenceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}",
            self.component.as_deref().unwrap_or_default(),
            self.member.as_deref().unwrap_or_default()
        )?;
        if let Some(index) = self.index {
            write!(f, " ({index})")?;
        }
        write!(f, ": {}", self.outcome)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PartitionReferenceState {
    pub status: PartitionStatus,
    pub records: IndexMap<ReferenceDescriptor, ReferenceRecord>,
}

impl PartitionReferenceState {
    pub fn has_errors(&self) -> bool {
        self.records.values().any(ReferenceRecord::is_failure)
    }

    pub(crate) fn reset_outcomes(&mut self) {
        for record in self.records.values_mut() {
            record.outcome = ResolutionOutcome::Succeeded;
        }
    }

    fn failures(&self) -> impl Iterator<Item = (&ReferenceDescriptor, &ReferenceRecord)> {
        self.records.iter().filter(|(_, r)| r.is_failure())
    }
}

impl<H: PartitionHost, S: PartitionStore> Orchestrator<H, S> {
    /// `Default` for partitions never restored or cleared.
    pub fn status(&self, path: &str) -> PartitionStatus {
        self.states
            .get(path)
            .map(|s| s.status)
            .unwrap_or_default()
    }

    pub fn has_errors(&self, path: &str) -> bool {
        self.states.get(path).is_some_and(|s| s.has_errors())
    }

    /// Saving is allowed only after a restore that left no failures.
    pub fn can_be_saved(&self, path: &str) -> bool {
        self.status(path) == PartitionStatus::Restored && !self.has_errors(path)
    }

    pub fn partition_state(&self, path: &str) -> Option<&PartitionReferenceState> {
        self.states.get(path)
    }

    /// Failed variables of a loaded partition.
    pub fn invalid_references(&self, path: &str) -> Vec<(ReferenceDescriptor, ReferenceRecord)> {
        if !self.host.is_loaded(path) {
            return Vec::new();
        }
        let Some(state) = self.states.get(path) else {
            return Vec::new();
        };
        state
            .failures()
            .map(|(d, r)| (d.clone(), r.clone()))
            .collect()
    }

    /// Failed variables owned by `entity`.
    pub fn invalid_references_for(
        &self,
        entity: &EntityHandle,
    ) -> Vec<(ReferenceDescriptor, ReferenceRecord)> {
        let Some(state) = self.states.get(&entity.partition_path()) else {
            return Vec::new();
        };
        state
            .failures()
            .filter(|(_, r)| r.source.as_ref() == Some(entity))
            .map(|(d, r)| (d.clone(), r.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Slot, StableId};
    use crate::orchestrator::tests::{discovered, scene, P, Q};

    #[test]
    fn test_record_display() {
        let variable = ReferenceDescriptor::new(P, StableId::new("a"))
            .with_field("targets")
            .with_component("Widget", 0)
            .with_slot(Some(Slot::Array(2)));
        let record = ReferenceRecord::new(&variable, ResolutionOutcome::TypeMismatch, None);
        assert_eq!(record.to_string(), "Widget.targets (2): TypeMismatch");
    }

    #[test]
    fn test_unknown_partition_defaults() {
        let s = scene();
        assert_eq!(s.orchestrator.status("Nowhere.scene"), PartitionStatus::Default);
        assert!(!s.orchestrator.has_errors("Nowhere.scene"));
        assert!(!s.orchestrator.can_be_saved("Nowhere.scene"));
        assert!(s.orchestrator.invalid_references("Nowhere.scene").is_empty());
    }

    #[test]
    fn test_invalid_references_by_partition_and_entity() {
        let mut s = scene();
        s.orchestrator.save_unchecked(P, discovered(&s.p)).unwrap();
        s.world.unload(Q);
        s.orchestrator.restore(P);

        let invalid = s.orchestrator.invalid_references(P);
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].1.outcome, ResolutionOutcome::PartitionNotLoaded);
        assert_eq!(invalid[0].1.member.as_deref(), Some("target"));

        assert_eq!(s.orchestrator.invalid_references_for(&s.source).len(), 1);
        assert!(s.orchestrator.invalid_references_for(&s.target).is_empty());

        // Unloaded partitions report nothing.
        s.world.unload(P);
        assert!(s.orchestrator.invalid_references(P).is_empty());
    }
}
