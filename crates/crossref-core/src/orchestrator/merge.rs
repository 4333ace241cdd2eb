//! Combining freshly discovered pairs with the persisted ones on save.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::discovery::find_cross_partition_references;
use crate::errors::CrossRefResult;
use crate::graph::{Partition, PartitionHost};
use crate::models::{ReferenceDescriptor, ReferencePair};
use crate::orchestrator::Orchestrator;
use crate::store::PartitionStore;

/// Merge `carried` and `discovered`, keyed by variable.
///
/// A discovered pair always wins.  A carried pair survives only while both
/// its variable and its value still evaluate cleanly, where a value in an
/// unloaded partition counts as valid.
pub fn merge_pairs<H: PartitionHost + ?Sized>(
    host: &H,
    carried: Vec<ReferencePair>,
    discovered: Vec<ReferencePair>,
) -> Vec<ReferencePair> {
    let mut merged: IndexMap<ReferenceDescriptor, ReferencePair> = IndexMap::new();

    for pair in carried {
        if pair.variable.is_valid(host, true) && pair.value.is_valid(host, true) {
            merged.insert(pair.variable.clone(), pair);
        } else {
            debug!("Dropping stale cross-partition reference {pair}");
        }
    }
    for pair in discovered {
        merged.insert(pair.variable.clone(), pair);
    }

    merged.into_values().collect()
}

impl<H: PartitionHost, S: PartitionStore> Orchestrator<H, S> {
    /// The set `partition` should persist: its current cross-partition
    /// references plus still-valid previously saved ones.
    pub fn merge_on_save(&self, partition: &Arc<Partition>) -> CrossRefResult<Vec<ReferencePair>> {
        let discovered: Vec<ReferencePair> =
            find_cross_partition_references(std::slice::from_ref(partition)).collect();
        let carried = self
            .load(partition.path())?
            .map(|c| c.references)
            .unwrap_or_default();
        Ok(merge_pairs(&self.host, carried, discovered))
    }
}
