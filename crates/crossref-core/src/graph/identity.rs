//! Per-partition stable identity map.

use std::collections::HashMap;

use crate::graph::EntityHandle;
use crate::models::StableId;

/// Bidirectional `StableId <-> entity` map owned by one partition.
///
/// Ids are never reused: binding a new id to an entity retires the old
/// mapping, and forgetting an entity does not free its id for minting.
#[derive(Default)]
pub struct IdentityRegistry {
    by_id: HashMap<StableId, EntityHandle>,
    by_instance: HashMap<u64, StableId>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a persisted id to a freshly loaded entity.
    pub fn bind(&mut self, id: StableId, entity: &EntityHandle) {
        if let Some(previous) = self.by_instance.insert(entity.instance(), id.clone()) {
            if previous != id {
                self.by_id.remove(&previous);
            }
        }
        self.by_id.insert(id, entity.clone());
    }

    pub fn id_of(&self, entity: &EntityHandle) -> Option<StableId> {
        self.by_instance.get(&entity.instance()).cloned()
    }

    /// Existing id for `entity`, or a newly minted and bound one.
    pub fn get_or_create(&mut self, partition_path: &str, entity: &EntityHandle) -> StableId {
        if let Some(id) = self.id_of(entity) {
            return id;
        }
        let id = StableId::mint(partition_path, entity.name(), entity.instance());
        self.bind(id.clone(), entity);
        id
    }

    pub fn resolve(&self, id: &StableId) -> Option<EntityHandle> {
        self.by_id.get(id).cloned()
    }

    pub fn forget(&mut self, entity: &EntityHandle) {
        if let Some(id) = self.by_instance.remove(&entity.instance()) {
            self.by_id.remove(&id);
        }
    }

    pub fn entries(&self) -> Vec<(StableId, EntityHandle)> {
        let mut entries: Vec<(StableId, EntityHandle)> = self
            .by_id
            .iter()
            .map(|(id, e)| (id.clone(), e.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
