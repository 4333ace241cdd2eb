//! Independently loadable partitions of the object graph.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::graph::identity::IdentityRegistry;
use crate::graph::EntityHandle;
use crate::models::StableId;

/// A loadable unit of entities with its own identity registry.
pub struct Partition {
    path: String,
    loaded: AtomicBool,
    roots: RwLock<Vec<EntityHandle>>,
    identities: RwLock<IdentityRegistry>,
}

impl Partition {
    /// Create a partition in the loaded state.
    pub fn new(path: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            loaded: AtomicBool::new(true),
            roots: RwLock::new(Vec::new()),
            identities: RwLock::new(IdentityRegistry::new()),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub(crate) fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::Release);
    }

    /// Add a root entity; it and its descendants become owned by this partition.
    pub fn add_root(self: &Arc<Self>, entity: &EntityHandle) {
        entity.attach(self);
        self.roots.write().push(entity.clone());
    }

    pub fn roots(&self) -> Vec<EntityHandle> {
        self.roots.read().clone()
    }

    /// Every entity in the partition, roots first, depth first.
    pub fn entities(&self) -> Vec<EntityHandle> {
        self.roots().iter().flat_map(|r| r.descendants()).collect()
    }

    /// Remove `entity` and its subtree, dropping their identities.
    pub fn destroy(&self, entity: &EntityHandle) -> bool {
        let removed = {
            let mut roots = self.roots.write();
            let before = roots.len();
            roots.retain(|r| r != entity);
            before != roots.len()
        } || self.entities().iter().any(|e| e.remove_child(entity));

        if removed {
            let mut identities = self.identities.write();
            for e in entity.descendants() {
                identities.forget(&e);
            }
        }
        removed
    }

    // -- identities ---------------------------------------------------------

    pub fn bind_identity(&self, id: StableId, entity: &EntityHandle) {
        self.identities.write().bind(id, entity);
    }

    pub fn identity_of(&self, entity: &EntityHandle) -> Option<StableId> {
        self.identities.read().id_of(entity)
    }

    pub fn get_or_create_identity(&self, entity: &EntityHandle) -> StableId {
        self.identities.write().get_or_create(&self.path, entity)
    }

    pub fn resolve_identity(&self, id: &StableId) -> Option<EntityHandle> {
        self.identities.read().resolve(id)
    }

    /// Snapshot of the identity map, sorted by id, for persisting.
    pub fn identities(&self) -> Vec<(StableId, EntityHandle)> {
        self.identities.read().entries()
    }
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("path", &self.path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_root_attaches_subtree() {
        let p = Partition::new("Assets/A.scene");
        let root = EntityHandle::new("root");
        let child = EntityHandle::new("child");
        root.add_child(&child);
        p.add_root(&root);

        assert_eq!(child.partition_path(), "Assets/A.scene");
        assert_eq!(p.entities(), vec![root, child.clone()]);

        let late = EntityHandle::new("late");
        child.add_child(&late);
        assert_eq!(late.partition_path(), "Assets/A.scene");
    }

    #[test]
    fn test_unloaded_partition_makes_handles_stale() {
        let p = Partition::new("Assets/A.scene");
        let e = EntityHandle::new("e");
        p.add_root(&e);
        assert!(e.is_alive());
        p.set_loaded(false);
        assert!(!e.is_alive());
    }

    #[test]
    fn test_destroy_forgets_identities() {
        let p = Partition::new("Assets/A.scene");
        let root = EntityHandle::new("root");
        let child = EntityHandle::new("child");
        root.add_child(&child);
        p.add_root(&root);
        let id = p.get_or_create_identity(&child);

        assert!(p.destroy(&child));
        assert!(p.resolve_identity(&id).is_none());
        assert_eq!(p.entities(), vec![root]);
        assert!(!p.destroy(&child));
    }
}
