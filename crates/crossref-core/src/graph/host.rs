//! Partition lifecycle queries consumed by resolution and orchestration.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::graph::partition::Partition;

/// Host view of which partitions are currently loaded.
pub trait PartitionHost {
    /// The loaded partition at `path`, if any.
    fn partition(&self, path: &str) -> Option<Arc<Partition>>;

    /// All loaded partitions in host order.
    fn loaded_partitions(&self) -> Vec<Arc<Partition>>;

    fn is_loaded(&self, path: &str) -> bool {
        self.partition(path).is_some()
    }
}

impl<H: PartitionHost + ?Sized> PartitionHost for Arc<H> {
    fn partition(&self, path: &str) -> Option<Arc<Partition>> {
        (**self).partition(path)
    }

    fn loaded_partitions(&self) -> Vec<Arc<Partition>> {
        (**self).loaded_partitions()
    }
}

impl<H: PartitionHost + ?Sized> PartitionHost for &H {
    fn partition(&self, path: &str) -> Option<Arc<Partition>> {
        (**self).partition(path)
    }

    fn loaded_partitions(&self) -> Vec<Arc<Partition>> {
        (**self).loaded_partitions()
    }
}

/// In-memory host keeping loaded partitions in load order.
#[derive(Default)]
pub struct World {
    partitions: RwLock<IndexMap<String, Arc<Partition>>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `partition`, replacing (and unloading) any previous instance at
    /// the same path.  Returns the replaced instance; loading an instance
    /// that is already loaded returns `None` and leaves it loaded.
    pub fn load(&self, partition: Arc<Partition>) -> Option<Arc<Partition>> {
        partition.set_loaded(true);
        debug!("Loading partition {}", partition.path());
        let previous = self
            .partitions
            .write()
            .insert(partition.path().to_string(), partition.clone());
        match previous {
            Some(old) if !Arc::ptr_eq(&old, &partition) => {
                old.set_loaded(false);
                Some(old)
            }
            _ => None,
        }
    }

    pub fn unload(&self, path: &str) -> Option<Arc<Partition>> {
        let removed = self.partitions.write().shift_remove(path);
        if let Some(partition) = &removed {
            debug!("Unloading partition {}", path);
            partition.set_loaded(false);
        }
        removed
    }
}

impl PartitionHost for World {
    fn partition(&self, path: &str) -> Option<Arc<Partition>> {
        self.partitions
            .read()
            .get(path)
            .filter(|p| p.is_loaded())
            .cloned()
    }

    fn loaded_partitions(&self) -> Vec<Arc<Partition>> {
        self.partitions
            .read()
            .values()
            .filter(|p| p.is_loaded())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityHandle;

    #[test]
    fn test_load_and_unload() {
        let world = World::new();
        let a = Partition::new("A.scene");
        let b = Partition::new("B.scene");
        world.load(a.clone());
        world.load(b);

        assert!(world.is_loaded("A.scene"));
        let paths: Vec<String> = world
            .loaded_partitions()
            .iter()
            .map(|p| p.path().to_string())
            .collect();
        assert_eq!(paths, vec!["A.scene", "B.scene"]);

        world.unload("A.scene");
        assert!(!world.is_loaded("A.scene"));
        assert!(!a.is_loaded());
        assert!(world.unload("A.scene").is_none());
    }

    #[test]
    fn test_reload_stales_old_instance() {
        let world = World::new();
        let first = Partition::new("A.scene");
        let e = EntityHandle::new("e");
        first.add_root(&e);
        world.load(first);

        world.load(Partition::new("A.scene"));
        assert!(!e.is_alive());
        assert!(world.is_loaded("A.scene"));
    }

    #[test]
    fn test_loading_same_instance_twice_keeps_it_loaded() {
        let world = World::new();
        let a = Partition::new("A.scene");
        let e = EntityHandle::new("e");
        a.add_root(&e);

        assert!(world.load(a.clone()).is_none());
        assert!(world.load(a.clone()).is_none());
        assert!(world.is_loaded("A.scene"));
        assert!(a.is_loaded());
        assert!(e.is_alive());
        assert_eq!(world.loaded_partitions().len(), 1);
    }
}
