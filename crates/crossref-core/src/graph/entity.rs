//! Live handles to entities and their components.
//!
//! Handles are cheap `Arc` clones.  Equality is instance identity: a
//! reloaded partition produces new handles that never compare equal to the
//! old ones, even when they carry the same stable id.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::graph::fields::{find_field, ComponentType, FieldDecl, FieldValue, ReferenceableFields};
use crate::graph::partition::Partition;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

fn next_instance() -> u64 {
    NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// EntityHandle
// ---------------------------------------------------------------------------

struct EntityData {
    instance: u64,
    name: String,
    /// `None` for detached entities (templates, assets).
    owner: RwLock<Option<Weak<Partition>>>,
    components: RwLock<Vec<ComponentHandle>>,
    children: RwLock<Vec<EntityHandle>>,
}

/// An addressable object owning components and child entities.
#[derive(Clone)]
pub struct EntityHandle(Arc<EntityData>);

impl EntityHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(EntityData {
            instance: next_instance(),
            name: name.into(),
            owner: RwLock::new(None),
            components: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Process-unique instance number.
    pub fn instance(&self) -> u64 {
        self.0.instance
    }

    pub fn add_component(&self, fields: impl ReferenceableFields) -> ComponentHandle {
        let handle = ComponentHandle(Arc::new(ComponentData {
            instance: next_instance(),
            owner: Arc::downgrade(&self.0),
            ty: fields.component_type().clone(),
            fields: RwLock::new(Box::new(fields)),
        }));
        self.0.components.write().push(handle.clone());
        handle
    }

    pub fn components(&self) -> Vec<ComponentHandle> {
        self.0.components.read().clone()
    }

    /// Components that are, or derive from, `type_name`, in declaration order.
    pub fn components_of_type(&self, type_name: &str) -> Vec<ComponentHandle> {
        self.0
            .components
            .read()
            .iter()
            .filter(|c| c.is_a(type_name))
            .cloned()
            .collect()
    }

    /// Position of `component` among the components sharing its concrete type.
    pub fn component_index(&self, component: &ComponentHandle) -> Option<usize> {
        self.components_of_type(component.type_name())
            .iter()
            .position(|c| c == component)
    }

    /// Parent `child` under this entity.  Returns `false`, changing nothing,
    /// when `child` is this entity or one of its ancestors.
    pub fn add_child(&self, child: &EntityHandle) -> bool {
        if child.descendants().contains(self) {
            debug!(
                "Refusing to parent {} under its own descendant {}",
                child.name(),
                self.name()
            );
            return false;
        }
        let owner = self.0.owner.read().clone();
        child.set_owner(owner);
        self.0.children.write().push(child.clone());
        true
    }

    pub(crate) fn remove_child(&self, child: &EntityHandle) -> bool {
        let mut children = self.0.children.write();
        let before = children.len();
        children.retain(|c| c != child);
        before != children.len()
    }

    pub fn children(&self) -> Vec<EntityHandle> {
        self.0.children.read().clone()
    }

    /// This entity followed by all descendants, depth first.
    pub fn descendants(&self) -> Vec<EntityHandle> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(entity) = stack.pop() {
            let children = entity.children();
            out.push(entity);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    pub fn partition(&self) -> Option<Arc<Partition>> {
        self.0.owner.read().as_ref().and_then(Weak::upgrade)
    }

    /// Owning partition path, or `""` for detached entities.
    pub fn partition_path(&self) -> String {
        self.partition()
            .map(|p| p.path().to_string())
            .unwrap_or_default()
    }

    /// `false` once the owning partition has been unloaded or dropped.
    pub fn is_alive(&self) -> bool {
        match self.0.owner.read().as_ref() {
            None => true,
            Some(weak) => weak.upgrade().is_some_and(|p| p.is_loaded()),
        }
    }

    pub(crate) fn attach(&self, partition: &Arc<Partition>) {
        self.set_owner(Some(Arc::downgrade(partition)));
    }

    fn set_owner(&self, owner: Option<Weak<Partition>>) {
        for entity in self.descendants() {
            *entity.0.owner.write() = owner.clone();
        }
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for EntityHandle {}

impl Hash for EntityHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.instance.hash(state);
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHandle")
            .field("name", &self.0.name)
            .field("instance", &self.0.instance)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentHandle
// ---------------------------------------------------------------------------

struct ComponentData {
    instance: u64,
    owner: Weak<EntityData>,
    ty: ComponentType,
    fields: RwLock<Box<dyn ReferenceableFields>>,
}

/// A typed sub-object of an entity.
#[derive(Clone)]
pub struct ComponentHandle(Arc<ComponentData>);

impl ComponentHandle {
    pub fn instance(&self) -> u64 {
        self.0.instance
    }

    pub fn entity(&self) -> Option<EntityHandle> {
        self.0.owner.upgrade().map(EntityHandle)
    }

    pub fn component_type(&self) -> &ComponentType {
        &self.0.ty
    }

    pub fn type_name(&self) -> &str {
        self.0.ty.name()
    }

    pub fn is_a(&self, type_name: &str) -> bool {
        self.0.ty.is_a(type_name)
    }

    pub fn fields(&self) -> Vec<FieldDecl> {
        self.0.fields.read().fields()
    }

    pub fn find_field(&self, name: &str) -> Option<FieldDecl> {
        find_field(&self.fields(), name)
    }

    pub fn read(&self, field: &FieldDecl) -> Option<FieldValue> {
        self.0.fields.read().get(field)
    }

    pub fn write(&self, field: &FieldDecl, value: FieldValue) -> bool {
        self.0.fields.write().set(field, value)
    }

    /// Read the eligible field named `name`.
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.find_field(name).and_then(|decl| self.read(&decl))
    }

    /// Write the eligible field named `name`.
    pub fn set(&self, name: &str, value: FieldValue) -> bool {
        match self.find_field(name) {
            Some(decl) => self.write(&decl, value),
            None => false,
        }
    }

    pub fn partition_path(&self) -> String {
        self.entity()
            .map(|e| e.partition_path())
            .unwrap_or_default()
    }

    pub fn is_alive(&self) -> bool {
        self.entity().is_some_and(|e| e.is_alive())
    }
}

impl PartialEq for ComponentHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ComponentHandle {}

impl Hash for ComponentHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.instance.hash(state);
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("type", &self.0.ty.name())
            .field("instance", &self.0.instance)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ObjectRef
// ---------------------------------------------------------------------------

/// A live handle to anything a reference can point at.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Entity(EntityHandle),
    Component(ComponentHandle),
}

impl ObjectRef {
    /// The entity itself, or the entity owning the component.
    pub fn entity(&self) -> Option<EntityHandle> {
        match self {
            ObjectRef::Entity(e) => Some(e.clone()),
            ObjectRef::Component(c) => c.entity(),
        }
    }

    pub fn as_component(&self) -> Option<&ComponentHandle> {
        match self {
            ObjectRef::Component(c) => Some(c),
            ObjectRef::Entity(_) => None,
        }
    }

    pub fn partition_path(&self) -> String {
        match self {
            ObjectRef::Entity(e) => e.partition_path(),
            ObjectRef::Component(c) => c.partition_path(),
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            ObjectRef::Entity(e) => e.is_alive(),
            ObjectRef::Component(c) => c.is_alive(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            ObjectRef::Entity(e) => e.name().to_string(),
            ObjectRef::Component(c) => match c.entity() {
                Some(e) => format!("{} ({})", e.name(), c.type_name()),
                None => c.type_name().to_string(),
            },
        }
    }
}

impl From<EntityHandle> for ObjectRef {
    fn from(entity: EntityHandle) -> Self {
        ObjectRef::Entity(entity)
    }
}

impl From<ComponentHandle> for ObjectRef {
    fn from(component: ComponentHandle) -> Self {
        ObjectRef::Component(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fields::{FieldBag, FieldKind, TypeRef, Visibility};

    fn bag(name: &str) -> FieldBag {
        FieldBag::new(ComponentType::new(name).with_ancestor("Behaviour")).field(
            "link",
            FieldKind::Reference(TypeRef::Object),
            Visibility::Public,
            FieldValue::Reference(None),
        )
    }

    #[test]
    fn test_components_of_type_follows_lineage() {
        let e = EntityHandle::new("e");
        let a = e.add_component(bag("Light"));
        let b = e.add_component(bag("Door"));
        let c = e.add_component(bag("Light"));

        assert_eq!(e.components_of_type("Light"), vec![a.clone(), c.clone()]);
        assert_eq!(e.components_of_type("Behaviour").len(), 3);
        assert_eq!(e.component_index(&c), Some(1));
        assert_eq!(e.component_index(&b), Some(0));
        assert_eq!(c.entity(), Some(e));
    }

    #[test]
    fn test_descendants_are_depth_first() {
        let root = EntityHandle::new("root");
        let a = EntityHandle::new("a");
        let a1 = EntityHandle::new("a1");
        let b = EntityHandle::new("b");
        a.add_child(&a1);
        root.add_child(&a);
        root.add_child(&b);

        let names: Vec<String> = root
            .descendants()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_detached_entity_is_alive_without_partition() {
        let e = EntityHandle::new("template");
        assert!(e.is_alive());
        assert_eq!(e.partition_path(), "");
    }

    #[test]
    fn test_handle_equality_is_identity() {
        let a = EntityHandle::new("same");
        let b = EntityHandle::new("same");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(ObjectRef::from(a.clone()), ObjectRef::from(b));
    }

    #[test]
    fn test_get_and_set_by_name() {
        let e = EntityHandle::new("e");
        let target = EntityHandle::new("t");
        let c = e.add_component(bag("Door"));
        assert!(c.set("link", FieldValue::Reference(Some(target.clone().into()))));
        assert_eq!(
            c.get("link"),
            Some(FieldValue::Reference(Some(ObjectRef::Entity(target))))
        );
        assert!(!c.set("nope", FieldValue::Reference(None)));
    }

    #[test]
    fn test_add_child_rejects_cycles() {
        let root = EntityHandle::new("root");
        let mid = EntityHandle::new("mid");
        let leaf = EntityHandle::new("leaf");
        assert!(root.add_child(&mid));
        assert!(mid.add_child(&leaf));

        assert!(!root.add_child(&root));
        assert!(!leaf.add_child(&root));
        assert!(!leaf.add_child(&mid));
        assert!(leaf.children().is_empty());
        assert_eq!(root.descendants(), vec![root.clone(), mid, leaf]);
    }
}
