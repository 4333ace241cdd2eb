//! In-memory object model: partitions, entities, components and the field
//! capability that reference descriptors address.

pub mod entity;
pub mod fields;
pub mod host;
pub mod identity;
pub mod partition;

pub use entity::{ComponentHandle, EntityHandle, ObjectRef};
pub use fields::{
    ComponentType, FieldBag, FieldDecl, FieldKind, FieldValue, PersistentListener,
    ReferenceableFields, TypeRef, Visibility,
};
pub use host::{PartitionHost, World};
pub use identity::IdentityRegistry;
pub use partition::Partition;
