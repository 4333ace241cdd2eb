//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::graph::{
    ComponentHandle, ComponentType, EntityHandle, FieldBag, FieldKind, FieldValue, ObjectRef,
    Partition, PersistentListener, TypeRef, Visibility,
};

pub(crate) const WIDGET: &str = "Widget";

/// A `Widget` component deriving from `Behaviour`, with one field of each kind.
pub(crate) fn widget() -> FieldBag {
    let ty = ComponentType::new(WIDGET).with_ancestor("Behaviour");
    FieldBag::new(ty)
        .field(
            "target",
            FieldKind::Reference(TypeRef::component(WIDGET)),
            Visibility::Public,
            FieldValue::Reference(None),
        )
        .field(
            "entity",
            FieldKind::Reference(TypeRef::Entity),
            Visibility::Serialized,
            FieldValue::Reference(None),
        )
        .field(
            "targets",
            FieldKind::List(TypeRef::component(WIDGET)),
            Visibility::Public,
            FieldValue::List(Vec::new()),
        )
        .field(
            "onFire",
            FieldKind::Listeners,
            Visibility::Public,
            FieldValue::Listeners(Vec::new()),
        )
        .field(
            "hidden",
            FieldKind::Reference(TypeRef::Object),
            Visibility::Private,
            FieldValue::Reference(None),
        )
        .field(
            "label",
            FieldKind::Data,
            Visibility::Serialized,
            FieldValue::Data(serde_json::json!("widget")),
        )
        .inherited(
            "Behaviour",
            "owner",
            FieldKind::Reference(TypeRef::Object),
            Visibility::Public,
            FieldValue::Reference(None),
        )
}

/// A plain `Light` component with no reference fields.
pub(crate) fn light() -> FieldBag {
    FieldBag::new(ComponentType::new("Light")).field(
        "intensity",
        FieldKind::Data,
        Visibility::Public,
        FieldValue::Data(serde_json::json!(1.0)),
    )
}

/// Root entity in `partition` carrying one `Widget`.
pub(crate) fn spawn(partition: &Arc<Partition>, name: &str) -> (EntityHandle, ComponentHandle) {
    let entity = EntityHandle::new(name);
    let widget = entity.add_component(widget());
    partition.add_root(&entity);
    (entity, widget)
}

pub(crate) fn reference(target: impl Into<ObjectRef>) -> FieldValue {
    FieldValue::Reference(Some(target.into()))
}

pub(crate) fn list<T: Into<ObjectRef>>(items: Vec<Option<T>>) -> FieldValue {
    FieldValue::List(items.into_iter().map(|i| i.map(Into::into)).collect())
}

pub(crate) fn listeners<T: Into<ObjectRef>>(targets: Vec<Option<T>>) -> FieldValue {
    FieldValue::Listeners(
        targets
            .into_iter()
            .map(|t| PersistentListener::new(t.map(Into::into), "Fire"))
            .collect(),
    )
}

pub(crate) fn referenced(component: &ComponentHandle, field: &str) -> Option<ObjectRef> {
    match component.get(field) {
        Some(FieldValue::Reference(r)) => r,
        _ => None,
    }
}
