//! Discovery of cross-partition references in loaded partitions.
//!
//! Walks every component of every entity in the given partitions and emits a
//! [`ReferencePair`] for each eligible field, list element or listener whose
//! current value lives in another partition.  Stable ids are minted on
//! demand for both ends of every emitted pair.

use std::sync::Arc;

use tracing::debug;

use crate::graph::fields::serialized_fields;
use crate::graph::{ComponentHandle, FieldDecl, FieldValue, ObjectRef, Partition};
use crate::models::{ReferenceDescriptor, ReferencePair, Slot};

/// How a referenced object's partition relates to the referencing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartitionRelation {
    Same,
    /// The target has no owning partition (a template or asset).  Never
    /// treated as cross-partition, even though the paths differ.
    Detached,
    Cross,
}

pub fn classify(source_path: &str, target_path: &str) -> PartitionRelation {
    if target_path.trim().is_empty() {
        PartitionRelation::Detached
    } else if target_path == source_path {
        PartitionRelation::Same
    } else {
        PartitionRelation::Cross
    }
}

/// Lazily scan `partitions` for cross-partition references.
///
/// The iterator is recomputed from live state on every call; unloaded
/// partitions are skipped.
pub fn find_cross_partition_references(
    partitions: &[Arc<Partition>],
) -> impl Iterator<Item = ReferencePair> + '_ {
    partitions
        .iter()
        .filter(|p| p.is_loaded())
        .flat_map(|partition| {
            partition
                .entities()
                .into_iter()
                .flat_map(|entity| entity.components())
                .map(move |component| (partition, component))
        })
        .flat_map(|(partition, component)| scan_component(partition, &component))
}

fn scan_component(partition: &Arc<Partition>, component: &ComponentHandle) -> Vec<ReferencePair> {
    let mut pairs = Vec::new();
    for field in serialized_fields(component.fields()) {
        let Some(value) = component.read(&field) else {
            continue;
        };
        match value {
            FieldValue::Reference(Some(target)) => {
                if let Some(pair) = pair_for(partition, component, &field, None, &target) {
                    pairs.push(pair);
                }
            }
            FieldValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    let Some(target) = item else { continue };
                    if let Some(pair) =
                        pair_for(partition, component, &field, Some(Slot::Array(i)), target)
                    {
                        pairs.push(pair);
                    }
                }
            }
            FieldValue::Listeners(listeners) => {
                for (i, listener) in listeners.iter().enumerate() {
                    let Some(target) = &listener.target else {
                        continue;
                    };
                    if let Some(pair) =
                        pair_for(partition, component, &field, Some(Slot::Listener(i)), target)
                    {
                        pairs.push(pair);
                    }
                }
            }
            FieldValue::Reference(None) | FieldValue::Data(_) => {}
        }
    }
    pairs
}

fn pair_for(
    partition: &Arc<Partition>,
    component: &ComponentHandle,
    field: &FieldDecl,
    slot: Option<Slot>,
    target: &ObjectRef,
) -> Option<ReferencePair> {
    let value = value_descriptor(partition.path(), target)?;
    let variable = variable_descriptor(partition, component, field, slot)?;
    debug!("Found cross-partition reference {variable} -> {value}");
    Some(ReferencePair::new(variable, value))
}

/// Descriptor for `target`, if it lives in a partition other than `source_path`.
pub fn value_descriptor(source_path: &str, target: &ObjectRef) -> Option<ReferenceDescriptor> {
    // Handles into unloaded partitions are stale.
    if !target.is_alive() {
        return None;
    }
    let entity = target.entity()?;
    if classify(source_path, &entity.partition_path()) != PartitionRelation::Cross {
        return None;
    }
    let owner = entity.partition()?;
    let id = owner.get_or_create_identity(&entity);
    let descriptor = ReferenceDescriptor::new(owner.path(), id);

    match target {
        ObjectRef::Entity(_) => Some(descriptor),
        ObjectRef::Component(c) => {
            let index = entity.component_index(c)?;
            Some(descriptor.with_component(c.type_name(), index))
        }
    }
}

fn variable_descriptor(
    partition: &Arc<Partition>,
    component: &ComponentHandle,
    field: &FieldDecl,
    slot: Option<Slot>,
) -> Option<ReferenceDescriptor> {
    let entity = component.entity()?;
    let index = entity.component_index(component)?;
    let id = partition.get_or_create_identity(&entity);
    Some(
        ReferenceDescriptor::new(partition.path(), id)
            .with_field(field.name.clone())
            .with_component(component.type_name(), index)
            .with_slot(slot),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EntityHandle, World};
    use crate::testing::{list, listeners, reference, spawn, widget, WIDGET};

    #[test]
    fn test_classify() {
        assert_eq!(classify("A.scene", "A.scene"), PartitionRelation::Same);
        assert_eq!(classify("A.scene", "B.scene"), PartitionRelation::Cross);
        assert_eq!(classify("A.scene", ""), PartitionRelation::Detached);
        assert_eq!(classify("A.scene", "  "), PartitionRelation::Detached);
    }

    #[test]
    fn test_single_field_emits_one_pair() {
        let p = Partition::new("Assets/P.scene");
        let q = Partition::new("Assets/Q.scene");
        let (source, source_widget) = spawn(&p, "source");
        let (target, target_widget) = spawn(&q, "target");
        source_widget.set("target", reference(target_widget));

        let pairs: Vec<ReferencePair> = find_cross_partition_references(&[p.clone()]).collect();
        assert_eq!(pairs.len(), 1);

        let pair = &pairs[0];
        let source_id = p.identity_of(&source).unwrap();
        let target_id = q.identity_of(&target).unwrap();
        assert_eq!(
            pair.variable,
            ReferenceDescriptor::new("Assets/P.scene", source_id)
                .with_field("target")
                .with_component(WIDGET, 0)
        );
        assert_eq!(
            pair.value,
            ReferenceDescriptor::new("Assets/Q.scene", target_id).with_component(WIDGET, 0)
        );
    }

    #[test]
    fn test_same_partition_and_detached_targets_are_ignored() {
        let p = Partition::new("Assets/P.scene");
        let (_, a) = spawn(&p, "a");
        let (other, _) = spawn(&p, "b");
        let template = EntityHandle::new("template");
        a.set("entity", reference(other));
        a.set("owner", reference(template));

        assert_eq!(find_cross_partition_references(&[p]).count(), 0);
    }

    #[test]
    fn test_private_fields_are_not_scanned() {
        let p = Partition::new("Assets/P.scene");
        let q = Partition::new("Assets/Q.scene");
        let (_, a) = spawn(&p, "a");
        let (b, _) = spawn(&q, "b");
        let hidden = a.fields().into_iter().find(|f| f.name == "hidden").unwrap();
        assert!(a.write(&hidden, reference(b)));
        assert_eq!(find_cross_partition_references(&[p]).count(), 0);
    }

    #[test]
    fn test_array_slots_are_tagged() {
        let p = Partition::new("Assets/P.scene");
        let q = Partition::new("Assets/Q.scene");
        let (_, near) = spawn(&p, "near");
        let (_, a) = spawn(&p, "a");
        let (_, far) = spawn(&q, "far");
        a.set("targets", list(vec![Some(near), Some(far), None]));

        let pairs: Vec<ReferencePair> = find_cross_partition_references(&[p]).collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].variable.slot(), Some(Slot::Array(1)));
        assert_eq!(pairs[0].variable.field(), Some("targets"));
        assert_eq!(pairs[0].value.slot(), None);
    }

    #[test]
    fn test_listener_slots_are_tagged() {
        let p = Partition::new("Assets/P.scene");
        let q = Partition::new("Assets/Q.scene");
        let (_, a) = spawn(&p, "a");
        let (far, _) = spawn(&q, "far");
        a.set("onFire", listeners(vec![None, Some(far.clone()), Some(far)]));

        let slots: Vec<Option<Slot>> = find_cross_partition_references(&[p])
            .map(|pair| pair.variable.slot())
            .collect();
        assert_eq!(
            slots,
            vec![Some(Slot::Listener(1)), Some(Slot::Listener(2))]
        );
    }

    #[test]
    fn test_second_component_and_child_entities() {
        let p = Partition::new("Assets/P.scene");
        let q = Partition::new("Assets/Q.scene");
        let root = EntityHandle::new("root");
        let child = EntityHandle::new("child");
        root.add_child(&child);
        child.add_component(widget());
        let second = child.add_component(widget());
        p.add_root(&root);

        let target = EntityHandle::new("target");
        target.add_component(widget());
        let target_second = target.add_component(widget());
        q.add_root(&target);
        second.set("target", reference(target_second));

        let pairs: Vec<ReferencePair> = find_cross_partition_references(&[p]).collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].variable.component_index(), 1);
        assert_eq!(pairs[0].value.component_index(), 1);
        assert_eq!(pairs[0].value.component_type(), Some(WIDGET));
    }

    #[test]
    fn test_stale_handles_are_skipped() {
        let world = World::new();
        let p = Partition::new("Assets/P.scene");
        let q = Partition::new("Assets/Q.scene");
        let (_, a) = spawn(&p, "a");
        let (_, far) = spawn(&q, "far");
        world.load(p.clone());
        world.load(q);
        a.set("target", reference(far));

        assert_eq!(find_cross_partition_references(&[p.clone()]).count(), 1);
        world.unload("Assets/Q.scene");
        assert_eq!(find_cross_partition_references(&[p]).count(), 0);
    }

    #[test]
    fn test_discovery_reuses_existing_ids() {
        let p = Partition::new("Assets/P.scene");
        let q = Partition::new("Assets/Q.scene");
        let (_, a) = spawn(&p, "a");
        let (far, _) = spawn(&q, "far");
        let known = q.get_or_create_identity(&far);
        a.set("entity", reference(far));

        let first: Vec<ReferencePair> = find_cross_partition_references(&[p.clone()]).collect();
        let second: Vec<ReferencePair> = find_cross_partition_references(&[p]).collect();
        assert_eq!(first, second);
        assert_eq!(first[0].value.object_id(), &known);
    }
}
