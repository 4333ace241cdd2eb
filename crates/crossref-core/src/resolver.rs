//! Resolution and assignment through reference descriptors.
//!
//! Resolution walks partition -> stable id -> component.  Field addressing is
//! a separate phase used only by evaluation and assignment, so a target can be
//! found even when its field later turns out to be invalid.
//!
//! Every attempt ends in exactly one [`ResolutionOutcome`]; nothing here
//! returns an error.

use tracing::debug;

use crate::graph::{
    ComponentHandle, FieldDecl, FieldKind, FieldValue, ObjectRef, PartitionHost, TypeRef,
};
use crate::models::{ReferenceDescriptor, ResolutionOutcome, Slot};

/// Target found by a resolve or assign attempt, with its outcome.
///
/// `target` is set whenever the descriptor reached a live object, even if a
/// later step (field lookup, type check) failed.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub target: Option<ObjectRef>,
    pub outcome: ResolutionOutcome,
}

impl Resolution {
    pub fn succeeded(target: ObjectRef) -> Self {
        Self {
            target: Some(target),
            outcome: ResolutionOutcome::Succeeded,
        }
    }

    pub fn failed(outcome: ResolutionOutcome) -> Self {
        Self {
            target: None,
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

impl ReferenceDescriptor {
    /// Find the live object this descriptor names.
    pub fn resolve<H: PartitionHost + ?Sized>(&self, host: &H) -> Resolution {
        let Some(partition) = host.partition(self.partition_path()) else {
            return Resolution::failed(ResolutionOutcome::PartitionNotLoaded);
        };
        let Some(entity) = partition.resolve_identity(self.object_id()) else {
            return Resolution::failed(ResolutionOutcome::InvalidObjectId);
        };

        match self.component_type() {
            Some(type_name) => match entity
                .components_of_type(type_name)
                .into_iter()
                .nth(self.component_index())
            {
                Some(component) => Resolution::succeeded(ObjectRef::Component(component)),
                None => Resolution::failed(ResolutionOutcome::SubObjectNotFound),
            },
            None => Resolution::succeeded(ObjectRef::Entity(entity)),
        }
    }

    /// Resolve the target and, when a field is named, the field as well.
    pub fn evaluate<H: PartitionHost + ?Sized>(&self, host: &H) -> ResolutionOutcome {
        let resolution = self.resolve(host);
        let Some(target) = resolution.target else {
            return resolution.outcome;
        };
        if self.field().is_some() {
            if let Err(outcome) = self.locate_field(&target) {
                return outcome;
            }
        }
        ResolutionOutcome::Succeeded
    }

    /// Whether the descriptor currently evaluates cleanly.  With
    /// `lenient_unloaded`, a target partition that is simply not loaded also
    /// counts as valid.
    pub fn is_valid<H: PartitionHost + ?Sized>(&self, host: &H, lenient_unloaded: bool) -> bool {
        match self.evaluate(host) {
            ResolutionOutcome::Succeeded => true,
            ResolutionOutcome::PartitionNotLoaded => lenient_unloaded,
            _ => false,
        }
    }

    /// Write `value` into the addressed field, element or listener.
    pub fn assign<H: PartitionHost + ?Sized>(&self, host: &H, value: &ObjectRef) -> Resolution {
        self.write(host, Some(value))
    }

    /// Clearing write: stores "no value", bypassing the type check.
    pub fn clear<H: PartitionHost + ?Sized>(&self, host: &H) -> Resolution {
        self.write(host, None)
    }

    fn write<H: PartitionHost + ?Sized>(
        &self,
        host: &H,
        value: Option<&ObjectRef>,
    ) -> Resolution {
        let resolution = self.resolve(host);
        let Some(target) = resolution.target else {
            return resolution;
        };
        let (component, field) = match self.locate_field(&target) {
            Ok(found) => found,
            Err(outcome) => return Resolution::failed(outcome),
        };

        let outcome = match self.slot() {
            Some(Slot::Array(index)) => write_element(&component, &field, index, value),
            Some(Slot::Listener(index)) => write_listener(&component, &field, index, value),
            None => write_field(&component, &field, value),
        };
        Resolution {
            target: Some(target),
            outcome,
        }
    }

    fn locate_field(
        &self,
        target: &ObjectRef,
    ) -> Result<(ComponentHandle, FieldDecl), ResolutionOutcome> {
        let name = self.field().ok_or(ResolutionOutcome::InvalidField)?;
        // Entities carry no fields of their own.
        let component = target
            .as_component()
            .ok_or(ResolutionOutcome::InvalidField)?;
        let field = component
            .find_field(name)
            .ok_or(ResolutionOutcome::InvalidField)?;
        Ok((component.clone(), field))
    }
}

/// A missing value always passes; a present one must be accepted by `ty`.
fn ensure_correct_type(
    ty: &TypeRef,
    value: Option<&ObjectRef>,
) -> Result<(), ResolutionOutcome> {
    match value {
        None => Ok(()),
        Some(v) if ty.accepts(v) => Ok(()),
        Some(_) => Err(ResolutionOutcome::TypeMismatch),
    }
}

fn commit(component: &ComponentHandle, field: &FieldDecl, value: FieldValue) -> ResolutionOutcome {
    if component.write(field, value) {
        ResolutionOutcome::Succeeded
    } else {
        ResolutionOutcome::InvalidField
    }
}

fn write_field(
    component: &ComponentHandle,
    field: &FieldDecl,
    value: Option<&ObjectRef>,
) -> ResolutionOutcome {
    let FieldKind::Reference(ty) = &field.kind else {
        return ResolutionOutcome::TypeMismatch;
    };
    if let Err(outcome) = ensure_correct_type(ty, value) {
        return outcome;
    }
    commit(component, field, FieldValue::Reference(value.cloned()))
}

/// Overwrite one element of a sequence.  An index past the current end is
/// skipped and still reported as `Succeeded`, so shrinking arrays do not
/// turn into resolution failures.
fn write_element(
    component: &ComponentHandle,
    field: &FieldDecl,
    index: usize,
    value: Option<&ObjectRef>,
) -> ResolutionOutcome {
    let FieldKind::List(element) = &field.kind else {
        return ResolutionOutcome::TypeMismatch;
    };
    if let Err(outcome) = ensure_correct_type(element, value) {
        return outcome;
    }
    let Some(FieldValue::List(mut items)) = component.read(field) else {
        return ResolutionOutcome::TypeMismatch;
    };
    let len = items.len();
    match items.get_mut(index) {
        Some(slot) => {
            *slot = value.cloned();
            commit(component, field, FieldValue::List(items))
        }
        None => {
            debug!(
                field = %field.name,
                index,
                len,
                "Array write skipped: index out of bounds"
            );
            ResolutionOutcome::Succeeded
        }
    }
}

fn write_listener(
    component: &ComponentHandle,
    field: &FieldDecl,
    index: usize,
    value: Option<&ObjectRef>,
) -> ResolutionOutcome {
    if field.kind != FieldKind::Listeners {
        return ResolutionOutcome::TypeMismatch;
    }
    if let Err(outcome) = ensure_correct_type(&TypeRef::Object, value) {
        return outcome;
    }
    let Some(FieldValue::Listeners(mut listeners)) = component.read(field) else {
        return ResolutionOutcome::TypeMismatch;
    };
    match listeners.get_mut(index) {
        Some(listener) => {
            listener.target = value.cloned();
            commit(component, field, FieldValue::Listeners(listeners))
        }
        None => ResolutionOutcome::InvalidField,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
