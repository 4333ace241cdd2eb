//! Field capability used for reference addressing.
//!
//! Components expose their fields through [`ReferenceableFields`]: an ordered
//! list of declarations plus a getter and a setter keyed by declaration.  The
//! order is the lookup order: fields declared by the concrete type first,
//! then each ancestor from nearest to furthest.

use crate::graph::ObjectRef;

// ---------------------------------------------------------------------------
// Type information
// ---------------------------------------------------------------------------

/// Name of a component type together with its ancestor chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentType {
    name: String,
    ancestors: Vec<String>,
}

impl ComponentType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ancestors: Vec::new(),
        }
    }

    /// Append the next ancestor, nearest first.
    pub fn with_ancestor(mut self, ancestor: impl Into<String>) -> Self {
        self.ancestors.push(ancestor.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_a(&self, type_name: &str) -> bool {
        self.lineage().any(|t| t == type_name)
    }

    /// The type itself followed by its ancestors.
    pub fn lineage(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.ancestors.iter().map(String::as_str))
    }

    /// Distance from the concrete type to `declared_by`; unknown types sort last.
    pub fn depth_of(&self, declared_by: &str) -> usize {
        self.lineage()
            .position(|t| t == declared_by)
            .unwrap_or(usize::MAX)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    /// Non-public but explicitly marked for serialization.
    Serialized,
    Private,
}

impl Visibility {
    /// Only public or explicitly serialized fields take part in referencing.
    pub fn is_serialized(self) -> bool {
        matches!(self, Visibility::Public | Visibility::Serialized)
    }
}

/// What a reference-typed field (or element, or listener target) accepts.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// Any entity or component.
    Object,
    Entity,
    /// A component that is, or derives from, the named type.
    Component(String),
}

impl TypeRef {
    pub fn component(name: impl Into<String>) -> Self {
        TypeRef::Component(name.into())
    }

    pub fn accepts(&self, value: &ObjectRef) -> bool {
        match (self, value) {
            (TypeRef::Object, _) => true,
            (TypeRef::Entity, ObjectRef::Entity(_)) => true,
            (TypeRef::Component(name), ObjectRef::Component(c)) => c.is_a(name),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// A single handle.
    Reference(TypeRef),
    /// An indexable sequence of handles.
    List(TypeRef),
    /// A multi-cast listener list whose entries bind to any object.
    Listeners,
    /// Plain data; never a reference.
    Data,
}

/// One field declaration exposed by a component.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldDecl {
    pub name: String,
    pub kind: FieldKind,
    pub visibility: Visibility,
    pub declared_by: String,
}

/// A persisted listener entry: the bound target plus the method it invokes.
#[derive(Clone, Debug, PartialEq)]
pub struct PersistentListener {
    pub target: Option<ObjectRef>,
    pub method: String,
}

impl PersistentListener {
    pub fn new(target: Option<ObjectRef>, method: impl Into<String>) -> Self {
        Self {
            target,
            method: method.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Reference(Option<ObjectRef>),
    List(Vec<Option<ObjectRef>>),
    Listeners(Vec<PersistentListener>),
    Data(serde_json::Value),
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Field access for components that participate in cross-partition
/// referencing.
pub trait ReferenceableFields: Send + Sync + 'static {
    fn component_type(&self) -> &ComponentType;

    /// Every declared field in lookup order.
    fn fields(&self) -> Vec<FieldDecl>;

    fn get(&self, field: &FieldDecl) -> Option<FieldValue>;

    /// Store `value`; returns `false` when the component refuses the write.
    fn set(&mut self, field: &FieldDecl, value: FieldValue) -> bool;
}

/// First field named `name` that is eligible for referencing.
pub fn find_field(fields: &[FieldDecl], name: &str) -> Option<FieldDecl> {
    fields
        .iter()
        .find(|f| f.name == name && f.visibility.is_serialized())
        .cloned()
}

/// Eligible fields, keeping only the first declaration of each name.
pub fn serialized_fields(fields: Vec<FieldDecl>) -> Vec<FieldDecl> {
    let mut seen = std::collections::HashSet::new();
    fields
        .into_iter()
        .filter(|f| f.visibility.is_serialized())
        .filter(|f| seen.insert(f.name.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// FieldBag
// ---------------------------------------------------------------------------

/// Table-driven [`ReferenceableFields`] implementation for statically
/// registered component shapes.
#[derive(Clone, Debug)]
pub struct FieldBag {
    ty: ComponentType,
    slots: Vec<(FieldDecl, FieldValue)>,
}

impl FieldBag {
    pub fn new(ty: ComponentType) -> Self {
        Self {
            ty,
            slots: Vec::new(),
        }
    }

    /// Declare a field on the concrete type.
    pub fn field(
        self,
        name: impl Into<String>,
        kind: FieldKind,
        visibility: Visibility,
        value: FieldValue,
    ) -> Self {
        let declared_by = self.ty.name().to_string();
        self.declare(declared_by, name, kind, visibility, value)
    }

    /// Declare a field on one of the ancestor types.
    pub fn inherited(
        self,
        declared_by: impl Into<String>,
        name: impl Into<String>,
        kind: FieldKind,
        visibility: Visibility,
        value: FieldValue,
    ) -> Self {
        self.declare(declared_by.into(), name, kind, visibility, value)
    }

    fn declare(
        mut self,
        declared_by: String,
        name: impl Into<String>,
        kind: FieldKind,
        visibility: Visibility,
        value: FieldValue,
    ) -> Self {
        let decl = FieldDecl {
            name: name.into(),
            kind,
            visibility,
            declared_by,
        };
        self.slots.push((decl, value));
        self
    }

    fn slot_mut(&mut self, field: &FieldDecl) -> Option<&mut FieldValue> {
        self.slots
            .iter_mut()
            .find(|(d, _)| d.name == field.name && d.declared_by == field.declared_by)
            .map(|(_, v)| v)
    }
}

impl ReferenceableFields for FieldBag {
    fn component_type(&self) -> &ComponentType {
        &self.ty
    }

    fn fields(&self) -> Vec<FieldDecl> {
        let mut decls: Vec<FieldDecl> = self.slots.iter().map(|(d, _)| d.clone()).collect();
        decls.sort_by_key(|d| self.ty.depth_of(&d.declared_by));
        decls
    }

    fn get(&self, field: &FieldDecl) -> Option<FieldValue> {
        self.slots
            .iter()
            .find(|(d, _)| d.name == field.name && d.declared_by == field.declared_by)
            .map(|(_, v)| v.clone())
    }

    fn set(&mut self, field: &FieldDecl, value: FieldValue) -> bool {
        match self.slot_mut(field) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
