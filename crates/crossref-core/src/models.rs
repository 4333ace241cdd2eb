//! Shared typed models used across resolution, discovery, storage and the
//! orchestrator.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::CrossRefError;

// ---------------------------------------------------------------------------
// Persistence constants
// ---------------------------------------------------------------------------

/// Logical key under which a partition's reference collection is stored.
pub const REFERENCES_KEY: &str = "CrossSceneReferences";

/// Pairs processed per scheduling quantum during a restore pass.
pub const DEFAULT_RESTORE_BATCH: usize = 20;

/// Upper bound accepted for a configured restore batch.
pub const MAX_RESTORE_BATCH: usize = 10_000;

/// Sentinel used by the persisted layout for "no slot index".
const NO_INDEX: i64 = -1;

// ---------------------------------------------------------------------------
// StableId
// ---------------------------------------------------------------------------

static MINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Persisted, partition-scoped identity token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(String);

impl StableId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Mint a fresh token for an entity living in `partition_path`.
    ///
    /// The first 32 hex characters of a SHA-256 digest over the partition,
    /// the entity name, its instance number, a process-wide counter and the
    /// current time.  The counter keeps tokens distinct inside one process
    /// even when the clock does not advance.
    pub fn mint(partition_path: &str, entity_name: &str, instance: u64) -> Self {
        let counter = MINT_COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(partition_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(entity_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(instance.to_le_bytes());
        hasher.update(counter.to_le_bytes());
        hasher.update(nanos.to_le_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..32].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Outcomes and status
// ---------------------------------------------------------------------------

/// Typed result of a resolve or assign attempt.  `Unknown` until a pair
/// has been evaluated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionOutcome {
    Succeeded,
    #[default]
    Unknown,
    PartitionNotLoaded,
    InvalidObjectId,
    SubObjectNotFound,
    InvalidField,
    TypeMismatch,
}

impl ResolutionOutcome {
    pub fn is_success(self) -> bool {
        self == ResolutionOutcome::Succeeded
    }

    /// Outcome recorded for a pair: a value failure beats a variable
    /// failure, and any failure beats success.
    pub fn combine(variable: Self, value: Self) -> Self {
        if !value.is_success() {
            value
        } else {
            variable
        }
    }
}

impl fmt::Display for ResolutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionOutcome::Succeeded => "Succeeded",
            ResolutionOutcome::Unknown => "Unknown",
            ResolutionOutcome::PartitionNotLoaded => "PartitionNotLoaded",
            ResolutionOutcome::InvalidObjectId => "InvalidObjectId",
            ResolutionOutcome::SubObjectNotFound => "SubObjectNotFound",
            ResolutionOutcome::InvalidField => "InvalidField",
            ResolutionOutcome::TypeMismatch => "TypeMismatch",
        };
        f.write_str(s)
    }
}

/// Restore lifecycle of a single partition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionStatus {
    /// Nothing has been restored or cleared yet.
    #[default]
    Default,
    /// References were restored by the last pass.
    Restored,
    /// Live bindings were cleared.
    Cleared,
}

// ---------------------------------------------------------------------------
// ReferenceDescriptor
// ---------------------------------------------------------------------------

/// Sub-field slot addressed by a descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Array(usize),
    Listener(usize),
}

impl Slot {
    pub fn index(self) -> usize {
        match self {
            Slot::Array(i) | Slot::Listener(i) => i,
        }
    }
}

/// Serializable address of a storage location or a target object.
///
/// Equality and hashing are structural.  Builders consume `self` and are
/// only meant to be chained at construction time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DescriptorFields", into = "DescriptorFields")]
pub struct ReferenceDescriptor {
    partition_path: String,
    object_id: StableId,
    component_type: Option<String>,
    component_index: usize,
    field: Option<String>,
    slot: Option<Slot>,
}

impl ReferenceDescriptor {
    pub fn new(partition_path: impl Into<String>, object_id: StableId) -> Self {
        Self {
            partition_path: partition_path.into(),
            object_id,
            component_type: None,
            component_index: 0,
            field: None,
            slot: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Qualify the descriptor with the `index`-th component of `type_name`.
    pub fn with_component(mut self, type_name: impl Into<String>, index: usize) -> Self {
        self.component_type = Some(type_name.into());
        self.component_index = index;
        self
    }

    pub fn with_slot(mut self, slot: Option<Slot>) -> Self {
        self.slot = slot;
        self
    }

    pub fn partition_path(&self) -> &str {
        &self.partition_path
    }

    pub fn object_id(&self) -> &StableId {
        &self.object_id
    }

    pub fn component_type(&self) -> Option<&str> {
        self.component_type.as_deref()
    }

    pub fn component_index(&self) -> usize {
        self.component_index
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn slot(&self) -> Option<Slot> {
        self.slot
    }

    pub fn array_index(&self) -> Option<usize> {
        match self.slot {
            Some(Slot::Array(i)) => Some(i),
            _ => None,
        }
    }

    pub fn listener_index(&self) -> Option<usize> {
        match self.slot {
            Some(Slot::Listener(i)) => Some(i),
            _ => None,
        }
    }
}

impl fmt::Display for ReferenceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stem = std::path::Path::new(&self.partition_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        write!(f, "{stem}/{}", self.object_id)?;
        if let Some(component) = &self.component_type {
            write!(f, "+{component}")?;
        }
        if let Some(field) = &self.field {
            write!(f, ".{field}")?;
        }
        if let Some(slot) = self.slot {
            write!(f, "({})", slot.index())?;
        }
        Ok(())
    }
}

/// Flat persisted form of a [`ReferenceDescriptor`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorFields {
    partition_path: String,
    object_id: StableId,
    #[serde(default)]
    component_type_name: Option<String>,
    #[serde(default)]
    component_index: usize,
    #[serde(default)]
    field_name: Option<String>,
    #[serde(default = "no_index")]
    array_index: i64,
    #[serde(default = "no_index")]
    listener_index: i64,
}

fn no_index() -> i64 {
    NO_INDEX
}

fn slot_index(raw: i64, name: &str) -> Result<Option<usize>, CrossRefError> {
    match raw {
        NO_INDEX => Ok(None),
        i if i >= 0 => Ok(Some(i as usize)),
        other => Err(CrossRefError::InvalidDescriptor(format!(
            "{name} must be -1 or non-negative, got {other}"
        ))),
    }
}

impl TryFrom<DescriptorFields> for ReferenceDescriptor {
    type Error = CrossRefError;

    fn try_from(raw: DescriptorFields) -> Result<Self, Self::Error> {
        let array = slot_index(raw.array_index, "arrayIndex")?;
        let listener = slot_index(raw.listener_index, "listenerIndex")?;
        let slot = match (array, listener) {
            (Some(_), Some(_)) => {
                return Err(CrossRefError::InvalidDescriptor(
                    "arrayIndex and listenerIndex cannot both be set".to_string(),
                ))
            }
            (Some(i), None) => Some(Slot::Array(i)),
            (None, Some(i)) => Some(Slot::Listener(i)),
            (None, None) => None,
        };
        Ok(Self {
            partition_path: raw.partition_path,
            object_id: raw.object_id,
            component_type: raw.component_type_name,
            component_index: raw.component_index,
            field: raw.field_name,
            slot,
        })
    }
}

impl From<ReferenceDescriptor> for DescriptorFields {
    fn from(d: ReferenceDescriptor) -> Self {
        let (array_index, listener_index) = match d.slot {
            Some(Slot::Array(i)) => (i as i64, NO_INDEX),
            Some(Slot::Listener(i)) => (NO_INDEX, i as i64),
            None => (NO_INDEX, NO_INDEX),
        };
        Self {
            partition_path: d.partition_path,
            object_id: d.object_id,
            component_type_name: d.component_type,
            component_index: d.component_index,
            field_name: d.field,
            array_index,
            listener_index,
        }
    }
}

// ---------------------------------------------------------------------------
// Pairs and collections
// ---------------------------------------------------------------------------

/// "The location named by `variable` should hold a handle to `value`."
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferencePair {
    pub variable: ReferenceDescriptor,
    pub value: ReferenceDescriptor,
}

impl ReferencePair {
    pub fn new(variable: ReferenceDescriptor, value: ReferenceDescriptor) -> Self {
        Self { variable, value }
    }
}

impl fmt::Display for ReferencePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.variable, self.value)
    }
}

/// All reference pairs persisted for one partition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReferenceCollection {
    #[serde(rename = "scene")]
    pub partition_path: String,
    #[serde(default)]
    pub references: Vec<ReferencePair>,
}

impl PartitionReferenceCollection {
    pub fn new(partition_path: impl Into<String>, references: Vec<ReferencePair>) -> Self {
        Self {
            partition_path: partition_path.into(),
            references,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
