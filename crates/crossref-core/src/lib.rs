//! Crossref core library: persistent references between independently loaded
//! partitions of an object graph.
//!
//! A live handle from an object in one partition to an object in another
//! cannot survive serialization.  This crate records such references as
//! [`ReferencePair`]s of stable, partition-scoped addresses, persists them per
//! partition through a [`PartitionStore`], and re-binds them when partitions
//! are loaded again.  Failures are typed [`ResolutionOutcome`]s tracked per
//! pair, never panics or errors.

pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod errors;
pub mod graph;
pub mod models;
pub mod orchestrator;
pub mod resolver;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::CrossRefConfig;
pub use diagnostics::{CollectingSink, DiagnosticSink, Severity, TracingSink};
pub use discovery::find_cross_partition_references;
pub use errors::{CrossRefError, CrossRefResult};
pub use graph::{ComponentHandle, EntityHandle, ObjectRef, Partition, PartitionHost, World};
pub use models::{
    PartitionReferenceCollection, PartitionStatus, ReferenceDescriptor, ReferencePair,
    ResolutionOutcome, Slot, StableId, REFERENCES_KEY,
};
pub use orchestrator::{Orchestrator, PlayModeChange, RestoreStep, SaveDecision};
pub use resolver::Resolution;
pub use store::{MemoryStore, PartitionStore, SqliteStore};
