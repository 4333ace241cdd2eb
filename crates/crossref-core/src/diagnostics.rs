//! Per-pair diagnostics reported during restore.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::graph::EntityHandle;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Receiver for unresolved-reference reports.
pub trait DiagnosticSink {
    /// `source` is the entity owning the failed variable, when it resolved.
    fn report(&self, severity: Severity, message: &str, source: Option<&EntityHandle>);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn report(&self, severity: Severity, message: &str, source: Option<&EntityHandle>) {
        (**self).report(severity, message, source)
    }
}

/// Forwards reports to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, severity: Severity, message: &str, source: Option<&EntityHandle>) {
        let source = source.map(|e| e.name().to_string()).unwrap_or_default();
        match severity {
            Severity::Warning => tracing::warn!(source = %source, "{message}"),
            Severity::Error => tracing::error!(source = %source, "{message}"),
        }
    }
}

/// A report captured by [`CollectingSink`].
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub source: Option<EntityHandle>,
}

/// Keeps every report in memory, in arrival order.
#[derive(Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, severity: Severity, message: &str, source: Option<&EntityHandle>) {
        self.entries.lock().push(Diagnostic {
            severity,
            message: message.to_string(),
            source: source.cloned(),
        });
    }
}
