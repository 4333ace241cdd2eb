//! Error types for the crossref core library.
//!
//! Resolution failures are not errors: they travel as
//! [`ResolutionOutcome`](crate::models::ResolutionOutcome) data.  The variants
//! here cover storage, configuration and caller precondition violations.

use crate::models::PartitionStatus;

/// Top-level error enum for the crossref core library.
#[derive(Debug, thiserror::Error)]
pub enum CrossRefError {
    #[error("Store error: {0}")]
    Store(String),

    #[error(
        "Cannot save cross-partition references in '{partition}': \
         status is {status:?}, unresolved references: {has_errors}"
    )]
    SaveRejected {
        partition: String,
        status: PartitionStatus,
        has_errors: bool,
    },

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CrossRefResult<T> = Result<T, CrossRefError>;
