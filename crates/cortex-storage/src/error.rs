//! Storage error types for cortex-storage.
//!
//! [`StorageError`] covers every failure a store can report: I/O and
//! serialization, SQLite and migrations, document envelope problems and
//! integrity violations found while validating a document before it is
//! turned back into a brain. A load that fails never yields a brain.

use cortex_core::{CoreError, LinkKey, NeuronId};
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing a graph file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The SQLite backend reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// The graph file does not start with a valid envelope header.
    #[error("malformed document: {reason}")]
    Malformed { reason: String },

    /// The document body does not hash to the checksum in its envelope.
    #[error("checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch { expected: String, found: String },

    /// The document was written by an incompatible format version.
    #[error("unsupported format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// A data integrity violation was detected.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },

    /// No neuron with this id is stored.
    #[error("neuron not found: {0}")]
    NeuronNotFound(NeuronId),

    /// No link with this key is stored.
    #[error("link not found: {0}")]
    LinkNotFound(LinkKey),

    /// Nothing has been saved to the store yet.
    #[error("no brain has been saved to this store")]
    Empty,

    /// The operation was cancelled between two units of work.
    #[error("operation cancelled")]
    Cancelled,

    /// Reading the brain failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl StorageError {
    pub(crate) fn integrity(reason: impl Into<String>) -> Self {
        StorageError::IntegrityError { reason: reason.into() }
    }
}
