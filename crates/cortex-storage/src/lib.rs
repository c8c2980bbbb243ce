//! Persistence for cortex brains.
//!
//! Provides the [`GraphStore`] trait defining the storage contract that all
//! backends implement, plus [`InMemoryStore`], [`JsonFileStore`] and
//! [`SqliteStore`] as first-class backends.
//!
//! # Architecture
//!
//! A brain travels to and from storage as a [`BrainDocument`]: a flat,
//! sorted image of every committed neuron and link. Loading validates the
//! document's structural invariants before any brain is built, so a failed
//! load never leaves a half-initialized brain behind. Incremental saves
//! apply a [`ChangeSet`](cortex_core::ChangeSet) drained from the brain on
//! top of the last full save.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`document`]: BrainDocument and its integrity validation
//! - [`convert`]: Brain decompose/recompose functions
//! - [`traits`]: GraphStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`file`]: JsonFileStore implementation
//! - [`schema`]: SQL schema constants and migration setup
//! - [`sqlite`]: SqliteStore implementation

pub mod convert;
pub mod document;
pub mod error;
pub mod file;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use convert::{decompose, recompose};
pub use document::{BrainDocument, FORMAT_VERSION};
pub use error::StorageError;
pub use file::JsonFileStore;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::GraphStore;
