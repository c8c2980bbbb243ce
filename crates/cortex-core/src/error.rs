//! Core error types for cortex-core.
//!
//! Uses `thiserror` for structured, matchable error variants. Every variant
//! is produced before any mutation happens: a `CoreError` means the graph was
//! left untouched.

use thiserror::Error;

use crate::id::{LinkKey, NeuronId};
use crate::kind::NeuronKind;
use crate::lock::LockError;

/// Errors produced by brain operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No neuron with this id is registered.
    #[error("neuron not found: {id}")]
    NeuronNotFound { id: NeuronId },

    /// The neuron exists but was deleted.
    #[error("neuron deleted: {id}")]
    NeuronDeleted { id: NeuronId },

    /// The neuron does not have the kind the operation requires.
    #[error("neuron {id} is {found:?}, expected {expected}")]
    WrongKind {
        id: NeuronId,
        expected: &'static str,
        found: NeuronKind,
    },

    /// A link with the same (from, to, meaning) triple already exists.
    #[error("duplicate link: {key}")]
    DuplicateLink { key: LinkKey },

    /// No link with this triple exists.
    #[error("link not found: {key}")]
    LinkNotFound { key: LinkKey },

    /// The neuron is still referenced as a meaning or info item.
    #[error("neuron {id} is still referenced {uses} time(s) as meaning or info")]
    InUse { id: NeuronId, uses: usize },

    /// Predefined neurons cannot be deleted.
    #[error("neuron {id} is predefined")]
    Predefined { id: NeuronId },

    /// Index outside the bounds of a child or info list.
    #[error("index {index} out of range for {id} (len {len})")]
    IndexOutOfRange {
        id: NeuronId,
        index: usize,
        len: usize,
    },

    /// The child does not occur in the cluster.
    #[error("neuron {child} is not a child of {cluster}")]
    ChildNotFound { cluster: NeuronId, child: NeuronId },

    /// The item does not occur in the link's info list.
    #[error("neuron {item} is not in the info of {key}")]
    InfoNotFound { key: LinkKey, item: NeuronId },

    /// The payload does not match the neuron's kind.
    #[error("payload does not fit neuron {id} of kind {kind:?}")]
    InvalidPayload { id: NeuronId, kind: NeuronKind },

    /// A neuron passed to `Brain::add` already carries an id.
    #[error("neuron {id} is already registered")]
    AlreadyRegistered { id: NeuronId },

    /// The graph changed underneath a multi-phase operation too many times.
    #[error("contention on neuron {id}: gave up after {attempts} attempts")]
    Contention { id: NeuronId, attempts: usize },

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl CoreError {
    /// Returns `true` for plain lookup misses, which instructions treat as
    /// a logged no-op rather than a failure.
    pub fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            CoreError::LinkNotFound { .. }
                | CoreError::ChildNotFound { .. }
                | CoreError::InfoNotFound { .. }
        )
    }
}
