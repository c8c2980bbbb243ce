//! The universal graph node.
//!
//! A [`Neuron`] carries an immutable id and kind, a few atomic flags, and
//! one reader/writer lock per [`Aspect`]. Adjacency aspects are lazy twice
//! over: the lock itself is only allocated the first time the aspect is
//! locked, and the list inside stays `None` ("never touched") until the
//! first write. Untouched and empty are therefore distinct, and persistence
//! keeps them distinct.
//!
//! Neurons are only ever read or mutated through a [`LockSet`](crate::LockSet)
//! obtained from the lock manager; this module exposes the raw cells to the
//! crate only.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::id::{LinkKey, NeuronId};
use crate::kind::{NeuronKind, Payload};
use crate::lock::Aspect;

/// List held by an id-valued aspect (`Children`, `ClusteredBy`).
pub(crate) type IdList = Option<Vec<NeuronId>>;
/// List held by a link-valued aspect (`LinksOut`, `LinksIn`).
pub(crate) type LinkList = Option<Vec<LinkKey>>;

pub(crate) type Cell<T> = Arc<RwLock<T>>;

const CHANGED: u8 = 0b001;
const DELETED: u8 = 0b010;
const TEMPORARY: u8 = 0b100;

/// A node in the knowledge graph.
pub struct Neuron {
    id: NeuronId,
    kind: NeuronKind,
    flags: AtomicU8,
    value: Cell<Payload>,
    links_out: OnceLock<Cell<LinkList>>,
    links_in: OnceLock<Cell<LinkList>>,
    clustered_by: OnceLock<Cell<IdList>>,
    children: OnceLock<Cell<IdList>>,
}

impl Neuron {
    pub(crate) fn new(id: NeuronId, kind: NeuronKind, payload: Payload) -> Self {
        Neuron {
            id,
            kind,
            flags: AtomicU8::new(CHANGED),
            value: Arc::new(RwLock::new(payload)),
            links_out: OnceLock::new(),
            links_in: OnceLock::new(),
            clustered_by: OnceLock::new(),
            children: OnceLock::new(),
        }
    }

    /// Creates a neuron that is not registered anywhere yet. It carries
    /// [`NeuronId::TEMP`] until handed to [`Brain::add`](crate::Brain::add).
    pub fn detached(kind: NeuronKind, payload: Payload) -> Self {
        Neuron::new(NeuronId::TEMP, kind, payload)
    }

    /// Rebuilds a neuron from persisted parts. Materialized lists are
    /// restored as-is; absent lists stay untouched.
    pub(crate) fn from_parts(parts: NeuronParts) -> Self {
        let neuron = Neuron::new(parts.id, parts.kind, parts.payload);
        neuron.flags.store(0, Ordering::Release);
        if let Some(list) = parts.links_out {
            let _ = neuron.links_out.set(Arc::new(RwLock::new(Some(list))));
        }
        if let Some(list) = parts.links_in {
            let _ = neuron.links_in.set(Arc::new(RwLock::new(Some(list))));
        }
        if let Some(list) = parts.clustered_by {
            let _ = neuron.clustered_by.set(Arc::new(RwLock::new(Some(list))));
        }
        if let Some(list) = parts.children {
            let _ = neuron.children.set(Arc::new(RwLock::new(Some(list))));
        }
        neuron
    }

    /// Consumes a detached neuron, returning its kind and payload.
    pub(crate) fn into_detached_parts(self) -> (NeuronId, NeuronKind, Payload) {
        let payload = self.value.read().clone();
        (self.id, self.kind, payload)
    }

    pub fn id(&self) -> NeuronId {
        self.id
    }

    pub fn kind(&self) -> NeuronKind {
        self.kind
    }

    pub fn is_cluster(&self) -> bool {
        self.kind.is_cluster()
    }

    // -----------------------------------------------------------------------
    // Flags
    // -----------------------------------------------------------------------

    pub fn is_deleted(&self) -> bool {
        self.flags.load(Ordering::Acquire) & DELETED != 0
    }

    /// Returns `true` if the neuron changed since it was last saved.
    pub fn is_changed(&self) -> bool {
        self.flags.load(Ordering::Acquire) & CHANGED != 0
    }

    /// Returns `true` for uncommitted evaluation results.
    pub fn is_temporary(&self) -> bool {
        self.flags.load(Ordering::Acquire) & TEMPORARY != 0
    }

    pub(crate) fn mark_changed(&self) {
        self.flags.fetch_or(CHANGED, Ordering::AcqRel);
    }

    /// Clears the changed flag, returning whether it was set.
    pub(crate) fn take_changed(&self) -> bool {
        self.flags.fetch_and(!CHANGED, Ordering::AcqRel) & CHANGED != 0
    }

    pub(crate) fn mark_deleted(&self) {
        self.flags.fetch_or(DELETED, Ordering::AcqRel);
    }

    pub(crate) fn mark_temporary(&self) {
        self.flags.fetch_or(TEMPORARY, Ordering::AcqRel);
    }

    /// Turns a temporary neuron into a regular one.
    pub(crate) fn commit(&self) {
        self.flags.fetch_and(!TEMPORARY, Ordering::AcqRel);
    }

    // -----------------------------------------------------------------------
    // Aspect cells
    // -----------------------------------------------------------------------

    /// Returns `true` if the neuron has the given aspect at all.
    pub fn has_aspect(&self, aspect: Aspect) -> bool {
        aspect != Aspect::Children || self.is_cluster()
    }

    /// Returns `true` if the aspect's list was ever written.
    pub fn is_materialized(&self, aspect: Aspect) -> bool {
        match aspect {
            Aspect::Value => true,
            Aspect::LinksOut => materialized(&self.links_out),
            Aspect::LinksIn => materialized(&self.links_in),
            Aspect::ClusteredBy => materialized(&self.clustered_by),
            Aspect::Children => materialized(&self.children),
        }
    }

    pub(crate) fn value_cell(&self) -> &Cell<Payload> {
        &self.value
    }

    pub(crate) fn ids_cell(&self, aspect: Aspect) -> Option<&Cell<IdList>> {
        match aspect {
            Aspect::ClusteredBy => Some(lazy_cell(&self.clustered_by)),
            Aspect::Children if self.is_cluster() => Some(lazy_cell(&self.children)),
            _ => None,
        }
    }

    pub(crate) fn links_cell(&self, aspect: Aspect) -> Option<&Cell<LinkList>> {
        match aspect {
            Aspect::LinksOut => Some(lazy_cell(&self.links_out)),
            Aspect::LinksIn => Some(lazy_cell(&self.links_in)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Neuron {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neuron")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

fn lazy_cell<T>(slot: &OnceLock<Cell<Option<T>>>) -> &Cell<Option<T>> {
    slot.get_or_init(|| Arc::new(RwLock::new(None)))
}

fn materialized<T>(slot: &OnceLock<Cell<Option<T>>>) -> bool {
    slot.get().is_some_and(|cell| cell.read().is_some())
}

/// Flat, serializable form of a neuron and its adjacency lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronParts {
    pub id: NeuronId,
    pub kind: NeuronKind,
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links_out: Option<Vec<LinkKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links_in: Option<Vec<LinkKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clustered_by: Option<Vec<NeuronId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NeuronId>>,
}

impl NeuronParts {
    /// Parts of a neuron with no adjacency lists.
    pub fn bare(id: NeuronId, kind: NeuronKind, payload: Payload) -> Self {
        NeuronParts {
            id,
            kind,
            payload,
            links_out: None,
            links_in: None,
            clustered_by: None,
            children: None,
        }
    }
}
