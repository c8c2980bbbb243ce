//! Change tracking for incremental saves.
//!
//! Changed neurons are tracked by their `CHANGED` flag; deletions and link
//! changes cannot be, so the brain records them in a [`ChangeLog`].
//! [`Brain::take_changes`](crate::Brain::take_changes) drains both into a
//! [`ChangeSet`] a store can apply on top of its last full save.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;

use crate::id::{LinkKey, NeuronId};
use crate::link::LinkParts;
use crate::neuron::NeuronParts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkChange {
    Upserted,
    Removed,
}

#[derive(Default)]
struct Pending {
    deleted: BTreeSet<NeuronId>,
    links: BTreeMap<LinkKey, LinkChange>,
}

/// Deletions and link changes since the last drain.
#[derive(Default)]
pub(crate) struct ChangeLog {
    pending: Mutex<Pending>,
}

impl ChangeLog {
    pub(crate) fn neuron_deleted(&self, id: NeuronId) {
        self.pending.lock().deleted.insert(id);
    }

    pub(crate) fn link_upserted(&self, key: LinkKey) {
        self.pending.lock().links.insert(key, LinkChange::Upserted);
    }

    pub(crate) fn link_removed(&self, key: LinkKey) {
        self.pending.lock().links.insert(key, LinkChange::Removed);
    }

    /// Drains the log into (deleted neurons, upserted links, removed links).
    pub(crate) fn drain(&self) -> (Vec<NeuronId>, Vec<LinkKey>, Vec<LinkKey>) {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut upserted = Vec::new();
        let mut removed = Vec::new();
        for (key, change) in pending.links {
            match change {
                LinkChange::Upserted => upserted.push(key),
                LinkChange::Removed => removed.push(key),
            }
        }
        (pending.deleted.into_iter().collect(), upserted, removed)
    }
}

/// Everything that changed since the previous drain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Neurons created or modified, in id order.
    pub neurons: Vec<NeuronParts>,
    /// Links created or whose info changed.
    pub links: Vec<LinkParts>,
    pub deleted_neurons: Vec<NeuronId>,
    pub removed_links: Vec<LinkKey>,
    /// The brain's id counter at drain time.
    pub next_id: u64,
}

impl ChangeSet {
    /// Returns true if nothing changed.
    pub fn is_clean(&self) -> bool {
        self.neurons.is_empty()
            && self.links.is_empty()
            && self.deleted_neurons.is_empty()
            && self.removed_links.is_empty()
    }

    /// Total number of records in the set.
    pub fn total(&self) -> usize {
        self.neurons.len() + self.links.len() + self.deleted_neurons.len() + self.removed_links.len()
    }
}
