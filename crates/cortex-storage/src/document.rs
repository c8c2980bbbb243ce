//! The serializable image of a brain.
//!
//! A [`BrainDocument`] holds every committed neuron and every link in flat
//! form, sorted by id and key so that equal brains produce equal documents.
//! [`BrainDocument::validate`] checks the structural invariants before a
//! document is turned back into a brain.

use std::collections::HashMap;

use cortex_core::{CancelToken, LinkKey, LinkParts, NeuronId, NeuronParts};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Current document format version.
pub const FORMAT_VERSION: u32 = 1;

/// Flat image of a brain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainDocument {
    pub version: u32,
    /// The brain's id counter; every stored id lies below it.
    pub next_id: u64,
    pub neurons: Vec<NeuronParts>,
    pub links: Vec<LinkParts>,
}

impl BrainDocument {
    /// Builds a document, sorting neurons by id and links by key.
    pub fn new(next_id: u64, mut neurons: Vec<NeuronParts>, mut links: Vec<LinkParts>) -> Self {
        neurons.sort_by_key(|n| n.id);
        links.sort_by_key(|l| l.key);
        BrainDocument {
            version: FORMAT_VERSION,
            next_id,
            neurons,
            links,
        }
    }

    pub fn neuron(&self, id: NeuronId) -> Option<&NeuronParts> {
        self.neurons
            .binary_search_by_key(&id, |n| n.id)
            .ok()
            .map(|i| &self.neurons[i])
    }

    pub fn link(&self, key: LinkKey) -> Option<&LinkParts> {
        self.links
            .binary_search_by_key(&key, |l| l.key)
            .ok()
            .map(|i| &self.links[i])
    }

    /// Checks every structural invariant of the stored graph.
    ///
    /// - ids are unique, not reserved and below `next_id`
    /// - payloads fit their neuron kinds
    /// - every referenced id (link endpoint, meaning, info item, child,
    ///   owner) is stored
    /// - every link is listed exactly once by both of its endpoints, and
    ///   every listed key is a stored link
    /// - a child occurs in a cluster as often as the cluster occurs in the
    ///   child's owner list
    ///
    /// The token is checked between neurons.
    pub fn validate(&self, cancel: &CancelToken) -> Result<(), StorageError> {
        if self.version != FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: self.version,
                expected: FORMAT_VERSION,
            });
        }

        let mut neurons: HashMap<NeuronId, &NeuronParts> = HashMap::with_capacity(self.neurons.len());
        for n in &self.neurons {
            if n.id.is_empty() || n.id.is_temp() {
                return Err(StorageError::integrity(format!("reserved id {} stored", n.id)));
            }
            if n.id.0 >= self.next_id {
                return Err(StorageError::integrity(format!(
                    "neuron {} is not below next_id {}",
                    n.id, self.next_id
                )));
            }
            if neurons.insert(n.id, n).is_some() {
                return Err(StorageError::integrity(format!("neuron {} stored twice", n.id)));
            }
        }

        let mut links: HashMap<LinkKey, &LinkParts> = HashMap::with_capacity(self.links.len());
        for l in &self.links {
            if links.insert(l.key, l).is_some() {
                return Err(StorageError::integrity(format!("link {} stored twice", l.key)));
            }
        }

        for n in &self.neurons {
            if cancel.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            if !n.kind.accepts(&n.payload) {
                return Err(StorageError::integrity(format!(
                    "payload of {} does not fit kind {:?}",
                    n.id, n.kind
                )));
            }
            if let Some(meaning) = n.payload.meaning() {
                require(&neurons, meaning, "cluster meaning")?;
            }

            for key in n.links_out.iter().flatten() {
                if key.from != n.id || !links.contains_key(key) {
                    return Err(StorageError::integrity(format!("{} lists unknown outgoing link {key}", n.id)));
                }
            }
            for key in n.links_in.iter().flatten() {
                if key.to != n.id || !links.contains_key(key) {
                    return Err(StorageError::integrity(format!("{} lists unknown incoming link {key}", n.id)));
                }
            }

            if n.children.is_some() && !n.kind.is_cluster() {
                return Err(StorageError::integrity(format!("{} has children but is not a cluster", n.id)));
            }
            for &child in n.children.iter().flatten() {
                let c = require(&neurons, child, "child")?;
                if occurrences(n.children.as_ref(), &child) != occurrences(c.clustered_by.as_ref(), &n.id) {
                    return Err(StorageError::integrity(format!(
                        "child {child} of {} is not mirrored in its owner list",
                        n.id
                    )));
                }
            }
            for &owner in n.clustered_by.iter().flatten() {
                let o = require(&neurons, owner, "owner")?;
                if occurrences(n.clustered_by.as_ref(), &owner) != occurrences(o.children.as_ref(), &n.id) {
                    return Err(StorageError::integrity(format!(
                        "owner {owner} of {} does not list it as child",
                        n.id
                    )));
                }
            }
        }

        for l in &self.links {
            let from = require(&neurons, l.key.from, "link source")?;
            let to = require(&neurons, l.key.to, "link target")?;
            require(&neurons, l.key.meaning, "link meaning")?;
            for &item in &l.info {
                require(&neurons, item, "link info")?;
            }
            if occurrences(from.links_out.as_ref(), &l.key) != 1 || occurrences(to.links_in.as_ref(), &l.key) != 1 {
                return Err(StorageError::integrity(format!(
                    "link {} is not registered exactly once at both endpoints",
                    l.key
                )));
            }
        }
        Ok(())
    }
}

fn require<'a>(
    neurons: &HashMap<NeuronId, &'a NeuronParts>,
    id: NeuronId,
    what: &str,
) -> Result<&'a NeuronParts, StorageError> {
    neurons
        .get(&id)
        .copied()
        .ok_or_else(|| StorageError::integrity(format!("{what} refers to missing neuron {id}")))
}

fn occurrences<T: PartialEq>(list: Option<&Vec<T>>, item: &T) -> usize {
    list.map_or(0, |l| l.iter().filter(|x| *x == item).count())
}
