//! In-memory implementation of [`GraphStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and for hosts that
//! do not need durability. It keeps records in ordered maps with the same
//! semantics as the SQLite backend.

use std::collections::BTreeMap;

use cortex_core::{CancelToken, ChangeSet, LinkKey, LinkParts, NeuronId, NeuronParts};

use crate::document::BrainDocument;
use crate::error::StorageError;
use crate::traits::GraphStore;

/// Ordered in-memory record tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    /// `None` until the first save.
    next_id: Option<u64>,
    neurons: BTreeMap<NeuronId, NeuronParts>,
    links: BTreeMap<LinkKey, LinkParts>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding exactly `document`.
    pub fn from_document(document: BrainDocument) -> Self {
        InMemoryStore {
            next_id: Some(document.next_id),
            neurons: document.neurons.into_iter().map(|n| (n.id, n)).collect(),
            links: document.links.into_iter().map(|l| (l.key, l)).collect(),
        }
    }

    fn bump_next_id(&mut self, at_least: u64) {
        let next = self.next_id.get_or_insert(at_least);
        *next = (*next).max(at_least);
    }
}

impl GraphStore for InMemoryStore {
    fn save_document(&mut self, document: &BrainDocument, cancel: &CancelToken) -> Result<(), StorageError> {
        let mut neurons = BTreeMap::new();
        for n in &document.neurons {
            if cancel.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            neurons.insert(n.id, n.clone());
        }
        self.neurons = neurons;
        self.links = document.links.iter().map(|l| (l.key, l.clone())).collect();
        self.next_id = Some(document.next_id);
        Ok(())
    }

    fn load_document(&self) -> Result<BrainDocument, StorageError> {
        let next_id = self.next_id.ok_or(StorageError::Empty)?;
        Ok(BrainDocument::new(
            next_id,
            self.neurons.values().cloned().collect(),
            self.links.values().cloned().collect(),
        ))
    }

    fn save_changes(&mut self, changes: &ChangeSet) -> Result<(), StorageError> {
        for id in &changes.deleted_neurons {
            self.neurons.remove(id);
        }
        for key in &changes.removed_links {
            self.links.remove(key);
        }
        for n in &changes.neurons {
            self.neurons.insert(n.id, n.clone());
        }
        for l in &changes.links {
            self.links.insert(l.key, l.clone());
        }
        self.bump_next_id(changes.next_id);
        Ok(())
    }

    fn upsert_neuron(&mut self, neuron: &NeuronParts) -> Result<(), StorageError> {
        self.bump_next_id(neuron.id.0 + 1);
        self.neurons.insert(neuron.id, neuron.clone());
        Ok(())
    }

    fn get_neuron(&self, id: NeuronId) -> Result<NeuronParts, StorageError> {
        self.neurons.get(&id).cloned().ok_or(StorageError::NeuronNotFound(id))
    }

    fn delete_neuron(&mut self, id: NeuronId) -> Result<(), StorageError> {
        self.neurons
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NeuronNotFound(id))
    }

    fn upsert_link(&mut self, link: &LinkParts) -> Result<(), StorageError> {
        self.links.insert(link.key, link.clone());
        Ok(())
    }

    fn delete_link(&mut self, key: LinkKey) -> Result<(), StorageError> {
        self.links
            .remove(&key)
            .map(|_| ())
            .ok_or(StorageError::LinkNotFound(key))
    }

    fn neuron_count(&self) -> Result<usize, StorageError> {
        Ok(self.neurons.len())
    }

    fn link_count(&self) -> Result<usize, StorageError> {
        Ok(self.links.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::{Brain, BrainConfig, NeuronKind, Payload};

    #[test]
    fn empty_store_has_nothing_to_load() {
        let store = InMemoryStore::new();
        assert!(matches!(store.load_document(), Err(StorageError::Empty)));
        assert_eq!(store.neuron_count().unwrap(), 0);
    }

    #[test]
    fn save_and_load_brain() {
        let brain = Brain::new();
        let a = brain.create_with(NeuronKind::Int, Payload::Int(3)).unwrap();
        let mut store = InMemoryStore::new();
        store.save_brain(&brain, &CancelToken::new()).unwrap();

        let loaded = store.load_brain(BrainConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(loaded.payload(a).unwrap(), Payload::Int(3));
        assert_eq!(store.neuron_count().unwrap(), brain.neuron_count());
    }

    #[test]
    fn crud_records() {
        let mut store = InMemoryStore::new();
        let parts = NeuronParts::bare(NeuronId(2000), NeuronKind::Neuron, Payload::Empty);
        store.upsert_neuron(&parts).unwrap();
        assert_eq!(store.get_neuron(NeuronId(2000)).unwrap(), parts);
        assert_eq!(store.load_document().unwrap().next_id, 2001);

        store.delete_neuron(NeuronId(2000)).unwrap();
        assert!(matches!(
            store.get_neuron(NeuronId(2000)),
            Err(StorageError::NeuronNotFound(_))
        ));
        assert!(store.delete_neuron(NeuronId(2000)).is_err());

        let key = LinkKey::new(NeuronId(1), NeuronId(2), NeuronId(3));
        store.upsert_link(&LinkParts { key, info: vec![] }).unwrap();
        assert_eq!(store.link_count().unwrap(), 1);
        store.delete_link(key).unwrap();
        assert!(matches!(store.delete_link(key), Err(StorageError::LinkNotFound(_))));
    }

    #[test]
    fn cancelled_save_keeps_previous_image() {
        let brain = Brain::new();
        let mut store = InMemoryStore::new();
        store.save_brain(&brain, &CancelToken::new()).unwrap();
        let before = store.load_document().unwrap();

        brain.create(NeuronKind::Neuron);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(store.save_brain(&brain, &cancel), Err(StorageError::Cancelled)));
        assert_eq!(store.load_document().unwrap(), before);
    }
}
