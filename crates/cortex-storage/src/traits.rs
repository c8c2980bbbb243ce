//! The [`GraphStore`] trait defining the storage contract for brains.
//!
//! Two-layer API design:
//! - **Low-level CRUD** methods write single neuron or link records and
//!   serve incremental saves.
//! - **High-level convenience** methods (`save_brain`, `load_brain`) move a
//!   whole brain through a [`BrainDocument`].
//!
//! All backends implement this trait and are fully swappable.

use cortex_core::{Brain, BrainConfig, CancelToken, ChangeSet, LinkKey, LinkParts, NeuronId, NeuronParts};

use crate::convert::{decompose, recompose};
use crate::document::BrainDocument;
use crate::error::StorageError;

/// The storage contract for brains.
///
/// The trait is synchronous; a store is owned by one host thread while the
/// brain itself is shared.
pub trait GraphStore {
    // -------------------------------------------------------------------
    // Whole-document operations
    // -------------------------------------------------------------------

    /// Replaces everything stored with `document`.
    fn save_document(&mut self, document: &BrainDocument, cancel: &CancelToken) -> Result<(), StorageError>;

    /// Reads everything stored. Fails with [`StorageError::Empty`] if nothing
    /// was ever saved.
    fn load_document(&self) -> Result<BrainDocument, StorageError>;

    /// Applies the changes drained from a brain on top of the last save.
    ///
    /// Deletions are applied before upserts. The store's id counter never
    /// moves backwards.
    fn save_changes(&mut self, changes: &ChangeSet) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // High-level convenience methods
    // -------------------------------------------------------------------

    /// Saves a full image of `brain`, replacing whatever was stored.
    fn save_brain(&mut self, brain: &Brain, cancel: &CancelToken) -> Result<(), StorageError> {
        let document = decompose(brain)?;
        self.save_document(&document, cancel)?;
        tracing::info!(
            neurons = document.neurons.len(),
            links = document.links.len(),
            "brain saved"
        );
        Ok(())
    }

    /// Loads, validates and rebuilds the stored brain.
    fn load_brain(&self, config: BrainConfig, cancel: &CancelToken) -> Result<Brain, StorageError> {
        let document = self.load_document()?;
        let (neurons, links) = (document.neurons.len(), document.links.len());
        let brain = recompose(document, config, cancel)?;
        tracing::info!(neurons, links, "brain loaded");
        Ok(brain)
    }

    // -------------------------------------------------------------------
    // Neuron CRUD
    // -------------------------------------------------------------------

    /// Inserts or replaces one neuron record.
    fn upsert_neuron(&mut self, neuron: &NeuronParts) -> Result<(), StorageError>;

    /// Retrieves one neuron record.
    fn get_neuron(&self, id: NeuronId) -> Result<NeuronParts, StorageError>;

    /// Deletes one neuron record.
    fn delete_neuron(&mut self, id: NeuronId) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Link CRUD
    // -------------------------------------------------------------------

    /// Inserts or replaces one link record.
    fn upsert_link(&mut self, link: &LinkParts) -> Result<(), StorageError>;

    /// Deletes one link record.
    fn delete_link(&mut self, key: LinkKey) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Query methods
    // -------------------------------------------------------------------

    /// Number of stored neurons.
    fn neuron_count(&self) -> Result<usize, StorageError>;

    /// Number of stored links.
    fn link_count(&self) -> Result<usize, StorageError>;
}
