//! JSON file implementation of [`GraphStore`].
//!
//! A graph file is one header line followed by the pretty-printed
//! [`BrainDocument`]:
//!
//! ```text
//! cortex-brain v1 blake3:<hex digest of the body>
//! { ... }
//! ```
//!
//! The checksum covers the body bytes exactly as written. Files are written
//! to a sibling temporary path and renamed into place, so a crash never
//! leaves a half-written graph behind. Record-level operations rewrite the
//! whole file.

use std::fs;
use std::path::{Path, PathBuf};

use cortex_core::{CancelToken, ChangeSet, LinkKey, LinkParts, NeuronId, NeuronParts};

use crate::document::{BrainDocument, FORMAT_VERSION};
use crate::error::StorageError;
use crate::memory::InMemoryStore;
use crate::traits::GraphStore;

const MAGIC: &str = "cortex-brain";

/// A graph stored as a checksummed JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a graph file exists at the store's path.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn write(&self, document: &BrainDocument) -> Result<(), StorageError> {
        let body = serde_json::to_string_pretty(document)?;
        let digest = blake3::hash(body.as_bytes());
        let contents = format!("{MAGIC} v{} blake3:{}\n{body}\n", document.version, digest.to_hex());

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Runs `f` against the stored records and writes the result back. A
    /// missing file starts out empty.
    fn modify<R>(&mut self, f: impl FnOnce(&mut InMemoryStore) -> Result<R, StorageError>) -> Result<R, StorageError> {
        let mut records = if self.exists() {
            InMemoryStore::from_document(self.load_document()?)
        } else {
            InMemoryStore::new()
        };
        let result = f(&mut records)?;
        self.write(&records.load_document()?)?;
        Ok(result)
    }

    fn records(&self) -> Result<InMemoryStore, StorageError> {
        Ok(InMemoryStore::from_document(self.load_document()?))
    }
}

/// Splits a graph file into its declared version, checksum and body.
fn parse_envelope(contents: &str) -> Result<(u32, &str, &str), StorageError> {
    let malformed = |reason: &str| StorageError::Malformed {
        reason: reason.to_string(),
    };
    let (header, body) = contents.split_once('\n').ok_or_else(|| malformed("missing header line"))?;
    let mut fields = header.split_whitespace();
    if fields.next() != Some(MAGIC) {
        return Err(malformed("not a cortex graph file"));
    }
    let version = fields
        .next()
        .and_then(|v| v.strip_prefix('v'))
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| malformed("missing format version"))?;
    let checksum = fields
        .next()
        .and_then(|c| c.strip_prefix("blake3:"))
        .ok_or_else(|| malformed("missing checksum"))?;
    Ok((version, checksum, body.strip_suffix('\n').unwrap_or(body)))
}

impl GraphStore for JsonFileStore {
    fn save_document(&mut self, document: &BrainDocument, cancel: &CancelToken) -> Result<(), StorageError> {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        self.write(document)
    }

    fn load_document(&self) -> Result<BrainDocument, StorageError> {
        let contents = fs::read_to_string(&self.path)?;
        let (version, expected, body) = parse_envelope(&contents)?;
        if version != FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: version,
                expected: FORMAT_VERSION,
            });
        }
        let found = blake3::hash(body.as_bytes()).to_hex().to_string();
        if found != expected {
            return Err(StorageError::ChecksumMismatch {
                expected: expected.to_string(),
                found,
            });
        }
        let document: BrainDocument = serde_json::from_str(body)?;
        tracing::debug!(path = %self.path.display(), neurons = document.neurons.len(), "graph file read");
        Ok(document)
    }

    fn save_changes(&mut self, changes: &ChangeSet) -> Result<(), StorageError> {
        self.modify(|records| records.save_changes(changes))
    }

    fn upsert_neuron(&mut self, neuron: &NeuronParts) -> Result<(), StorageError> {
        self.modify(|records| records.upsert_neuron(neuron))
    }

    fn get_neuron(&self, id: NeuronId) -> Result<NeuronParts, StorageError> {
        self.records()?.get_neuron(id)
    }

    fn delete_neuron(&mut self, id: NeuronId) -> Result<(), StorageError> {
        self.modify(|records| records.delete_neuron(id))
    }

    fn upsert_link(&mut self, link: &LinkParts) -> Result<(), StorageError> {
        self.modify(|records| records.upsert_link(link))
    }

    fn delete_link(&mut self, key: LinkKey) -> Result<(), StorageError> {
        self.modify(|records| records.delete_link(key))
    }

    fn neuron_count(&self) -> Result<usize, StorageError> {
        if !self.exists() {
            return Ok(0);
        }
        Ok(self.load_document()?.neurons.len())
    }

    fn link_count(&self) -> Result<usize, StorageError> {
        if !self.exists() {
            return Ok(0);
        }
        Ok(self.load_document()?.links.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::{Brain, BrainConfig, NeuronKind, Payload};

    fn store_in(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::new(dir.path().join("brain.json"))
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let brain = Brain::new();
        let d = brain.create_with(NeuronKind::Double, Payload::Double(0.1)).unwrap();
        store.save_brain(&brain, &CancelToken::new()).unwrap();

        let loaded = store.load_brain(BrainConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(loaded.payload(d).unwrap(), Payload::Double(0.1));
        assert!(!dir.path().join("brain.tmp").exists());
    }

    #[test]
    fn tampered_body_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.save_brain(&Brain::new(), &CancelToken::new()).unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        fs::write(store.path(), contents.replacen("\"version\": 1", "\"version\": 2", 1)).unwrap();
        assert!(matches!(
            store.load_document(),
            Err(StorageError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn missing_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.load_document(), Err(StorageError::Io(_))));
        assert_eq!(store.neuron_count().unwrap(), 0);

        fs::write(store.path(), "{}\n").unwrap();
        assert!(matches!(store.load_document(), Err(StorageError::Malformed { .. })));
    }

    #[test]
    fn record_updates_rewrite_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let parts = NeuronParts::bare(NeuronId(3000), NeuronKind::Int, Payload::Int(1));
        store.upsert_neuron(&parts).unwrap();
        assert_eq!(store.get_neuron(NeuronId(3000)).unwrap(), parts);
        assert_eq!(store.neuron_count().unwrap(), 1);
        store.delete_neuron(NeuronId(3000)).unwrap();
        assert_eq!(store.neuron_count().unwrap(), 0);
    }
}
