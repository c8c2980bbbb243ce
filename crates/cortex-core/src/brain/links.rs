//! Link creation and removal.
//!
//! A link is registered in `from.LinksOut`, in `to.LinksIn` and in the link
//! table, and counts as one use of its meaning. All of that happens under a
//! single batched lock: write on both endpoint lists and read on the
//! meaning's value, which keeps the meaning from being deleted meanwhile.

use std::collections::HashSet;
use std::sync::Arc;

use super::Brain;
use crate::error::CoreError;
use crate::event::BrainEvent;
use crate::id::{LinkKey, NeuronId};
use crate::link::Link;
use crate::lock::{Aspect, LockRequest, LockSet};

impl Brain {
    /// The link with this key, if it exists.
    pub fn link(&self, key: LinkKey) -> Option<Arc<Link>> {
        self.links.get(&key).map(|l| Arc::clone(l.value()))
    }

    pub fn link_exists(&self, key: LinkKey) -> bool {
        self.links.contains_key(&key)
    }

    /// Creates the link `from -[meaning]-> to`.
    ///
    /// Fails with [`CoreError::DuplicateLink`] if the triple already exists.
    pub fn insert_link(&self, from: NeuronId, to: NeuronId, meaning: NeuronId) -> Result<LinkKey, CoreError> {
        let key = LinkKey::new(from, to, meaning);
        if meaning.is_empty() {
            return Err(CoreError::NeuronNotFound { id: meaning });
        }
        let mut locks = self.request_locks(&[
            LockRequest::write(from, Aspect::LinksOut),
            LockRequest::write(to, Aspect::LinksIn),
            LockRequest::read(meaning, Aspect::Value),
        ])?;
        if self.links.contains_key(&key) {
            return Err(CoreError::DuplicateLink { key });
        }
        locks.links_mut(from, Aspect::LinksOut)?.push(key);
        locks.links_mut(to, Aspect::LinksIn)?.push(key);
        self.links.insert(key, Arc::new(Link::new(key, Vec::new())));
        self.add_usage(meaning);
        for id in [from, to, meaning] {
            self.commit(id);
        }
        drop(locks);

        self.changes.link_upserted(key);
        self.emit(BrainEvent::LinkCreated(key));
        Ok(key)
    }

    /// Removes a link from both endpoints and the link table.
    pub fn remove_link(&self, key: LinkKey) -> Result<(), CoreError> {
        let mut locks = self.request_locks(&[
            LockRequest::write(key.from, Aspect::LinksOut),
            LockRequest::write(key.to, Aspect::LinksIn),
        ])?;
        if !self.links.contains_key(&key) {
            return Err(CoreError::LinkNotFound { key });
        }
        self.unregister_link(&mut locks, key)?;
        drop(locks);
        self.emit(BrainEvent::LinkRemoved(key));
        Ok(())
    }

    /// Removes `key` from both endpoint lists and the table. The caller
    /// holds write locks on `from.LinksOut` and `to.LinksIn`.
    pub(crate) fn unregister_link(&self, locks: &mut LockSet, key: LinkKey) -> Result<(), CoreError> {
        locks.links_mut(key.from, Aspect::LinksOut)?.retain(|k| *k != key);
        locks.links_mut(key.to, Aspect::LinksIn)?.retain(|k| *k != key);
        if let Some((_, link)) = self.links.remove(&key) {
            self.remove_usage(key.meaning);
            for &item in link.info().iter() {
                self.remove_usage(item);
            }
            self.changes.link_removed(key);
        }
        Ok(())
    }

    /// Removes the outgoing links of `from` whose meaning is one of
    /// `meanings`, or every outgoing link if `meanings` is empty, in one
    /// locked step. Returns how many links were removed.
    pub fn remove_links_out(&self, from: NeuronId, meanings: &[NeuronId]) -> Result<usize, CoreError> {
        self.remove_links_where(from, Aspect::LinksOut, meanings)
    }

    /// Removes the incoming links of `to` whose meaning is one of
    /// `meanings`, or every incoming link if `meanings` is empty.
    pub fn remove_links_in(&self, to: NeuronId, meanings: &[NeuronId]) -> Result<usize, CoreError> {
        self.remove_links_where(to, Aspect::LinksIn, meanings)
    }

    fn remove_links_where(&self, id: NeuronId, aspect: Aspect, meanings: &[NeuronId]) -> Result<usize, CoreError> {
        let (own, far) = match aspect {
            Aspect::LinksOut => (Aspect::LinksOut, Aspect::LinksIn),
            _ => (Aspect::LinksIn, Aspect::LinksOut),
        };
        let matches = |k: &LinkKey| meanings.is_empty() || meanings.contains(&k.meaning);
        let far_end = |k: &LinkKey| if own == Aspect::LinksOut { k.to } else { k.from };

        let removed = self.retry(id, || {
            let snapshot = self.snapshot_links(id, own)?;
            let mut requests = vec![LockRequest::write(id, own)];
            requests.extend(
                snapshot
                    .iter()
                    .filter(|k| matches(*k))
                    .map(|k| LockRequest::write(far_end(k), far)),
            );
            let mut locks = self.request_locks(&requests)?;

            let doomed: Vec<LinkKey> = locks
                .links(id, own)?
                .iter()
                .filter(|k| matches(*k))
                .copied()
                .collect();
            // A link added since the snapshot may point at an unlocked neuron.
            if doomed.iter().any(|k| locks.mode(far_end(k), far).is_none()) {
                return Ok(None);
            }
            for &key in &doomed {
                self.unregister_link(&mut locks, key)?;
            }
            Ok(Some(doomed))
        })?;

        for &key in &removed {
            self.emit(BrainEvent::LinkRemoved(key));
        }
        Ok(removed.len())
    }

    /// Makes `to` the only target of `from`'s links with `meaning`: existing
    /// links with that meaning are removed and the new one is created, all
    /// under one lock set.
    pub fn set_first_out(&self, from: NeuronId, meaning: NeuronId, to: NeuronId) -> Result<LinkKey, CoreError> {
        if meaning.is_empty() {
            return Err(CoreError::NeuronNotFound { id: meaning });
        }
        let key = LinkKey::new(from, to, meaning);
        let removed = self.retry(from, || {
            let snapshot = self.snapshot_links(from, Aspect::LinksOut)?;
            let mut requests = vec![
                LockRequest::write(from, Aspect::LinksOut),
                LockRequest::write(to, Aspect::LinksIn),
                LockRequest::read(meaning, Aspect::Value),
            ];
            requests.extend(
                snapshot
                    .iter()
                    .filter(|k| k.meaning == meaning)
                    .map(|k| LockRequest::write(k.to, Aspect::LinksIn)),
            );
            let mut locks = self.request_locks(&requests)?;

            let old: Vec<LinkKey> = locks
                .links(from, Aspect::LinksOut)?
                .iter()
                .filter(|k| k.meaning == meaning && **k != key)
                .copied()
                .collect();
            if old.iter().any(|k| locks.mode(k.to, Aspect::LinksIn).is_none()) {
                return Ok(None);
            }
            for &k in &old {
                self.unregister_link(&mut locks, k)?;
            }
            if !self.links.contains_key(&key) {
                locks.links_mut(from, Aspect::LinksOut)?.push(key);
                locks.links_mut(to, Aspect::LinksIn)?.push(key);
                self.links.insert(key, Arc::new(Link::new(key, Vec::new())));
                self.add_usage(meaning);
                for id in [from, to, meaning] {
                    self.commit(id);
                }
                self.changes.link_upserted(key);
            }
            Ok(Some(old))
        })?;

        for k in removed {
            self.emit(BrainEvent::LinkRemoved(k));
        }
        self.emit(BrainEvent::LinkCreated(key));
        Ok(key)
    }

    /// Distinct meanings of `id`'s outgoing (or incoming) links, in first
    /// occurrence order.
    pub fn link_meanings(&self, id: NeuronId, aspect: Aspect) -> Result<Vec<NeuronId>, CoreError> {
        let links = self.snapshot_links(id, aspect)?;
        let mut seen = HashSet::new();
        Ok(links
            .iter()
            .map(|k| k.meaning)
            .filter(|m| seen.insert(*m))
            .collect())
    }
}
