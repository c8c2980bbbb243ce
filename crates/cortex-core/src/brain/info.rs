//! Link info lists.
//!
//! Reading or editing a link's info takes a read lock on `from.LinksOut`,
//! which keeps the link registered, plus a read lock on the `Value` of every
//! item being added, which keeps those items alive. The info list itself is
//! guarded by the link's leaf lock, taken last.

use std::sync::Arc;

use super::children::{first_missing, remove_one};
use super::Brain;
use crate::error::CoreError;
use crate::id::{LinkKey, NeuronId};
use crate::link::Link;
use crate::lock::{Aspect, LockMode, LockRequest, LockSet};

impl Brain {
    fn lock_link(&self, key: LinkKey, items: &[NeuronId]) -> Result<(LockSet, Arc<Link>), CoreError> {
        let mut requests = vec![LockRequest::read(key.from, Aspect::LinksOut)];
        requests.extend(items.iter().map(|&i| LockRequest::read(i, Aspect::Value)));
        let locks = self.request_locks(&requests)?;
        let link = self.link(key).ok_or(CoreError::LinkNotFound { key })?;
        Ok((locks, link))
    }

    fn info_changed(&self, key: LinkKey, added: &[NeuronId], removed: &[NeuronId]) {
        for &item in added {
            self.add_usage(item);
            self.commit(item);
        }
        for &item in removed {
            self.remove_usage(item);
        }
        self.changes.link_upserted(key);
    }

    /// Copy of the link's info list.
    pub fn info(&self, key: LinkKey) -> Result<Vec<NeuronId>, CoreError> {
        let _locks = self.request_lock(key.from, Aspect::LinksOut, LockMode::Read)?;
        let link = self.link(key).ok_or(CoreError::LinkNotFound { key })?;
        let info = link.info().clone();
        Ok(info)
    }

    /// Appends items to the info list.
    pub fn add_info(&self, key: LinkKey, items: &[NeuronId]) -> Result<(), CoreError> {
        let (_locks, link) = self.lock_link(key, items)?;
        link.info_mut().extend_from_slice(items);
        self.info_changed(key, items, &[]);
        Ok(())
    }

    /// Inserts `item` at `index` (0 ≤ index ≤ len).
    pub fn insert_info(&self, key: LinkKey, item: NeuronId, index: usize) -> Result<(), CoreError> {
        let (_locks, link) = self.lock_link(key, &[item])?;
        let mut info = link.info_mut();
        if index > info.len() {
            return Err(CoreError::IndexOutOfRange {
                id: key.from,
                index,
                len: info.len(),
            });
        }
        info.insert(index, item);
        drop(info);
        self.info_changed(key, &[item], &[]);
        Ok(())
    }

    /// Replaces the item at `index`, returning the previous one.
    pub fn set_info(&self, key: LinkKey, index: usize, item: NeuronId) -> Result<NeuronId, CoreError> {
        let (_locks, link) = self.lock_link(key, &[item])?;
        let mut info = link.info_mut();
        let len = info.len();
        let Some(slot) = info.get_mut(index) else {
            return Err(CoreError::IndexOutOfRange { id: key.from, index, len });
        };
        let old = std::mem::replace(slot, item);
        drop(info);
        self.info_changed(key, &[item], &[old]);
        Ok(old)
    }

    /// Removes the first occurrence of `item`.
    pub fn remove_info(&self, key: LinkKey, item: NeuronId) -> Result<(), CoreError> {
        self.remove_info_items(key, &[item])
    }

    /// Removes the first occurrence of each of `items` under one lock. If
    /// any is missing, the list is left untouched.
    pub fn remove_info_items(&self, key: LinkKey, items: &[NeuronId]) -> Result<(), CoreError> {
        let (_locks, link) = self.lock_link(key, &[])?;
        let mut info = link.info_mut();
        if let Some(item) = first_missing(&info, items) {
            return Err(CoreError::InfoNotFound { key, item });
        }
        for &item in items {
            remove_one(&mut info, item);
        }
        drop(info);
        self.info_changed(key, &[], items);
        Ok(())
    }

    /// Removes and returns the item at `index`.
    pub fn remove_info_at(&self, key: LinkKey, index: usize) -> Result<NeuronId, CoreError> {
        let (_locks, link) = self.lock_link(key, &[])?;
        let mut info = link.info_mut();
        if index >= info.len() {
            return Err(CoreError::IndexOutOfRange {
                id: key.from,
                index,
                len: info.len(),
            });
        }
        let item = info.remove(index);
        drop(info);
        self.info_changed(key, &[], &[item]);
        Ok(item)
    }

    /// Empties the info list, returning the removed items.
    pub fn clear_info(&self, key: LinkKey) -> Result<Vec<NeuronId>, CoreError> {
        let (_locks, link) = self.lock_link(key, &[])?;
        let removed = std::mem::take(&mut *link.info_mut());
        self.info_changed(key, &[], &removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::NeuronKind;

    fn linked() -> (Brain, LinkKey) {
        let brain = Brain::new();
        let f = brain.create(NeuronKind::Neuron);
        let t = brain.create(NeuronKind::Neuron);
        let m = brain.create(NeuronKind::Neuron);
        let key = brain.insert_link(f, t, m).unwrap();
        (brain, key)
    }

    #[test]
    fn info_keeps_order() {
        let (brain, key) = linked();
        let a = brain.create(NeuronKind::Neuron);
        let b = brain.create(NeuronKind::Neuron);
        let c = brain.create(NeuronKind::Neuron);
        brain.add_info(key, &[a, c]).unwrap();
        brain.insert_info(key, b, 1).unwrap();
        assert_eq!(brain.info(key).unwrap(), vec![a, b, c]);

        assert_eq!(brain.set_info(key, 0, c).unwrap(), a);
        assert_eq!(brain.remove_info_at(key, 1).unwrap(), b);
        assert_eq!(brain.info(key).unwrap(), vec![c, c]);
        assert_eq!(brain.usage_count(c), 2);
        assert_eq!(brain.usage_count(a), 0);

        brain.remove_info(key, c).unwrap();
        assert_eq!(brain.clear_info(key).unwrap(), vec![c]);
        assert_eq!(brain.usage_count(c), 0);
    }

    #[test]
    fn out_of_range_leaves_info_untouched() {
        let (brain, key) = linked();
        let a = brain.create(NeuronKind::Neuron);
        assert!(matches!(
            brain.insert_info(key, a, 1),
            Err(CoreError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            brain.set_info(key, 0, a),
            Err(CoreError::IndexOutOfRange { .. })
        ));
        assert!(brain.info(key).unwrap().is_empty());
        assert_eq!(brain.usage_count(a), 0);
    }

    #[test]
    fn missing_item_and_link_are_lookup_misses() {
        let (brain, key) = linked();
        let a = brain.create(NeuronKind::Neuron);
        assert!(brain.remove_info(key, a).unwrap_err().is_lookup_miss());

        let other = LinkKey::new(key.to, key.from, key.meaning);
        assert!(brain.info(other).unwrap_err().is_lookup_miss());
    }

    #[test]
    fn remove_info_items_is_all_or_nothing() {
        let (brain, key) = linked();
        let a = brain.create(NeuronKind::Neuron);
        let b = brain.create(NeuronKind::Neuron);
        brain.add_info(key, &[a, b, a]).unwrap();

        assert!(brain.remove_info_items(key, &[b, b]).unwrap_err().is_lookup_miss());
        assert_eq!(brain.info(key).unwrap(), vec![a, b, a]);
        assert_eq!(brain.usage_count(b), 1);

        brain.remove_info_items(key, &[a, b]).unwrap();
        assert_eq!(brain.info(key).unwrap(), vec![a]);
        assert_eq!(brain.usage_count(a), 1);
        assert_eq!(brain.usage_count(b), 0);
    }

    #[test]
    fn removing_link_releases_info_usage() {
        let (brain, key) = linked();
        let a = brain.create(NeuronKind::Neuron);
        brain.add_info(key, &[a]).unwrap();
        assert_eq!(brain.usage_count(a), 1);
        brain.remove_link(key).unwrap();
        assert_eq!(brain.usage_count(a), 0);
    }
}
