//! Cluster children and meanings.
//!
//! Every occurrence of a child in a cluster is mirrored by one occurrence of
//! the cluster in the child's `ClusteredBy` list. Both sides change under one
//! batched write lock.

use super::Brain;
use crate::error::CoreError;
use crate::event::BrainEvent;
use crate::id::NeuronId;
use crate::kind::Payload;
use crate::lock::{Aspect, LockMode, LockRequest};

impl Brain {
    /// Inserts `child` at `index` (0 ≤ index ≤ len).
    pub fn insert_child(&self, cluster: NeuronId, child: NeuronId, index: usize) -> Result<(), CoreError> {
        self.insert_child_at(cluster, child, Some(index))
    }

    /// Appends `child` to the end of the cluster.
    pub fn add_child(&self, cluster: NeuronId, child: NeuronId) -> Result<(), CoreError> {
        self.insert_child_at(cluster, child, None)
    }

    fn insert_child_at(&self, cluster: NeuronId, child: NeuronId, index: Option<usize>) -> Result<(), CoreError> {
        self.cluster(cluster)?;
        let mut locks = self.request_locks(&[
            LockRequest::write(cluster, Aspect::Children),
            LockRequest::write(child, Aspect::ClusteredBy),
        ])?;
        let len = locks.ids(cluster, Aspect::Children)?.len();
        let index = index.unwrap_or(len);
        if index > len {
            return Err(CoreError::IndexOutOfRange { id: cluster, index, len });
        }
        locks.ids_mut(cluster, Aspect::Children)?.insert(index, child);
        locks.ids_mut(child, Aspect::ClusteredBy)?.push(cluster);
        self.commit(cluster);
        self.commit(child);
        drop(locks);
        self.record_change(cluster);
        Ok(())
    }

    /// Appends several children in one locked step. Duplicates are allowed.
    pub fn add_children(&self, cluster: NeuronId, children: &[NeuronId]) -> Result<(), CoreError> {
        if children.is_empty() {
            return Ok(());
        }
        self.cluster(cluster)?;
        let mut requests = vec![LockRequest::write(cluster, Aspect::Children)];
        requests.extend(children.iter().map(|&c| LockRequest::write(c, Aspect::ClusteredBy)));
        let mut locks = self.request_locks(&requests)?;

        locks.ids_mut(cluster, Aspect::Children)?.extend_from_slice(children);
        for &child in children {
            locks.ids_mut(child, Aspect::ClusteredBy)?.push(cluster);
            self.commit(child);
        }
        self.commit(cluster);
        drop(locks);
        self.record_change(cluster);
        Ok(())
    }

    /// Removes the first occurrence of `child`.
    pub fn remove_child(&self, cluster: NeuronId, child: NeuronId) -> Result<(), CoreError> {
        self.remove_children(cluster, &[child])
    }

    /// Removes the first occurrence of each of `children` in one locked
    /// step. A child listed twice must occur twice. If any is missing,
    /// nothing is removed.
    pub fn remove_children(&self, cluster: NeuronId, children: &[NeuronId]) -> Result<(), CoreError> {
        if children.is_empty() {
            return Ok(());
        }
        self.cluster(cluster)?;
        let mut requests = vec![LockRequest::write(cluster, Aspect::Children)];
        requests.extend(children.iter().map(|&c| LockRequest::write(c, Aspect::ClusteredBy)));
        let mut locks = self.request_locks(&requests)?;

        if let Some(child) = first_missing(locks.ids(cluster, Aspect::Children)?, children) {
            return Err(CoreError::ChildNotFound { cluster, child });
        }
        for &child in children {
            remove_one(locks.ids_mut(cluster, Aspect::Children)?, child);
            remove_one(locks.ids_mut(child, Aspect::ClusteredBy)?, cluster);
        }
        drop(locks);
        self.record_change(cluster);
        Ok(())
    }

    /// Removes and returns the child at `index`.
    pub fn remove_child_at(&self, cluster: NeuronId, index: usize) -> Result<NeuronId, CoreError> {
        self.cluster(cluster)?;
        let removed = self.retry(cluster, || {
            let child = self.child_at(cluster, index)?;
            let mut locks = self.request_locks(&[
                LockRequest::write(cluster, Aspect::Children),
                LockRequest::write(child, Aspect::ClusteredBy),
            ])?;
            if locks.ids(cluster, Aspect::Children)?.get(index) != Some(&child) {
                return Ok(None);
            }
            locks.ids_mut(cluster, Aspect::Children)?.remove(index);
            remove_one(locks.ids_mut(child, Aspect::ClusteredBy)?, cluster);
            Ok(Some(child))
        })?;
        self.record_change(cluster);
        Ok(removed)
    }

    /// Replaces the child at `index`, returning the previous one.
    pub fn set_child(&self, cluster: NeuronId, index: usize, child: NeuronId) -> Result<NeuronId, CoreError> {
        self.cluster(cluster)?;
        self.neuron(child)?;
        let old = self.retry(cluster, || {
            let old = self.child_at(cluster, index)?;
            let mut locks = self.request_locks(&[
                LockRequest::write(cluster, Aspect::Children),
                LockRequest::write(old, Aspect::ClusteredBy),
                LockRequest::write(child, Aspect::ClusteredBy),
            ])?;
            if locks.ids(cluster, Aspect::Children)?.get(index) != Some(&old) {
                return Ok(None);
            }
            locks.ids_mut(cluster, Aspect::Children)?[index] = child;
            remove_one(locks.ids_mut(old, Aspect::ClusteredBy)?, cluster);
            locks.ids_mut(child, Aspect::ClusteredBy)?.push(cluster);
            Ok(Some(old))
        })?;
        self.commit(cluster);
        self.commit(child);
        self.record_change(cluster);
        Ok(old)
    }

    /// Removes every child, returning them in order.
    pub fn clear_children(&self, cluster: NeuronId) -> Result<Vec<NeuronId>, CoreError> {
        self.cluster(cluster)?;
        let removed = self.retry(cluster, || {
            let snapshot = self.snapshot_ids(cluster, Aspect::Children)?;
            let mut requests = vec![LockRequest::write(cluster, Aspect::Children)];
            requests.extend(snapshot.iter().map(|&c| LockRequest::write(c, Aspect::ClusteredBy)));
            let mut locks = self.request_locks(&requests)?;
            if locks.ids(cluster, Aspect::Children)? != snapshot.as_slice() {
                return Ok(None);
            }
            let removed = std::mem::take(locks.ids_mut(cluster, Aspect::Children)?);
            for &child in &removed {
                remove_one(locks.ids_mut(child, Aspect::ClusteredBy)?, cluster);
            }
            Ok(Some(removed))
        })?;
        self.record_change(cluster);
        Ok(removed)
    }

    /// Position of the first occurrence of `child`.
    pub fn index_of_child(&self, cluster: NeuronId, child: NeuronId) -> Result<Option<usize>, CoreError> {
        self.cluster(cluster)?;
        let locks = self.request_lock(cluster, Aspect::Children, LockMode::Read)?;
        Ok(locks
            .ids(cluster, Aspect::Children)?
            .iter()
            .position(|&c| c == child))
    }

    pub fn child_count(&self, cluster: NeuronId) -> Result<usize, CoreError> {
        self.cluster(cluster)?;
        let locks = self.request_lock(cluster, Aspect::Children, LockMode::Read)?;
        Ok(locks.ids(cluster, Aspect::Children)?.len())
    }

    /// The child at `index`.
    pub fn child_at(&self, cluster: NeuronId, index: usize) -> Result<NeuronId, CoreError> {
        let locks = self.request_lock(cluster, Aspect::Children, LockMode::Read)?;
        let children = locks.ids(cluster, Aspect::Children)?;
        children.get(index).copied().ok_or(CoreError::IndexOutOfRange {
            id: cluster,
            index,
            len: children.len(),
        })
    }

    // -----------------------------------------------------------------------
    // Meaning
    // -----------------------------------------------------------------------

    /// The cluster's meaning, or `None` if unset.
    pub fn meaning(&self, cluster: NeuronId) -> Result<Option<NeuronId>, CoreError> {
        self.cluster(cluster)?;
        Ok(self.payload(cluster)?.meaning())
    }

    /// Sets the cluster's meaning (`NeuronId::EMPTY` clears it), returning
    /// the previous one.
    pub fn set_meaning(&self, cluster: NeuronId, meaning: NeuronId) -> Result<Option<NeuronId>, CoreError> {
        self.cluster(cluster)?;
        let mut requests = vec![LockRequest::write(cluster, Aspect::Value)];
        if !meaning.is_empty() {
            requests.push(LockRequest::read(meaning, Aspect::Value));
        }
        let mut locks = self.request_locks(&requests)?;
        let old = locks.payload(cluster)?.meaning();
        if old == Some(meaning) {
            return Ok(old);
        }
        *locks.payload_mut(cluster)? = Payload::Meaning(meaning);
        if !meaning.is_empty() {
            self.add_usage(meaning);
            self.commit(meaning);
        }
        if let Some(old) = old {
            self.remove_usage(old);
        }
        drop(locks);
        self.emit(BrainEvent::NeuronChanged(cluster));
        Ok(old)
    }
}

/// The first item of `wanted` that occurs in `list` fewer times than it
/// is wanted.
pub(crate) fn first_missing(list: &[NeuronId], wanted: &[NeuronId]) -> Option<NeuronId> {
    wanted
        .iter()
        .find(|&&w| {
            let needed = wanted.iter().filter(|&&x| x == w).count();
            list.iter().filter(|&&x| x == w).count() < needed
        })
        .copied()
}

/// Removes the first occurrence of `id` from `list`.
pub(crate) fn remove_one(list: &mut Vec<NeuronId>, id: NeuronId) -> bool {
    match list.iter().position(|&x| x == id) {
        Some(i) => {
            list.remove(i);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::NeuronKind;

    fn setup() -> (Brain, NeuronId, NeuronId, NeuronId) {
        let brain = Brain::new();
        let meaning = brain.create(NeuronKind::Neuron);
        let c = brain.create_cluster(NeuronKind::Cluster, meaning).unwrap();
        let a = brain.create(NeuronKind::Neuron);
        let b = brain.create(NeuronKind::Neuron);
        brain.add_child(c, a).unwrap();
        brain.add_child(c, b).unwrap();
        (brain, c, a, b)
    }

    #[test]
    fn insert_and_remove_keep_order_and_owners() {
        let (brain, c, a, b) = setup();
        assert_eq!(brain.index_of_child(c, b).unwrap(), Some(1));

        let x = brain.create(NeuronKind::Neuron);
        brain.insert_child(c, x, 1).unwrap();
        assert_eq!(brain.children(c).unwrap(), vec![a, x, b]);
        assert_eq!(brain.clustered_by(x).unwrap(), vec![c]);

        brain.remove_child(c, x).unwrap();
        assert_eq!(brain.children(c).unwrap(), vec![a, b]);
        assert!(brain.clustered_by(x).unwrap().is_empty());
    }

    #[test]
    fn insert_past_end_is_rejected_without_mutation() {
        let (brain, c, a, b) = setup();
        let x = brain.create(NeuronKind::Neuron);
        let err = brain.insert_child(c, x, 3).unwrap_err();
        assert!(matches!(err, CoreError::IndexOutOfRange { index: 3, len: 2, .. }));
        assert_eq!(brain.children(c).unwrap(), vec![a, b]);
        assert!(brain.clustered_by(x).unwrap().is_empty());
    }

    #[test]
    fn duplicates_are_mirrored_per_occurrence() {
        let (brain, c, a, _) = setup();
        brain.add_child(c, a).unwrap();
        assert_eq!(brain.clustered_by(a).unwrap(), vec![c, c]);
        brain.remove_child(c, a).unwrap();
        assert_eq!(brain.clustered_by(a).unwrap(), vec![c]);
    }

    #[test]
    fn set_and_remove_at() {
        let (brain, c, a, b) = setup();
        let x = brain.create(NeuronKind::Neuron);
        assert_eq!(brain.set_child(c, 0, x).unwrap(), a);
        assert_eq!(brain.children(c).unwrap(), vec![x, b]);
        assert!(brain.clustered_by(a).unwrap().is_empty());

        assert_eq!(brain.remove_child_at(c, 1).unwrap(), b);
        assert_eq!(brain.children(c).unwrap(), vec![x]);
        assert!(matches!(
            brain.remove_child_at(c, 5),
            Err(CoreError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn clear_children_detaches_all() {
        let (brain, c, a, b) = setup();
        assert_eq!(brain.clear_children(c).unwrap(), vec![a, b]);
        assert_eq!(brain.child_count(c).unwrap(), 0);
        assert!(brain.clustered_by(a).unwrap().is_empty());
        assert!(brain.clustered_by(b).unwrap().is_empty());
    }

    #[test]
    fn missing_child_is_a_lookup_miss() {
        let (brain, c, _, _) = setup();
        let x = brain.create(NeuronKind::Neuron);
        let err = brain.remove_child(c, x).unwrap_err();
        assert!(err.is_lookup_miss());
    }

    #[test]
    fn remove_children_is_all_or_nothing() {
        let (brain, c, a, b) = setup();
        brain.add_child(c, a).unwrap();
        let x = brain.create(NeuronKind::Neuron);

        // `b` is listed twice but occurs once.
        let err = brain.remove_children(c, &[a, b, b]).unwrap_err();
        assert!(matches!(err, CoreError::ChildNotFound { child, .. } if child == b));
        assert!(brain.remove_children(c, &[a, x]).is_err());
        assert_eq!(brain.children(c).unwrap(), vec![a, b, a]);

        brain.remove_children(c, &[a, a]).unwrap();
        assert_eq!(brain.children(c).unwrap(), vec![b]);
        assert!(brain.clustered_by(a).unwrap().is_empty());
    }

    #[test]
    fn first_missing_counts_multiplicity() {
        let a = NeuronId(2000);
        let b = NeuronId(2001);
        assert_eq!(first_missing(&[a, b, a], &[a, a]), None);
        assert_eq!(first_missing(&[a, b], &[a, a]), Some(a));
        assert_eq!(first_missing(&[a], &[b]), Some(b));
    }

    #[test]
    fn children_of_non_cluster_is_wrong_kind() {
        let brain = Brain::new();
        let n = brain.create(NeuronKind::Int);
        let x = brain.create(NeuronKind::Int);
        assert!(matches!(brain.add_child(n, x), Err(CoreError::WrongKind { .. })));
    }

    #[test]
    fn meaning_is_reference_counted() {
        let (brain, c, _, _) = setup();
        let m1 = brain.meaning(c).unwrap().unwrap();
        assert_eq!(brain.usage_count(m1), 1);

        let m2 = brain.create(NeuronKind::Neuron);
        assert_eq!(brain.set_meaning(c, m2).unwrap(), Some(m1));
        assert_eq!(brain.usage_count(m1), 0);
        assert_eq!(brain.usage_count(m2), 1);

        brain.set_meaning(c, NeuronId::EMPTY).unwrap();
        assert_eq!(brain.meaning(c).unwrap(), None);
        assert_eq!(brain.usage_count(m2), 0);
    }
}
