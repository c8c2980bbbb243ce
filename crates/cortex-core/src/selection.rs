//! Restartable, duplicable cursors over derived neuron sequences.
//!
//! A [`Selection`] snapshots a list (a cluster's children, a neuron's owning
//! clusters, its outgoing links) into a pooled buffer under a read lock and
//! releases the lock before iterating. Iteration therefore never blocks
//! writers; a concurrent change may make the snapshot stale but never
//! inconsistent.
//!
//! Duplicates share the snapshot and keep independent positions. The buffer
//! goes back to the pool when the last duplicate drops.

use std::sync::Arc;

use crate::brain::Brain;
use crate::error::CoreError;
use crate::id::{LinkKey, NeuronId};
use crate::lock::Aspect;
use crate::pool::Pooled;

/// A cursor over a shared, immutable snapshot.
pub struct Selection<T> {
    items: Arc<Pooled<T>>,
    pos: usize,
}

impl<T: Copy> Selection<T> {
    /// Wraps an already filled buffer.
    pub fn from_pooled(items: Pooled<T>) -> Self {
        Selection {
            items: items.into_shared(),
            pos: 0,
        }
    }

    /// An independent cursor at the same position over the same snapshot.
    pub fn duplicate(&self) -> Self {
        Selection {
            items: Arc::clone(&self.items),
            pos: self.pos,
        }
    }

    /// Jumps to the terminal position without visiting the rest.
    pub fn goto_end(&mut self) {
        self.pos = self.items.len();
    }

    /// Rewinds to the first item.
    pub fn restart(&mut self) {
        self.pos = 0;
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.items.len()
    }

    /// Items not yet visited.
    pub fn remaining(&self) -> usize {
        self.items.len().saturating_sub(self.pos)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// The next item, without advancing.
    pub fn peek(&self) -> Option<T> {
        self.items.get(self.pos).copied()
    }

    /// The whole snapshot, regardless of position.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of cursors sharing the snapshot.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.items)
    }
}

impl<T: Copy> Iterator for Selection<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.peek()?;
        self.pos += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl<T: Copy> Clone for Selection<T> {
    fn clone(&self) -> Self {
        self.duplicate()
    }
}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for Selection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("pos", &self.pos)
            .field("items", &self.items)
            .finish()
    }
}

impl Selection<NeuronId> {
    /// Children of a cluster, in order.
    pub fn children(brain: &Brain, cluster: NeuronId) -> Result<Self, CoreError> {
        Ok(Self::from_pooled(brain.snapshot_ids(cluster, Aspect::Children)?))
    }

    /// Clusters owning a neuron, once per occurrence.
    pub fn clustered_by(brain: &Brain, id: NeuronId) -> Result<Self, CoreError> {
        Ok(Self::from_pooled(brain.snapshot_ids(id, Aspect::ClusteredBy)?))
    }

    /// An arbitrary list of ids, copied into a pooled buffer.
    pub fn from_items(brain: &Brain, items: impl IntoIterator<Item = NeuronId>) -> Self {
        Self::from_pooled(brain.factories().ids.checkout_from(items))
    }

    pub fn single(brain: &Brain, id: NeuronId) -> Self {
        Self::from_items(brain, [id])
    }
}

impl Selection<LinkKey> {
    /// Outgoing links of a neuron, in creation order.
    pub fn links_out(brain: &Brain, id: NeuronId) -> Result<Self, CoreError> {
        Ok(Self::from_pooled(brain.snapshot_links(id, Aspect::LinksOut)?))
    }

    /// Incoming links of a neuron, in creation order.
    pub fn links_in(brain: &Brain, id: NeuronId) -> Result<Self, CoreError> {
        Ok(Self::from_pooled(brain.snapshot_links(id, Aspect::LinksIn)?))
    }
}
