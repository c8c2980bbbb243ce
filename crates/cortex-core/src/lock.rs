//! Per-neuron, per-aspect reader/writer locking.
//!
//! Every neuron exposes five independently lockable [`Aspect`]s. Operations
//! that touch several neurons describe what they need as a batch of
//! [`LockRequest`]s; the [`LockManager`] sorts and deduplicates the batch by
//! `(neuron id, aspect)` before taking anything, so two batches that overlap
//! always acquire their common locks in the same order and can never wait on
//! each other in a cycle.
//!
//! A successful acquisition yields a [`LockSet`] holding owned guards. The
//! set is all-or-nothing: on any failure every lock taken so far is dropped
//! before the error is returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::{LinkKey, NeuronId};
use crate::kind::Payload;
use crate::neuron::{IdList, LinkList, Neuron};

/// A disjoint, independently lockable facet of a neuron.
///
/// The declaration order is the secondary key of the global lock order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Aspect {
    Value,
    LinksOut,
    LinksIn,
    Children,
    ClusteredBy,
}

impl Aspect {
    pub const ALL: [Aspect; 5] = [
        Aspect::Value,
        Aspect::LinksOut,
        Aspect::LinksIn,
        Aspect::Children,
        Aspect::ClusteredBy,
    ];
}

/// Lock mode: read (shared) or write (exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    Read,
    Write,
}

/// One entry of a batched lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub neuron: NeuronId,
    pub aspect: Aspect,
    pub mode: LockMode,
}

impl LockRequest {
    pub fn read(neuron: NeuronId, aspect: Aspect) -> Self {
        LockRequest {
            neuron,
            aspect,
            mode: LockMode::Read,
        }
    }

    pub fn write(neuron: NeuronId, aspect: Aspect) -> Self {
        LockRequest {
            neuron,
            aspect,
            mode: LockMode::Write,
        }
    }
}

/// Errors from lock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The neuron is not registered.
    #[error("cannot lock unknown neuron {neuron}")]
    UnknownNeuron { neuron: NeuronId },

    /// The neuron was deleted before or while the request waited.
    #[error("cannot lock deleted neuron {neuron}")]
    Deleted { neuron: NeuronId },

    /// The neuron has no such aspect (e.g. `Children` on a non-cluster).
    #[error("neuron {neuron} has no {aspect:?} aspect")]
    AspectUnavailable { neuron: NeuronId, aspect: Aspect },

    /// The lock could not be taken within the configured timeout.
    #[error("timed out waiting for {mode:?} lock on {aspect:?} of {neuron}")]
    Timeout {
        neuron: NeuronId,
        aspect: Aspect,
        mode: LockMode,
    },

    /// The lock set does not hold this neuron+aspect.
    #[error("{aspect:?} of {neuron} is not held by this lock set")]
    NotHeld { neuron: NeuronId, aspect: Aspect },

    /// The lock is held in read mode but write access was requested.
    #[error("{aspect:?} of {neuron} is held for reading only")]
    NotWritable { neuron: NeuronId, aspect: Aspect },
}

/// Counters describing lock manager traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Lock sets handed out.
    pub acquired: u64,
    /// Requests that gave up waiting.
    pub timeouts: u64,
    /// Requests rejected before or after waiting (unknown, deleted, aspect).
    pub rejected: u64,
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

enum Guard {
    ValueRead(ArcRwLockReadGuard<RawRwLock, Payload>),
    ValueWrite(ArcRwLockWriteGuard<RawRwLock, Payload>),
    IdsRead(ArcRwLockReadGuard<RawRwLock, IdList>),
    IdsWrite(ArcRwLockWriteGuard<RawRwLock, IdList>),
    LinksRead(ArcRwLockReadGuard<RawRwLock, LinkList>),
    LinksWrite(ArcRwLockWriteGuard<RawRwLock, LinkList>),
}

impl Guard {
    fn mode(&self) -> LockMode {
        match self {
            Guard::ValueRead(_) | Guard::IdsRead(_) | Guard::LinksRead(_) => LockMode::Read,
            Guard::ValueWrite(_) | Guard::IdsWrite(_) | Guard::LinksWrite(_) => LockMode::Write,
        }
    }
}

struct HeldLock {
    neuron: Arc<Neuron>,
    aspect: Aspect,
    guard: Guard,
}

impl HeldLock {
    fn key(&self) -> (NeuronId, Aspect) {
        (self.neuron.id(), self.aspect)
    }
}

/// A resolved batch entry: the neuron itself instead of its id.
pub(crate) struct LockTarget {
    pub neuron: Arc<Neuron>,
    pub aspect: Aspect,
    pub mode: LockMode,
}

// ---------------------------------------------------------------------------
// LockManager
// ---------------------------------------------------------------------------

/// Acquires batched aspect locks in the global `(id, aspect)` order.
pub struct LockManager {
    timeout: Duration,
    acquired: AtomicU64,
    timeouts: AtomicU64,
    rejected: AtomicU64,
}

impl LockManager {
    /// Creates a lock manager whose waits give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        LockManager {
            timeout,
            acquired: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn stats(&self) -> LockStats {
        LockStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Acquires every target, all-or-nothing.
    ///
    /// Targets are sorted by `(id, aspect)` and deduplicated, a write request
    /// winning over a read request for the same pair. Deleted or aspect-less
    /// targets are rejected before anything is taken.
    pub(crate) fn acquire(
        &self,
        targets: impl IntoIterator<Item = LockTarget>,
    ) -> Result<LockSet, LockError> {
        let mut batch: SmallVec<[LockTarget; 8]> = targets.into_iter().collect();
        batch.sort_by_key(|t| (t.neuron.id(), t.aspect));
        batch.dedup_by(|next, kept| {
            if next.neuron.id() == kept.neuron.id() && next.aspect == kept.aspect {
                kept.mode = kept.mode.max(next.mode);
                true
            } else {
                false
            }
        });

        for target in &batch {
            if target.neuron.is_deleted() {
                self.record_rejection();
                return Err(LockError::Deleted {
                    neuron: target.neuron.id(),
                });
            }
            if !target.neuron.has_aspect(target.aspect) {
                self.record_rejection();
                return Err(LockError::AspectUnavailable {
                    neuron: target.neuron.id(),
                    aspect: target.aspect,
                });
            }
        }

        let mut held = Vec::with_capacity(batch.len());
        for target in batch {
            let Some(guard) = self.lock_one(&target) else {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    neuron = %target.neuron.id(),
                    aspect = ?target.aspect,
                    mode = ?target.mode,
                    "lock wait timed out; releasing {} held lock(s)",
                    held.len()
                );
                return Err(LockError::Timeout {
                    neuron: target.neuron.id(),
                    aspect: target.aspect,
                    mode: target.mode,
                });
            };
            held.push(HeldLock {
                neuron: target.neuron,
                aspect: target.aspect,
                guard,
            });
        }

        // A delete may have completed while we were waiting.
        if let Some(dead) = held.iter().find(|h| h.neuron.is_deleted()) {
            self.record_rejection();
            return Err(LockError::Deleted {
                neuron: dead.neuron.id(),
            });
        }

        self.acquired.fetch_add(1, Ordering::Relaxed);
        Ok(LockSet { held })
    }

    fn lock_one(&self, target: &LockTarget) -> Option<Guard> {
        let neuron = &target.neuron;
        let timeout = self.timeout;
        match (target.aspect, target.mode) {
            (Aspect::Value, LockMode::Read) => neuron
                .value_cell()
                .try_read_arc_for(timeout)
                .map(Guard::ValueRead),
            (Aspect::Value, LockMode::Write) => neuron
                .value_cell()
                .try_write_arc_for(timeout)
                .map(Guard::ValueWrite),
            (Aspect::LinksOut | Aspect::LinksIn, mode) => {
                let cell = neuron.links_cell(target.aspect)?;
                match mode {
                    LockMode::Read => cell.try_read_arc_for(timeout).map(Guard::LinksRead),
                    LockMode::Write => cell.try_write_arc_for(timeout).map(Guard::LinksWrite),
                }
            }
            (Aspect::Children | Aspect::ClusteredBy, mode) => {
                let cell = neuron.ids_cell(target.aspect)?;
                match mode {
                    LockMode::Read => cell.try_read_arc_for(timeout).map(Guard::IdsRead),
                    LockMode::Write => cell.try_write_arc_for(timeout).map(Guard::IdsWrite),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LockSet
// ---------------------------------------------------------------------------

/// An acquired batch of aspect locks, released on drop.
///
/// Accessors look up the guard for a `(neuron, aspect)` pair and fail with
/// [`LockError::NotHeld`] or [`LockError::NotWritable`] if the set does not
/// cover the access. Mutable accessors mark the neuron as changed.
pub struct LockSet {
    held: Vec<HeldLock>,
}

impl LockSet {
    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Mode in which `(neuron, aspect)` is held, if at all.
    pub fn mode(&self, neuron: NeuronId, aspect: Aspect) -> Option<LockMode> {
        self.position(neuron, aspect)
            .ok()
            .map(|i| self.held[i].guard.mode())
    }

    /// The locked neuron, if any of its aspects is held.
    pub fn neuron(&self, id: NeuronId) -> Option<&Arc<Neuron>> {
        self.held
            .iter()
            .find(|h| h.neuron.id() == id)
            .map(|h| &h.neuron)
    }

    /// Ids in acquisition order.
    pub fn keys(&self) -> impl Iterator<Item = (NeuronId, Aspect)> + '_ {
        self.held.iter().map(HeldLock::key)
    }

    pub fn payload(&self, neuron: NeuronId) -> Result<&Payload, LockError> {
        match &self.find(neuron, Aspect::Value)?.guard {
            Guard::ValueRead(g) => Ok(&**g),
            Guard::ValueWrite(g) => Ok(&**g),
            _ => Err(not_held(neuron, Aspect::Value)),
        }
    }

    pub fn payload_mut(&mut self, neuron: NeuronId) -> Result<&mut Payload, LockError> {
        let held = self.find_mut(neuron, Aspect::Value)?;
        match &mut held.guard {
            Guard::ValueWrite(g) => {
                held.neuron.mark_changed();
                Ok(&mut **g)
            }
            _ => Err(not_writable(neuron, Aspect::Value)),
        }
    }

    /// Id list of a `Children` or `ClusteredBy` aspect; empty if untouched.
    pub fn ids(&self, neuron: NeuronId, aspect: Aspect) -> Result<&[NeuronId], LockError> {
        match &self.find(neuron, aspect)?.guard {
            Guard::IdsRead(g) => Ok(g.as_deref().unwrap_or(&[])),
            Guard::IdsWrite(g) => Ok(g.as_deref().unwrap_or(&[])),
            _ => Err(not_held(neuron, aspect)),
        }
    }

    /// Mutable id list, materializing it on first write.
    pub fn ids_mut(&mut self, neuron: NeuronId, aspect: Aspect) -> Result<&mut Vec<NeuronId>, LockError> {
        let held = self.find_mut(neuron, aspect)?;
        match &mut held.guard {
            Guard::IdsWrite(g) => {
                held.neuron.mark_changed();
                Ok(g.get_or_insert_with(Vec::new))
            }
            Guard::IdsRead(_) => Err(not_writable(neuron, aspect)),
            _ => Err(not_held(neuron, aspect)),
        }
    }

    /// Link list of a `LinksOut` or `LinksIn` aspect; empty if untouched.
    pub fn links(&self, neuron: NeuronId, aspect: Aspect) -> Result<&[LinkKey], LockError> {
        match &self.find(neuron, aspect)?.guard {
            Guard::LinksRead(g) => Ok(g.as_deref().unwrap_or(&[])),
            Guard::LinksWrite(g) => Ok(g.as_deref().unwrap_or(&[])),
            _ => Err(not_held(neuron, aspect)),
        }
    }

    pub fn links_mut(&mut self, neuron: NeuronId, aspect: Aspect) -> Result<&mut Vec<LinkKey>, LockError> {
        let held = self.find_mut(neuron, aspect)?;
        match &mut held.guard {
            Guard::LinksWrite(g) => {
                held.neuron.mark_changed();
                Ok(g.get_or_insert_with(Vec::new))
            }
            Guard::LinksRead(_) => Err(not_writable(neuron, aspect)),
            _ => Err(not_held(neuron, aspect)),
        }
    }

    /// Returns the list of an aspect if it was ever materialized.
    pub(crate) fn ids_snapshot(&self, neuron: NeuronId, aspect: Aspect) -> Result<Option<Vec<NeuronId>>, LockError> {
        match &self.find(neuron, aspect)?.guard {
            Guard::IdsRead(g) => Ok((**g).clone()),
            Guard::IdsWrite(g) => Ok((**g).clone()),
            _ => Err(not_held(neuron, aspect)),
        }
    }

    pub(crate) fn links_snapshot(&self, neuron: NeuronId, aspect: Aspect) -> Result<Option<Vec<LinkKey>>, LockError> {
        match &self.find(neuron, aspect)?.guard {
            Guard::LinksRead(g) => Ok((**g).clone()),
            Guard::LinksWrite(g) => Ok((**g).clone()),
            _ => Err(not_held(neuron, aspect)),
        }
    }

    /// Releases a single lock early. Returns `false` if it was not held.
    pub fn release_one(&mut self, neuron: NeuronId, aspect: Aspect) -> bool {
        match self.position(neuron, aspect) {
            Ok(i) => {
                self.held.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    /// Releases every lock in the set.
    pub fn release(self) {
        drop(self);
    }

    fn position(&self, neuron: NeuronId, aspect: Aspect) -> Result<usize, LockError> {
        self.held
            .binary_search_by_key(&(neuron, aspect), HeldLock::key)
            .map_err(|_| not_held(neuron, aspect))
    }

    fn find(&self, neuron: NeuronId, aspect: Aspect) -> Result<&HeldLock, LockError> {
        let i = self.position(neuron, aspect)?;
        Ok(&self.held[i])
    }

    fn find_mut(&mut self, neuron: NeuronId, aspect: Aspect) -> Result<&mut HeldLock, LockError> {
        let i = self.position(neuron, aspect)?;
        Ok(&mut self.held[i])
    }
}

impl std::fmt::Debug for LockSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.held.iter().map(|h| (h.neuron.id(), h.aspect, h.guard.mode())))
            .finish()
    }
}

fn not_held(neuron: NeuronId, aspect: Aspect) -> LockError {
    LockError::NotHeld { neuron, aspect }
}

fn not_writable(neuron: NeuronId, aspect: Aspect) -> LockError {
    LockError::NotWritable { neuron, aspect }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::NeuronKind;

    fn neuron(id: u64, kind: NeuronKind) -> Arc<Neuron> {
        Arc::new(Neuron::new(NeuronId(id), kind, kind.default_payload()))
    }

    fn target(n: &Arc<Neuron>, aspect: Aspect, mode: LockMode) -> LockTarget {
        LockTarget {
            neuron: Arc::clone(n),
            aspect,
            mode,
        }
    }

    fn manager() -> LockManager {
        LockManager::new(Duration::from_millis(50))
    }

    #[test]
    fn batch_is_sorted_and_deduplicated() {
        let a = neuron(2000, NeuronKind::Neuron);
        let b = neuron(1500, NeuronKind::Cluster);
        let set = manager()
            .acquire([
                target(&a, Aspect::LinksOut, LockMode::Read),
                target(&b, Aspect::Children, LockMode::Write),
                target(&a, Aspect::Value, LockMode::Read),
                target(&a, Aspect::LinksOut, LockMode::Write),
            ])
            .unwrap();

        let keys: Vec<_> = set.keys().collect();
        assert_eq!(
            keys,
            vec![
                (NeuronId(1500), Aspect::Children),
                (NeuronId(2000), Aspect::Value),
                (NeuronId(2000), Aspect::LinksOut),
            ]
        );
        assert_eq!(set.mode(NeuronId(2000), Aspect::LinksOut), Some(LockMode::Write));
    }

    #[test]
    fn rejects_children_on_non_cluster() {
        let a = neuron(2000, NeuronKind::Int);
        let err = manager()
            .acquire([target(&a, Aspect::Children, LockMode::Read)])
            .unwrap_err();
        assert_eq!(
            err,
            LockError::AspectUnavailable {
                neuron: NeuronId(2000),
                aspect: Aspect::Children
            }
        );
    }

    #[test]
    fn rejects_deleted_neuron_without_taking_locks() {
        let a = neuron(2000, NeuronKind::Neuron);
        let b = neuron(2001, NeuronKind::Neuron);
        b.mark_deleted();
        let mgr = manager();
        let err = mgr
            .acquire([
                target(&a, Aspect::Value, LockMode::Write),
                target(&b, Aspect::Value, LockMode::Write),
            ])
            .unwrap_err();
        assert!(matches!(err, LockError::Deleted { .. }));
        // Nothing of the failed batch is still held.
        assert!(a.value_cell().try_write().is_some());
        assert_eq!(mgr.stats().rejected, 1);
    }

    #[test]
    fn timeout_releases_partial_set() {
        let a = neuron(2000, NeuronKind::Neuron);
        let b = neuron(2001, NeuronKind::Neuron);
        let mgr = manager();
        let blocker = mgr.acquire([target(&b, Aspect::Value, LockMode::Write)]).unwrap();

        let err = mgr
            .acquire([
                target(&a, Aspect::Value, LockMode::Write),
                target(&b, Aspect::Value, LockMode::Read),
            ])
            .unwrap_err();
        assert!(matches!(err, LockError::Timeout { neuron: NeuronId(2001), .. }));
        assert!(a.value_cell().try_write().is_some(), "partial lock leaked");
        assert_eq!(mgr.stats().timeouts, 1);
        drop(blocker);
    }

    #[test]
    fn readers_share_writers_exclude() {
        let a = neuron(2000, NeuronKind::Neuron);
        let mgr = manager();
        let r1 = mgr.acquire([target(&a, Aspect::LinksIn, LockMode::Read)]).unwrap();
        let r2 = mgr.acquire([target(&a, Aspect::LinksIn, LockMode::Read)]).unwrap();
        assert!(mgr.acquire([target(&a, Aspect::LinksIn, LockMode::Write)]).is_err());
        // A different aspect of the same neuron is independent.
        assert!(mgr.acquire([target(&a, Aspect::LinksOut, LockMode::Write)]).is_ok());
        drop((r1, r2));
        assert!(mgr.acquire([target(&a, Aspect::LinksIn, LockMode::Write)]).is_ok());
    }

    #[test]
    fn accessors_enforce_mode() {
        let a = neuron(2000, NeuronKind::Int);
        let mut set = manager()
            .acquire([
                target(&a, Aspect::Value, LockMode::Write),
                target(&a, Aspect::ClusteredBy, LockMode::Read),
            ])
            .unwrap();

        *set.payload_mut(NeuronId(2000)).unwrap() = Payload::Int(7);
        assert_eq!(set.payload(NeuronId(2000)).unwrap(), &Payload::Int(7));
        assert!(set.ids(NeuronId(2000), Aspect::ClusteredBy).unwrap().is_empty());
        assert!(matches!(
            set.ids_mut(NeuronId(2000), Aspect::ClusteredBy),
            Err(LockError::NotWritable { .. })
        ));
        assert!(matches!(
            set.links(NeuronId(2000), Aspect::LinksOut),
            Err(LockError::NotHeld { .. })
        ));

        assert!(set.release_one(NeuronId(2000), Aspect::Value));
        assert!(!set.release_one(NeuronId(2000), Aspect::Value));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn payload_mut_under_read_lock_leaves_neuron_clean() {
        let a = neuron(2000, NeuronKind::Int);
        a.take_changed();
        let mut set = manager()
            .acquire([target(&a, Aspect::Value, LockMode::Read)])
            .unwrap();
        assert!(matches!(
            set.payload_mut(NeuronId(2000)),
            Err(LockError::NotWritable { .. })
        ));
        assert!(!a.is_changed());
    }
}
