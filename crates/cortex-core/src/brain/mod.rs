//! The graph store.
//!
//! A [`Brain`] owns the id→neuron registry, the link table, the lock
//! manager, the buffer pools, the event bus and the change log. It is an
//! explicit object shared as `Arc<Brain>`; nothing in the workspace reaches
//! it through global state.
//!
//! All structural mutation goes through the methods in this module and its
//! submodules. Each one describes the aspects it touches as one batched lock
//! request, validates its arguments against the locked state, and only then
//! mutates, so an error never leaves a half-applied change behind.

mod children;
mod delete;
mod info;
mod links;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use dashmap::DashMap;

use crate::changes::{ChangeLog, ChangeSet};
use crate::config::BrainConfig;
use crate::error::CoreError;
use crate::event::{BrainEvent, EventBus};
use crate::id::{LinkKey, NeuronId};
use crate::kind::{NeuronKind, Payload, TimerState};
use crate::link::{Link, LinkParts};
use crate::lock::{Aspect, LockError, LockManager, LockMode, LockRequest, LockSet, LockTarget};
use crate::neuron::{Neuron, NeuronParts};
use crate::opcode::Opcode;
use crate::pool::{Factories, Pooled};
use crate::predefined::Predefined;

/// How often a multi-phase operation re-reads its neighbourhood before
/// giving up with [`CoreError::Contention`].
pub(crate) const MAX_ATTEMPTS: usize = 8;

/// The graph store: registry, links, locks, pools and events.
pub struct Brain {
    config: BrainConfig,
    neurons: DashMap<NeuronId, Arc<Neuron>>,
    links: DashMap<LinkKey, Arc<Link>>,
    /// How often each neuron is referenced as a meaning or info item.
    usage: DashMap<NeuronId, usize>,
    next_id: AtomicU64,
    locks: LockManager,
    factories: Factories,
    events: EventBus,
    changes: ChangeLog,
}

impl Default for Brain {
    fn default() -> Self {
        Self::new()
    }
}

impl Brain {
    /// Creates a brain holding only the predefined neurons.
    pub fn new() -> Self {
        Self::with_config(BrainConfig::default())
    }

    pub fn with_config(config: BrainConfig) -> Self {
        let brain = Self::empty(config, NeuronId::FIRST_FREE.0);
        brain.ensure_predefined();
        brain
    }

    fn empty(config: BrainConfig, next_id: u64) -> Self {
        Brain {
            locks: LockManager::new(config.lock_timeout()),
            factories: Factories::new(config.pool_retain),
            config,
            neurons: DashMap::new(),
            links: DashMap::new(),
            usage: DashMap::new(),
            next_id: AtomicU64::new(next_id.max(NeuronId::FIRST_FREE.0)),
            events: EventBus::new(),
            changes: ChangeLog::default(),
        }
    }

    /// Creates every predefined neuron that is missing. Returns how many
    /// were created.
    pub fn ensure_predefined(&self) -> usize {
        let mut created = 0;
        for &pre in Predefined::ALL {
            created += usize::from(self.ensure_fixed(pre.id(), pre.kind()));
        }
        for &op in Opcode::ALL {
            created += usize::from(self.ensure_fixed(Predefined::instruction(op), NeuronKind::Instruction(op)));
        }
        created
    }

    fn ensure_fixed(&self, id: NeuronId, kind: NeuronKind) -> bool {
        let mut inserted = false;
        self.neurons.entry(id).or_insert_with(|| {
            inserted = true;
            Arc::new(Neuron::new(id, kind, kind.default_payload()))
        });
        inserted
    }

    pub fn config(&self) -> &BrainConfig {
        &self.config
    }

    pub fn factories(&self) -> &Factories {
        &self.factories
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Subscribes to change and activity notifications.
    pub fn subscribe(&self) -> Receiver<BrainEvent> {
        self.events.subscribe()
    }

    /// Publishes an event to all subscribers.
    pub fn emit(&self, event: BrainEvent) {
        self.events.emit(event);
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    fn allocate_id(&self) -> NeuronId {
        NeuronId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn register(&self, kind: NeuronKind, payload: Payload, temporary: bool) -> NeuronId {
        let id = self.allocate_id();
        let neuron = Neuron::new(id, kind, payload);
        if temporary {
            neuron.mark_temporary();
        }
        self.neurons.insert(id, Arc::new(neuron));
        if !temporary {
            self.emit(BrainEvent::NeuronCreated(id));
        }
        id
    }

    /// Creates a neuron of `kind` with its default payload.
    pub fn create(&self, kind: NeuronKind) -> NeuronId {
        self.register(kind, kind.default_payload(), false)
    }

    /// Creates a neuron with an explicit payload.
    pub fn create_with(&self, kind: NeuronKind, payload: Payload) -> Result<NeuronId, CoreError> {
        if !kind.accepts(&payload) {
            return Err(CoreError::InvalidPayload {
                id: NeuronId::TEMP,
                kind,
            });
        }
        if let Some(meaning) = payload.meaning() {
            // Meaning references are counted; go through set_meaning.
            self.neuron(meaning)?;
            let id = self.create(kind);
            if let Err(e) = self.set_meaning(id, meaning) {
                // The meaning vanished in between; undo the creation.
                if let Err(undo) = self.delete(id) {
                    tracing::warn!(%id, error = %undo, "half-created neuron left behind");
                }
                return Err(e);
            }
            return Ok(id);
        }
        Ok(self.register(kind, payload, false))
    }

    /// Creates a cluster-kind neuron with the given meaning (or none if
    /// `meaning` is `NeuronId::EMPTY`).
    pub fn create_cluster(&self, kind: NeuronKind, meaning: NeuronId) -> Result<NeuronId, CoreError> {
        if !kind.is_cluster() {
            return Err(CoreError::WrongKind {
                id: NeuronId::TEMP,
                expected: "cluster kind",
                found: kind,
            });
        }
        self.create_with(kind, Payload::Meaning(meaning))
    }

    /// Creates an uncommitted evaluation result.
    ///
    /// Temporaries are committed when attached to a cluster, link or info
    /// list; otherwise the processor that created them releases them.
    pub fn create_temporary(&self, kind: NeuronKind, payload: Payload) -> Result<NeuronId, CoreError> {
        if !kind.accepts(&payload) || payload.meaning().is_some() {
            return Err(CoreError::InvalidPayload {
                id: NeuronId::TEMP,
                kind,
            });
        }
        Ok(self.register(kind, payload, true))
    }

    /// Registers a detached neuron, assigning it a fresh id.
    pub fn add(&self, neuron: Neuron) -> Result<NeuronId, CoreError> {
        let (id, kind, payload) = neuron.into_detached_parts();
        if !id.is_temp() {
            return Err(CoreError::AlreadyRegistered { id });
        }
        self.create_with(kind, payload)
    }

    /// Looks up a live neuron.
    pub fn find(&self, id: NeuronId) -> Option<Arc<Neuron>> {
        self.neurons
            .get(&id)
            .map(|n| Arc::clone(n.value()))
            .filter(|n| !n.is_deleted())
    }

    pub fn contains(&self, id: NeuronId) -> bool {
        self.find(id).is_some()
    }

    /// Like [`find`](Self::find), but a miss is an error.
    pub fn neuron(&self, id: NeuronId) -> Result<Arc<Neuron>, CoreError> {
        match self.neurons.get(&id) {
            Some(n) if n.is_deleted() => Err(CoreError::NeuronDeleted { id }),
            Some(n) => Ok(Arc::clone(n.value())),
            None => Err(CoreError::NeuronNotFound { id }),
        }
    }

    pub fn kind_of(&self, id: NeuronId) -> Result<NeuronKind, CoreError> {
        Ok(self.neuron(id)?.kind())
    }

    fn cluster(&self, id: NeuronId) -> Result<Arc<Neuron>, CoreError> {
        let neuron = self.neuron(id)?;
        if !neuron.is_cluster() {
            return Err(CoreError::WrongKind {
                id,
                expected: "cluster",
                found: neuron.kind(),
            });
        }
        Ok(neuron)
    }

    pub fn neuron_count(&self) -> usize {
        self.neurons.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// All registered ids, sorted.
    pub fn ids(&self) -> Vec<NeuronId> {
        let mut ids: Vec<NeuronId> = self.neurons.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// The id the next created neuron will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    /// Commits a temporary neuron. No-op for regular neurons.
    pub fn commit(&self, id: NeuronId) {
        if let Some(n) = self.neurons.get(&id) {
            n.commit();
        }
    }

    pub fn is_temporary(&self, id: NeuronId) -> bool {
        self.neurons.get(&id).is_some_and(|n| n.is_temporary())
    }

    // -----------------------------------------------------------------------
    // Locking
    // -----------------------------------------------------------------------

    /// Locks a single aspect of a neuron.
    pub fn request_lock(&self, id: NeuronId, aspect: Aspect, mode: LockMode) -> Result<LockSet, LockError> {
        self.request_locks(&[LockRequest { neuron: id, aspect, mode }])
    }

    /// Locks a batch of aspects, all-or-nothing, in the global order.
    pub fn request_locks(&self, requests: &[LockRequest]) -> Result<LockSet, LockError> {
        let mut targets = Vec::with_capacity(requests.len());
        for req in requests {
            let Some(neuron) = self.neurons.get(&req.neuron).map(|n| Arc::clone(n.value())) else {
                self.locks.record_rejection();
                return Err(LockError::UnknownNeuron { neuron: req.neuron });
            };
            targets.push(LockTarget {
                neuron,
                aspect: req.aspect,
                mode: req.mode,
            });
        }
        self.locks.acquire(targets)
    }

    /// Runs a multi-phase operation until its snapshot is still valid once
    /// the full lock set is held. `attempt` returns `Ok(None)` for a stale
    /// snapshot. Neighbours vanishing mid-way also count as stale.
    pub(crate) fn retry<R>(
        &self,
        id: NeuronId,
        mut attempt: impl FnMut() -> Result<Option<R>, CoreError>,
    ) -> Result<R, CoreError> {
        for _ in 0..MAX_ATTEMPTS {
            match attempt() {
                Ok(Some(done)) => return Ok(done),
                Ok(None) => {}
                Err(CoreError::Lock(
                    LockError::Deleted { neuron } | LockError::UnknownNeuron { neuron },
                )) if neuron != id => {}
                Err(e) => return Err(e),
            }
        }
        tracing::warn!(%id, attempts = MAX_ATTEMPTS, "giving up on contended operation");
        Err(CoreError::Contention {
            id,
            attempts: MAX_ATTEMPTS,
        })
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Copies an id aspect (`Children`, `ClusteredBy`) into a pooled buffer
    /// under a read lock that is released before returning.
    pub fn snapshot_ids(&self, id: NeuronId, aspect: Aspect) -> Result<Pooled<NeuronId>, CoreError> {
        let locks = self.request_lock(id, aspect, LockMode::Read)?;
        Ok(self
            .factories
            .ids
            .checkout_from(locks.ids(id, aspect)?.iter().copied()))
    }

    /// Copies a link aspect (`LinksOut`, `LinksIn`) into a pooled buffer.
    pub fn snapshot_links(&self, id: NeuronId, aspect: Aspect) -> Result<Pooled<LinkKey>, CoreError> {
        let locks = self.request_lock(id, aspect, LockMode::Read)?;
        Ok(self
            .factories
            .links
            .checkout_from(locks.links(id, aspect)?.iter().copied()))
    }

    pub fn children(&self, cluster: NeuronId) -> Result<Vec<NeuronId>, CoreError> {
        self.cluster(cluster)?;
        Ok(self.snapshot_ids(cluster, Aspect::Children)?.to_vec())
    }

    /// Clusters that own `id`, once per occurrence.
    pub fn clustered_by(&self, id: NeuronId) -> Result<Vec<NeuronId>, CoreError> {
        Ok(self.snapshot_ids(id, Aspect::ClusteredBy)?.to_vec())
    }

    pub fn links_out(&self, id: NeuronId) -> Result<Vec<LinkKey>, CoreError> {
        Ok(self.snapshot_links(id, Aspect::LinksOut)?.to_vec())
    }

    pub fn links_in(&self, id: NeuronId) -> Result<Vec<LinkKey>, CoreError> {
        Ok(self.snapshot_links(id, Aspect::LinksIn)?.to_vec())
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    pub fn payload(&self, id: NeuronId) -> Result<Payload, CoreError> {
        let locks = self.request_lock(id, Aspect::Value, LockMode::Read)?;
        Ok(locks.payload(id)?.clone())
    }

    /// Replaces the payload of a non-cluster neuron.
    pub fn set_payload(&self, id: NeuronId, payload: Payload) -> Result<(), CoreError> {
        self.update_payload(id, |current| {
            *current = payload;
            Ok(())
        })
    }

    /// Mutates a payload in place under a write lock. The result must still
    /// fit the neuron's kind, otherwise the change is rolled back. Cluster
    /// meanings are reference counted and must use
    /// [`set_meaning`](Self::set_meaning).
    pub fn update_payload<R>(
        &self,
        id: NeuronId,
        f: impl FnOnce(&mut Payload) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let neuron = self.neuron(id)?;
        let kind = neuron.kind();
        if kind.is_cluster() {
            return Err(CoreError::InvalidPayload { id, kind });
        }
        let mut locks = self.request_lock(id, Aspect::Value, LockMode::Write)?;
        let mut next = locks.payload(id)?.clone();
        let out = f(&mut next)?;
        if !kind.accepts(&next) {
            return Err(CoreError::InvalidPayload { id, kind });
        }
        *locks.payload_mut(id)? = next;
        drop(locks);
        self.emit(BrainEvent::NeuronChanged(id));
        Ok(out)
    }

    /// Timer neurons whose `active` flag is set, for an external scheduler.
    pub fn active_timers(&self) -> Vec<(NeuronId, TimerState)> {
        // Collect first: value locks are never waited on while a registry
        // shard is held.
        let candidates: Vec<Arc<Neuron>> = self
            .neurons
            .iter()
            .filter(|e| e.kind() == NeuronKind::Timer)
            .map(|e| Arc::clone(e.value()))
            .collect();
        let mut timers = Vec::new();
        for neuron in candidates {
            if neuron.is_deleted() {
                continue;
            }
            let value = neuron.value_cell().read();
            if let Payload::Timer(state) = &*value {
                if state.active {
                    timers.push((neuron.id(), *state));
                }
            }
        }
        timers.sort_unstable_by_key(|(id, _)| *id);
        timers
    }

    // -----------------------------------------------------------------------
    // Usage counts
    // -----------------------------------------------------------------------

    /// How often `id` is referenced as a link meaning, cluster meaning or
    /// info item.
    pub fn usage_count(&self, id: NeuronId) -> usize {
        self.usage.get(&id).map(|u| *u).unwrap_or(0)
    }

    fn add_usage(&self, id: NeuronId) {
        *self.usage.entry(id).or_insert(0) += 1;
    }

    fn remove_usage(&self, id: NeuronId) {
        let emptied = match self.usage.get_mut(&id) {
            Some(mut uses) => {
                *uses = uses.saturating_sub(1);
                *uses == 0
            }
            None => false,
        };
        if emptied {
            self.usage.remove_if(&id, |_, uses| *uses == 0);
        }
    }

    // -----------------------------------------------------------------------
    // Persistence support
    // -----------------------------------------------------------------------

    /// Flat copy of one neuron, taken under read locks on every aspect.
    pub fn neuron_parts(&self, id: NeuronId) -> Result<NeuronParts, CoreError> {
        let neuron = self.neuron(id)?;
        let requests: Vec<LockRequest> = Aspect::ALL
            .iter()
            .filter(|&&a| neuron.has_aspect(a))
            .map(|&a| LockRequest::read(id, a))
            .collect();
        let locks = self.request_locks(&requests)?;
        Ok(NeuronParts {
            id,
            kind: neuron.kind(),
            payload: locks.payload(id)?.clone(),
            links_out: locks.links_snapshot(id, Aspect::LinksOut)?,
            links_in: locks.links_snapshot(id, Aspect::LinksIn)?,
            clustered_by: locks.ids_snapshot(id, Aspect::ClusteredBy)?,
            children: if neuron.is_cluster() {
                locks.ids_snapshot(id, Aspect::Children)?
            } else {
                None
            },
        })
    }

    /// Flat copy of one link.
    pub fn link_parts(&self, key: LinkKey) -> Result<LinkParts, CoreError> {
        let _alive = self.request_lock(key.from, Aspect::LinksOut, LockMode::Read)?;
        let link = self.link(key).ok_or(CoreError::LinkNotFound { key })?;
        Ok(link.to_parts())
    }

    /// Flat copy of every committed neuron and every link, in id/key order.
    ///
    /// Each neuron is copied under its own locks; callers wanting a
    /// consistent image save while the brain is quiescent.
    pub fn export_parts(&self) -> Result<(Vec<NeuronParts>, Vec<LinkParts>), CoreError> {
        let mut neurons = Vec::with_capacity(self.neurons.len());
        for id in self.ids() {
            match self.neuron_parts(id) {
                Ok(parts) if !self.is_temporary(id) => neurons.push(parts),
                Ok(_) => {}
                // Deleted while exporting.
                Err(CoreError::NeuronNotFound { .. } | CoreError::NeuronDeleted { .. }) => {}
                Err(CoreError::Lock(LockError::Deleted { .. } | LockError::UnknownNeuron { .. })) => {}
                Err(e) => return Err(e),
            }
        }
        let mut links: Vec<LinkParts> = self.links.iter().map(|e| e.value().to_parts()).collect();
        links.sort_unstable_by_key(|l| l.key);
        Ok((neurons, links))
    }

    /// Rebuilds a brain from flat parts that were already validated.
    ///
    /// Usage counts are recomputed from links and cluster meanings, and
    /// missing predefined neurons are re-created.
    pub fn from_parts(
        config: BrainConfig,
        next_id: u64,
        neurons: Vec<NeuronParts>,
        links: Vec<LinkParts>,
    ) -> Brain {
        let brain = Brain::empty(config, next_id);
        let mut highest = 0;
        for parts in neurons {
            if let Some(meaning) = parts.payload.meaning() {
                brain.add_usage(meaning);
            }
            highest = highest.max(parts.id.0);
            brain.neurons.insert(parts.id, Arc::new(Neuron::from_parts(parts)));
        }
        for parts in links {
            brain.add_usage(parts.key.meaning);
            for &item in &parts.info {
                brain.add_usage(item);
            }
            brain.links.insert(parts.key, Arc::new(Link::new(parts.key, parts.info)));
        }
        brain.next_id.fetch_max(highest + 1, Ordering::Relaxed);
        let recreated = brain.ensure_predefined();
        if recreated > 0 {
            tracing::info!(recreated, "re-created missing predefined neurons");
        }
        brain
    }

    /// Drains everything that changed since the previous drain.
    pub fn take_changes(&self) -> Result<ChangeSet, CoreError> {
        let (deleted_neurons, upserted, removed_links) = self.changes.drain();

        let mut changed: Vec<NeuronId> = self
            .neurons
            .iter()
            .filter(|e| !e.is_temporary() && e.take_changed())
            .map(|e| *e.key())
            .collect();
        changed.sort_unstable();

        let mut neurons = Vec::with_capacity(changed.len());
        for id in changed {
            match self.neuron_parts(id) {
                Ok(parts) => neurons.push(parts),
                Err(CoreError::NeuronNotFound { .. } | CoreError::NeuronDeleted { .. }) => {}
                Err(CoreError::Lock(LockError::Deleted { .. } | LockError::UnknownNeuron { .. })) => {}
                Err(e) => return Err(e),
            }
        }
        let links = upserted
            .into_iter()
            .filter_map(|key| self.link(key).map(|l| l.to_parts()))
            .collect();

        Ok(ChangeSet {
            neurons,
            links,
            deleted_neurons,
            removed_links,
            next_id: self.next_id(),
        })
    }

    fn record_change(&self, id: NeuronId) {
        self.emit(BrainEvent::NeuronChanged(id));
    }
}

impl std::fmt::Debug for Brain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Brain")
            .field("neurons", &self.neurons.len())
            .field("links", &self.links.len())
            .field("next_id", &self.next_id())
            .finish()
    }
}
