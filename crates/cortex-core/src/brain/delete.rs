//! Neuron deletion.
//!
//! Deleting a neuron must leave no dangling id anywhere: every link it takes
//! part in is unregistered from the far endpoint, it is removed from every
//! cluster that owns it, and its children lose it as an owner. The set of
//! neighbours is only known after reading the neuron's own lists, so
//! deletion runs in two phases: read the neighbourhood, then lock the
//! neuron and every neighbour in one batch and verify nothing changed in
//! between. A stale snapshot restarts the operation.

use std::collections::BTreeSet;

use super::Brain;
use crate::error::CoreError;
use crate::event::BrainEvent;
use crate::id::{LinkKey, NeuronId};
use crate::lock::{Aspect, LockRequest, LockSet};
use crate::neuron::Neuron;

/// The neighbourhood of a neuron as seen by the first phase.
#[derive(PartialEq)]
struct Neighbourhood {
    links_out: Vec<LinkKey>,
    links_in: Vec<LinkKey>,
    clustered_by: Vec<NeuronId>,
    children: Vec<NeuronId>,
}

impl Neighbourhood {
    fn read(locks: &LockSet, neuron: &Neuron) -> Result<Self, CoreError> {
        let id = neuron.id();
        Ok(Neighbourhood {
            links_out: locks.links(id, Aspect::LinksOut)?.to_vec(),
            links_in: locks.links(id, Aspect::LinksIn)?.to_vec(),
            clustered_by: locks.ids(id, Aspect::ClusteredBy)?.to_vec(),
            children: if neuron.is_cluster() {
                locks.ids(id, Aspect::Children)?.to_vec()
            } else {
                Vec::new()
            },
        })
    }

    /// Every lock the second phase needs, besides the neuron's own aspects.
    fn requests(&self, id: NeuronId) -> Vec<LockRequest> {
        let mut requests = Vec::new();
        requests.extend(self.links_out.iter().map(|k| LockRequest::write(k.to, Aspect::LinksIn)));
        requests.extend(self.links_in.iter().map(|k| LockRequest::write(k.from, Aspect::LinksOut)));
        requests.extend(self.clustered_by.iter().map(|&c| LockRequest::write(c, Aspect::Children)));
        requests.extend(self.children.iter().map(|&c| LockRequest::write(c, Aspect::ClusteredBy)));
        // The neuron's own aspects are requested separately.
        requests.retain(|r| r.neuron != id);
        requests
    }
}

fn own_aspects(neuron: &Neuron, write: bool) -> Vec<LockRequest> {
    Aspect::ALL
        .iter()
        .filter(|&&a| neuron.has_aspect(a))
        .map(|&a| {
            if write {
                LockRequest::write(neuron.id(), a)
            } else {
                LockRequest::read(neuron.id(), a)
            }
        })
        .collect()
}

impl Brain {
    /// Deletes a neuron and detaches it from every neighbour.
    ///
    /// Predefined neurons and neurons still used as a meaning or info item
    /// are rejected before anything changes.
    pub fn delete(&self, id: NeuronId) -> Result<(), CoreError> {
        if id.is_predefined() {
            return Err(CoreError::Predefined { id });
        }
        let neuron = self.neuron(id)?;
        let was_temporary = neuron.is_temporary();

        self.retry(id, || {
            let before = {
                let locks = self.request_locks(&own_aspects(&neuron, false))?;
                Neighbourhood::read(&locks, &neuron)?
            };

            let mut requests = own_aspects(&neuron, true);
            requests.extend(before.requests(id));
            let mut locks = self.request_locks(&requests)?;
            if Neighbourhood::read(&locks, &neuron)? != before {
                return Ok(None);
            }

            let uses = self.usage_count(id);
            if uses > 0 {
                return Err(CoreError::InUse { id, uses });
            }

            self.detach(&mut locks, &neuron, &before)?;
            Ok(Some(()))
        })?;

        if !was_temporary {
            self.changes.neuron_deleted(id);
            self.emit(BrainEvent::NeuronDeleted(id));
        }
        tracing::debug!(%id, "neuron deleted");
        Ok(())
    }

    /// Second phase of [`delete`](Self::delete): everything is locked and
    /// verified.
    fn detach(&self, locks: &mut LockSet, neuron: &Neuron, hood: &Neighbourhood) -> Result<(), CoreError> {
        let id = neuron.id();
        let links: BTreeSet<LinkKey> = hood.links_out.iter().chain(&hood.links_in).copied().collect();
        for &key in &links {
            self.unregister_link(locks, key)?;
        }

        let owners: BTreeSet<NeuronId> = hood.clustered_by.iter().copied().collect();
        for &owner in &owners {
            locks.ids_mut(owner, Aspect::Children)?.retain(|&c| c != id);
        }
        let children: BTreeSet<NeuronId> = hood.children.iter().copied().collect();
        for &child in &children {
            locks.ids_mut(child, Aspect::ClusteredBy)?.retain(|&c| c != id);
        }

        if let Some(meaning) = locks.payload(id)?.meaning() {
            self.remove_usage(meaning);
        }

        neuron.mark_deleted();
        self.neurons.remove(&id);
        self.usage.remove(&id);

        for owner in owners.into_iter().filter(|&o| o != id) {
            self.emit(BrainEvent::NeuronChanged(owner));
        }
        Ok(())
    }

    /// Deletes `id` if it is still an unreferenced temporary. Returns whether
    /// it was released.
    pub fn release_temporary(&self, id: NeuronId) -> bool {
        let Some(neuron) = self.find(id) else {
            return false;
        };
        if !neuron.is_temporary() {
            return false;
        }
        match self.delete(id) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(%id, error = %e, "temporary kept");
                false
            }
        }
    }
}
