//! Change notifications for designers and hosts.
//!
//! The brain publishes a [`BrainEvent`] after every committed structural
//! change. Subscribers receive events through a plain channel, so the core
//! never depends on whatever UI or transport consumes them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use parking_lot::Mutex;

use crate::id::{LinkKey, NeuronId};

#[derive(Debug, Clone, PartialEq)]
pub enum BrainEvent {
    NeuronCreated(NeuronId),
    /// Value or one of the adjacency lists changed.
    NeuronChanged(NeuronId),
    NeuronDeleted(NeuronId),
    LinkCreated(LinkKey),
    LinkRemoved(LinkKey),
    /// The first processor of an idle pool started running.
    ActivityStarted,
    /// The last busy processor finished; the brain is quiescent.
    ActivityStopped,
}

/// Fan-out of brain events to any number of subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<BrainEvent>>>,
    active: AtomicBool,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<BrainEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        self.active.store(true, Ordering::Release);
        rx
    }

    /// Delivers `event` to every live subscriber, dropping disconnected ones.
    pub fn emit(&self, event: BrainEvent) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            self.active.store(false, Ordering::Release);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
