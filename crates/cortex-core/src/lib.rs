//! Graph store for the cortex engine.
//!
//! The brain is a concurrently accessed graph of [`Neuron`]s joined by
//! [`Link`]s. Each neuron has five independently lockable aspects, and
//! every multi-neuron operation takes its locks as one batch in a global
//! order, which rules out deadlock between concurrent operations.
//!
//! # Modules
//!
//! - [`id`]: `NeuronId`, `LinkKey`
//! - [`kind`]: neuron kinds and payloads
//! - [`opcode`]: the closed instruction vocabulary
//! - [`predefined`]: neurons every brain carries at fixed ids
//! - [`neuron`], [`link`]: the node model
//! - [`lock`]: aspects, lock manager, lock sets
//! - [`pool`]: pooled scratch buffers
//! - [`selection`]: restartable, duplicable cursors
//! - [`brain`]: the registry and all structural operations
//! - [`event`], [`changes`], [`config`]: notifications, change tracking, tunables

pub mod brain;
pub mod changes;
pub mod config;
pub mod error;
pub mod event;
pub mod id;
pub mod kind;
pub mod link;
pub mod lock;
pub mod neuron;
pub mod opcode;
pub mod pool;
pub mod predefined;
pub mod selection;

// Re-export commonly used types
pub use brain::Brain;
pub use changes::ChangeSet;
pub use config::{BrainConfig, CancelToken};
pub use error::CoreError;
pub use event::BrainEvent;
pub use id::{LinkKey, NeuronId};
pub use kind::{ConditionalKind, NeuronKind, Payload, TimerState};
pub use link::{Link, LinkParts};
pub use lock::{Aspect, LockError, LockMode, LockRequest, LockSet, LockStats};
pub use neuron::{Neuron, NeuronParts};
pub use opcode::{ArgCount, Family, Opcode, ResultShape};
pub use pool::{BufferPool, Factories, PoolStats, Pooled};
pub use predefined::Predefined;
pub use selection::Selection;
