//! Brain configuration and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for a [`Brain`](crate::Brain).
///
/// Every field has a default, so a partial JSON object deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Upper bound on any single lock wait, in milliseconds.
    pub lock_timeout_ms: u64,
    /// Idle buffers each pool keeps for reuse.
    pub pool_retain: usize,
}

impl Default for BrainConfig {
    fn default() -> Self {
        BrainConfig {
            lock_timeout_ms: 5_000,
            pool_retain: 64,
        }
    }
}

impl BrainConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Shared flag checked between units of work of long host operations.
///
/// Cancellation is cooperative: it is observed between neurons of a save or
/// load and between root runs, never in the middle of an instruction.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
