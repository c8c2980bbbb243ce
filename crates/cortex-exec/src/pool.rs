//! A bounded pool of processors sharing one brain.
//!
//! [`ProcessorPool::acquire`] hands out a processor wrapped in a guard that
//! resets it and gives it back on drop. The pool keeps `min_size` processors
//! alive, creates more on demand up to `max_size`, and makes callers wait
//! (bounded by `acquire_timeout_ms`) once every processor is busy.
//!
//! The pool also tracks activity: when the number of busy processors goes
//! from zero to one it publishes [`BrainEvent::ActivityStarted`], and when it
//! drops back to zero [`BrainEvent::ActivityStopped`].

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use cortex_core::{Brain, BrainEvent, CancelToken, NeuronId};

use crate::config::{EngineConfig, PoolConfig, ProcessorConfig};
use crate::error::ExecError;
use crate::processor::Processor;

/// Counts describing a pool at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Processors in existence, idle or busy.
    pub alive: usize,
    pub idle: usize,
    pub busy: usize,
}

struct PoolState {
    idle: Vec<Processor>,
    alive: usize,
    busy: usize,
}

pub struct ProcessorPool {
    brain: Arc<Brain>,
    processor: ProcessorConfig,
    config: PoolConfig,
    state: Mutex<PoolState>,
    released: Condvar,
}

impl ProcessorPool {
    /// Creates the pool and its `min_size` initial processors.
    pub fn new(brain: Arc<Brain>, processor: ProcessorConfig, config: PoolConfig) -> Self {
        let max = config.max_size.max(1);
        let min = config.min_size.min(max);
        let idle: Vec<Processor> = (0..min)
            .map(|_| Processor::new(Arc::clone(&brain), processor.clone()))
            .collect();
        tracing::info!(min, max, "processor pool created");
        ProcessorPool {
            brain,
            processor,
            config: PoolConfig {
                min_size: min,
                max_size: max,
                ..config
            },
            state: Mutex::new(PoolState {
                alive: idle.len(),
                idle,
                busy: 0,
            }),
            released: Condvar::new(),
        }
    }

    pub fn from_engine_config(brain: Arc<Brain>, config: &EngineConfig) -> Self {
        Self::new(brain, config.processor.clone(), config.pool.clone())
    }

    pub fn brain(&self) -> &Arc<Brain> {
        &self.brain
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        PoolStatus {
            alive: state.alive,
            idle: state.idle.len(),
            busy: state.busy,
        }
    }

    /// Takes an idle processor, creates one if the pool is below its
    /// maximum, or waits for one to be released.
    pub fn acquire(&self) -> Result<PooledProcessor<'_>, ExecError> {
        let timeout = Duration::from_millis(self.config.acquire_timeout_ms);
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        let processor = loop {
            if let Some(processor) = state.idle.pop() {
                break processor;
            }
            if state.alive < self.config.max_size {
                state.alive += 1;
                tracing::debug!(alive = state.alive, "processor added to pool");
                break Processor::new(Arc::clone(&self.brain), self.processor.clone());
            }
            if self.released.wait_until(&mut state, deadline).timed_out() {
                tracing::warn!(busy = state.busy, "processor pool exhausted");
                return Err(ExecError::PoolExhausted {
                    waited_ms: self.config.acquire_timeout_ms,
                });
            }
        };
        state.busy += 1;
        let started = state.busy == 1;
        drop(state);
        if started {
            tracing::debug!("brain activity started");
            self.brain.emit(BrainEvent::ActivityStarted);
        }
        Ok(PooledProcessor {
            pool: self,
            processor: Some(processor),
        })
    }

    /// Runs `root` on a pooled processor. Result neurons are committed, so
    /// they outlive the reset that returns the processor to the pool.
    pub fn run(&self, root: NeuronId) -> Result<Vec<NeuronId>, ExecError> {
        let mut processor = self.acquire()?;
        let result = processor.run(root)?;
        self.keep(&result);
        Ok(result)
    }

    /// Runs every root on its own thread, at most `max_size` at once since
    /// each run holds a pooled processor. Roots not yet started when
    /// `cancel` fires yield [`ExecError::Cancelled`].
    pub fn run_many(&self, roots: &[NeuronId], cancel: &CancelToken) -> Vec<Result<Vec<NeuronId>, ExecError>> {
        thread::scope(|scope| {
            let handles: Vec<_> = roots
                .iter()
                .map(|&root| {
                    scope.spawn(move || {
                        if cancel.is_cancelled() {
                            return Err(ExecError::Cancelled);
                        }
                        let mut processor = self.acquire()?;
                        if cancel.is_cancelled() {
                            return Err(ExecError::Cancelled);
                        }
                        let result = processor.run(root)?;
                        self.keep(&result);
                        Ok(result)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
    }

    fn keep(&self, result: &[NeuronId]) {
        for &id in result {
            self.brain.commit(id);
        }
    }

    fn release(&self, mut processor: Processor) {
        processor.reset();
        let mut state = self.state.lock();
        state.busy -= 1;
        if state.alive <= self.config.min_size {
            state.idle.push(processor);
        } else {
            state.alive -= 1;
            tracing::debug!(alive = state.alive, "processor retired from pool");
            drop(processor);
        }
        let stopped = state.busy == 0;
        drop(state);
        self.released.notify_one();
        if stopped {
            tracing::debug!("brain activity stopped");
            self.brain.emit(BrainEvent::ActivityStopped);
        }
    }
}

impl Drop for ProcessorPool {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        tracing::info!(alive = state.alive, "processor pool shut down");
    }
}

/// A processor on loan from a [`ProcessorPool`].
pub struct PooledProcessor<'p> {
    pool: &'p ProcessorPool,
    processor: Option<Processor>,
}

impl Deref for PooledProcessor<'_> {
    type Target = Processor;

    fn deref(&self) -> &Processor {
        // Only `None` while being dropped.
        self.processor.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledProcessor<'_> {
    fn deref_mut(&mut self) -> &mut Processor {
        self.processor.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledProcessor<'_> {
    fn drop(&mut self) {
        if let Some(processor) = self.processor.take() {
            self.pool.release(processor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(min: usize, max: usize) -> (Arc<Brain>, ProcessorPool) {
        let brain = Arc::new(Brain::new());
        let config = PoolConfig {
            min_size: min,
            max_size: max,
            acquire_timeout_ms: 50,
        };
        let pool = ProcessorPool::new(Arc::clone(&brain), ProcessorConfig::default(), config);
        (brain, pool)
    }

    #[test]
    fn grows_to_max_and_shrinks_to_min() {
        let (_brain, pool) = pool(1, 2);
        assert_eq!(pool.status(), PoolStatus { alive: 1, idle: 1, busy: 0 });
        {
            let _a = pool.acquire().unwrap();
            let _b = pool.acquire().unwrap();
            assert_eq!(pool.status(), PoolStatus { alive: 2, idle: 0, busy: 2 });
            assert!(matches!(pool.acquire(), Err(ExecError::PoolExhausted { waited_ms: 50 })));
        }
        assert_eq!(pool.status(), PoolStatus { alive: 1, idle: 1, busy: 0 });
    }

    #[test]
    fn activity_events_bracket_busy_periods() {
        let (brain, pool) = pool(1, 2);
        let events = brain.subscribe();
        {
            let _a = pool.acquire().unwrap();
            let _b = pool.acquire().unwrap();
        }
        let activity: Vec<BrainEvent> = events
            .try_iter()
            .filter(|e| matches!(e, BrainEvent::ActivityStarted | BrainEvent::ActivityStopped))
            .collect();
        assert_eq!(activity, vec![BrainEvent::ActivityStarted, BrainEvent::ActivityStopped]);
    }

    #[test]
    fn released_processors_are_reset() {
        let (brain, pool) = pool(1, 1);
        let x = brain.create(cortex_core::NeuronKind::Neuron);
        {
            let mut p = pool.acquire().unwrap();
            p.bind(x, vec![x]);
        }
        let p = pool.acquire().unwrap();
        assert!(p.binding(x).is_none());
        assert!(p.is_idle());
    }
}
