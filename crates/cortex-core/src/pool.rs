//! Pooled scratch buffers ("factories").
//!
//! Traversal code never allocates its temporary lists directly. It checks a
//! buffer out of a [`BufferPool`], fills it, and the buffer returns to the
//! pool when the [`Pooled`] handle drops. When several consumers need the
//! same buffer (duplicated selection cursors), the handle is wrapped in an
//! `Arc` and recycled once the last consumer is gone.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::id::{LinkKey, NeuronId};

/// Buffers larger than this are dropped instead of retained.
const MAX_RETAINED_CAPACITY: usize = 4096;

/// Counters describing pool traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers handed out.
    pub checkouts: u64,
    /// Buffers returned and kept for reuse.
    pub recycled: u64,
    /// Checkouts that had to allocate a fresh buffer.
    pub allocated: u64,
    /// Buffers currently idle in the pool.
    pub idle: usize,
}

/// A synchronized pool of reusable `Vec<T>` buffers.
pub struct BufferPool<T> {
    idle: Mutex<Vec<Vec<T>>>,
    retain: usize,
    checkouts: AtomicU64,
    recycled: AtomicU64,
    allocated: AtomicU64,
}

impl<T> BufferPool<T> {
    /// Creates a pool that keeps at most `retain` idle buffers.
    pub fn new(retain: usize) -> Arc<Self> {
        Arc::new(BufferPool {
            idle: Mutex::new(Vec::new()),
            retain,
            checkouts: AtomicU64::new(0),
            recycled: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
        })
    }

    /// Checks out an empty buffer.
    pub fn checkout(self: &Arc<Self>) -> Pooled<T> {
        self.checkouts.fetch_add(1, Ordering::Relaxed);
        let buf = match self.idle.lock().pop() {
            Some(buf) => buf,
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                Vec::new()
            }
        };
        Pooled {
            buf,
            pool: Arc::clone(self),
        }
    }

    /// Checks out a buffer and fills it from `items`.
    pub fn checkout_from(self: &Arc<Self>, items: impl IntoIterator<Item = T>) -> Pooled<T> {
        let mut pooled = self.checkout();
        pooled.extend(items);
        pooled
    }

    fn recycle(&self, mut buf: Vec<T>) {
        // Nothing to reuse in a buffer that never allocated.
        if buf.capacity() == 0 || buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buf.clear();
        let mut idle = self.idle.lock();
        if idle.len() < self.retain {
            idle.push(buf);
            self.recycled.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            checkouts: self.checkouts.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
            idle: self.idle.lock().len(),
        }
    }
}

/// A buffer checked out of a [`BufferPool`]; recycled on drop.
pub struct Pooled<T> {
    buf: Vec<T>,
    pool: Arc<BufferPool<T>>,
}

impl<T> Pooled<T> {
    /// Wraps the buffer for shared, reference-counted consumption.
    pub fn into_shared(self) -> Arc<Pooled<T>> {
        Arc::new(self)
    }
}

impl<T: Clone> Pooled<T> {
    /// Copies the contents into an owned `Vec`.
    pub fn to_vec(&self) -> Vec<T> {
        self.buf.clone()
    }
}

impl<T> Deref for Pooled<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.buf
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.buf
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.buf.fmt(f)
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.recycle(buf);
    }
}

/// The pools a brain hands out scratch buffers from.
#[derive(Clone)]
pub struct Factories {
    pub ids: Arc<BufferPool<NeuronId>>,
    pub links: Arc<BufferPool<LinkKey>>,
}

impl Factories {
    pub fn new(retain: usize) -> Self {
        Factories {
            ids: BufferPool::new(retain),
            links: BufferPool::new(retain),
        }
    }

    /// Checks out an empty id buffer.
    pub fn id_list(&self) -> Pooled<NeuronId> {
        self.ids.checkout()
    }

    /// Checks out an empty link-key buffer.
    pub fn link_list(&self) -> Pooled<LinkKey> {
        self.links.checkout()
    }
}
