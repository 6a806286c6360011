//! Per-thread state with a dedicated slot for the primary thread

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// One `T` per thread
///
/// The registered primary thread uses a field stored directly on the
/// struct; every other thread gets a lazily created entry in a concurrent
/// map. Each slot is only ever locked by its owning thread on the hot path,
/// so the mutexes are uncontended except while draining or snapshotting.
#[derive(Debug)]
pub struct PerThread<T> {
    primary_id: RwLock<Option<ThreadId>>,
    primary: Mutex<T>,
    others: DashMap<ThreadId, Arc<Mutex<T>>>,
}

impl<T: Default> PerThread<T> {
    pub fn new() -> Self {
        Self {
            primary_id: RwLock::new(None),
            primary: Mutex::new(T::default()),
            others: DashMap::new(),
        }
    }

    /// Register `id` as the primary thread
    ///
    /// State follows its thread: the previous primary's state moves into
    /// the map and the new primary's existing state (if any) moves into the
    /// dedicated slot.
    pub fn set_primary(&self, id: ThreadId) {
        let mut current = self.primary_id.write();
        if *current == Some(id) {
            return;
        }

        let mut primary = self.primary.lock();
        let previous = std::mem::take(&mut *primary);
        if let Some(old) = *current {
            self.others.insert(old, Arc::new(Mutex::new(previous)));
        }
        if let Some((_, state)) = self.others.remove(&id) {
            *primary = std::mem::take(&mut *state.lock());
        }
        *current = Some(id);
    }

    pub fn primary_id(&self) -> Option<ThreadId> {
        *self.primary_id.read()
    }

    pub fn is_primary(&self, id: ThreadId) -> bool {
        *self.primary_id.read() == Some(id)
    }

    /// Run `f` against the calling thread's state
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let id = thread::current().id();
        if self.is_primary(id) {
            return f(&mut self.primary.lock());
        }

        let slot = match self.others.get(&id) {
            Some(slot) => Arc::clone(slot.value()),
            None => Arc::clone(self.others.entry(id).or_default().value()),
        };
        let mut state = slot.lock();
        f(&mut state)
    }

    /// Run `f` against the primary thread's state from any thread
    pub fn with_primary<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.primary.lock())
    }

    /// Visit every thread's state, primary first
    pub fn for_each(&self, mut f: impl FnMut(&mut T)) {
        f(&mut self.primary.lock());
        let slots: Vec<Arc<Mutex<T>>> = self.others.iter().map(|e| Arc::clone(e.value())).collect();
        for slot in slots {
            f(&mut slot.lock());
        }
    }

    /// Drop the calling thread's state (for worker threads about to exit)
    pub fn release_current(&self) {
        let id = thread::current().id();
        if !self.is_primary(id) {
            self.others.remove(&id);
        }
    }

    /// Visit every thread's state, then forget all non-primary threads
    ///
    /// The primary slot is kept; worker threads get fresh state on their
    /// next access.
    pub fn drain_and_clear(&self, mut f: impl FnMut(&mut T)) {
        f(&mut self.primary.lock());
        let ids: Vec<ThreadId> = self.others.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, slot)) = self.others.remove(&id) {
                f(&mut slot.lock());
            }
        }
    }

    /// Keep only the non-primary threads whose state satisfies `keep`
    pub fn retain_others(&self, mut keep: impl FnMut(&mut T) -> bool) {
        self.others.retain(|_, slot| keep(&mut slot.lock()));
    }

    /// Threads with state; the primary slot counts once registered
    pub fn thread_count(&self) -> usize {
        self.others.len() + usize::from(self.primary_id().is_some())
    }
}

impl<T: Default> Default for PerThread<T> {
    fn default() -> Self {
        Self::new()
    }
}
