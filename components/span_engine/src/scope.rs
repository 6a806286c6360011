//! Scoped spans and the per-thread label buffer pool

use echo_types::constants::SCOPE_POOL_SIZE;
use echo_types::MeasurementPoint;
use std::marker::PhantomData;

use crate::profiler::Profiler;
use crate::stack::CompletedSpan;

/// Initial capacity of a pooled label buffer
const LABEL_BUFFER_CAPACITY: usize = 64;

/// Pool of reusable label buffers for one thread
///
/// Labeled spans borrow a buffer on push and hand it back on pop, so steady
/// state profiling does not allocate. When the pool runs dry a fresh buffer
/// is allocated instead; acquisition never blocks and never fails.
#[derive(Debug)]
pub struct ScopePool {
    free: Vec<String>,
    capacity: usize,
    fresh_allocations: u64,
    reused: u64,
}

impl ScopePool {
    pub fn new() -> Self {
        Self::with_capacity(SCOPE_POOL_SIZE)
    }

    /// Pool holding up to `capacity` buffers, pre-filled
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: (0..capacity)
                .map(|_| String::with_capacity(LABEL_BUFFER_CAPACITY))
                .collect(),
            capacity,
            fresh_allocations: 0,
            reused: 0,
        }
    }

    /// Take a buffer holding a copy of `label`
    pub fn acquire(&mut self, label: &str) -> String {
        let mut buffer = match self.free.pop() {
            Some(buffer) => {
                self.reused += 1;
                buffer
            }
            None => {
                self.fresh_allocations += 1;
                String::with_capacity(label.len().max(LABEL_BUFFER_CAPACITY))
            }
        };
        buffer.clear();
        buffer.push_str(label);
        buffer
    }

    /// Return a buffer; dropped if the pool is already full
    pub fn release(&mut self, mut buffer: String) {
        if self.free.len() < self.capacity {
            buffer.clear();
            self.free.push(buffer);
        }
    }

    /// Buffers ready for reuse
    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers allocated because the pool was empty
    pub fn fresh_allocations(&self) -> u64 {
        self.fresh_allocations
    }

    pub fn reused(&self) -> u64 {
        self.reused
    }
}

impl Default for ScopePool {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that pops its span when it goes out of scope
///
/// Dropping the guard, including during unwinding, pops exactly once. A
/// guard whose push was filtered or refused never pops. The guard is tied
/// to the thread that created it because span stacks are per thread.
#[must_use = "the span is closed as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard<'a> {
    profiler: &'a Profiler,
    point: MeasurementPoint,
    open: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> ScopeGuard<'a> {
    pub(crate) fn new(profiler: &'a Profiler, point: MeasurementPoint, tracked: bool) -> Self {
        Self {
            profiler,
            point,
            open: tracked,
            _not_send: PhantomData,
        }
    }

    /// Whether the underlying push was accepted
    pub fn is_tracked(&self) -> bool {
        self.open
    }

    pub fn point(&self) -> MeasurementPoint {
        self.point
    }

    /// Close now and return the completed span
    pub fn close(mut self) -> Option<CompletedSpan> {
        self.finish()
    }

    fn finish(&mut self) -> Option<CompletedSpan> {
        if !std::mem::replace(&mut self.open, false) {
            return None;
        }
        self.profiler.pop(self.point)
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_reuses_buffers() {
        let mut pool = ScopePool::with_capacity(2);
        let a = pool.acquire("alpha");
        assert_eq!(a, "alpha");
        assert_eq!(pool.available(), 1);

        pool.release(a);
        assert_eq!(pool.available(), 2);

        let b = pool.acquire("beta");
        assert_eq!(b, "beta");
        assert_eq!(pool.reused(), 2);
        assert_eq!(pool.fresh_allocations(), 0);
    }

    #[test]
    fn test_exhausted_pool_allocates() {
        let mut pool = ScopePool::with_capacity(1);
        let first = pool.acquire("x");
        let second = pool.acquire("y");
        assert_eq!(pool.fresh_allocations(), 1);

        pool.release(first);
        pool.release(second);
        // Overflow buffer is dropped, pool stays at capacity
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_default_pool_size() {
        let pool = ScopePool::new();
        assert_eq!(pool.capacity(), SCOPE_POOL_SIZE);
        assert_eq!(pool.available(), SCOPE_POOL_SIZE);
    }
}
