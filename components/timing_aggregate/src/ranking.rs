//! Time-bounded cache for sorted top-N lists

use echo_types::constants::RANKING_CACHE_TTL_MS;
use parking_lot::Mutex;

#[derive(Debug)]
struct CachedRanking<T> {
    computed_at_ms: u64,
    entries: Vec<T>,
}

/// Caches a fully sorted ranking for a fixed TTL
///
/// Reporting threads may ask for top-N lists every frame; re-sorting is only
/// done once the cached ranking is older than the TTL.
#[derive(Debug)]
pub struct RankingCache<T> {
    ttl_ms: u64,
    cached: Mutex<Option<CachedRanking<T>>>,
}

impl<T: Clone> RankingCache<T> {
    /// Cache with the default one second TTL
    pub fn new() -> Self {
        Self::with_ttl(RANKING_CACHE_TTL_MS)
    }

    pub fn with_ttl(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            cached: Mutex::new(None),
        }
    }

    /// First `n` entries of the ranking, recomputing via `compute` when stale
    pub fn get_or_refresh<F>(&self, now_ms: u64, n: usize, compute: F) -> Vec<T>
    where
        F: FnOnce() -> Vec<T>,
    {
        let mut cached = self.cached.lock();
        let fresh = matches!(
            cached.as_ref(),
            Some(c) if now_ms.saturating_sub(c.computed_at_ms) < self.ttl_ms
        );
        if !fresh {
            *cached = Some(CachedRanking {
                computed_at_ms: now_ms,
                entries: compute(),
            });
        }
        cached
            .as_ref()
            .map(|c| c.entries.iter().take(n).cloned().collect())
            .unwrap_or_default()
    }

    /// Force the next query to recompute
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }
}

impl<T: Clone> Default for RankingCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_cached_within_ttl() {
        let cache = RankingCache::new();
        let computed = Cell::new(0);
        let compute = || {
            computed.set(computed.get() + 1);
            vec![3, 2, 1]
        };

        assert_eq!(cache.get_or_refresh(0, 2, compute), vec![3, 2]);
        assert_eq!(cache.get_or_refresh(999, 3, compute), vec![3, 2, 1]);
        assert_eq!(computed.get(), 1);

        cache.get_or_refresh(1000, 1, compute);
        assert_eq!(computed.get(), 2);
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let cache = RankingCache::with_ttl(10_000);
        assert_eq!(cache.get_or_refresh(0, 5, || vec!["a"]), vec!["a"]);
        assert_eq!(cache.get_or_refresh(1, 5, || vec!["b"]), vec!["a"]);
        cache.invalidate();
        assert_eq!(cache.get_or_refresh(2, 5, || vec!["b"]), vec!["b"]);
    }
}
