//! Readable labels for script function handles
//!
//! Hosts identify functions by opaque handles. The labeler resolves a handle
//! once through a host callback, formats it and caches the result.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_MAX_ENTRIES: usize = 4096;
const SCRIPT_ROOT: &str = "media/lua/";

/// What the host knows about a function handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionKind {
    /// Script closure with optional source location
    Script {
        file: Option<String>,
        line: u32,
        name: Option<String>,
    },
    /// Function implemented by the host
    Native(String),
    /// Already a usable label
    Named(String),
    Unresolved,
}

/// Labeler counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelerStats {
    pub total_labeled: u64,
    pub unknown_labeled: u64,
    pub cache_hits: u64,
    pub cache_size: usize,
    pub unknown_ratio: f64,
    pub cache_hit_ratio: f64,
}

/// Bounded cache of handle to label
#[derive(Debug)]
pub struct FunctionLabeler<K: Eq + Hash + Clone + Debug> {
    cache: DashMap<K, Arc<str>>,
    max_entries: usize,
    total_labeled: AtomicU64,
    unknown_labeled: AtomicU64,
    cache_hits: AtomicU64,
}

impl<K: Eq + Hash + Clone + Debug> Default for FunctionLabeler<K> {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl<K: Eq + Hash + Clone + Debug> FunctionLabeler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labeler whose cache is cleared once it holds `max_entries` handles
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            cache: DashMap::new(),
            max_entries: max_entries.max(1),
            total_labeled: AtomicU64::new(0),
            unknown_labeled: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Label for `key`, resolving it with `describe` on a cache miss
    pub fn label_of(&self, key: &K, describe: impl FnOnce(&K) -> FunctionKind) -> Arc<str> {
        if let Some(label) = self.cache.get(key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(&label);
        }

        let kind = describe(key);
        let unknown = matches!(kind, FunctionKind::Unresolved);
        let label: Arc<str> = Arc::from(format_label(&kind, key));

        if self.cache.len() >= self.max_entries {
            debug!("Function label cache full ({} entries), clearing", self.cache.len());
            self.cache.clear();
        }
        self.cache.insert(key.clone(), Arc::clone(&label));

        self.total_labeled.fetch_add(1, Ordering::Relaxed);
        if unknown {
            self.unknown_labeled.fetch_add(1, Ordering::Relaxed);
        }
        label
    }

    /// Drop the cached label of a handle the host has released
    pub fn forget(&self, key: &K) -> bool {
        self.cache.remove(key).is_some()
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> LabelerStats {
        let total = self.total_labeled.load(Ordering::Relaxed);
        let unknown = self.unknown_labeled.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        LabelerStats {
            total_labeled: total,
            unknown_labeled: unknown,
            cache_hits: hits,
            cache_size: self.cache.len(),
            unknown_ratio: ratio(unknown, total),
            cache_hit_ratio: ratio(hits, total + hits),
        }
    }

    /// Reset counters; cached labels stay valid
    pub fn reset_stats(&self) {
        self.total_labeled.store(0, Ordering::Relaxed);
        self.unknown_labeled.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn format_label<K: Debug>(kind: &FunctionKind, key: &K) -> String {
    match kind {
        FunctionKind::Script {
            file: Some(file),
            line,
            name,
        } if !file.is_empty() => {
            let file = shorten_filename(file);
            match name.as_deref() {
                Some(name) if !name.is_empty() => format!("{}:{} ({})", file, line, name),
                _ => format!("{}:{}", file, line),
            }
        }
        FunctionKind::Script { .. } => format!("script:closure#{:?}", key),
        FunctionKind::Native(name) => format!("[Native] {}", name),
        FunctionKind::Named(name) => name.clone(),
        FunctionKind::Unresolved => format!("unknown:{:?}", key),
    }
}

/// Keep the path from the script root, or the last three components
pub fn shorten_filename(path: &str) -> String {
    if let Some(idx) = path.find(SCRIPT_ROOT) {
        return path[idx..].to_owned();
    }

    let parts: Vec<&str> = path.split(['/', '\\']).collect();
    if parts.len() <= 3 {
        return path.to_owned();
    }
    parts[parts.len() - 3..].join("/")
}
