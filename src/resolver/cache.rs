// src/resolver/cache.rs
//! Match result caching
//!
//! Caches atom match results keyed by a digest of the atom, the filters and
//! the state of the repositories that were consulted. Cached entries are not
//! trusted blindly: the matcher re-validates every package they reference
//! and drops the entry if any has disappeared.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::trace;

/// Default maximum number of cached entries
const DEFAULT_MAX_ENTRIES: usize = 4096;

/// Cache seam used by the matcher
pub trait ResultCache<T>: Send + Sync {
    fn get(&self, key: &str) -> Option<T>;

    /// Store a value; an existing entry for the key is kept
    fn put(&self, key: String, value: T);

    fn invalidate(&self, key: &str);
}

#[derive(Clone)]
struct CacheEntry<T> {
    value: T,
    hits: u32,
    inserted: u64,
}

/// Thread-safe in-memory result cache
pub struct MatchCache<T> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
    max_entries: usize,
}

impl<T: Clone> Default for MatchCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl<T: Clone> MatchCache<T> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::with_capacity(max_entries.min(1024)))),
            max_entries: max_entries.max(1),
        }
    }

    /// Compute a cache key from its parts
    ///
    /// The key is the SHA-256 of the parts joined with a separator that
    /// cannot appear in atoms.
    pub fn compute_key(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update(b"\0");
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Evict the least used entry, oldest first among equals
    fn evict_lru(entries: &mut HashMap<String, CacheEntry<T>>) {
        if let Some(key) = entries
            .iter()
            .min_by_key(|(_, e)| (e.hits, e.inserted))
            .map(|(k, _)| k.clone())
        {
            trace!("Evicting match cache entry {}", key);
            entries.remove(&key);
        }
    }
}

impl<T: Clone + Send + Sync> ResultCache<T> for MatchCache<T> {
    fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.write().ok()?;
        let entry = entries.get_mut(key)?;
        entry.hits += 1;
        Some(entry.value.clone())
    }

    fn put(&self, key: String, value: T) {
        if let Ok(mut entries) = self.entries.write() {
            if entries.contains_key(&key) {
                return;
            }
            if entries.len() >= self.max_entries {
                Self::evict_lru(&mut entries);
            }
            let inserted = entries.values().map(|e| e.inserted + 1).max().unwrap_or(0);
            entries.insert(
                key,
                CacheEntry {
                    value,
                    hits: 0,
                    inserted,
                },
            );
        }
    }

    fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}
