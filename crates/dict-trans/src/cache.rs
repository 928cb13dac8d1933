//! Result caching for dictionary fetches.
//!
//! Provides an LRU cache with TTL expiration for dictionaries returned by the
//! data source. The cache is shared (`Arc`) between copies of a
//! [`TranslationContextBuilder`](crate::TranslationContextBuilder).

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::config::CacheConfig;
use crate::context::Dictionary;
use crate::traits::ALL_CODES;

/// Identity of one batched fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// System dictionary fetch.
    System {
        /// Dictionary code.
        dict_code: String,
        /// Normalized codes argument.
        codes: String,
    },
    /// Table dictionary fetch.
    Table {
        /// Source table.
        table: String,
        /// Column holding codes.
        code_column: String,
        /// Column holding names.
        name_column: String,
        /// Row filter.
        condition: Option<String>,
        /// Normalized codes argument.
        codes: String,
    },
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::System { dict_code, codes } => write!(f, "dict:{}[{}]", dict_code, codes),
            CacheKey::Table {
                table,
                code_column,
                name_column,
                condition,
                codes,
            } => {
                write!(f, "table:{}:{}:{}[{}]", table, code_column, name_column, codes)?;
                if let Some(condition) = condition {
                    write!(f, " where {}", condition)?;
                }
                Ok(())
            }
        }
    }
}

/// A cached dictionary with expiration tracking.
#[derive(Debug, Clone)]
struct CacheEntry {
    dict: Arc<Dictionary>,
    created_at: Instant,
}

impl CacheEntry {
    fn new(dict: Arc<Dictionary>) -> Self {
        Self {
            dict,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Thread-safe LRU cache with TTL expiration for fetched dictionaries.
///
/// # Example
///
/// ```rust
/// use dict_trans::{CacheConfig, CacheKey, DictionaryCache};
/// use std::collections::HashMap;
/// use std::sync::Arc;
///
/// let cache = DictionaryCache::new(CacheConfig::default());
/// let key = CacheKey::System {
///     dict_code: "user_status".to_string(),
///     codes: "0,1".to_string(),
/// };
///
/// let dict: HashMap<String, String> = [("1".to_string(), "Active".to_string())].into();
/// cache.set(key.clone(), Arc::new(dict));
/// assert!(cache.get(&key).is_some());
/// ```
pub struct DictionaryCache {
    inner: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl DictionaryCache {
    /// Creates a cache from configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_capacity(config.max_entries, config.ttl)
    }

    /// Creates a cache with custom capacity and TTL.
    ///
    /// A capacity of 0 is treated as 1.
    pub fn with_capacity(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Gets a cached dictionary, dropping it if expired.
    ///
    /// On a hit the entry is promoted to most-recently-used.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Dictionary>> {
        let mut cache = self.inner.lock();

        if let Some(entry) = cache.get(key) {
            if entry.is_expired(self.ttl) {
                cache.pop(key);
                return None;
            }
            return Some(Arc::clone(&entry.dict));
        }

        None
    }

    /// Stores a dictionary, evicting the least recently used entry if full.
    pub fn set(&self, key: CacheKey, dict: Arc<Dictionary>) {
        self.inner.lock().put(key, CacheEntry::new(dict));
    }

    /// Checks if a key is present without affecting LRU order.
    ///
    /// Expired entries that have not been cleaned up still count.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().contains(key)
    }

    /// Number of entries, including expired ones not yet cleaned up.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Removes expired entries.
    pub fn cleanup_expired(&self) {
        let mut cache = self.inner.lock();
        let ttl = self.ttl;
        let expired_keys: Vec<CacheKey> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired_keys {
            cache.pop(&key);
        }
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let cache = self.inner.lock();
        let total = cache.len();
        let expired = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .count();

        CacheStats {
            total_entries: total,
            expired_entries: expired,
            valid_entries: total.saturating_sub(expired),
        }
    }
}

impl fmt::Debug for DictionaryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("DictionaryCache")
            .field("entries", &stats.total_entries)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Statistics about the cache state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    /// Total number of entries in the cache.
    pub total_entries: usize,
    /// Number of expired entries (not yet cleaned up).
    pub expired_entries: usize,
    /// Number of valid (non-expired) entries.
    pub valid_entries: usize,
}

/// Normalizes a set of codes into the batched `codes` argument.
///
/// Codes are trimmed, deduplicated and sorted so that the same set always
/// yields the same cache key. An empty set becomes the `%` wildcard.
///
/// ```rust
/// use dict_trans::normalize_codes;
///
/// assert_eq!(normalize_codes(["2", " 1", "2"]), "1,2");
/// assert_eq!(normalize_codes(Vec::<String>::new()), "%");
/// ```
pub fn normalize_codes<I, S>(codes: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: BTreeSet<String> = codes
        .into_iter()
        .map(|c| c.as_ref().trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    if unique.is_empty() {
        ALL_CODES.to_string()
    } else {
        unique.into_iter().collect::<Vec<_>>().join(",")
    }
}
