//! Thread-safe bounded LRU cache of compiled filter programs (spec §4.2).

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::ast::Program;
use super::parse::compile;
use crate::error::SubscriptionError;

/// Default cache capacity.
pub const DEFAULT_CAPACITY: usize = 256;

/// Compiles filter expressions once and caches the result, evicting by
/// true LRU once the bounded capacity (fixed at construction) is reached.
pub struct FilterCache {
    inner: Mutex<LruCache<String, Program>>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

/// Hit/miss accounting for observability (spec §9 "alternatives ... as
/// long as hit/miss counters remain accurate").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl FilterCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is clamped to at least 1");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Return the compiled program for `expression`, compiling (and
    /// caching) it on a miss.
    pub fn get_or_compile(&self, expression: &str) -> Result<Program, SubscriptionError> {
        use std::sync::atomic::Ordering;

        let mut cache = self.inner.lock().expect("filter cache mutex poisoned");
        if let Some(program) = cache.get(expression) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(program.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        drop(cache);

        let program = compile(expression)?;
        let mut cache = self.inner.lock().expect("filter cache mutex poisoned");
        cache.put(expression.to_string(), program.clone());
        Ok(program)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        use std::sync::atomic::Ordering;
        CacheStats { hits: self.hits.load(Ordering::Relaxed), misses: self.misses.load(Ordering::Relaxed) }
    }
}

impl Default for FilterCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
