//! Reference-counted, dedup-on-load resource cache
//!
//! Stores expensive derived assets keyed by string, shared behind `Arc`.
//! Every request for a live key increments its reference count; the entry
//! is evicted the instant the count returns to zero, so an entry with
//! zero references never exists.
//!
//! Concurrent requests for a key that is still loading are coalesced onto
//! a single in-flight load: at most one [`PendingLoad`] exists per key,
//! and every caller joins its shared future instead of fetching again.
//! Both tables live under one mutex, so the create-or-join decision and
//! the completion re-check are single-writer critical sections.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::error::CacheError;

/// A single in-flight load, joined by every coalesced caller
type PendingLoad<T> = Shared<BoxFuture<'static, Result<Arc<T>, CacheError>>>;

/// A live cached asset and its reference count
struct CacheEntry<T> {
    value: Arc<T>,
    refs: usize,
}

struct CacheState<T> {
    entries: HashMap<String, CacheEntry<T>>,
    pending: HashMap<String, PendingLoad<T>>,
}

enum Plan<T> {
    /// Key was live; count already incremented
    Hit(Arc<T>),
    /// Join an in-flight load (ours or a prior caller's)
    Join(PendingLoad<T>),
}

/// Keyed, reference-counted store with request coalescing
///
/// Cloning the cache clones a handle to the same shared state.
pub struct ResourceCache<T> {
    state: Arc<Mutex<CacheState<T>>>,
}

impl<T> ResourceCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                pending: HashMap::new(),
            })),
        }
    }

    /// Whether a live entry exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Outstanding references for `key`, if live
    pub fn ref_count(&self, key: &str) -> Option<usize> {
        self.state.lock().entries.get(key).map(|e| e.refs)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether no entry is live
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Number of loads currently in flight
    pub fn pending_loads(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Drop one reference to `key`
    ///
    /// Evicts the entry the instant its count reaches zero. Releasing a
    /// key that is not live is a defensive no-op.
    pub fn release(&self, key: &str) {
        let mut guard = self.state.lock();
        let evict = match guard.entries.get_mut(key) {
            Some(entry) => {
                entry.refs -= 1;
                entry.refs == 0
            }
            None => {
                log::debug!("release of unknown key '{}' ignored", key);
                return;
            }
        };
        if evict {
            guard.entries.remove(key);
            log::debug!("evicted '{}'", key);
        }
    }
}

impl<T: Send + Sync + 'static> ResourceCache<T> {
    /// Resolve `key`, loading it at most once
    ///
    /// - A live entry resolves immediately with its shared value and an
    ///   incremented count.
    /// - A key with a load in flight joins that load; `load` is not
    ///   called.
    /// - Otherwise `load` supplies the one retrieval for this key. When
    ///   it settles the pending record is cleared either way, so a later
    ///   request can retry after failure; the cache never retries itself.
    ///
    /// Every joiner of a successful load re-checks the entry table:
    /// whoever lands first inserts the entry with one reference, the rest
    /// pick up that entry and increment it. K coalesced callers therefore
    /// see one retrieval, the same `Arc`, and a count of K.
    pub fn fetch_and_cache<F, Fut>(
        &self,
        key: &str,
        load: F,
    ) -> impl Future<Output = Result<Arc<T>, CacheError>> + Send
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let key = key.to_string();

        let plan = {
            let mut guard = state.lock();
            if let Some(entry) = guard.entries.get_mut(&key) {
                entry.refs += 1;
                Plan::Hit(Arc::clone(&entry.value))
            } else if let Some(pending) = guard.pending.get(&key) {
                Plan::Join(pending.clone())
            } else {
                let fut = load();
                let driver_state = Arc::clone(&state);
                let driver_key = key.clone();
                let driver = async move {
                    let result = fut.await.map(Arc::new);
                    // Settles exactly once; the record must go even on
                    // failure so a later request can start over.
                    driver_state.lock().pending.remove(&driver_key);
                    result
                };
                let pending = driver.boxed().shared();
                guard.pending.insert(key.clone(), pending.clone());
                Plan::Join(pending)
            }
        };

        async move {
            match plan {
                Plan::Hit(value) => Ok(value),
                Plan::Join(pending) => {
                    let value = pending.await?;
                    let mut guard = state.lock();
                    match guard.entries.get_mut(&key) {
                        // A sibling joiner landed the entry while this
                        // caller was waking up; share it and let this
                        // load's copy drop.
                        Some(entry) => {
                            entry.refs += 1;
                            Ok(Arc::clone(&entry.value))
                        }
                        None => {
                            guard.entries.insert(
                                key.clone(),
                                CacheEntry {
                                    value: Arc::clone(&value),
                                    refs: 1,
                                },
                            );
                            Ok(value)
                        }
                    }
                }
            }
        }
    }
}

impl<T> Clone for ResourceCache<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_hit_increments_refcount() {
        let cache: ResourceCache<u32> = ResourceCache::new();
        let first = block_on(cache.fetch_and_cache("k", || async { Ok(7) })).unwrap();
        let second = block_on(cache.fetch_and_cache("k", || async { Ok(8) })).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 7);
        assert_eq!(cache.ref_count("k"), Some(2));
    }

    #[test]
    fn test_eviction_at_zero() {
        let cache: ResourceCache<u32> = ResourceCache::new();
        let _value = block_on(cache.fetch_and_cache("k", || async { Ok(1) })).unwrap();
        assert_eq!(cache.ref_count("k"), Some(1));

        cache.release("k");
        assert!(!cache.contains("k"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_release_unknown_key_is_noop() {
        let cache: ResourceCache<u32> = ResourceCache::new();
        cache.release("never-loaded");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failure_clears_pending() {
        let cache: ResourceCache<u32> = ResourceCache::new();
        let failed = block_on(cache.fetch_and_cache("k", || async {
            Err(CacheError::Fetch {
                key: "k".to_string(),
                message: "offline".to_string(),
            })
        }));
        assert!(failed.is_err());
        assert_eq!(cache.pending_loads(), 0);
        assert!(!cache.contains("k"));

        // Retry succeeds and actually runs the loader again.
        let runs = AtomicUsize::new(0);
        let value = block_on(cache.fetch_and_cache("k", || {
            runs.fetch_add(1, Ordering::SeqCst);
            async { Ok(9) }
        }))
        .unwrap();
        assert_eq!(*value, 9);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
