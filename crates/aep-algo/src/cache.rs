//! Compute-once memo for expensive per-key work.
//!
//! Each key owns a `OnceCell`; the map lock is only held long enough to
//! fetch or insert that cell, so concurrent callers asking for the same key
//! block on the one computation instead of repeating it, while different keys
//! compute in parallel.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

type Compute<K, V, E> = Box<dyn Fn(&K) -> Result<V, E> + Send + Sync>;

pub struct FilterCache<K, V, E> {
    compute: Compute<K, V, E>,
    entries: Mutex<HashMap<K, Arc<OnceCell<Arc<V>>>>>,
    computed: AtomicUsize,
}

impl<K, V, E> FilterCache<K, V, E>
where
    K: Eq + Hash + Clone,
{
    pub fn new(compute: impl Fn(&K) -> Result<V, E> + Send + Sync + 'static) -> Self {
        Self {
            compute: Box::new(compute),
            entries: Mutex::new(HashMap::new()),
            computed: AtomicUsize::new(0),
        }
    }

    /// Cached value for `key`, computing it on first use.
    ///
    /// A failed computation is not cached.
    pub fn get(&self, key: &K) -> Result<Arc<V>, E> {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(key.clone()).or_default())
        };
        cell.get_or_try_init(|| {
            self.computed.fetch_add(1, Ordering::Relaxed);
            (self.compute)(key).map(Arc::new)
        })
        .map(Arc::clone)
    }

    /// Whether `key` already has a value.
    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|cell| cell.get().is_some())
    }

    /// Number of keys with a value.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times the compute function ran.
    pub fn computations(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }
}

impl<K, V, E> std::fmt::Debug for FilterCache<K, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterCache")
            .field("computations", &self.computed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn second_lookup_reuses_value() {
        let cache: FilterCache<u32, Vec<u32>, String> = FilterCache::new(|k| Ok(vec![*k; 3]));
        let a = cache.get(&7).unwrap();
        let b = cache.get(&7).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.computations(), 1);
        cache.get(&8).unwrap();
        assert_eq!(cache.computations(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn errors_are_retried() {
        let fail = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&fail);
        let cache: FilterCache<u32, u32, String> = FilterCache::new(move |k| {
            if flag.load(Ordering::SeqCst) {
                Err("boom".to_string())
            } else {
                Ok(*k)
            }
        });
        assert!(cache.get(&1).is_err());
        assert!(!cache.contains(&1));
        fail.store(false, Ordering::SeqCst);
        assert_eq!(*cache.get(&1).unwrap(), 1);
        assert_eq!(cache.computations(), 2);
    }

    #[test]
    fn concurrent_callers_compute_once() {
        let cache: FilterCache<u32, u32, String> = FilterCache::new(|k| {
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(k * 2)
        });
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| assert_eq!(*cache.get(&21).unwrap(), 42));
            }
        });
        assert_eq!(cache.computations(), 1);
    }
}
