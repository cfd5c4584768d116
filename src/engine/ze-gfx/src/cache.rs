use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;

struct CacheStorage<K, V> {
    storage: HashMap<K, V>,
    reverse: HashMap<V, K>,
    counter: HashMap<V, usize>,
}

/// Content-addressed, reference-counted cache of native objects.
///
/// Equal keys always resolve to the same value while it is alive. Every acquire must be
/// paired with a release, the value is dropped when its count reaches zero.
pub struct GraphicsCache<K, V> {
    inner: Mutex<CacheStorage<K, V>>,
}

impl<K, V> Default for GraphicsCache<K, V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(CacheStorage {
                storage: HashMap::new(),
                reverse: HashMap::new(),
                counter: HashMap::new(),
            }),
        }
    }
}

impl<K: Clone + Eq + Hash, V: Clone + Eq + Hash> GraphicsCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value cached for `key`, or create it with `create`.
    /// `create` runs under the cache lock and nothing is stored when it fails.
    pub fn acquire<E, F>(&self, key: &K, create: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        let mut inner = self.inner.lock();
        if let Some(value) = inner.storage.get(key).cloned() {
            *inner.counter.entry(value.clone()).or_insert(0) += 1;
            return Ok(value);
        }

        let value = create(key)?;
        inner.storage.insert(key.clone(), value.clone());
        inner.reverse.insert(value.clone(), key.clone());
        inner.counter.insert(value.clone(), 1);
        Ok(value)
    }

    /// Decrement the count of `value`. Returns true when this evicted it.
    /// Unknown values are ignored.
    pub fn release(&self, value: &V) -> bool {
        let mut inner = self.inner.lock();
        let remaining = match inner.counter.get_mut(value) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => return false,
        };

        if remaining > 0 {
            return false;
        }

        inner.counter.remove(value);
        if let Some(key) = inner.reverse.remove(value) {
            inner.storage.remove(&key);
        }
        true
    }

    /// Drop every cached value regardless of its count
    pub fn dispose_all(&self) {
        let mut inner = self.inner.lock();
        inner.storage.clear();
        inner.reverse.clear();
        inner.counter.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.lock().storage.contains_key(key)
    }

    pub fn ref_count(&self, value: &V) -> usize {
        self.inner.lock().counter.get(value).copied().unwrap_or(0)
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let inner = self.inner.lock();
        inner.storage.len() == inner.reverse.len()
            && inner.storage.len() == inner.counter.len()
            && inner.storage.iter().all(|(key, value)| {
                inner.reverse.get(value) == Some(key) && inner.counter.contains_key(value)
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::GraphicsCache;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn equal_keys_share_one_value() {
        let cache = GraphicsCache::<String, u32>::new();
        let created = AtomicUsize::new(0);
        let create = |_: &String| -> Result<u32, ()> {
            Ok(10 + created.fetch_add(1, Ordering::SeqCst) as u32)
        };

        let a = cache.acquire(&"opaque".to_string(), create).unwrap();
        let b = cache.acquire(&"opaque".to_string(), create).unwrap();
        let c = cache.acquire(&"additive".to_string(), create).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(cache.ref_count(&a), 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.is_consistent());
    }

    #[test]
    fn value_is_evicted_when_last_reference_is_released() {
        let cache = GraphicsCache::<u8, u32>::new();
        let a = cache.acquire(&1, |_| Ok::<_, ()>(100)).unwrap();
        cache.acquire(&1, |_| Ok::<_, ()>(200)).unwrap();

        assert!(!cache.release(&a));
        assert!(cache.contains_key(&1));
        assert!(cache.release(&a));
        assert!(!cache.contains_key(&1));
        assert_eq!(cache.ref_count(&a), 0);
        assert!(cache.is_empty());
        assert!(cache.is_consistent());

        // A fresh acquire creates a new value
        assert_eq!(cache.acquire(&1, |_| Ok::<_, ()>(300)).unwrap(), 300);
    }

    #[test]
    fn failed_creation_commits_nothing() {
        let cache = GraphicsCache::<u8, u32>::new();
        assert_eq!(cache.acquire(&7, |_| Err::<u32, _>("out of memory")), Err("out of memory"));
        assert!(cache.is_empty());
        assert!(cache.is_consistent());
        assert_eq!(cache.acquire(&7, |_| Ok::<_, &str>(1)), Ok(1));
        assert_eq!(cache.ref_count(&1), 1);
    }

    #[test]
    fn releasing_unknown_value_is_a_no_op() {
        let cache = GraphicsCache::<u8, u32>::new();
        cache.acquire(&1, |_| Ok::<_, ()>(5)).unwrap();
        assert!(!cache.release(&42));
        assert_eq!(cache.ref_count(&5), 1);
    }

    #[test]
    fn dispose_all_clears_every_map() {
        let cache = GraphicsCache::<u8, u32>::new();
        cache.acquire(&1, |_| Ok::<_, ()>(5)).unwrap();
        cache.acquire(&2, |_| Ok::<_, ()>(6)).unwrap();
        cache.dispose_all();
        assert!(cache.is_empty());
        assert!(!cache.release(&5));
        assert!(cache.is_consistent());
    }

    #[test]
    fn concurrent_acquire_creates_once() {
        let cache = Arc::new(GraphicsCache::<u8, usize>::new());
        let created = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let created = created.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let value = cache
                            .acquire(&3, |_| {
                                Ok::<_, ()>(created.fetch_add(1, Ordering::SeqCst) + 1000)
                            })
                            .unwrap();
                        assert_eq!(value, 1000);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(cache.ref_count(&1000), 800);
        assert!(cache.is_consistent());
    }
}
