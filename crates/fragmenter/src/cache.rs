// Standard Library Imports
use std::{collections::VecDeque, hash::Hash};

// External Crate Imports
use ahash::{HashMap, HashMapExt};

// Public API ==========================================================================================================

/// A small least-recently-used cache. With a capacity of zero, nothing is ever stored
#[derive(Clone, Debug)]
pub struct LeafCache<K, V> {
    entries: HashMap<K, V>,
    recency: VecDeque<K>,
    capacity: usize,
    hits: usize,
    misses: usize,
}

impl<K: Clone + Eq + Hash, V: Clone> LeafCache<K, V> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            recency: VecDeque::with_capacity(capacity),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let value = self.entries.get(key).cloned();
        if value.is_some() {
            self.hits += 1;
            self.touch(key);
        } else {
            self.misses += 1;
        }
        value
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        self.entries.insert(key.clone(), value);
        self.touch(&key);
        while self.recency.len() > self.capacity {
            if let Some(oldest) = self.recency.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Looks `key` up, computing (and caching) its value on a miss
    pub fn get_or_try_insert_with<E>(&mut self, key: K, compute: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn hits(&self) -> usize {
        self.hits
    }

    #[must_use]
    pub const fn misses(&self) -> usize {
        self.misses
    }

    fn touch(&mut self, key: &K) {
        if let Some(position) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(position);
        }
        self.recency.push_back(key.clone());
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = LeafCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        // "b" is now the stalest entry
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!((cache.hits(), cache.misses()), (3, 1));
    }

    #[test]
    fn reinserting_refreshes() {
        let mut cache = LeafCache::new(2);
        cache.insert(1, "one");
        cache.insert(2, "two");
        cache.insert(1, "uno");
        cache.insert(3, "three");
        assert_eq!(cache.get(&1), Some("uno"));
        assert_eq!(cache.get(&2), None);
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let mut cache = LeafCache::new(0);
        cache.insert("a", 1);
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a"), None);

        let mut computed = 0;
        for _ in 0..3 {
            let value = cache.get_or_try_insert_with("a", || {
                computed += 1;
                Ok::<_, ()>(42)
            });
            assert_eq!(value, Ok(42));
        }
        assert_eq!(computed, 3);
        assert_eq!(cache.capacity(), 0);
    }

    #[test]
    fn computes_each_value_once() {
        let mut cache = LeafCache::new(4);
        let mut computed = 0;
        for key in [1, 2, 1, 1, 2] {
            let value = cache.get_or_try_insert_with(key, || {
                computed += 1;
                Ok::<_, ()>(key * 10)
            });
            assert_eq!(value, Ok(key * 10));
        }
        assert_eq!(computed, 2);
        assert_eq!((cache.hits(), cache.misses()), (3, 2));

        assert_eq!(cache.get_or_try_insert_with(3, || Err("failed")), Err("failed"));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
