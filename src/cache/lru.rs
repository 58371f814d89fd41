//! LRU Cache (C1): fixed-capacity key -> value map with recency eviction.
//!
//! HashMap + VecDeque access order, same shape as the teacher's
//! `LruPreviewCache`, generalized over key/value type. Capacity 0 is legal
//! and means "store is a no-op, get is always a miss."

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

pub struct LruCache<K, V> {
    entries: HashMap<K, V>,
    /// Least-recently-used at the front, most-recently-used at the back.
    access_order: VecDeque<K>,
    capacity: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            access_order: VecDeque::new(),
            capacity,
        }
    }

    /// Insert or overwrite `key`, promoting it to most-recently-used.
    /// Evicts the least-recently-used entry if over capacity.
    pub fn store(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.contains_key(&key) {
            self.access_order.retain(|k| k != &key);
        } else {
            while self.entries.len() >= self.capacity {
                if let Some(oldest) = self.access_order.pop_front() {
                    self.entries.remove(&oldest);
                } else {
                    break;
                }
            }
        }
        self.entries.insert(key.clone(), value);
        self.access_order.push_back(key);
    }

    /// Look up `key`, promoting it to most-recently-used on hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.capacity == 0 || !self.entries.contains_key(key) {
            return None;
        }
        self.access_order.retain(|k| k != key);
        self.access_order.push_back(key.clone());
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
