// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Incrementally maintained `value -> occurrences` tables.
//!
//! Every mutation touches at most two buckets; the sorted key list
//! consumers rank against is rebuilt lazily, and only after the set of
//! keys has changed.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Clone, Debug)]
pub struct Histogram<K> {
    buckets: HashMap<K, usize>,
    sorted: OnceCell<Vec<K>>,
}

impl<K> Default for Histogram<K> {
    fn default() -> Self {
        Histogram {
            buckets: HashMap::new(),
            sorted: OnceCell::new(),
        }
    }
}

impl<K: Copy + Eq + Hash + Ord> Histogram<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K) {
        let count = self.buckets.entry(key).or_insert(0);
        if *count == 0 {
            self.sorted.take();
        }
        *count += 1;
    }

    /// Remove one occurrence of `key`.  Removing a key that has no
    /// occurrences is a no-op.
    pub fn remove(&mut self, key: K) {
        let Some(count) = self.buckets.get_mut(&key) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.buckets.remove(&key);
            self.sorted.take();
        }
    }

    /// Move one occurrence from `old` to `new`.  `None` on either side
    /// means the value is not counted in this histogram.
    pub fn reclassify(&mut self, old: Option<K>, new: Option<K>) {
        if old == new {
            return;
        }
        if let Some(old) = old {
            self.remove(old);
        }
        if let Some(new) = new {
            self.add(new);
        }
    }

    pub fn get(&self, key: K) -> usize {
        self.buckets.get(&key).copied().unwrap_or(0)
    }

    pub fn sorted_keys(&self) -> &[K] {
        self.sorted.get_or_init(|| {
            let mut keys: Vec<K> = self.buckets.keys().copied().collect();
            keys.sort_unstable();
            keys
        })
    }

    /// Rank of `key` among the sorted keys, scaled to `[0, 1]`.  Keys not
    /// present rank where they would be inserted; with fewer than two keys
    /// everything ranks 0.
    pub fn percentile(&self, key: K) -> f64 {
        let keys = self.sorted_keys();
        if keys.len() <= 1 {
            return 0.0;
        }
        let rank = keys.partition_point(|k| *k < key).min(keys.len() - 1);
        rank as f64 / (keys.len() - 1) as f64
    }

    /// Sum of occurrences over all buckets.
    pub fn total(&self) -> usize {
        self.buckets.values().sum()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// `(key, occurrences)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, usize)> + '_ {
        self.sorted_keys().iter().map(|k| (*k, self.get(*k)))
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.sorted.take();
    }
}

impl<K: Copy + Eq + Hash + Ord> PartialEq for Histogram<K> {
    fn eq(&self, other: &Self) -> bool {
        self.buckets == other.buckets
    }
}
