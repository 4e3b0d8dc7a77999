// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! A Mattson LRU stack for exact reuse distances.

/// Distance reported for a key that has never been touched.
pub const COLD_MISS: i64 = -1;

#[derive(Clone, Debug)]
struct Link<K> {
    key: K,
    next: Option<usize>,
}

/// A singly linked LRU stack whose links live in a `Vec`.  Slots are never
/// freed: a touch of a known key only relinks it.
#[derive(Clone, Debug)]
pub struct AccessStack<K> {
    links: Vec<Link<K>>,
    head: Option<usize>,
}

impl<K> Default for AccessStack<K> {
    fn default() -> Self {
        AccessStack {
            links: vec![],
            head: None,
        }
    }
}

impl<K: PartialEq> AccessStack<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `key` to the top of the stack, returning the depth it was found
    /// at (0 is the top) or [`COLD_MISS`] if this is its first touch.
    pub fn touch(&mut self, key: K) -> i64 {
        let mut prev: Option<usize> = None;
        let mut cur = self.head;
        let mut depth: i64 = 0;

        while let Some(id) = cur {
            if self.links[id].key == key {
                if let Some(prev) = prev {
                    // splice out and relink at the head
                    self.links[prev].next = self.links[id].next;
                    self.links[id].next = self.head;
                    self.head = Some(id);
                }
                return depth;
            }
            prev = cur;
            cur = self.links[id].next;
            depth += 1;
        }

        let id = self.links.len();
        self.links.push(Link {
            key,
            next: self.head,
        });
        self.head = Some(id);
        COLD_MISS
    }

    /// Keys from the top (most recently touched) down.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            let id = cur?;
            let link = &self.links[id];
            cur = link.next;
            Some(&link.key)
        })
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_touch_sequence() {
        let mut stack = AccessStack::new();
        let distances: Vec<i64> = ["A", "B", "C", "A", "B", "A"]
            .into_iter()
            .map(|key| stack.touch(key))
            .collect();
        assert_eq!(vec![-1, -1, -1, 2, 2, 1], distances);

        let order: Vec<&str> = stack.iter().copied().collect();
        assert_eq!(vec!["A", "B", "C"], order);
        assert_eq!(3, stack.len());
    }

    #[test]
    fn test_repeated_touch_is_zero() {
        let mut stack = AccessStack::new();
        assert!(stack.is_empty());
        assert_eq!(COLD_MISS, stack.touch(7));
        assert_eq!(0, stack.touch(7));
        assert_eq!(0, stack.touch(7));
        assert_eq!(1, stack.len());
    }

    // the obvious Vec-based model the linked version must agree with
    fn naive_distances(keys: &[u8]) -> Vec<i64> {
        let mut stack: Vec<u8> = vec![];
        keys.iter()
            .map(|key| match stack.iter().position(|k| k == key) {
                Some(pos) => {
                    stack.remove(pos);
                    stack.insert(0, *key);
                    pos as i64
                }
                None => {
                    stack.insert(0, *key);
                    COLD_MISS
                }
            })
            .collect()
    }

    proptest! {
        #[test]
        fn matches_naive_stack(keys in prop::collection::vec(0u8..16, 0..200)) {
            let mut stack = AccessStack::new();
            let distances: Vec<i64> = keys.iter().map(|k| stack.touch(*k)).collect();
            prop_assert_eq!(naive_distances(&keys), distances);

            let distinct: std::collections::BTreeSet<u8> = keys.iter().copied().collect();
            prop_assert_eq!(distinct.len(), stack.len());
        }
    }
}
