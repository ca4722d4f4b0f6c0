use std::collections::VecDeque;

/// Newest-first list that never grows past `capacity`.
///
/// Entries are identified by the key returned from `key_of`; callers use
/// [`BoundedFeed::contains_key`] to deduplicate before pushing.
#[derive(Debug, Clone)]
pub struct BoundedFeed<T, K> {
    entries: VecDeque<T>,
    capacity: usize,
    key_of: fn(&T) -> K,
}

impl<T, K: PartialEq> BoundedFeed<T, K> {
    pub fn new(capacity: usize, key_of: fn(&T) -> K) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            key_of,
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.iter().any(|entry| (self.key_of)(entry) == *key)
    }

    /// Inserts at the front and drops the oldest entries beyond capacity.
    pub fn push_front(&mut self, entry: T) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.entries.retain(keep);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone, K> BoundedFeed<T, K> {
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}
