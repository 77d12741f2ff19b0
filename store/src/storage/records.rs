//! Record store: the key → payload map that sits beside the index.
//!
//! The index only knows keys. Payloads live here, and the database keeps the
//! two in step (existence check before insert, paired removal on delete).

use std::collections::HashMap;
use std::hash::Hash;

/// The four-operation contract the database relies on.
pub trait RecordStore<K, V> {
    /// Whether a record exists for `key`.
    fn exists(&self, key: &K) -> bool;

    /// The payload for `key`, if any.
    fn get(&self, key: &K) -> Option<&V>;

    /// Insert or replace the payload for `key`, returning the old one.
    fn put(&mut self, key: K, value: V) -> Option<V>;

    /// Remove the payload for `key`, returning it.
    fn remove(&mut self, key: &K) -> Option<V>;
}

/// In-memory record store.
#[derive(Debug)]
pub struct MemoryRecordStore<K, V> {
    records: HashMap<K, V>,
}

impl<K, V> Default for MemoryRecordStore<K, V> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> MemoryRecordStore<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// All records sorted by key.
    #[must_use]
    pub fn entries(&self) -> Vec<(&K, &V)>
    where
        K: Ord,
    {
        let mut entries: Vec<(&K, &V)> = self.records.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl<K: Eq + Hash, V> RecordStore<K, V> for MemoryRecordStore<K, V> {
    fn exists(&self, key: &K) -> bool {
        self.records.contains_key(key)
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.records.get(key)
    }

    fn put(&mut self, key: K, value: V) -> Option<V> {
        self.records.insert(key, value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.records.remove(key)
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for MemoryRecordStore<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
