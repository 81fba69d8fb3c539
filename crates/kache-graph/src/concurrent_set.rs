//! A small mutex-protected set, shared between the analyzer's `dependedBy`
//! wiring and the executor's live dependency counters.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Mutex;

/// A concurrent set supporting add, delete-returning-remaining-size, and
/// snapshot.
#[derive(Debug, Default)]
pub struct ConcurrentSet<K> {
    inner: Mutex<HashSet<K>>,
}

impl<K: Eq + Hash + Clone> ConcurrentSet<K> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashSet::new()),
        }
    }

    /// Build a set pre-populated from `items`.
    pub fn from_iter(items: impl IntoIterator<Item = K>) -> Self {
        Self {
            inner: Mutex::new(items.into_iter().collect()),
        }
    }

    pub fn add(&self, key: K) {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert(key);
    }

    /// Remove `key` and return the set's size after removal, as a single
    /// atomic step — callers use this to detect "this was the last
    /// dependency" without a separate check-then-act race.
    pub fn delete_and_len(&self, key: &K) -> usize {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.remove(key);
        guard.len()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A point-in-time copy of the set's contents, order unspecified.
    pub fn snapshot(&self) -> Vec<K> {
        let guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.iter().cloned().collect()
    }
}
