//! Guarded ordered set
//!
//! Set semantics with stable insertion-order iteration; every mutation is
//! serialised behind a lock. Each shard keeps one of these holding the
//! guild ids listed in its READY payload.

use std::sync::RwLock;

/// Ordered set with serialised mutation
#[derive(Debug, Default)]
pub struct GuardedSet<T: Eq + Clone> {
    values: RwLock<Vec<T>>,
}

impl<T: Eq + Clone> GuardedSet<T> {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: RwLock::new(Vec::new()),
        }
    }

    /// Check whether the set contains a value
    pub fn contains(&self, value: &T) -> bool {
        self.values.read().unwrap().contains(value)
    }

    /// Add a value; returns true if the set changed
    pub fn add(&self, value: T) -> bool {
        let mut values = self.values.write().unwrap();
        if values.contains(&value) {
            false
        } else {
            values.push(value);
            true
        }
    }

    /// Remove a value; returns true if the set changed
    pub fn remove(&self, value: &T) -> bool {
        let mut values = self.values.write().unwrap();
        let before = values.len();
        values.retain(|v| v != value);
        values.len() != before
    }

    /// Replace the contents, deduplicating while keeping first occurrence
    /// order
    pub fn replace(&self, new_values: impl IntoIterator<Item = T>) {
        let mut values = self.values.write().unwrap();
        values.clear();
        for value in new_values {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }

    /// Number of values in the set
    pub fn len(&self) -> usize {
        self.values.read().unwrap().len()
    }

    /// Check whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the values in insertion order
    pub fn snapshot(&self) -> Vec<T> {
        self.values.read().unwrap().clone()
    }
}
