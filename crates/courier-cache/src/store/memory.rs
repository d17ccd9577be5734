//! In-memory KV store
//!
//! Backs the integration suite and local development without a Redis
//! instance. Mirrors the semantics the projection relies on: hashes, sets
//! and glob-pattern scans.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CacheResult;
use crate::store::KvStore;

#[derive(Debug, Clone)]
enum Entry {
    Str(Vec<u8>),
    Hash(BTreeMap<String, Vec<u8>>),
    Set(BTreeMap<String, ()>),
}

/// In-memory implementation of [`KvStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Check whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matches(pattern: &str, key: &str) -> bool {
        // Glob subset: '*' wildcards, everything else literal. That is all
        // the projection's patterns use.
        let mut segments = pattern.split('*');
        let first = segments.next().unwrap_or("");
        if !key.starts_with(first) {
            return false;
        }
        let mut rest = &key[first.len()..];
        let mut last_len = 0;
        for segment in segments {
            match rest.find(segment) {
                Some(pos) => {
                    rest = &rest[pos + segment.len()..];
                    last_len = segment.len();
                }
                None => return false,
            }
        }
        // A pattern not ending in '*' must consume the whole key
        pattern.ends_with('*') || (rest.is_empty() && last_len > 0) || pattern == key
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let entries = self.entries.lock().unwrap();
        Ok(match entries.get(key) {
            Some(Entry::Str(v)) => Some(v.clone()),
            _ => None,
        })
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), Entry::Str(value));
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        let mut removed = 0;
        for key in keys {
            if entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<Vec<u8>>> {
        let entries = self.entries.lock().unwrap();
        Ok(match entries.get(key) {
            Some(Entry::Hash(h)) => h.get(field).cloned(),
            _ => None,
        })
    }

    async fn hset(&self, key: &str, field: &str, value: Vec<u8>) -> CacheResult<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()));
        if let Entry::Hash(h) = entry {
            h.insert(field.to_string(), value);
        }
        Ok(())
    }

    async fn hset_multiple(&self, key: &str, pairs: &[(String, Vec<u8>)]) -> CacheResult<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()));
        if let Entry::Hash(h) = entry {
            for (field, value) in pairs {
                h.insert(field.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> CacheResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        let mut removed = 0;
        if let Some(Entry::Hash(h)) = entries.get_mut(key) {
            for field in fields {
                if h.remove(field).is_some() {
                    removed += 1;
                }
            }
            if h.is_empty() {
                entries.remove(key);
            }
        }
        Ok(removed)
    }

    async fn hexists(&self, key: &str, field: &str) -> CacheResult<bool> {
        let entries = self.entries.lock().unwrap();
        Ok(match entries.get(key) {
            Some(Entry::Hash(h)) => h.contains_key(field),
            _ => false,
        })
    }

    async fn hkeys(&self, key: &str) -> CacheResult<Vec<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(match entries.get(key) {
            Some(Entry::Hash(h)) => h.keys().cloned().collect(),
            _ => Vec::new(),
        })
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeMap::new()));
        Ok(match entry {
            Entry::Set(s) => s.insert(member.to_string(), ()).is_none(),
            _ => false,
        })
    }

    async fn srem(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        let mut removed = false;
        if let Some(Entry::Set(s)) = entries.get_mut(key) {
            removed = s.remove(member).is_some();
            if s.is_empty() {
                entries.remove(key);
            }
        }
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(match entries.get(key) {
            Some(Entry::Set(s)) => s.keys().cloned().collect(),
            _ => Vec::new(),
        })
    }

    async fn scan_match(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .keys()
            .filter(|k| Self::matches(pattern, k))
            .cloned()
            .collect())
    }

    async fn clear_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        let keys: Vec<String> = entries
            .keys()
            .filter(|k| Self::matches(pattern, k))
            .cloned()
            .collect();
        for key in &keys {
            entries.remove(key);
        }
        Ok(keys.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_string_ops() {
        let store = MemoryStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        store.set("k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        assert_eq!(store.del(&["k".to_string()]).await.unwrap(), 1);
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hash_ops() {
        let store = MemoryStore::new();
        store.hset("h", "a", b"1".to_vec()).await.unwrap();
        store
            .hset_multiple(
                "h",
                &[("b".to_string(), b"2".to_vec()), ("c".to_string(), b"3".to_vec())],
            )
            .await
            .unwrap();

        assert!(store.hexists("h", "a").await.unwrap());
        assert_eq!(store.hget("h", "b").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.hkeys("h").await.unwrap().len(), 3);

        assert_eq!(
            store
                .hdel("h", &["a".to_string(), "missing".to_string()])
                .await
                .unwrap(),
            1
        );
        assert!(!store.hexists("h", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_ops() {
        let store = MemoryStore::new();
        assert!(store.sadd("s", "1").await.unwrap());
        assert!(!store.sadd("s", "1").await.unwrap());
        assert!(store.sadd("s", "2").await.unwrap());

        assert_eq!(store.smembers("s").await.unwrap(), vec!["1", "2"]);

        assert!(store.srem("s", "1").await.unwrap());
        assert!(!store.srem("s", "1").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_set_key_disappears() {
        let store = MemoryStore::new();
        store.sadd("s", "1").await.unwrap();
        store.srem("s", "1").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_scan_and_clear() {
        let store = MemoryStore::new();
        store.set("app:guilds", b"g".to_vec()).await.unwrap();
        store.set("app:channels", b"c".to_vec()).await.unwrap();
        store.set("other:guilds", b"o".to_vec()).await.unwrap();

        let mut keys = store.scan_match("app:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["app:channels", "app:guilds"]);

        assert_eq!(store.clear_pattern("app:*").await.unwrap(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_pattern_matching() {
        assert!(MemoryStore::matches("a:*", "a:b"));
        assert!(MemoryStore::matches("a:*:roles", "a:guild:1:roles"));
        assert!(!MemoryStore::matches("a:*:roles", "a:guild:1:members"));
        assert!(MemoryStore::matches("exact", "exact"));
        assert!(!MemoryStore::matches("exact", "exact2"));
        assert!(!MemoryStore::matches("b:*", "a:b"));
    }
}
