//! KV store trait
//!
//! The operations the cache projection needs from its backing store:
//! string get/set, hash, set, pattern scan and bulk clear. The production
//! implementation is Redis; tests use the in-memory store.

use async_trait::async_trait;

use crate::error::CacheResult;

/// Abstract key/value store
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a string key
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set a string key
    async fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()>;

    /// Delete whole keys, returning how many existed
    async fn del(&self, keys: &[String]) -> CacheResult<u64>;

    /// Get a hash field
    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set a hash field
    async fn hset(&self, key: &str, field: &str, value: Vec<u8>) -> CacheResult<()>;

    /// Set multiple hash fields in one round-trip
    async fn hset_multiple(&self, key: &str, entries: &[(String, Vec<u8>)]) -> CacheResult<()>;

    /// Delete hash fields, returning how many existed
    async fn hdel(&self, key: &str, fields: &[String]) -> CacheResult<u64>;

    /// Check whether a hash field exists
    async fn hexists(&self, key: &str, field: &str) -> CacheResult<bool>;

    /// List the fields of a hash
    async fn hkeys(&self, key: &str) -> CacheResult<Vec<String>>;

    /// Add a member to a set, returning whether it was newly added
    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool>;

    /// Remove a member from a set, returning whether it was present
    async fn srem(&self, key: &str, member: &str) -> CacheResult<bool>;

    /// List the members of a set
    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>>;

    /// Scan for keys matching a glob pattern
    async fn scan_match(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Bulk-delete every key matching a pattern, returning the count
    async fn clear_pattern(&self, pattern: &str) -> CacheResult<u64>;
}
