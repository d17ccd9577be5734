//! Redis-backed KV store using deadpool-redis.
//!
//! Provides a managed pool of Redis connections for efficient resource usage.

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;

use crate::error::{CacheError, CacheResult};
use crate::store::KvStore;

/// Bulk-clear script, SCAN + DEL driven entirely server-side
const CLEAR_SCRIPT: &str = r#"local count, cursor = 0, "0"
while true do
    local req = redis.call("SCAN", cursor, "MATCH", ARGV[1], "COUNT", ARGV[2])
    if #req[2] > 0 then redis.call("DEL", unpack(req[2])) end
    count, cursor = count + #req[2], req[1]
    if cursor == "0" then break end
end
return count"#;

/// Redis pool configuration
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., `redis://localhost:6379`)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: usize,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 16,
        }
    }
}

impl From<&courier_common::RedisConfig> for RedisStoreConfig {
    fn from(config: &courier_common::RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections as usize,
        }
    }
}

/// Managed Redis connection pool implementing [`KvStore`]
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl RedisStore {
    /// Create a new Redis store with the given configuration
    pub fn new(config: RedisStoreConfig) -> CacheResult<Self> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map_err(|e| CacheError::CreatePool(e.to_string()))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| CacheError::CreatePool(e.to_string()))?;

        // Redact credentials from URL for logging
        let safe_url = config.url.split('@').next_back().unwrap_or(&config.url);
        tracing::info!(
            url = %safe_url,
            max_connections = config.max_connections,
            "Redis store created"
        );

        Ok(Self { pool })
    }

    /// Create a new Redis store from courier-common config
    pub fn from_config(config: &courier_common::RedisConfig) -> CacheResult<Self> {
        Self::new(RedisStoreConfig::from(config))
    }

    /// Get a connection from the pool
    pub async fn conn(&self) -> CacheResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(CacheError::GetConnection)
    }

    /// Check if the pool is healthy by pinging Redis
    pub async fn health_check(&self) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(conn.del(keys).await?)
    }

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        Ok(conn.hget(key, field).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: Vec<u8>) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        conn.hset::<_, _, _, ()>(key, field, value).await?;
        Ok(())
    }

    async fn hset_multiple(&self, key: &str, entries: &[(String, Vec<u8>)]) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        conn.hset_multiple::<_, _, _, ()>(key, entries).await?;
        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> CacheResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(conn.hdel(key, fields).await?)
    }

    async fn hexists(&self, key: &str, field: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.hexists(key, field).await?)
    }

    async fn hkeys(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.hkeys(key).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let added: i64 = conn.sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.smembers(key).await?)
    }

    async fn scan_match(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let mut cursor: u64 = 0;
        let mut all_keys = Vec::new();

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(64)
                .query_async(&mut conn)
                .await?;

            all_keys.extend(keys);
            cursor = next_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(all_keys)
    }

    async fn clear_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.conn().await?;
        let count: u64 = redis::cmd("EVAL")
            .arg(CLEAR_SCRIPT)
            .arg(0)
            .arg(pattern)
            .arg(64)
            .query_async(&mut conn)
            .await?;

        tracing::info!(pattern = %pattern, count = count, "Cleared cache keys");

        Ok(count)
    }
}
