//! KV store abstraction and implementations

mod kv;
mod memory;
mod redis_store;

pub use kv::KvStore;
pub use memory::MemoryStore;
pub use redis_store::{RedisStore, RedisStoreConfig};
