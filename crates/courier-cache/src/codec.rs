//! Binary codec for persisted and published payloads
//!
//! Everything written to the KV store or the broker is msgpack with named
//! fields, so the frames stay self-describing for consumers in other
//! languages.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::CacheResult;

/// Encode a value to msgpack bytes with named fields
pub fn encode<T: Serialize>(value: &T) -> CacheResult<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Decode a value from msgpack bytes
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}
