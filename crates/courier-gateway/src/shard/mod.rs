//! Shard runtime
//!
//! One websocket session per shard: handshake, identify/resume, heartbeat,
//! read loop and the reconnect driver.

mod backoff;
mod connection;
mod shard;
mod state;

pub use backoff::Backoff;
pub use connection::{GatewayReader, GatewayWriter};
pub use shard::{SessionLimits, Shard, ShardConfig};
pub use state::ShardState;
