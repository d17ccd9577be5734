//! # courier-gateway
//!
//! The producer core: persistent gateway sessions (shards), the event
//! pipeline that projects dispatches into the cache, and the publisher that
//! republishes the filtered stream to the broker.

pub mod broker;
pub mod error;
pub mod events;
pub mod group;
pub mod limiter;
pub mod manager;
pub mod pipeline;
pub mod protocol;
pub mod publisher;
pub mod rest;
pub mod shard;

// Re-export commonly used types at crate root
pub use broker::{Broker, BrokerError, RecordingBroker, RedisBroker};
pub use error::{GatewayError, GatewayResult};
pub use events::{EventKind, RawEvent};
pub use group::ShardGroup;
pub use manager::{Manager, ManagerOptions};
pub use pipeline::{MarshalContext, MarshalerRegistry, Pipeline};
pub use publisher::Publisher;
pub use rest::{GatewayBot, RestClient, SessionStartLimit};
pub use shard::Shard;
