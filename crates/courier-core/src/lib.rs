//! # courier-core
//!
//! Domain layer containing the entities cached by the producer, the
//! `Snowflake` value object, and the stream-event envelope published to
//! consumers. This crate has zero dependencies on infrastructure
//! (websockets, Redis, brokers).

pub mod entities;
pub mod events;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    CachedGuild, Channel, ChannelType, Emoji, Guild, Member, Role, UnavailableGuild, User,
};
pub use events::StreamEvent;
pub use value_objects::{Snowflake, SnowflakeParseError};
