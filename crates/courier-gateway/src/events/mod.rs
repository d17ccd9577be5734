//! Dispatch events
//!
//! Event kinds, dispatch payload structures, and the raw event passed from
//! shards to the pipeline.

mod event_types;
mod payloads;

pub use event_types::EventKind;
pub use payloads::{
    ChannelPinsUpdatePayload, GuildBanPayload, GuildEmojisUpdatePayload,
    GuildIntegrationsUpdatePayload, GuildMembersChunkPayload, GuildRoleDeletePayload,
    GuildRolePayload, MemberRemovePayload, ReadyPayload, ShardPayload, WebhooksUpdatePayload,
};

use crate::protocol::OpCode;

/// A raw event as forwarded from a shard to the pipeline
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// The shard the event arrived on
    pub shard_id: u32,
    /// Frame op code; always `Dispatch` once it reaches the pipeline
    pub op: OpCode,
    /// Gateway sequence number
    pub sequence: u64,
    /// Dispatch type (the `t` field)
    pub kind: String,
    /// Raw payload (the `d` field)
    pub data: serde_json::Value,
}

impl RawEvent {
    /// Create a dispatch event
    pub fn dispatch(
        shard_id: u32,
        sequence: u64,
        kind: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            shard_id,
            op: OpCode::Dispatch,
            sequence,
            kind: kind.into(),
            data,
        }
    }

    /// Create a synthetic shard lifecycle event
    pub fn synthetic(shard_id: u32, kind: EventKind, data: serde_json::Value) -> Self {
        Self::dispatch(shard_id, 0, kind.as_str(), data)
    }
}
