//! Dispatch payload structures
//!
//! The `d` shapes of the dispatch kinds the pipeline handles. Guild,
//! channel and member payloads deserialize straight into the core entity
//! types; the structures here cover events with their own envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_core::{Emoji, Member, Role, Snowflake, UnavailableGuild, User};

/// READY payload
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    #[serde(rename = "v", default)]
    pub version: u8,
    pub session_id: String,
    #[serde(default)]
    pub user: User,
    /// Guilds the session covers; delivered as unavailable stubs
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
}

/// GUILD_ROLE_CREATE / GUILD_ROLE_UPDATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildRolePayload {
    pub guild_id: Snowflake,
    pub role: Role,
}

/// GUILD_ROLE_DELETE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildRoleDeletePayload {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

/// CHANNEL_PINS_UPDATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPinsUpdatePayload {
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub last_pin_timestamp: Option<DateTime<Utc>>,
}

/// GUILD_MEMBER_REMOVE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRemovePayload {
    pub guild_id: Snowflake,
    pub user: User,
}

/// GUILD_MEMBERS_CHUNK payload
#[derive(Debug, Clone, Deserialize)]
pub struct GuildMembersChunkPayload {
    pub guild_id: Snowflake,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// GUILD_BAN_ADD / GUILD_BAN_REMOVE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildBanPayload {
    pub guild_id: Snowflake,
    pub user: User,
}

/// GUILD_EMOJIS_UPDATE payload
#[derive(Debug, Clone, Deserialize)]
pub struct GuildEmojisUpdatePayload {
    pub guild_id: Snowflake,
    #[serde(default)]
    pub emojis: Vec<Emoji>,
}

/// GUILD_INTEGRATIONS_UPDATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildIntegrationsUpdatePayload {
    pub guild_id: Snowflake,
}

/// WEBHOOKS_UPDATE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksUpdatePayload {
    pub guild_id: Snowflake,
    pub channel_id: Snowflake,
}

/// Synthetic shard lifecycle payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardPayload {
    pub shard_id: u32,
    /// Close code, present on SHARD_DISCONNECT
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl ShardPayload {
    /// Payload for SHARD_CONNECT / SHARD_READY
    #[must_use]
    pub fn new(shard_id: u32) -> Self {
        Self {
            shard_id,
            code: None,
        }
    }

    /// Payload for SHARD_DISCONNECT
    #[must_use]
    pub fn disconnect(shard_id: u32, code: u16) -> Self {
        Self {
            shard_id,
            code: Some(code),
        }
    }
}
