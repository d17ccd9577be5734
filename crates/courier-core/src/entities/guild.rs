//! Guild entity - the wire shape and its cached projection
//!
//! GUILD_CREATE carries the full object graph (roles, channels, emojis,
//! members inline). The cache stores subordinate entities in their own
//! tables and keeps only id lists on the guild, so the projection type
//! [`CachedGuild`] replaces the object lists with ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Channel, Emoji, Member, Role};
use crate::value_objects::Snowflake;

/// Guild as received from the gateway
///
/// The object lists are only present on GUILD_CREATE and full update
/// payloads; partial payloads deserialize with empty lists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub splash: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub owner_id: Snowflake,
    #[serde(default)]
    pub afk_channel_id: Option<Snowflake>,
    #[serde(default)]
    pub afk_timeout: u32,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub verification_level: u8,
    #[serde(default)]
    pub default_message_notifications: u8,
    #[serde(default)]
    pub explicit_content_filter: u8,
    #[serde(default)]
    pub mfa_level: u8,
    #[serde(default)]
    pub large: bool,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub widget_enabled: bool,
    #[serde(default)]
    pub widget_channel_id: Option<Snowflake>,
    #[serde(default)]
    pub system_channel_id: Option<Snowflake>,
    #[serde(default)]
    pub vanity_url_code: Option<String>,
    #[serde(default)]
    pub premium_tier: u8,
    #[serde(default)]
    pub premium_subscription_count: u32,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unavailable: bool,

    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub emojis: Vec<Emoji>,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// Guild as persisted in the cache
///
/// Subordinate entities appear as id lists; the entity tables own the
/// values. Structural equality over this type decides whether an update
/// event is emitted downstream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CachedGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub splash: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub owner_id: Snowflake,
    #[serde(default)]
    pub afk_channel_id: Option<Snowflake>,
    #[serde(default)]
    pub afk_timeout: u32,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub verification_level: u8,
    #[serde(default)]
    pub default_message_notifications: u8,
    #[serde(default)]
    pub explicit_content_filter: u8,
    #[serde(default)]
    pub mfa_level: u8,
    #[serde(default)]
    pub large: bool,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub widget_enabled: bool,
    #[serde(default)]
    pub widget_channel_id: Option<Snowflake>,
    #[serde(default)]
    pub system_channel_id: Option<Snowflake>,
    #[serde(default)]
    pub vanity_url_code: Option<String>,
    #[serde(default)]
    pub premium_tier: u8,
    #[serde(default)]
    pub premium_subscription_count: u32,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,

    /// Role ids attached to the guild
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    /// Channel ids attached to the guild
    #[serde(default)]
    pub channels: Vec<Snowflake>,
    /// Emoji ids attached to the guild
    #[serde(default)]
    pub emojis: Vec<Snowflake>,
}

impl CachedGuild {
    /// Build the cached projection from a wire guild
    #[must_use]
    pub fn from_guild(guild: &Guild) -> Self {
        Self {
            id: guild.id,
            name: guild.name.clone(),
            icon: guild.icon.clone(),
            splash: guild.splash.clone(),
            banner: guild.banner.clone(),
            description: guild.description.clone(),
            region: guild.region.clone(),
            owner_id: guild.owner_id,
            afk_channel_id: guild.afk_channel_id,
            afk_timeout: guild.afk_timeout,
            member_count: guild.member_count,
            verification_level: guild.verification_level,
            default_message_notifications: guild.default_message_notifications,
            explicit_content_filter: guild.explicit_content_filter,
            mfa_level: guild.mfa_level,
            large: guild.large,
            features: guild.features.clone(),
            widget_enabled: guild.widget_enabled,
            widget_channel_id: guild.widget_channel_id,
            system_channel_id: guild.system_channel_id,
            vanity_url_code: guild.vanity_url_code.clone(),
            premium_tier: guild.premium_tier,
            premium_subscription_count: guild.premium_subscription_count,
            joined_at: guild.joined_at,
            roles: guild.roles.iter().map(|r| r.id).collect(),
            channels: guild.channels.iter().map(|c| c.id).collect(),
            emojis: guild.emojis.iter().map(|e| e.id).collect(),
        }
    }

    /// Check if a role id is attached to the guild
    #[inline]
    #[must_use]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }

    /// Append a role id if not already present
    pub fn add_role(&mut self, role_id: Snowflake) {
        if !self.has_role(role_id) {
            self.roles.push(role_id);
        }
    }

    /// Splice a role id out of the list
    pub fn remove_role(&mut self, role_id: Snowflake) {
        self.roles.retain(|&id| id != role_id);
    }

    /// Append a channel id if not already present
    pub fn add_channel(&mut self, channel_id: Snowflake) {
        if !self.channels.contains(&channel_id) {
            self.channels.push(channel_id);
        }
    }

    /// Splice a channel id out of the list
    pub fn remove_channel(&mut self, channel_id: Snowflake) {
        self.channels.retain(|&id| id != channel_id);
    }

    /// Replace the emoji id list
    pub fn set_emojis(&mut self, emoji_ids: Vec<Snowflake>) {
        self.emojis = emoji_ids;
    }
}

impl From<&Guild> for CachedGuild {
    fn from(guild: &Guild) -> Self {
        Self::from_guild(guild)
    }
}

/// Partial guild carried by GUILD_DELETE and in the READY guild list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::User;

    fn wire_guild() -> Guild {
        Guild {
            id: Snowflake::new(1),
            name: "Test Guild".to_string(),
            owner_id: Snowflake::new(100),
            roles: vec![Role {
                id: Snowflake::new(10),
                name: "everyone".to_string(),
                ..Role::default()
            }],
            channels: vec![Channel {
                id: Snowflake::new(20),
                guild_id: Some(Snowflake::new(1)),
                ..Channel::default()
            }],
            emojis: vec![Emoji {
                id: Snowflake::new(30),
                ..Emoji::default()
            }],
            members: vec![Member {
                user: User {
                    id: Snowflake::new(40),
                    ..User::default()
                },
                ..Member::default()
            }],
            ..Guild::default()
        }
    }

    #[test]
    fn test_cached_guild_strips_to_ids() {
        let cached = CachedGuild::from_guild(&wire_guild());
        assert_eq!(cached.roles, vec![Snowflake::new(10)]);
        assert_eq!(cached.channels, vec![Snowflake::new(20)]);
        assert_eq!(cached.emojis, vec![Snowflake::new(30)]);
        assert_eq!(cached.name, "Test Guild");
    }

    #[test]
    fn test_role_list_mutation() {
        let mut cached = CachedGuild::from_guild(&wire_guild());

        cached.add_role(Snowflake::new(11));
        assert!(cached.has_role(Snowflake::new(11)));

        // Adding the same role again should not duplicate
        cached.add_role(Snowflake::new(11));
        assert_eq!(cached.roles.len(), 2);

        cached.remove_role(Snowflake::new(10));
        assert!(!cached.has_role(Snowflake::new(10)));
        assert_eq!(cached.roles, vec![Snowflake::new(11)]);
    }

    #[test]
    fn test_channel_list_mutation() {
        let mut cached = CachedGuild::from_guild(&wire_guild());
        cached.add_channel(Snowflake::new(21));
        cached.remove_channel(Snowflake::new(20));
        assert_eq!(cached.channels, vec![Snowflake::new(21)]);
    }

    #[test]
    fn test_structural_equality_for_diffing() {
        let guild = wire_guild();
        let a = CachedGuild::from_guild(&guild);
        let b = CachedGuild::from_guild(&guild);
        assert_eq!(a, b);

        let mut c = b.clone();
        c.name = "Renamed".to_string();
        assert_ne!(a, c);
    }

    #[test]
    fn test_unavailable_guild_payload() {
        let partial: UnavailableGuild =
            serde_json::from_str(r#"{"id": "1", "unavailable": true}"#).unwrap();
        assert!(partial.unavailable);

        let left: UnavailableGuild = serde_json::from_str(r#"{"id": "1"}"#).unwrap();
        assert!(!left.unavailable);
    }

    #[test]
    fn test_cached_guild_msgpack_roundtrip() {
        let cached = CachedGuild::from_guild(&wire_guild());
        let bytes = rmp_serde::to_vec_named(&cached).unwrap();
        let decoded: CachedGuild = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(cached, decoded);
    }
}
