//! Cache key layout
//!
//! Every key is prefixed with the configured namespace. Identifiers are
//! only ever key components or hash fields, never part of the stored value.

use courier_core::Snowflake;

/// Key builder for the cache namespace
#[derive(Debug, Clone)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    /// Create a key space for a namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The configured namespace prefix
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Hash of all guilds, field = guild id
    #[must_use]
    pub fn guilds(&self) -> String {
        format!("{}:guilds", self.namespace)
    }

    /// Hash of a guild's members, field = user id
    #[must_use]
    pub fn guild_members(&self, guild_id: Snowflake) -> String {
        format!("{}:guild:{}:members", self.namespace, guild_id)
    }

    /// Hash of a guild's roles, field = role id
    #[must_use]
    pub fn guild_roles(&self, guild_id: Snowflake) -> String {
        format!("{}:guild:{}:roles", self.namespace, guild_id)
    }

    /// Per-guild channel index, field = channel id
    #[must_use]
    pub fn guild_channels(&self, guild_id: Snowflake) -> String {
        format!("{}:guild:{}:channels", self.namespace, guild_id)
    }

    /// Global channel hash, field = channel id
    #[must_use]
    pub fn channels(&self) -> String {
        format!("{}:channels", self.namespace)
    }

    /// Global emoji hash, field = emoji id
    #[must_use]
    pub fn emojis(&self) -> String {
        format!("{}:emojis", self.namespace)
    }

    /// Global user hash, field = user id
    #[must_use]
    pub fn users(&self) -> String {
        format!("{}:users", self.namespace)
    }

    /// Set of guild ids a user can be seen in
    #[must_use]
    pub fn user_mutual(&self, user_id: Snowflake) -> String {
        format!("{}:user:{}:mutual", self.namespace, user_id)
    }

    /// Match pattern covering every key in the namespace
    #[must_use]
    pub fn all(&self) -> String {
        format!("{}:*", self.namespace)
    }
}
