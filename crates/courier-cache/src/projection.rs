//! Cache projection client
//!
//! Translates entity operations into KV-store reads and writes using the
//! key layout in [`crate::keys`]. All writes go through the event pipeline,
//! which is the projection's only writer; methods here are mechanical and
//! do not decide policy beyond the configured cache feature flags.

use std::sync::Arc;

use courier_common::CacheSettings;
use courier_core::{CachedGuild, Channel, Emoji, Guild, Member, Role, Snowflake, User};

use crate::codec::{decode, encode};
use crate::error::CacheResult;
use crate::keys::KeySpace;
use crate::store::KvStore;

/// Client for the materialised view of the platform's object graph
#[derive(Clone)]
pub struct CacheProjection {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    settings: CacheSettings,
}

impl CacheProjection {
    /// Create a projection over a KV store
    pub fn new(store: Arc<dyn KvStore>, settings: CacheSettings) -> Self {
        Self {
            keys: KeySpace::new(settings.namespace.clone()),
            store,
            settings,
        }
    }

    /// The key layout in use
    #[must_use]
    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    /// The underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Whether member entities are persisted
    #[must_use]
    pub fn cache_members(&self) -> bool {
        self.settings.cache_members
    }

    /// Whether the mutual-guild set is maintained
    #[must_use]
    pub fn store_mutuals(&self) -> bool {
        self.settings.store_mutuals
    }

    /// Remove every key in the namespace
    pub async fn clear_namespace(&self) -> CacheResult<u64> {
        self.store.clear_pattern(&self.keys.all()).await
    }

    // === Guilds ===

    /// Fetch a cached guild
    pub async fn guild(&self, guild_id: Snowflake) -> CacheResult<Option<CachedGuild>> {
        match self
            .store
            .hget(&self.keys.guilds(), &guild_id.to_string())
            .await?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Check whether a guild is cached
    pub async fn guild_exists(&self, guild_id: Snowflake) -> CacheResult<bool> {
        self.store
            .hexists(&self.keys.guilds(), &guild_id.to_string())
            .await
    }

    /// Persist a cached guild
    pub async fn save_guild(&self, guild: &CachedGuild) -> CacheResult<()> {
        self.store
            .hset(&self.keys.guilds(), &guild.id.to_string(), encode(guild)?)
            .await
    }

    /// Persist a guild and its whole subordinate graph in bulk
    ///
    /// One hash-multi-set per table; a GUILD_CREATE for a 10k-member guild
    /// issues a handful of round-trips, not one write per member.
    pub async fn insert_guild_graph(&self, guild: &Guild) -> CacheResult<CachedGuild> {
        let cached = CachedGuild::from_guild(guild);
        self.save_guild(&cached).await?;

        if !guild.roles.is_empty() {
            let entries = encode_table(&guild.roles, |r| r.id)?;
            self.store
                .hset_multiple(&self.keys.guild_roles(guild.id), &entries)
                .await?;
        }

        if !guild.channels.is_empty() {
            let entries = encode_table(&guild.channels, |c| c.id)?;
            self.store
                .hset_multiple(&self.keys.channels(), &entries)
                .await?;
            self.store
                .hset_multiple(&self.keys.guild_channels(guild.id), &entries)
                .await?;
        }

        if !guild.emojis.is_empty() {
            let entries = encode_table(&guild.emojis, |e| e.id)?;
            self.store
                .hset_multiple(&self.keys.emojis(), &entries)
                .await?;
        }

        if !guild.members.is_empty() {
            self.save_members(guild.id, &guild.members).await?;
        }

        Ok(cached)
    }

    /// Remove a guild and every subordinate entity
    ///
    /// Returns the cached guild that was removed, if any.
    pub async fn remove_guild(&self, guild_id: Snowflake) -> CacheResult<Option<CachedGuild>> {
        let guild = self.guild(guild_id).await?;
        let gid = guild_id.to_string();

        self.store.hdel(&self.keys.guilds(), &[gid.clone()]).await?;

        if let Some(guild) = &guild {
            let channel_ids: Vec<String> =
                guild.channels.iter().map(Snowflake::to_string).collect();
            self.store.hdel(&self.keys.channels(), &channel_ids).await?;

            let emoji_ids: Vec<String> = guild.emojis.iter().map(Snowflake::to_string).collect();
            self.store.hdel(&self.keys.emojis(), &emoji_ids).await?;
        }

        // Member entries decrement each user's mutual set before the hash
        // itself goes away
        let member_ids = self
            .store
            .hkeys(&self.keys.guild_members(guild_id))
            .await?;
        for user_id in &member_ids {
            self.drop_mutual(guild_id, user_id).await?;
        }

        self.store
            .del(&[
                self.keys.guild_roles(guild_id),
                self.keys.guild_channels(guild_id),
                self.keys.guild_members(guild_id),
            ])
            .await?;

        Ok(guild)
    }

    // === Roles ===

    /// Fetch a role
    pub async fn role(&self, guild_id: Snowflake, role_id: Snowflake) -> CacheResult<Option<Role>> {
        match self
            .store
            .hget(&self.keys.guild_roles(guild_id), &role_id.to_string())
            .await?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist a role
    pub async fn save_role(&self, guild_id: Snowflake, role: &Role) -> CacheResult<()> {
        self.store
            .hset(
                &self.keys.guild_roles(guild_id),
                &role.id.to_string(),
                encode(role)?,
            )
            .await
    }

    /// Delete a role
    pub async fn delete_role(&self, guild_id: Snowflake, role_id: Snowflake) -> CacheResult<()> {
        self.store
            .hdel(&self.keys.guild_roles(guild_id), &[role_id.to_string()])
            .await?;
        Ok(())
    }

    // === Channels ===

    /// Fetch a channel from the global table
    pub async fn channel(&self, channel_id: Snowflake) -> CacheResult<Option<Channel>> {
        match self
            .store
            .hget(&self.keys.channels(), &channel_id.to_string())
            .await?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist a channel in the global table and its guild's index
    pub async fn save_channel(&self, channel: &Channel) -> CacheResult<()> {
        let bytes = encode(channel)?;
        let cid = channel.id.to_string();

        self.store
            .hset(&self.keys.channels(), &cid, bytes.clone())
            .await?;

        if let Some(guild_id) = channel.guild_id.filter(|_| !channel.is_dm()) {
            self.store
                .hset(&self.keys.guild_channels(guild_id), &cid, bytes)
                .await?;
        }

        Ok(())
    }

    /// Delete a channel from the global table and its guild's index
    pub async fn delete_channel(&self, channel: &Channel) -> CacheResult<()> {
        let cid = channel.id.to_string();
        self.store.hdel(&self.keys.channels(), &[cid.clone()]).await?;

        if let Some(guild_id) = channel.guild_id.filter(|_| !channel.is_dm()) {
            self.store
                .hdel(&self.keys.guild_channels(guild_id), &[cid])
                .await?;
        }

        Ok(())
    }

    // === Emojis ===

    /// Fetch an emoji from the global table
    pub async fn emoji(&self, emoji_id: Snowflake) -> CacheResult<Option<Emoji>> {
        match self
            .store
            .hget(&self.keys.emojis(), &emoji_id.to_string())
            .await?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Replace a guild's emoji set, updating the global table and the id
    /// list on the guild
    pub async fn replace_guild_emojis(
        &self,
        guild: &mut CachedGuild,
        emojis: &[Emoji],
    ) -> CacheResult<()> {
        let old_ids: Vec<String> = guild.emojis.iter().map(Snowflake::to_string).collect();
        self.store.hdel(&self.keys.emojis(), &old_ids).await?;

        if !emojis.is_empty() {
            let entries = encode_table(emojis, |e| e.id)?;
            self.store
                .hset_multiple(&self.keys.emojis(), &entries)
                .await?;
        }

        guild.set_emojis(emojis.iter().map(|e| e.id).collect());
        self.save_guild(guild).await
    }

    // === Members and users ===

    /// Fetch a member
    pub async fn member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> CacheResult<Option<Member>> {
        match self
            .store
            .hget(&self.keys.guild_members(guild_id), &user_id.to_string())
            .await?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist a member, its user entry and the mutual-guild edge
    pub async fn save_member(&self, guild_id: Snowflake, member: &Member) -> CacheResult<()> {
        let user_id = member.user.id;

        if self.settings.cache_members {
            self.store
                .hset(
                    &self.keys.guild_members(guild_id),
                    &user_id.to_string(),
                    encode(member)?,
                )
                .await?;
        }

        self.save_user(&member.user).await?;

        if self.settings.store_mutuals {
            self.store
                .sadd(&self.keys.user_mutual(user_id), &guild_id.to_string())
                .await?;
        }

        Ok(())
    }

    /// Bulk-persist members (one hash-multi-set for the member table)
    pub async fn save_members(&self, guild_id: Snowflake, members: &[Member]) -> CacheResult<()> {
        if members.is_empty() {
            return Ok(());
        }

        if self.settings.cache_members {
            let entries = encode_table(members, |m| m.user.id)?;
            self.store
                .hset_multiple(&self.keys.guild_members(guild_id), &entries)
                .await?;
        }

        let users: Vec<(String, Vec<u8>)> = members
            .iter()
            .map(|m| Ok((m.user.id.to_string(), encode(&m.user)?)))
            .collect::<CacheResult<_>>()?;
        self.store
            .hset_multiple(&self.keys.users(), &users)
            .await?;

        if self.settings.store_mutuals {
            let gid = guild_id.to_string();
            for member in members {
                self.store
                    .sadd(&self.keys.user_mutual(member.user.id), &gid)
                    .await?;
            }
        }

        Ok(())
    }

    /// Remove a member and its mutual-guild edge
    pub async fn remove_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> CacheResult<()> {
        let uid = user_id.to_string();
        self.store
            .hdel(&self.keys.guild_members(guild_id), &[uid.clone()])
            .await?;
        self.drop_mutual(guild_id, &uid).await
    }

    /// Fetch a user from the global table
    pub async fn user(&self, user_id: Snowflake) -> CacheResult<Option<User>> {
        match self
            .store
            .hget(&self.keys.users(), &user_id.to_string())
            .await?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist a user
    pub async fn save_user(&self, user: &User) -> CacheResult<()> {
        self.store
            .hset(&self.keys.users(), &user.id.to_string(), encode(user)?)
            .await
    }

    /// Guild ids a user can currently be seen in
    pub async fn mutual_guilds(&self, user_id: Snowflake) -> CacheResult<Vec<Snowflake>> {
        let members = self
            .store
            .smembers(&self.keys.user_mutual(user_id))
            .await?;
        Ok(members
            .iter()
            .filter_map(|s| Snowflake::parse(s).ok())
            .collect())
    }

    /// Remove the mutual edge; an emptied set removes the user entry
    async fn drop_mutual(&self, guild_id: Snowflake, user_id: &str) -> CacheResult<()> {
        if !self.settings.store_mutuals {
            return Ok(());
        }

        let mutual_key = format!("{}:user:{}:mutual", self.keys.namespace(), user_id);
        self.store.srem(&mutual_key, &guild_id.to_string()).await?;

        if self.store.smembers(&mutual_key).await?.is_empty() {
            self.store
                .hdel(&self.keys.users(), &[user_id.to_string()])
                .await?;
        }

        Ok(())
    }
}

/// Encode a slice of entities into (id, bytes) hash entries
fn encode_table<T: serde::Serialize>(
    values: &[T],
    id: impl Fn(&T) -> Snowflake,
) -> CacheResult<Vec<(String, Vec<u8>)>> {
    values
        .iter()
        .map(|v| Ok((id(v).to_string(), encode(v)?)))
        .collect()
}
