//! Guild lifecycle marshalers

use courier_core::{CachedGuild, Guild, UnavailableGuild};

use crate::events::{RawEvent, ReadyPayload};
use crate::pipeline::marshalers::{emit, emit_diff, parse};
use crate::pipeline::{MarshalContext, MarshalFuture};

/// READY: seed the unavailable-guild map and the shard's pending set
///
/// Nothing is emitted; the synthetic SHARD_READY fires once every listed
/// guild has delivered its GUILD_CREATE.
pub fn ready<'a>(ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        let payload: ReadyPayload = parse(event)?;

        for guild in &payload.guilds {
            ctx.set_unavailable(guild.id, false);
        }
        ctx.track_ready_guilds(
            event.shard_id,
            payload.guilds.iter().map(|g| g.id).collect(),
        );

        tracing::info!(
            shard = event.shard_id,
            guilds = payload.guilds.len(),
            "READY received, awaiting guild warm-up"
        );

        None
    })
}

/// GUILD_CREATE: upsert the whole guild graph, then disambiguate between
/// warm-up, join and availability restore
pub fn guild_create<'a>(ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        let guild: Guild = parse(event)?;

        let in_cache = match ctx.cache.guild_exists(guild.id).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(guild = %guild.id, error = %e, "Failed to check guild cache");
                false
            }
        };

        let cached = match ctx.cache.insert_guild_graph(&guild).await {
            Ok(cached) => cached,
            Err(e) => {
                // The event is still meaningful downstream; the cache is
                // only a projection
                tracing::warn!(guild = %guild.id, error = %e, "Failed to save guild graph");
                CachedGuild::from_guild(&guild)
            }
        };

        ctx.note_guild_create(event.shard_id, guild.id);

        match (ctx.take_unavailable(guild.id), in_cache) {
            // Was marked unavailable: the guild came back
            (Some(true), _) => emit("GUILD_AVAILABLE", &cached),
            // Listed in READY: initial warm-up, consumers do not care
            (Some(false), _) => {
                tracing::debug!(guild = %guild.id, "Initial guild create");
                None
            }
            // Unlisted but cached: availability restored across a resume
            (None, true) => emit("GUILD_AVAILABLE", &cached),
            // Brand new guild
            (None, false) => emit("GUILD_JOIN", &cached),
        }
    })
}

/// GUILD_UPDATE: replace guild fields, emitting `{before, after}` only
/// when the persisted fields differ
pub fn guild_update<'a>(ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        let guild: Guild = parse(event)?;

        let before = match ctx.cache.guild(guild.id).await {
            Ok(before) => before,
            Err(e) => {
                tracing::warn!(guild = %guild.id, error = %e, "Failed to load guild for diff");
                None
            }
        };
        if before.is_none() {
            tracing::warn!(guild = %guild.id, "GUILD_UPDATE referenced unknown guild");
        }

        let mut after = CachedGuild::from_guild(&guild);
        if let Some(before) = &before {
            // Update payloads may omit the subordinate lists; the cached
            // ids survive the replace
            if guild.roles.is_empty() {
                after.roles = before.roles.clone();
            }
            if guild.channels.is_empty() {
                after.channels = before.channels.clone();
            }
            if guild.emojis.is_empty() {
                after.emojis = before.emojis.clone();
            }
            if after.joined_at.is_none() {
                after.joined_at = before.joined_at;
            }
            if after.member_count == 0 {
                after.member_count = before.member_count;
            }
        }

        if before.as_ref() == Some(&after) {
            tracing::debug!(guild = %guild.id, "GUILD_UPDATE changed nothing");
            return None;
        }

        if let Err(e) = ctx.cache.save_guild(&after).await {
            tracing::warn!(guild = %guild.id, error = %e, "Failed to save updated guild");
        }

        emit_diff("GUILD_UPDATE", &before, &after)
    })
}

/// GUILD_DELETE: either an availability flap or a real removal
pub fn guild_delete<'a>(ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        let partial: UnavailableGuild = parse(event)?;

        ctx.take_unavailable(partial.id);

        if partial.unavailable {
            // The guild went down; keep its cache so the eventual
            // GUILD_CREATE is recognised as an availability restore
            ctx.set_unavailable(partial.id, true);

            let guild = ctx.cache.guild(partial.id).await.ok().flatten();
            tracing::info!(guild = %partial.id, "Guild went unavailable");
            match guild {
                Some(guild) => emit("GUILD_UNAVAILABLE", &guild),
                None => emit("GUILD_UNAVAILABLE", &partial),
            }
        } else {
            let removed = match ctx.cache.remove_guild(partial.id).await {
                Ok(removed) => removed,
                Err(e) => {
                    tracing::warn!(guild = %partial.id, error = %e, "Failed to remove guild");
                    None
                }
            };

            tracing::info!(guild = %partial.id, "Removed from guild");
            match removed {
                Some(guild) => emit("GUILD_REMOVE", &guild),
                None => emit("GUILD_REMOVE", &partial),
            }
        }
    })
}
