//! Shard lifecycle and passthrough marshalers

use courier_core::StreamEvent;

use crate::events::{GuildEmojisUpdatePayload, RawEvent, ShardPayload};
use crate::pipeline::marshalers::parse;
use crate::pipeline::{MarshalContext, MarshalFuture};

/// Forward the event unchanged; no cache effect
pub fn passthrough<'a>(_ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move { Some(StreamEvent::new(event.kind.clone(), event.data.clone())) })
}

/// RESUMED: session continuity only, nothing for consumers
pub fn resumed<'a>(_ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        tracing::debug!(shard = event.shard_id, "Session resumed");
        None
    })
}

/// SHARD_READY: every guild from the shard's READY has arrived
pub fn shard_ready<'a>(_ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        if let Some(payload) = parse::<ShardPayload>(event) {
            tracing::info!(shard = payload.shard_id, "Shard is ready");
        }
        Some(StreamEvent::new(event.kind.clone(), event.data.clone()))
    })
}

/// SHARD_CONNECT passthrough
pub fn shard_connect<'a>(_ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        if let Some(payload) = parse::<ShardPayload>(event) {
            tracing::info!(shard = payload.shard_id, "Shard connected");
        }
        Some(StreamEvent::new(event.kind.clone(), event.data.clone()))
    })
}

/// SHARD_DISCONNECT passthrough
pub fn shard_disconnect<'a>(
    _ctx: &'a mut MarshalContext,
    event: &'a RawEvent,
) -> MarshalFuture<'a> {
    Box::pin(async move {
        if let Some(payload) = parse::<ShardPayload>(event) {
            tracing::info!(
                shard = payload.shard_id,
                code = payload.code,
                "Shard disconnected"
            );
        }
        Some(StreamEvent::new(event.kind.clone(), event.data.clone()))
    })
}

/// GUILD_EMOJIS_UPDATE: replace the guild's emoji set, then pass through
pub fn guild_emojis_update<'a>(
    ctx: &'a mut MarshalContext,
    event: &'a RawEvent,
) -> MarshalFuture<'a> {
    Box::pin(async move {
        let payload: GuildEmojisUpdatePayload = parse(event)?;

        match ctx.cache.guild(payload.guild_id).await {
            Ok(Some(mut guild)) => {
                if let Err(e) = ctx
                    .cache
                    .replace_guild_emojis(&mut guild, &payload.emojis)
                    .await
                {
                    tracing::warn!(guild = %guild.id, error = %e, "Failed to replace emojis");
                }
            }
            Ok(None) => {
                tracing::warn!(
                    guild = %payload.guild_id,
                    "GUILD_EMOJIS_UPDATE referenced unknown guild"
                );
            }
            Err(e) => {
                tracing::warn!(guild = %payload.guild_id, error = %e, "Failed to load guild");
            }
        }

        Some(StreamEvent::new(event.kind.clone(), event.data.clone()))
    })
}
