//! Channel marshalers

use courier_core::Channel;

use crate::events::{ChannelPinsUpdatePayload, RawEvent};
use crate::pipeline::marshalers::{emit, emit_diff, parse};
use crate::pipeline::{MarshalContext, MarshalFuture};

async fn update_guild_channel_list(
    ctx: &mut MarshalContext,
    channel: &Channel,
    insert: bool,
) {
    let Some(guild_id) = channel.guild_id.filter(|_| !channel.is_dm()) else {
        return;
    };

    match ctx.cache.guild(guild_id).await {
        Ok(Some(mut guild)) => {
            if insert {
                guild.add_channel(channel.id);
            } else {
                guild.remove_channel(channel.id);
            }
            if let Err(e) = ctx.cache.save_guild(&guild).await {
                tracing::warn!(guild = %guild.id, error = %e, "Failed to save channel list");
            }
        }
        Ok(None) => {
            tracing::warn!(
                guild = %guild_id,
                channel = %channel.id,
                "Channel event referenced unknown guild"
            );
        }
        Err(e) => {
            tracing::warn!(guild = %guild_id, error = %e, "Failed to load guild");
        }
    }
}

/// CHANNEL_CREATE: upsert the channel and index it on its guild
pub fn channel_create<'a>(ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        let channel: Channel = parse(event)?;

        if let Err(e) = ctx.cache.save_channel(&channel).await {
            tracing::warn!(channel = %channel.id, error = %e, "Failed to save channel");
        }
        update_guild_channel_list(ctx, &channel, true).await;

        emit("CHANNEL_CREATE", &channel)
    })
}

/// CHANNEL_UPDATE: replace the channel, diffed against the cached value
pub fn channel_update<'a>(ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        let channel: Channel = parse(event)?;

        let before = ctx.cache.channel(channel.id).await.ok().flatten();

        if let Err(e) = ctx.cache.save_channel(&channel).await {
            tracing::warn!(channel = %channel.id, error = %e, "Failed to save channel");
        }

        if before.as_ref() == Some(&channel) {
            tracing::debug!(channel = %channel.id, "CHANNEL_UPDATE changed nothing");
            return None;
        }

        emit_diff("CHANNEL_UPDATE", &before, &channel)
    })
}

/// CHANNEL_DELETE: drop the channel and its guild index entry
pub fn channel_delete<'a>(ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        let channel: Channel = parse(event)?;

        // Prefer the cached value for the downstream event
        let cached = ctx.cache.channel(channel.id).await.ok().flatten();

        if let Err(e) = ctx.cache.delete_channel(&channel).await {
            tracing::warn!(channel = %channel.id, error = %e, "Failed to delete channel");
        }
        update_guild_channel_list(ctx, &channel, false).await;

        emit("CHANNEL_DELETE", &cached.unwrap_or(channel))
    })
}

/// CHANNEL_PINS_UPDATE: record the pin timestamp on the cached channel
pub fn channel_pins_update<'a>(
    ctx: &'a mut MarshalContext,
    event: &'a RawEvent,
) -> MarshalFuture<'a> {
    Box::pin(async move {
        let payload: ChannelPinsUpdatePayload = parse(event)?;

        match ctx.cache.channel(payload.channel_id).await {
            Ok(Some(mut channel)) => {
                channel.last_pin_timestamp = payload.last_pin_timestamp;
                if let Err(e) = ctx.cache.save_channel(&channel).await {
                    tracing::warn!(channel = %channel.id, error = %e, "Failed to save channel");
                }
            }
            Ok(None) => {
                tracing::warn!(
                    channel = %payload.channel_id,
                    "CHANNEL_PINS_UPDATE referenced unknown channel"
                );
            }
            Err(e) => {
                tracing::warn!(channel = %payload.channel_id, error = %e, "Failed to load channel");
            }
        }

        emit("CHANNEL_PINS_UPDATE", &payload)
    })
}
