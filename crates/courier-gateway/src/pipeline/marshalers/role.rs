//! Role marshalers

use crate::events::{GuildRoleDeletePayload, GuildRolePayload, RawEvent};
use crate::pipeline::marshalers::{emit, emit_diff, parse};
use crate::pipeline::{MarshalContext, MarshalFuture};

/// GUILD_ROLE_CREATE: insert the role and append its id to the guild
pub fn guild_role_create<'a>(
    ctx: &'a mut MarshalContext,
    event: &'a RawEvent,
) -> MarshalFuture<'a> {
    Box::pin(async move {
        let payload: GuildRolePayload = parse(event)?;

        if let Err(e) = ctx.cache.save_role(payload.guild_id, &payload.role).await {
            tracing::warn!(role = %payload.role.id, error = %e, "Failed to save role");
        }

        match ctx.cache.guild(payload.guild_id).await {
            Ok(Some(mut guild)) => {
                guild.add_role(payload.role.id);
                if let Err(e) = ctx.cache.save_guild(&guild).await {
                    tracing::warn!(guild = %guild.id, error = %e, "Failed to save role list");
                }
            }
            Ok(None) => {
                tracing::warn!(
                    guild = %payload.guild_id,
                    "GUILD_ROLE_CREATE referenced unknown guild"
                );
            }
            Err(e) => {
                tracing::warn!(guild = %payload.guild_id, error = %e, "Failed to load guild");
            }
        }

        emit("GUILD_ROLE_CREATE", &payload)
    })
}

/// GUILD_ROLE_UPDATE: replace the role, diffed against the cached value
pub fn guild_role_update<'a>(
    ctx: &'a mut MarshalContext,
    event: &'a RawEvent,
) -> MarshalFuture<'a> {
    Box::pin(async move {
        let payload: GuildRolePayload = parse(event)?;

        let before = ctx
            .cache
            .role(payload.guild_id, payload.role.id)
            .await
            .ok()
            .flatten();
        if before.is_none() {
            tracing::warn!(
                role = %payload.role.id,
                guild = %payload.guild_id,
                "GUILD_ROLE_UPDATE referenced unknown role"
            );
        }

        if let Err(e) = ctx.cache.save_role(payload.guild_id, &payload.role).await {
            tracing::warn!(role = %payload.role.id, error = %e, "Failed to save role");
        }

        if before.as_ref() == Some(&payload.role) {
            return None;
        }

        emit_diff("GUILD_ROLE_UPDATE", &before, &payload.role)
    })
}

/// GUILD_ROLE_DELETE: remove the role and splice its id from the guild
pub fn guild_role_delete<'a>(
    ctx: &'a mut MarshalContext,
    event: &'a RawEvent,
) -> MarshalFuture<'a> {
    Box::pin(async move {
        let payload: GuildRoleDeletePayload = parse(event)?;

        let role = ctx
            .cache
            .role(payload.guild_id, payload.role_id)
            .await
            .ok()
            .flatten();

        if let Err(e) = ctx.cache.delete_role(payload.guild_id, payload.role_id).await {
            tracing::warn!(role = %payload.role_id, error = %e, "Failed to delete role");
        }

        match ctx.cache.guild(payload.guild_id).await {
            Ok(Some(mut guild)) => {
                guild.remove_role(payload.role_id);
                if let Err(e) = ctx.cache.save_guild(&guild).await {
                    tracing::warn!(guild = %guild.id, error = %e, "Failed to save role list");
                }
            }
            Ok(None) => {
                tracing::warn!(
                    guild = %payload.guild_id,
                    "GUILD_ROLE_DELETE referenced unknown guild"
                );
            }
            Err(e) => {
                tracing::warn!(guild = %payload.guild_id, error = %e, "Failed to load guild");
            }
        }

        emit(
            "GUILD_ROLE_DELETE",
            &serde_json::json!({"role": role, "guild_id": payload.guild_id}),
        )
    })
}
