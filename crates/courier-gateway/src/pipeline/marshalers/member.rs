//! Member marshalers
//!
//! Member writes are idempotent last-write-wins upserts keyed by user id,
//! so GUILD_MEMBERS_CHUNK and GUILD_CREATE may arrive in either order.

use courier_core::{Member, Snowflake};

use crate::events::{GuildMembersChunkPayload, MemberRemovePayload, RawEvent};
use crate::pipeline::marshalers::{emit, emit_diff, parse};
use crate::pipeline::{MarshalContext, MarshalFuture};

async fn bump_member_count(ctx: &mut MarshalContext, guild_id: Snowflake, delta: i64) {
    match ctx.cache.guild(guild_id).await {
        Ok(Some(mut guild)) => {
            guild.member_count = guild.member_count.saturating_add_signed(delta as i32);
            if let Err(e) = ctx.cache.save_guild(&guild).await {
                tracing::warn!(guild = %guild.id, error = %e, "Failed to save member count");
            }
        }
        Ok(None) => {
            tracing::warn!(guild = %guild_id, "Member event referenced unknown guild");
        }
        Err(e) => {
            tracing::warn!(guild = %guild_id, error = %e, "Failed to load guild");
        }
    }
}

/// GUILD_MEMBER_ADD: upsert the member and its mutual-guild edge
pub fn member_add<'a>(ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        let member: Member = parse(event)?;
        let Some(guild_id) = member.guild_id else {
            tracing::warn!(user = %member.user.id, "GUILD_MEMBER_ADD without guild id");
            return None;
        };

        if let Err(e) = ctx.cache.save_member(guild_id, &member).await {
            tracing::warn!(user = %member.user.id, error = %e, "Failed to save member");
        }
        bump_member_count(ctx, guild_id, 1).await;

        emit("GUILD_MEMBER_ADD", &member)
    })
}

/// GUILD_MEMBER_UPDATE: replace the member, inheriting cached fields the
/// payload omits
pub fn member_update<'a>(ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        let mut member: Member = parse(event)?;
        let Some(guild_id) = member.guild_id else {
            tracing::warn!(user = %member.user.id, "GUILD_MEMBER_UPDATE without guild id");
            return None;
        };

        let before = ctx
            .cache
            .member(guild_id, member.user.id)
            .await
            .ok()
            .flatten();
        if let Some(before) = &before {
            member.inherit_from(before);
        }

        if let Err(e) = ctx.cache.save_member(guild_id, &member).await {
            tracing::warn!(user = %member.user.id, error = %e, "Failed to save member");
        }

        if before.as_ref() == Some(&member) {
            return None;
        }

        emit_diff("GUILD_MEMBER_UPDATE", &before, &member)
    })
}

/// GUILD_MEMBER_REMOVE: drop the member and its mutual-guild edge
pub fn member_remove<'a>(ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        let payload: MemberRemovePayload = parse(event)?;

        if let Err(e) = ctx
            .cache
            .remove_member(payload.guild_id, payload.user.id)
            .await
        {
            tracing::warn!(user = %payload.user.id, error = %e, "Failed to remove member");
        }
        bump_member_count(ctx, payload.guild_id, -1).await;

        emit("GUILD_MEMBER_REMOVE", &payload)
    })
}

/// GUILD_MEMBERS_CHUNK: bulk upsert; nothing is emitted downstream
pub fn members_chunk<'a>(ctx: &'a mut MarshalContext, event: &'a RawEvent) -> MarshalFuture<'a> {
    Box::pin(async move {
        let payload: GuildMembersChunkPayload = parse(event)?;

        let members: Vec<Member> = payload
            .members
            .into_iter()
            .map(|mut member| {
                member.guild_id = Some(payload.guild_id);
                member
            })
            .collect();

        tracing::debug!(
            guild = %payload.guild_id,
            members = members.len(),
            "Caching member chunk"
        );

        if let Err(e) = ctx.cache.save_members(payload.guild_id, &members).await {
            tracing::warn!(guild = %payload.guild_id, error = %e, "Failed to save member chunk");
        }

        None
    })
}
