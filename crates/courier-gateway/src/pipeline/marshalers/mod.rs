//! Marshaler catalogue
//!
//! One handler per dispatch kind. A marshaler applies the event's cache
//! effects and returns the downstream event, or `None` to drop. Errors
//! local to one event are logged and swallowed here; the gateway is the
//! authoritative source and the cache only a projection.

mod channel;
mod guild;
mod member;
mod misc;
mod role;

pub use channel::{channel_create, channel_delete, channel_pins_update, channel_update};
pub use guild::{guild_create, guild_delete, guild_update, ready};
pub use member::{member_add, member_remove, member_update, members_chunk};
pub use misc::{
    guild_emojis_update, passthrough, resumed, shard_connect, shard_disconnect, shard_ready,
};
pub use role::{guild_role_create, guild_role_delete, guild_role_update};

use serde::de::DeserializeOwned;
use serde::Serialize;

use courier_core::StreamEvent;

use crate::events::RawEvent;

/// Decode a dispatch payload, logging and dropping the event on failure
///
/// The gateway may introduce fields at any time; a payload this producer
/// cannot read is never a reason to kill the shard.
pub(crate) fn parse<T: DeserializeOwned>(event: &RawEvent) -> Option<T> {
    match serde_json::from_value(event.data.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                kind = %event.kind,
                shard = event.shard_id,
                error = %e,
                "Failed to decode dispatch payload, dropping event"
            );
            None
        }
    }
}

/// Build a downstream event from a payload, logging encode failures
pub(crate) fn emit<T: Serialize>(kind: impl Into<String>, payload: &T) -> Option<StreamEvent> {
    let kind = kind.into();
    match StreamEvent::from_payload(kind.clone(), payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(kind = %kind, error = %e, "Failed to encode stream event");
            None
        }
    }
}

/// Build a `{before, after}` event, logging encode failures
pub(crate) fn emit_diff<T: Serialize>(
    kind: impl Into<String>,
    before: &Option<T>,
    after: &T,
) -> Option<StreamEvent> {
    let kind = kind.into();
    match (
        serde_json::to_value(before),
        serde_json::to_value(after),
    ) {
        (Ok(before), Ok(after)) => Some(StreamEvent::new(
            kind,
            serde_json::json!({"before": before, "after": after}),
        )),
        _ => {
            tracing::warn!(kind = %kind, "Failed to encode diff event");
            None
        }
    }
}
