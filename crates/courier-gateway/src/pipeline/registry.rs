//! Marshaler registry
//!
//! A data-driven lookup table from dispatch kind to handler. Built once at
//! process start and immutable afterwards, so the pipeline reads it without
//! synchronisation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use courier_core::StreamEvent;

use crate::events::{EventKind, RawEvent};
use crate::pipeline::marshalers;
use crate::pipeline::MarshalContext;

/// Future returned by a marshaler
pub type MarshalFuture<'a> = Pin<Box<dyn Future<Output = Option<StreamEvent>> + Send + 'a>>;

/// Per-kind handler: applies cache effects and decides the downstream
/// event; `None` means "do not forward"
pub type Marshaler = for<'a> fn(&'a mut MarshalContext, &'a RawEvent) -> MarshalFuture<'a>;

/// Registry of marshalers keyed by dispatch kind
#[derive(Default)]
pub struct MarshalerRegistry {
    entries: HashMap<String, Marshaler>,
}

impl MarshalerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the registry with every marshaler the producer knows
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(EventKind::Ready, marshalers::ready);
        registry.register(EventKind::Resumed, marshalers::resumed);

        registry.register(EventKind::ShardReady, marshalers::shard_ready);
        registry.register(EventKind::ShardConnect, marshalers::shard_connect);
        registry.register(EventKind::ShardDisconnect, marshalers::shard_disconnect);

        registry.register(EventKind::GuildCreate, marshalers::guild_create);
        registry.register(EventKind::GuildUpdate, marshalers::guild_update);
        registry.register(EventKind::GuildDelete, marshalers::guild_delete);

        registry.register(EventKind::GuildRoleCreate, marshalers::guild_role_create);
        registry.register(EventKind::GuildRoleUpdate, marshalers::guild_role_update);
        registry.register(EventKind::GuildRoleDelete, marshalers::guild_role_delete);

        registry.register(EventKind::ChannelCreate, marshalers::channel_create);
        registry.register(EventKind::ChannelUpdate, marshalers::channel_update);
        registry.register(EventKind::ChannelDelete, marshalers::channel_delete);
        registry.register(EventKind::ChannelPinsUpdate, marshalers::channel_pins_update);

        registry.register(EventKind::GuildMemberAdd, marshalers::member_add);
        registry.register(EventKind::GuildMemberUpdate, marshalers::member_update);
        registry.register(EventKind::GuildMemberRemove, marshalers::member_remove);
        registry.register(EventKind::GuildMembersChunk, marshalers::members_chunk);

        registry.register(EventKind::GuildBanAdd, marshalers::passthrough);
        registry.register(EventKind::GuildBanRemove, marshalers::passthrough);
        registry.register(EventKind::GuildEmojisUpdate, marshalers::guild_emojis_update);
        registry.register(EventKind::GuildIntegrationsUpdate, marshalers::passthrough);
        registry.register(EventKind::WebhooksUpdate, marshalers::passthrough);

        registry
    }

    /// Bind a marshaler to a dispatch kind
    ///
    /// A no-op when the kind is already bound.
    pub fn register(&mut self, kind: impl Into<String>, marshaler: Marshaler) {
        self.entries.entry(kind.into()).or_insert(marshaler);
    }

    /// Look up the marshaler for a dispatch kind
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&Marshaler> {
        self.entries.get(kind)
    }

    /// Number of bound kinds
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_the_catalogue() {
        let registry = MarshalerRegistry::with_defaults();
        for kind in [
            "READY",
            "SHARD_READY",
            "SHARD_CONNECT",
            "SHARD_DISCONNECT",
            "GUILD_CREATE",
            "GUILD_UPDATE",
            "GUILD_DELETE",
            "GUILD_ROLE_CREATE",
            "GUILD_ROLE_UPDATE",
            "GUILD_ROLE_DELETE",
            "CHANNEL_CREATE",
            "CHANNEL_UPDATE",
            "CHANNEL_DELETE",
            "CHANNEL_PINS_UPDATE",
            "GUILD_MEMBER_ADD",
            "GUILD_MEMBER_UPDATE",
            "GUILD_MEMBER_REMOVE",
            "GUILD_MEMBERS_CHUNK",
            "GUILD_BAN_ADD",
            "GUILD_BAN_REMOVE",
            "GUILD_EMOJIS_UPDATE",
            "GUILD_INTEGRATIONS_UPDATE",
            "WEBHOOKS_UPDATE",
        ] {
            assert!(registry.get(kind).is_some(), "missing marshaler for {kind}");
        }
    }

    #[test]
    fn test_register_is_noop_when_bound() {
        let mut registry = MarshalerRegistry::new();
        registry.register("GUILD_CREATE", marshalers::guild_create);
        let len = registry.len();

        registry.register("GUILD_CREATE", marshalers::passthrough);
        assert_eq!(registry.len(), len);

        // The original binding survives
        let bound = registry.get("GUILD_CREATE").unwrap();
        assert_eq!(*bound as usize, marshalers::guild_create as usize);
    }

    #[test]
    fn test_unknown_kind_is_unbound() {
        let registry = MarshalerRegistry::with_defaults();
        assert!(registry.get("PRESENCE_UPDATE").is_none());
    }
}
