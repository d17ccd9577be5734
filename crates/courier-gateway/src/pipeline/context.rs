//! Marshal context
//!
//! Mutable state owned by the pipeline task: the cache handle, the
//! unavailable-guild map, and the per-shard READY guild tracking. No other
//! task touches any of this; the pipeline's serial consumption is what
//! makes cache writes linearisable.

use std::collections::HashMap;

use courier_cache::CacheProjection;
use courier_core::Snowflake;

use crate::limiter::GuardedSet;

/// State threaded through every marshaler call
pub struct MarshalContext {
    /// The cache projection; the pipeline is its only writer
    pub cache: CacheProjection,

    /// Guilds that are logically present but have not delivered state.
    /// `false`: listed in READY, initial GUILD_CREATE still pending.
    /// `true`: went unavailable after READY.
    unavailables: HashMap<Snowflake, bool>,

    /// Guild ids each shard still owes a GUILD_CREATE for
    shard_ready: HashMap<u32, GuardedSet<Snowflake>>,

    /// Shards whose pending set just emptied; drained by the consumer
    newly_ready: Vec<u32>,
}

impl MarshalContext {
    /// Create a context over a cache projection
    #[must_use]
    pub fn new(cache: CacheProjection) -> Self {
        Self {
            cache,
            unavailables: HashMap::new(),
            shard_ready: HashMap::new(),
            newly_ready: Vec::new(),
        }
    }

    // === Unavailable guilds ===

    /// Mark a guild's availability state
    pub fn set_unavailable(&mut self, guild_id: Snowflake, down_after_ready: bool) {
        self.unavailables.insert(guild_id, down_after_ready);
    }

    /// Remove and return a guild's availability entry
    pub fn take_unavailable(&mut self, guild_id: Snowflake) -> Option<bool> {
        self.unavailables.remove(&guild_id)
    }

    /// Number of guilds currently tracked as unavailable
    #[must_use]
    pub fn unavailable_count(&self) -> usize {
        self.unavailables.len()
    }

    // === Shard READY tracking ===

    /// Record the guild ids a shard's READY listed
    pub fn track_ready_guilds(&mut self, shard_id: u32, guild_ids: Vec<Snowflake>) {
        let set = self.shard_ready.entry(shard_id).or_default();
        set.replace(guild_ids);

        // A READY with no guilds makes the shard ready immediately
        if set.is_empty() {
            self.shard_ready.remove(&shard_id);
            self.newly_ready.push(shard_id);
        }
    }

    /// Note a GUILD_CREATE against the shard's pending set
    pub fn note_guild_create(&mut self, shard_id: u32, guild_id: Snowflake) {
        if let Some(set) = self.shard_ready.get(&shard_id) {
            set.remove(&guild_id);
            if set.is_empty() {
                self.shard_ready.remove(&shard_id);
                self.newly_ready.push(shard_id);
            }
        }
    }

    /// Guild ids a shard still owes, for diagnostics
    #[must_use]
    pub fn pending_guilds(&self, shard_id: u32) -> usize {
        self.shard_ready.get(&shard_id).map_or(0, GuardedSet::len)
    }

    /// Drain the shards whose pending set just emptied
    pub fn take_newly_ready(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.newly_ready)
    }
}
