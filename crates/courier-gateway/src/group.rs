//! Shard group
//!
//! A group is the set of shards covering one shard-count configuration.
//! During rescaling a new group starts alongside the old one; only once
//! every shard in the new group is RUNNING does the old group stop.

use std::collections::HashMap;

use tokio::task::JoinSet;

use crate::error::{GatewayError, GatewayResult};
use crate::shard::{Shard, ShardConfig, ShardState};

/// A set of shards started and stopped together
pub struct ShardGroup {
    shard_count: u32,
    shards: HashMap<u32, Shard>,
}

impl ShardGroup {
    /// Create a group from per-shard configurations
    #[must_use]
    pub fn new(shard_count: u32, configs: Vec<ShardConfig>) -> Self {
        let shards = configs
            .into_iter()
            .map(|config| (config.shard_id, Shard::new(config)))
            .collect();

        Self {
            shard_count,
            shards,
        }
    }

    /// The shard count this group identifies with
    #[must_use]
    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Shard ids in this group
    #[must_use]
    pub fn shard_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.shards.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Look up a shard by id
    #[must_use]
    pub fn shard(&self, shard_id: u32) -> Option<&Shard> {
        self.shards.get(&shard_id)
    }

    /// Check whether every shard is RUNNING
    #[must_use]
    pub fn all_running(&self) -> bool {
        self.shards.values().all(|s| s.state() == ShardState::Running)
    }

    /// Open every shard concurrently; returns once all have produced a
    /// READY, or with the first error after stopping the group
    pub async fn start(&self) -> GatewayResult<()> {
        tracing::info!(
            shards = self.shards.len(),
            shard_count = self.shard_count,
            "Starting shard group"
        );

        let mut joins = JoinSet::new();
        for shard in self.shards.values() {
            let shard = shard.clone();
            joins.spawn(async move {
                let id = shard.id();
                (id, shard.open().await)
            });
        }

        let mut first_error = None;
        while let Some(joined) = joins.join_next().await {
            match joined {
                Ok((shard_id, Ok(()))) => {
                    tracing::info!(shard = shard_id, "Shard started");
                }
                Ok((shard_id, Err(e))) => {
                    tracing::error!(shard = shard_id, error = %e, "Failed to start shard");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(GatewayError::protocol(format!(
                        "shard task panicked: {e}"
                    )));
                }
            }
        }

        // A partial group cannot cover its range; kill it whole
        if let Some(error) = first_error {
            self.stop().await;
            return Err(error);
        }

        Ok(())
    }

    /// Close every shard in the group
    pub async fn stop(&self) {
        tracing::info!(shards = self.shards.len(), "Stopping shard group");
        for shard in self.shards.values() {
            shard.close(4000).await;
        }
    }
}
