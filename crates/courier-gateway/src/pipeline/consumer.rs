//! Pipeline consumer
//!
//! Exactly one task runs this loop, giving a sequential write order into
//! both the cache and the produce queue. A full produce queue back-
//! pressures this loop, and a full event queue in turn back-pressures the
//! shard read loops.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;

use courier_common::PipelineSettings;
use courier_core::StreamEvent;

use crate::events::{EventKind, RawEvent, ShardPayload};
use crate::pipeline::{MarshalContext, MarshalerRegistry};

/// The event-queue consumer
pub struct Pipeline {
    registry: Arc<MarshalerRegistry>,
    ignored: HashSet<String>,
    blacklist: HashSet<String>,
}

impl Pipeline {
    /// Create a pipeline over a registry and the configured filters
    #[must_use]
    pub fn new(settings: &PipelineSettings, registry: Arc<MarshalerRegistry>) -> Self {
        Self {
            registry,
            ignored: settings.ignored_events.iter().cloned().collect(),
            blacklist: settings.producer_blacklist.iter().cloned().collect(),
        }
    }

    /// Consume the event queue until every sender is gone
    pub async fn run(
        self,
        mut ctx: MarshalContext,
        mut event_rx: mpsc::Receiver<RawEvent>,
        produce_tx: mpsc::Sender<StreamEvent>,
    ) {
        tracing::debug!(marshalers = self.registry.len(), "Pipeline started");

        while let Some(event) = event_rx.recv().await {
            self.process(&mut ctx, event, &produce_tx).await;
        }

        tracing::debug!("Event queue closed, pipeline stopping");
        // produce_tx drops here, which lets the publisher drain and stop
    }

    /// Handle one raw event plus any synthetic events it triggers
    pub async fn process(
        &self,
        ctx: &mut MarshalContext,
        event: RawEvent,
        produce_tx: &mpsc::Sender<StreamEvent>,
    ) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            if self.ignored.contains(&event.kind) {
                tracing::debug!(kind = %event.kind, "Event ignored");
                continue;
            }

            let Some(marshaler) = self.registry.get(&event.kind) else {
                tracing::warn!(kind = %event.kind, "No marshaler for event");
                continue;
            };

            let downstream = marshaler(ctx, &event).await;

            // A GUILD_CREATE may have emptied a shard's pending set; the
            // synthetic SHARD_READY goes through the same marshal path
            for shard_id in ctx.take_newly_ready() {
                if let Ok(data) = serde_json::to_value(ShardPayload::new(shard_id)) {
                    queue.push_back(RawEvent::synthetic(
                        shard_id,
                        EventKind::ShardReady,
                        data,
                    ));
                }
            }

            let Some(downstream) = downstream else {
                continue;
            };

            if self.blacklist.contains(&event.kind) {
                tracing::debug!(kind = %event.kind, "Event cached but not republished");
                continue;
            }

            if produce_tx.send(downstream).await.is_err() {
                tracing::warn!("Produce queue closed, dropping stream event");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_cache::{CacheProjection, MemoryStore};
    use courier_common::CacheSettings;

    fn pipeline(settings: PipelineSettings) -> (Pipeline, MarshalContext) {
        let registry = Arc::new(MarshalerRegistry::with_defaults());
        let cache = CacheProjection::new(Arc::new(MemoryStore::new()), CacheSettings::default());
        (Pipeline::new(&settings, registry), MarshalContext::new(cache))
    }

    #[tokio::test]
    async fn test_ignored_events_never_reach_a_marshaler() {
        let (pipeline, mut ctx) = pipeline(PipelineSettings {
            ignored_events: vec!["GUILD_BAN_ADD".to_string()],
            producer_blacklist: Vec::new(),
        });
        let (produce_tx, mut produce_rx) = mpsc::channel(8);

        let event = RawEvent::dispatch(
            0,
            1,
            "GUILD_BAN_ADD",
            serde_json::json!({"guild_id": "1", "user": {"id": "2"}}),
        );
        pipeline.process(&mut ctx, event, &produce_tx).await;

        drop(produce_tx);
        assert!(produce_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_blacklisted_events_are_cached_but_not_republished() {
        let (pipeline, mut ctx) = pipeline(PipelineSettings {
            ignored_events: Vec::new(),
            producer_blacklist: vec!["GUILD_CREATE".to_string()],
        });
        let (produce_tx, mut produce_rx) = mpsc::channel(8);

        let event = RawEvent::dispatch(
            0,
            1,
            "GUILD_CREATE",
            serde_json::json!({"id": "9", "name": "g", "owner_id": "1"}),
        );
        pipeline.process(&mut ctx, event, &produce_tx).await;

        // Cached
        assert!(ctx
            .cache
            .guild_exists(courier_core::Snowflake::new(9))
            .await
            .unwrap());

        // Not republished
        drop(produce_tx);
        assert!(produce_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_dropped() {
        let (pipeline, mut ctx) = pipeline(PipelineSettings::default());
        let (produce_tx, mut produce_rx) = mpsc::channel(8);

        let event = RawEvent::dispatch(0, 1, "TYPING_START", serde_json::json!({}));
        pipeline.process(&mut ctx, event, &produce_tx).await;

        drop(produce_tx);
        assert!(produce_rx.recv().await.is_none());
    }
}
