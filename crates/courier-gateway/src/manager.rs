//! Manager
//!
//! Owns the shard groups, the shared identify limits, the bounded queues
//! and the pipeline/publisher tasks. All global mutable state lives here,
//! created at startup and passed explicitly to shards and marshalers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use courier_cache::CacheProjection;
use courier_common::AppConfig;
use courier_core::StreamEvent;

use crate::broker::Broker;
use crate::error::{GatewayError, GatewayResult};
use crate::events::RawEvent;
use crate::group::ShardGroup;
use crate::pipeline::{MarshalContext, MarshalerRegistry, Pipeline};
use crate::protocol::StatusUpdate;
use crate::publisher::Publisher;
use crate::rest::{GatewayBot, RestClient, API_VERSION};
use crate::shard::{SessionLimits, ShardConfig};

/// Capacity of the event and produce queues
pub const BUFFER_SIZE: usize = 2048;

/// Groups that may be live concurrently, enabling zero-gap rescaling
pub const MAX_SHARD_GROUPS: usize = 2;

/// Ceiling on queue draining during shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shard counts above this round up to the platform stride
const STRIDE_THRESHOLD: u32 = 63;
const STRIDE: u32 = 16;

/// Resolve the shard count against the server recommendation
///
/// `autoshard` takes the recommendation outright; otherwise the larger of
/// the requested and recommended counts wins.
#[must_use]
pub fn resolve_shard_count(requested: u32, recommended: u32, autoshard: bool) -> u32 {
    let count = if autoshard {
        recommended
    } else {
        requested.max(recommended)
    };
    round_shard_count(count.max(1))
}

/// Round counts above 63 up to the next multiple of 16
///
/// Platform-empirical big-bot stride; isolated here so it stays a policy
/// knob.
#[must_use]
pub fn round_shard_count(count: u32) -> u32 {
    if count > STRIDE_THRESHOLD {
        count.div_ceil(STRIDE) * STRIDE
    } else {
        count
    }
}

/// Shard ids this cluster runs: the `cluster_id`-th slice of the count
#[must_use]
pub fn cluster_shard_ids(shard_count: u32, cluster_count: u32, cluster_id: u32) -> Vec<u32> {
    let per_cluster = shard_count / cluster_count.max(1);
    (per_cluster * cluster_id..per_cluster * (cluster_id + 1)).collect()
}

/// Options for creating a manager
pub struct ManagerOptions {
    /// Bot token, with or without the `Bot ` prefix
    pub token: String,
    pub config: AppConfig,
    /// Presence every session identifies with
    pub presence: Option<StatusUpdate>,
}

/// The producer's top-level component
pub struct Manager {
    token: String,
    config: AppConfig,
    presence: Option<StatusUpdate>,
    rest: RestClient,
    cache: CacheProjection,
    broker: Arc<dyn Broker>,

    event_tx: StdMutex<Option<mpsc::Sender<RawEvent>>>,
    event_rx: StdMutex<Option<mpsc::Receiver<RawEvent>>>,
    produce_tx: StdMutex<Option<mpsc::Sender<StreamEvent>>>,
    produce_rx: StdMutex<Option<mpsc::Receiver<StreamEvent>>>,

    limits: StdMutex<Option<Arc<SessionLimits>>>,
    gateway: StdMutex<Option<GatewayBot>>,
    groups: StdMutex<VecDeque<Arc<ShardGroup>>>,
    pipeline_task: StdMutex<Option<JoinHandle<()>>>,
    publisher_task: StdMutex<Option<JoinHandle<()>>>,
}

impl Manager {
    /// Create a manager over a cache projection and a broker
    #[must_use]
    pub fn new(options: ManagerOptions, cache: CacheProjection, broker: Arc<dyn Broker>) -> Self {
        let mut token = options.token;
        if !token.starts_with("Bot ") {
            token = format!("Bot {token}");
        }

        let (event_tx, event_rx) = mpsc::channel(BUFFER_SIZE);
        let (produce_tx, produce_rx) = mpsc::channel(BUFFER_SIZE);

        Self {
            rest: RestClient::new(token.clone()),
            token,
            config: options.config,
            presence: options.presence,
            cache,
            broker,
            event_tx: StdMutex::new(Some(event_tx)),
            event_rx: StdMutex::new(Some(event_rx)),
            produce_tx: StdMutex::new(Some(produce_tx)),
            produce_rx: StdMutex::new(Some(produce_rx)),
            limits: StdMutex::new(None),
            gateway: StdMutex::new(None),
            groups: StdMutex::new(VecDeque::new()),
            pipeline_task: StdMutex::new(None),
            publisher_task: StdMutex::new(None),
        }
    }

    /// The gateway-bot response fetched at startup
    #[must_use]
    pub fn gateway(&self) -> Option<GatewayBot> {
        self.gateway.lock().unwrap().clone()
    }

    /// Number of live shard groups
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.lock().unwrap().len()
    }

    /// Remove every cache key in the configured namespace
    pub async fn clear_cache(&self) -> GatewayResult<u64> {
        self.cache
            .clear_namespace()
            .await
            .map_err(|e| GatewayError::protocol(format!("cache clear failed: {e}")))
    }

    /// Discover the gateway, start the pipeline and publisher, and bring
    /// up the first shard group
    pub async fn open(&self) -> GatewayResult<()> {
        let gateway = self.rest.gateway_bot().await?;
        tracing::info!(
            url = %gateway.url,
            recommended = gateway.shards,
            remaining = gateway.session_start_limit.remaining,
            max_concurrency = gateway.session_start_limit.max_concurrency,
            "Discovered gateway"
        );

        let settings = &self.config.gateway;
        let shard_count =
            resolve_shard_count(settings.shard_count, gateway.shards, settings.autoshard);

        if shard_count > gateway.session_start_limit.remaining {
            return Err(GatewayError::NotEnoughSessions {
                needed: shard_count,
                remaining: gateway.session_start_limit.remaining,
            });
        }

        let limits = Arc::new(SessionLimits::new(
            settings.max_concurrent_identifies,
            gateway.session_start_limit.max_concurrency,
        ));
        *self.limits.lock().unwrap() = Some(limits);
        *self.gateway.lock().unwrap() = Some(gateway);

        self.spawn_pipeline()?;
        self.spawn_publisher()?;

        let shard_ids =
            cluster_shard_ids(shard_count, settings.cluster_count, settings.cluster_id);
        tracing::info!(
            shards = shard_count,
            cluster = settings.cluster_id,
            ids = ?shard_ids,
            "Starting shards"
        );

        self.scale(shard_ids, shard_count).await
    }

    /// Start a new shard group; once all its shards are RUNNING the
    /// previous group stops
    pub async fn scale(&self, shard_ids: Vec<u32>, shard_count: u32) -> GatewayResult<()> {
        let configs = self.shard_configs(&shard_ids, shard_count)?;
        let group = Arc::new(ShardGroup::new(shard_count, configs));

        // Register before starting so shutdown reaches a half-started group.
        // If a previous rescale left us at capacity, retire the oldest.
        let stale: Vec<Arc<ShardGroup>> = {
            let mut groups = self.groups.lock().unwrap();
            let mut stale = Vec::new();
            while groups.len() >= MAX_SHARD_GROUPS {
                stale.extend(groups.pop_front());
            }
            groups.push_back(Arc::clone(&group));
            stale
        };
        for old in stale {
            old.stop().await;
        }

        match group.start().await {
            Ok(()) => {
                // Zero-gap handover: the new group is fully RUNNING, the
                // previous one can go
                let previous: Vec<Arc<ShardGroup>> = {
                    let mut groups = self.groups.lock().unwrap();
                    let mut previous = Vec::new();
                    while groups.len() > 1 {
                        previous.extend(groups.pop_front());
                    }
                    previous
                };
                for old in previous {
                    old.stop().await;
                }
                Ok(())
            }
            Err(e) => {
                let mut groups = self.groups.lock().unwrap();
                groups.retain(|g| !Arc::ptr_eq(g, &group));
                Err(e)
            }
        }
    }

    /// Close every shard, then drain both queues to completion or timeout
    pub async fn close(&self) {
        tracing::info!("Closing manager");

        let groups: Vec<Arc<ShardGroup>> = self.groups.lock().unwrap().drain(..).collect();
        for group in groups {
            group.stop().await;
        }

        // Dropping our event sender closes the queue once the shard tasks
        // have wound down; the pipeline then drains and stops, and its
        // dropped produce sender lets the publisher do the same
        self.event_tx.lock().unwrap().take();

        let pipeline = self.pipeline_task.lock().unwrap().take();
        if let Some(handle) = pipeline {
            if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("Pipeline did not drain within the shutdown ceiling");
            }
        }

        let publisher = self.publisher_task.lock().unwrap().take();
        if let Some(handle) = publisher {
            if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("Publisher did not drain within the shutdown ceiling");
            }
        }

        tracing::info!("Manager closed");
    }

    fn shard_configs(
        &self,
        shard_ids: &[u32],
        shard_count: u32,
    ) -> GatewayResult<Vec<ShardConfig>> {
        let event_tx = self
            .event_tx
            .lock()
            .unwrap()
            .clone()
            .ok_or(GatewayError::QueueClosed)?;
        let limits = self
            .limits
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GatewayError::protocol("manager not opened"))?;
        let gateway_url = {
            let gateway = self.gateway.lock().unwrap();
            let gateway = gateway
                .as_ref()
                .ok_or_else(|| GatewayError::protocol("manager not opened"))?;
            format!("{}?v={}&encoding=json", gateway.url, API_VERSION)
        };

        Ok(shard_ids
            .iter()
            .map(|&shard_id| ShardConfig {
                shard_id,
                shard_count,
                token: self.token.clone(),
                gateway_url: gateway_url.clone(),
                settings: self.config.gateway.clone(),
                presence: self.presence.clone(),
                event_tx: event_tx.clone(),
                limits: Arc::clone(&limits),
                reconnect: true,
            })
            .collect())
    }

    fn spawn_pipeline(&self) -> GatewayResult<()> {
        let event_rx = self
            .event_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| GatewayError::protocol("pipeline already running"))?;
        let produce_tx = self
            .produce_tx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| GatewayError::protocol("pipeline already running"))?;

        let registry = Arc::new(MarshalerRegistry::with_defaults());
        let pipeline = Pipeline::new(&self.config.pipeline, registry);
        let ctx = MarshalContext::new(self.cache.clone());

        let handle = tokio::spawn(pipeline.run(ctx, event_rx, produce_tx));
        *self.pipeline_task.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn spawn_publisher(&self) -> GatewayResult<()> {
        let produce_rx = self
            .produce_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| GatewayError::protocol("publisher already running"))?;

        let publisher = Publisher::new(Arc::clone(&self.broker), &self.config.broker.subject);

        let handle = tokio::spawn(publisher.run(produce_rx));
        *self.publisher_task.lock().unwrap() = Some(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_larger_count() {
        assert_eq!(resolve_shard_count(4, 2, false), 4);
        assert_eq!(resolve_shard_count(2, 8, false), 8);
        assert_eq!(resolve_shard_count(0, 1, false), 1);
    }

    #[test]
    fn test_autoshard_takes_recommendation() {
        assert_eq!(resolve_shard_count(32, 8, true), 8);
        assert_eq!(resolve_shard_count(0, 12, true), 12);
    }

    #[test]
    fn test_stride_rounding_boundary() {
        // 63 is left alone; the stride kicks in at 64
        assert_eq!(round_shard_count(63), 63);
        assert_eq!(round_shard_count(64), 64);
        assert_eq!(round_shard_count(65), 80);
        assert_eq!(round_shard_count(100), 112);
        assert_eq!(round_shard_count(1), 1);
    }

    #[test]
    fn test_resolve_applies_stride() {
        assert_eq!(resolve_shard_count(70, 1, false), 80);
        assert_eq!(resolve_shard_count(0, 96, true), 96);
    }

    #[test]
    fn test_cluster_partition() {
        assert_eq!(cluster_shard_ids(8, 2, 0), vec![0, 1, 2, 3]);
        assert_eq!(cluster_shard_ids(8, 2, 1), vec![4, 5, 6, 7]);
        assert_eq!(cluster_shard_ids(4, 1, 0), vec![0, 1, 2, 3]);
    }
}
