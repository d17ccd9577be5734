//! Downstream broker
//!
//! The producer only needs `publish(subject, bytes)` with at-least-once
//! delivery. Production publishes over Redis pub/sub; tests record frames
//! in memory.

use async_trait::async_trait;
use redis::AsyncCommands;

use courier_cache::RedisStore;

/// Broker error type
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Publish failed: {0}")]
    Publish(String),
}

/// Abstract downstream broker
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish an encoded stream event on a subject
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BrokerError>;
}

/// Broker over Redis pub/sub
pub struct RedisBroker {
    store: RedisStore,
}

impl RedisBroker {
    /// Create a broker sharing the cache's connection pool
    #[must_use]
    pub fn new(store: RedisStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut conn = self
            .store
            .conn()
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        let receivers: u32 = conn
            .publish(subject, payload)
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        tracing::trace!(subject = %subject, receivers = receivers, "Published stream event");

        Ok(())
    }
}

/// Broker that records published frames; used by the test suites
#[derive(Debug, Default)]
pub struct RecordingBroker {
    frames: std::sync::Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingBroker {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything published so far
    #[must_use]
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.frames.lock().unwrap().clone()
    }

    /// Number of published frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    /// Check whether nothing was published
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        self.frames
            .lock()
            .unwrap()
            .push((subject.to_string(), payload));
        Ok(())
    }
}
