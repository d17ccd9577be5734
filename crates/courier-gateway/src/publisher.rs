//! Stream event publisher
//!
//! Exactly one task drains the produce queue: encode, publish, and on any
//! transient failure log and skip. The pipeline is never blocked by a
//! broken broker frame.

use std::sync::Arc;

use tokio::sync::mpsc;

use courier_core::StreamEvent;

use crate::broker::Broker;

/// The produce-queue consumer
pub struct Publisher {
    broker: Arc<dyn Broker>,
    subject: String,
}

impl Publisher {
    /// Create a publisher for a broker subject
    pub fn new(broker: Arc<dyn Broker>, subject: impl Into<String>) -> Self {
        Self {
            broker,
            subject: subject.into(),
        }
    }

    /// Drain the produce queue until every sender is gone
    pub async fn run(self, mut produce_rx: mpsc::Receiver<StreamEvent>) {
        tracing::debug!(subject = %self.subject, "Publisher started");

        while let Some(event) = produce_rx.recv().await {
            self.publish(event).await;
        }

        tracing::debug!("Produce queue closed, publisher stopping");
    }

    /// Encode and publish one event; failures log and skip
    pub async fn publish(&self, event: StreamEvent) {
        let payload = match rmp_serde::to_vec_named(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(kind = %event.kind, error = %e, "Failed to encode stream event");
                return;
            }
        };

        if let Err(e) = self.broker.publish(&self.subject, payload).await {
            tracing::warn!(kind = %event.kind, error = %e, "Failed to publish stream event");
        }
    }
}
