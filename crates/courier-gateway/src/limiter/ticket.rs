//! Ticket pool
//!
//! A fixed-capacity pool with blocking acquire and non-blocking release.
//! Bounds how many shards may hold a handshake slot at once.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default pool capacity
pub const DEFAULT_TICKETS: usize = 100;

/// A held ticket; dropping it releases the slot
pub struct Ticket {
    _permit: OwnedSemaphorePermit,
}

/// Fixed-capacity ticket pool
#[derive(Clone)]
pub struct TicketPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl TicketPool {
    /// Create a pool with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Acquire a ticket, waiting until one is free
    pub async fn acquire(&self) -> Ticket {
        // The semaphore is never closed, so acquire cannot fail
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("ticket pool semaphore closed"));
        Ticket { _permit: permit }
    }

    /// Try to acquire a ticket without waiting
    #[must_use]
    pub fn try_acquire(&self) -> Option<Ticket> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| Ticket { _permit: permit })
    }

    /// Tickets currently free
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Total capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TicketPool {
    fn default() -> Self {
        Self::new(DEFAULT_TICKETS)
    }
}

impl std::fmt::Debug for TicketPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}
