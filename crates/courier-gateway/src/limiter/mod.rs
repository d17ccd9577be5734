//! Concurrency primitives
//!
//! The ticket pool bounding concurrent handshakes, the per-key token
//! buckets enforcing the identify ratelimit, and the guarded ordered set
//! used for per-shard READY guild tracking.

mod bucket;
mod guarded_set;
mod ticket;

pub use bucket::BucketStore;
pub use guarded_set::GuardedSet;
pub use ticket::{Ticket, TicketPool};
