//! Event pipeline
//!
//! The single consumer of the event queue. Each raw event is routed to its
//! marshaler, which updates the cache projection and decides what, if
//! anything, is republished downstream.

mod consumer;
mod context;
pub mod marshalers;
mod registry;

pub use consumer::Pipeline;
pub use context::MarshalContext;
pub use registry::{MarshalFuture, Marshaler, MarshalerRegistry};
