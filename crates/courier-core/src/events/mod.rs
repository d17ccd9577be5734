//! Stream events published to consumers

mod stream_event;

pub use stream_event::StreamEvent;
