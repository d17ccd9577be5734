//! Stream event envelope
//!
//! Every event republished to the broker is wrapped in this envelope and
//! msgpack-encoded. Field names are kept to one character to keep frames
//! small on high-volume subjects.

use serde::{Deserialize, Serialize};

/// Event published to the downstream broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Event kind (e.g. "GUILD_JOIN", "CHANNEL_UPDATE")
    #[serde(rename = "i")]
    pub kind: String,
    /// Event payload
    #[serde(rename = "d")]
    pub data: serde_json::Value,
}

impl StreamEvent {
    /// Create a new stream event
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Create a stream event from a serializable payload
    pub fn from_payload<T: Serialize>(
        kind: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Create a `{before, after}` pair for update events
    pub fn before_after<T: Serialize>(
        kind: impl Into<String>,
        before: &T,
        after: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            kind,
            serde_json::json!({
                "before": serde_json::to_value(before)?,
                "after": serde_json::to_value(after)?,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_event_creation() {
        let event = StreamEvent::new("GUILD_JOIN", serde_json::json!({"id": "1"}));
        assert_eq!(event.kind, "GUILD_JOIN");
        assert_eq!(event.data["id"], "1");
    }

    #[test]
    fn test_short_field_names() {
        let event = StreamEvent::new("SHARD_READY", serde_json::json!({"shard_id": 0}));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"i\":\"SHARD_READY\""));
        assert!(json.contains("\"d\":"));
    }

    #[test]
    fn test_before_after_pair() {
        let before = serde_json::json!({"name": "old"});
        let after = serde_json::json!({"name": "new"});
        let event = StreamEvent::before_after("GUILD_UPDATE", &before, &after).unwrap();
        assert_eq!(event.data["before"]["name"], "old");
        assert_eq!(event.data["after"]["name"], "new");
    }

    #[test]
    fn test_msgpack_roundtrip() {
        let event = StreamEvent::new("CHANNEL_CREATE", serde_json::json!({"id": "7"}));
        let bytes = rmp_serde::to_vec_named(&event).unwrap();
        let decoded: StreamEvent = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
