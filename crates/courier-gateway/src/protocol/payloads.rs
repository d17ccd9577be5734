//! Protocol payload structures
//!
//! Data carried inside the `d` field of control frames.

use serde::{Deserialize, Serialize};

/// Hello payload (op=10)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Interval between heartbeats, in milliseconds
    pub heartbeat_interval: u64,
}

/// Identify payload (op=2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: IdentifyProperties,
    pub compress: bool,
    pub large_threshold: u32,
    /// `[shard_id, shard_count]`, present whenever the bot is sharded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<StatusUpdate>,
    pub guild_subscriptions: bool,
    pub intents: u64,
}

/// Connection properties sent in Identify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    #[serde(rename = "$os")]
    pub os: String,
    #[serde(rename = "$browser")]
    pub browser: String,
    #[serde(rename = "$device")]
    pub device: String,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "courier".to_string(),
            device: "courier".to_string(),
        }
    }
}

/// Resume payload (op=6)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

/// Request Guild Members payload (op=8)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: String,
    pub query: String,
    pub limit: u32,
}

/// Status update payload (op=3, also embedded in Identify)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<Activity>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub afk: bool,
}

impl Default for StatusUpdate {
    fn default() -> Self {
        Self {
            since: None,
            game: None,
            status: default_status(),
            afk: false,
        }
    }
}

impl StatusUpdate {
    /// An online status with an activity name
    #[must_use]
    pub fn playing(name: impl Into<String>) -> Self {
        Self {
            game: Some(Activity {
                name: name.into(),
                ..Activity::default()
            }),
            ..Self::default()
        }
    }
}

/// Activity shown on the bot's presence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_status() -> String {
    "online".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_properties_use_dollar_keys() {
        let props = IdentifyProperties::default();
        let json = serde_json::to_value(&props).unwrap();
        assert!(json.get("$os").is_some());
        assert!(json.get("$browser").is_some());
        assert!(json.get("$device").is_some());
    }

    #[test]
    fn test_identify_shard_field_omitted_when_unsharded() {
        let identify = IdentifyPayload {
            token: "Bot x".to_string(),
            properties: IdentifyProperties::default(),
            compress: true,
            large_threshold: 250,
            shard: None,
            presence: None,
            guild_subscriptions: false,
            intents: 0,
        };
        let json = serde_json::to_value(&identify).unwrap();
        assert!(json.get("shard").is_none());

        let sharded = IdentifyPayload {
            shard: Some([3, 16]),
            ..identify
        };
        let json = serde_json::to_value(&sharded).unwrap();
        assert_eq!(json["shard"][0], 3);
        assert_eq!(json["shard"][1], 16);
    }

    #[test]
    fn test_hello_payload_parse() {
        let hello: HelloPayload =
            serde_json::from_str(r#"{"heartbeat_interval": 41250}"#).unwrap();
        assert_eq!(hello.heartbeat_interval, 41250);
    }

    #[test]
    fn test_status_update_playing() {
        let status = StatusUpdate::playing("with events");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["game"]["name"], "with events");
        assert_eq!(json["status"], "online");
    }
}
