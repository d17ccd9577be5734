//! Gateway message format
//!
//! Defines the structure for all WebSocket frames exchanged with the
//! gateway and the constructors for the frames the producer sends.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    HelloPayload, IdentifyPayload, OpCode, RequestGuildMembersPayload, ResumePayload, StatusUpdate,
};

/// Gateway message format
///
/// All frames sent over the WebSocket connection follow this format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event type (only for op=0 Dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event data payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl GatewayMessage {
    fn control(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op,
            t: None,
            s: None,
            d,
        }
    }

    // === Frames the producer sends ===

    /// Create a Heartbeat frame (op=1) carrying the last observed sequence
    #[must_use]
    pub fn heartbeat(sequence: u64) -> Self {
        Self::control(OpCode::Heartbeat, Some(Value::Number(sequence.into())))
    }

    /// Create an Identify frame (op=2)
    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Ok(Self::control(
            OpCode::Identify,
            Some(serde_json::to_value(payload)?),
        ))
    }

    /// Create a Resume frame (op=6)
    pub fn resume(payload: &ResumePayload) -> Result<Self, serde_json::Error> {
        Ok(Self::control(
            OpCode::Resume,
            Some(serde_json::to_value(payload)?),
        ))
    }

    /// Create a Presence Update frame (op=3)
    pub fn presence_update(status: &StatusUpdate) -> Result<Self, serde_json::Error> {
        Ok(Self::control(
            OpCode::PresenceUpdate,
            Some(serde_json::to_value(status)?),
        ))
    }

    /// Create a Request Guild Members frame (op=8)
    pub fn request_guild_members(
        payload: &RequestGuildMembersPayload,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::control(
            OpCode::RequestGuildMembers,
            Some(serde_json::to_value(payload)?),
        ))
    }

    // === Parsing frames the gateway sends ===

    /// Check if this is a dispatch frame (op=0)
    #[must_use]
    pub fn is_dispatch(&self) -> bool {
        self.op == OpCode::Dispatch
    }

    /// Try to parse as a Hello payload (op=10)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        self.d
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Parse the resumable flag of an Invalid Session frame (op=9)
    pub fn as_invalid_session(&self) -> Option<bool> {
        if self.op != OpCode::InvalidSession {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_json(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
