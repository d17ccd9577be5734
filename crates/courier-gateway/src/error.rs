//! Gateway error types

use crate::protocol::CloseCode;

/// Error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Websocket already opened")]
    AlreadyOpen,

    #[error("No websocket connection exists")]
    NotConnected,

    #[error("Shard id {shard_id} must be less than shard count {shard_count}")]
    ShardBounds { shard_id: u32, shard_count: u32 },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Gateway closed the connection: {0}")]
    Closed(CloseCode),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Not enough sessions remaining: need {needed}, have {remaining}")]
    NotEnoughSessions { needed: u32, remaining: u32 },

    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Decompress error: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("Payload decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("REST request error: {0}")]
    Rest(#[from] reqwest::Error),

    #[error("Event queue closed")]
    QueueClosed,
}

impl GatewayError {
    /// Protocol-fatal errors stop the shard instead of triggering a
    /// reconnect
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Closed(code) => !code.should_reconnect(),
            Self::InvalidToken | Self::ShardBounds { .. } | Self::NotEnoughSessions { .. } => true,
            _ => false,
        }
    }

    /// Create a protocol error
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
