//! Shard protocol state

use serde::{Deserialize, Serialize};

/// Protocol state of a shard session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardState {
    /// No socket
    Disconnected,
    /// Dialed, waiting for the Hello frame
    AwaitHello,
    /// Identify sent on a fresh session
    Identifying,
    /// Waiting for READY after Identify
    AwaitReady,
    /// Resume sent, waiting for RESUMED
    AwaitResumed,
    /// Session established, read loop live
    Running,
    /// Backing off before the next connection attempt
    Reconnecting,
    /// Shard will not reconnect (shutdown or protocol-fatal error)
    Stopped,
}

impl ShardState {
    /// Check whether the session is established
    #[inline]
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Check whether the shard has permanently stopped
    #[inline]
    #[must_use]
    pub fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for ShardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::AwaitHello => "AwaitHello",
            Self::Identifying => "Identifying",
            Self::AwaitReady => "AwaitReady",
            Self::AwaitResumed => "AwaitResumed",
            Self::Running => "Running",
            Self::Reconnecting => "Reconnecting",
            Self::Stopped => "Stopped",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(ShardState::Running.is_running());
        assert!(!ShardState::AwaitReady.is_running());
        assert!(ShardState::Stopped.is_stopped());
        assert!(!ShardState::Reconnecting.is_stopped());
    }
}
