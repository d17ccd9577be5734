//! REST bootstrap client
//!
//! The producer makes exactly one kind of REST request: `GET /gateway/bot`
//! to discover the gateway URL, recommended shard count and session start
//! limit. 429 responses are retried after the advertised delay; 401 aborts
//! startup.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};

/// API version spoken by the producer
pub const API_VERSION: &str = "8";

const DEFAULT_BASE_URL: &str = "https://discord.com";

/// `GET /gateway/bot` response
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayBot {
    /// Websocket URL to dial
    pub url: String,
    /// Recommended shard count
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

/// Session start limit advertised by the platform
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until the limit resets
    pub reset_after: u64,
    /// How many shards may identify concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

fn default_max_concurrency() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct TooManyRequests {
    /// Milliseconds to wait before retrying
    retry_after: u64,
}

/// Minimal authenticated REST client
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestClient {
    /// Create a client for a bot token
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL (used by tests)
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut token = token.into();
        if !token.starts_with("Bot ") {
            token = format!("Bot {token}");
        }

        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v{}{}", self.base_url, API_VERSION, path)
    }

    /// Fetch the gateway URL and session limits
    pub async fn gateway_bot(&self) -> GatewayResult<GatewayBot> {
        loop {
            let response = self
                .http
                .get(self.url("/gateway/bot"))
                .header("Authorization", &self.token)
                .send()
                .await?;

            match response.status().as_u16() {
                401 => return Err(GatewayError::InvalidToken),
                429 => {
                    let limited: TooManyRequests = response.json().await?;
                    tracing::warn!(
                        retry_after_ms = limited.retry_after,
                        "Gateway bootstrap request was ratelimited"
                    );
                    tokio::time::sleep(Duration::from_millis(limited.retry_after)).await;
                    continue;
                }
                _ => {
                    let response = response.error_for_status()?;
                    return Ok(response.json().await?);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_gets_bot_prefix() {
        let client = RestClient::new("abc123");
        assert_eq!(client.token, "Bot abc123");

        let already = RestClient::new("Bot abc123");
        assert_eq!(already.token, "Bot abc123");
    }

    #[test]
    fn test_url_construction() {
        let client = RestClient::new("t");
        assert_eq!(
            client.url("/gateway/bot"),
            "https://discord.com/api/v8/gateway/bot"
        );
    }

    #[test]
    fn test_gateway_bot_parse() {
        let body = serde_json::json!({
            "url": "wss://gateway.example",
            "shards": 9,
            "session_start_limit": {
                "total": 1000,
                "remaining": 991,
                "reset_after": 14400000,
                "max_concurrency": 3
            }
        });
        let gb: GatewayBot = serde_json::from_value(body).unwrap();
        assert_eq!(gb.shards, 9);
        assert_eq!(gb.session_start_limit.remaining, 991);
        assert_eq!(gb.session_start_limit.max_concurrency, 3);
    }

    #[test]
    fn test_max_concurrency_defaults_to_one() {
        let body = serde_json::json!({
            "url": "wss://gateway.example",
            "shards": 1,
            "session_start_limit": {
                "total": 1000,
                "remaining": 1000,
                "reset_after": 0
            }
        });
        let gb: GatewayBot = serde_json::from_value(body).unwrap();
        assert_eq!(gb.session_start_limit.max_concurrency, 1);
    }
}
