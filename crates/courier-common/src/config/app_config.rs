//! Application configuration structs
//!
//! Loads configuration from environment variables.

use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewaySettings,
    pub redis: RedisConfig,
    pub broker: BrokerConfig,
    pub cache: CacheSettings,
    pub pipeline: PipelineSettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Gateway session settings
///
/// Everything that shapes how sessions identify and how the manager scales.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Override the configured shard count with the server recommendation
    #[serde(default)]
    pub autoshard: bool,
    /// Explicit shard count (0 means auto)
    #[serde(default)]
    pub shard_count: u32,
    /// Number of clusters the shard set is partitioned across
    #[serde(default = "default_cluster_count")]
    pub cluster_count: u32,
    /// Which cluster this process runs
    #[serde(default)]
    pub cluster_id: u32,
    /// Heartbeat intervals without an ack before forcing a reconnect
    #[serde(default = "default_max_heartbeat_failures")]
    pub max_heartbeat_failures: u32,
    /// Global cap on sessions performing a handshake concurrently
    #[serde(default = "default_max_concurrent_identifies")]
    pub max_concurrent_identifies: usize,
    /// Member threshold passed in Identify
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
    /// Request zlib-compressed frames
    #[serde(default = "default_compress")]
    pub compress: bool,
    #[serde(default)]
    pub guild_subscriptions: bool,
    #[serde(default)]
    pub intents: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            autoshard: false,
            shard_count: 0,
            cluster_count: default_cluster_count(),
            cluster_id: 0,
            max_heartbeat_failures: default_max_heartbeat_failures(),
            max_concurrent_identifies: default_max_concurrent_identifies(),
            large_threshold: default_large_threshold(),
            compress: default_compress(),
            guild_subscriptions: false,
            intents: 0,
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Broker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Subject every stream event is published on
    #[serde(default = "default_broker_subject")]
    pub subject: String,
}

/// Cache projection settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Prefix for every cache key
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Persist member entities
    #[serde(default = "default_true")]
    pub cache_members: bool,
    /// Maintain the mutual-guild set per user
    #[serde(default = "default_true")]
    pub store_mutuals: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            cache_members: true,
            store_mutuals: true,
        }
    }
}

/// Event pipeline settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineSettings {
    /// Event kinds dropped before they reach a marshaler
    #[serde(default)]
    pub ignored_events: Vec<String>,
    /// Event kinds cached but never republished
    #[serde(default)]
    pub producer_blacklist: Vec<String>,
}

// Default value functions
fn default_app_name() -> String {
    "courier".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_cluster_count() -> u32 {
    1
}

fn default_max_heartbeat_failures() -> u32 {
    5
}

fn default_max_concurrent_identifies() -> usize {
    1
}

fn default_large_threshold() -> u32 {
    250
}

fn default_compress() -> bool {
    true
}

fn default_redis_max_connections() -> u32 {
    16
}

fn default_broker_subject() -> String {
    "courier".to_string()
}

fn default_namespace() -> String {
    "courier".to_string()
}

fn default_true() -> bool {
    true
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .ok()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: GatewaySettings {
                autoshard: env_parsed("GATEWAY_AUTOSHARD").unwrap_or(false),
                shard_count: env_parsed("GATEWAY_SHARD_COUNT").unwrap_or(0),
                cluster_count: env_parsed("GATEWAY_CLUSTER_COUNT")
                    .unwrap_or_else(default_cluster_count),
                cluster_id: env_parsed("GATEWAY_CLUSTER_ID").unwrap_or(0),
                max_heartbeat_failures: env_parsed("GATEWAY_MAX_HEARTBEAT_FAILURES")
                    .unwrap_or_else(default_max_heartbeat_failures),
                max_concurrent_identifies: env_parsed("GATEWAY_MAX_CONCURRENT_IDENTIFIES")
                    .unwrap_or_else(default_max_concurrent_identifies),
                large_threshold: env_parsed("GATEWAY_LARGE_THRESHOLD")
                    .unwrap_or_else(default_large_threshold),
                compress: env_parsed("GATEWAY_COMPRESS").unwrap_or_else(default_compress),
                guild_subscriptions: env_parsed("GATEWAY_GUILD_SUBSCRIPTIONS").unwrap_or(false),
                intents: env_parsed("GATEWAY_INTENTS").unwrap_or(0),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL"))?,
                max_connections: env_parsed("REDIS_MAX_CONNECTIONS")
                    .unwrap_or_else(default_redis_max_connections),
            },
            broker: BrokerConfig {
                subject: env::var("BROKER_SUBJECT").unwrap_or_else(|_| default_broker_subject()),
            },
            cache: CacheSettings {
                namespace: env::var("CACHE_NAMESPACE").unwrap_or_else(|_| default_namespace()),
                cache_members: env_parsed("CACHE_MEMBERS").unwrap_or(true),
                store_mutuals: env_parsed("CACHE_STORE_MUTUALS").unwrap_or(true),
            },
            pipeline: PipelineSettings {
                ignored_events: env_list("PIPELINE_IGNORED_EVENTS"),
                producer_blacklist: env_list("PIPELINE_PRODUCER_BLACKLIST"),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_app_name(), "courier");
        assert_eq!(default_namespace(), "courier");
        assert_eq!(default_max_heartbeat_failures(), 5);
        assert_eq!(default_large_threshold(), 250);
        assert!(default_compress());
    }

    #[test]
    fn test_gateway_settings_default() {
        let settings = GatewaySettings::default();
        assert!(!settings.autoshard);
        assert_eq!(settings.shard_count, 0);
        assert_eq!(settings.cluster_count, 1);
        assert_eq!(settings.max_concurrent_identifies, 1);
    }

    #[test]
    fn test_env_list_parsing() {
        env::set_var("TEST_EVENT_LIST", "PRESENCE_UPDATE, TYPING_START,,");
        let list = env_list("TEST_EVENT_LIST");
        assert_eq!(list, vec!["PRESENCE_UPDATE", "TYPING_START"]);
        env::remove_var("TEST_EVENT_LIST");
    }
}
