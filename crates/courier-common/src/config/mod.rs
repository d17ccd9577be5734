//! Configuration loading

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, BrokerConfig, CacheSettings, ConfigError, Environment,
    GatewaySettings, PipelineSettings, RedisConfig,
};
