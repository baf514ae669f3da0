//! Configuration management for the Shelfwise analytics engine
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with SHELFWISE__ prefix
//!    (e.g. `SHELFWISE__ANALYTICS__DEAD_STOCK_LOOKBACK_DAYS=60`)

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::{DeadStockPolicy, ReorderPolicy};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    #[validate]
    pub server: ServerConfig,

    /// Commerce platform connection and fetch discipline
    #[validate]
    pub commerce: CommerceConfig,

    /// Numeric knobs of the analytics passes
    #[validate]
    pub analytics: AnalyticsConfig,

    #[validate]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

/// Which generation of the commerce API to talk to
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiGeneration {
    /// REST Admin API, paginated through the `Link` header
    Rest,
    /// GraphQL Admin API, paginated through `pageInfo` cursors
    #[serde(rename = "graphql")]
    GraphQl,
}

impl ApiGeneration {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiGeneration::Rest => "rest",
            ApiGeneration::GraphQl => "graphql",
        }
    }
}

/// Which orders count as sales
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusFilter {
    Any,
    Paid,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct CommerceConfig {
    pub generation: ApiGeneration,

    /// Store domain (e.g. mystore.myshopify.com)
    pub shop_domain: String,

    /// Admin API access token
    pub access_token: String,

    /// API version (e.g. 2024-01)
    pub api_version: String,

    pub order_status: OrderStatusFilter,

    #[validate(range(min = 1, max = 40))]
    pub rate_limit_calls_per_second: u32,

    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    pub max_retries: u32,

    #[validate(range(min = 1))]
    pub rate_limit_backoff_secs: u64,

    #[validate(range(min = 1))]
    pub timeout_backoff_secs: u64,

    #[validate(range(min = 1))]
    pub max_pages: u32,

    #[validate(range(min = 1, max = 50))]
    pub inventory_chunk_size: usize,
}

impl CommerceConfig {
    pub fn min_call_spacing(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.rate_limit_calls_per_second.max(1)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AnalyticsConfig {
    #[validate(range(min = 1))]
    pub dead_stock_lookback_days: u32,

    #[validate(range(min = 1))]
    pub rop_lead_days: u32,

    #[validate(range(min = 1))]
    pub rop_safety_days: u32,

    #[validate(range(min = 1))]
    pub review_window_days: u32,

    #[validate(range(min = 1))]
    pub sales_window_days: u32,

    /// Net inbound stock out of suggested reorder quantities
    pub net_incoming: bool,

    /// Count stock at inactive locations by default
    pub include_inactive_locations: bool,

    pub dead_stock_policy: DeadStockPolicy,
}

impl AnalyticsConfig {
    pub fn reorder_policy(&self) -> ReorderPolicy {
        ReorderPolicy {
            sales_window_days: self.sales_window_days,
            lead_days: self.rop_lead_days,
            safety_days: self.rop_safety_days,
            review_days: self.review_window_days,
            net_incoming: self.net_incoming,
        }
    }

    /// Days of order history a report run needs beyond its own range
    pub fn lookback_days(&self, dead_stock: bool) -> u32 {
        if dead_stock {
            self.sales_window_days.max(self.dead_stock_lookback_days)
        } else {
            self.sales_window_days
        }
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct CacheConfig {
    pub enabled: bool,

    #[validate(range(min = 1))]
    pub max_entries: usize,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> AppResult<Self> {
        let environment =
            std::env::var("SHELFWISE_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = with_defaults(config::Config::builder(), &environment)
            .and_then(|builder| {
                builder
                    // Load environment-specific config file
                    .add_source(File::with_name(&format!("config/{}", environment)).required(false))
                    // Override with environment variables (SHELFWISE__ prefix)
                    .add_source(
                        Environment::with_prefix("SHELFWISE")
                            .prefix_separator("__")
                            .separator("__")
                            .try_parsing(true),
                    )
                    .build()
            })
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        Self::finish(config)
    }

    /// Code defaults only, no files or environment
    pub fn defaults() -> AppResult<Self> {
        let config = with_defaults(config::Config::builder(), "test")
            .and_then(|builder| builder.build())
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        Self::finish(config)
    }

    fn finish(config: config::Config) -> AppResult<Self> {
        let config: Config = config
            .try_deserialize()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        config
            .validate()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        Ok(config)
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    environment: &str,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    builder
        .set_default("environment", environment)?
        .set_default("server.port", 3000)?
        .set_default("server.host", "0.0.0.0")?
        .set_default("commerce.generation", "rest")?
        .set_default("commerce.shop_domain", "")?
        .set_default("commerce.access_token", "")?
        .set_default("commerce.api_version", "2024-01")?
        .set_default("commerce.order_status", "any")?
        .set_default("commerce.rate_limit_calls_per_second", 5)?
        .set_default("commerce.request_timeout_secs", 15)?
        .set_default("commerce.max_retries", 2)?
        .set_default("commerce.rate_limit_backoff_secs", 2)?
        .set_default("commerce.timeout_backoff_secs", 1)?
        .set_default("commerce.max_pages", 100)?
        .set_default("commerce.inventory_chunk_size", 50)?
        .set_default("analytics.dead_stock_lookback_days", 90)?
        .set_default("analytics.rop_lead_days", 7)?
        .set_default("analytics.rop_safety_days", 3)?
        .set_default("analytics.review_window_days", 14)?
        .set_default("analytics.sales_window_days", 30)?
        .set_default("analytics.net_incoming", true)?
        .set_default("analytics.include_inactive_locations", false)?
        .set_default("analytics.dead_stock_policy", "fine_grained_only")?
        .set_default("cache.enabled", true)?
        .set_default("cache.max_entries", 15)
}
