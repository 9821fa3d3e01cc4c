//! Application configuration loaded from environment variables.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::epoch::EPOCH_SECONDS;
use crate::error::ConfigError;
use crate::signing;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Polymarket Credentials ===
    /// Wallet private key (hex, 0x prefix optional).
    #[serde(default)]
    pub polymarket_private_key: String,

    // === Wallet Configuration ===
    /// Signature type: 0=EOA, 1=Magic.link proxy, 2=Gnosis Safe.
    #[serde(default)]
    pub polymarket_signature_type: u8,

    /// Funder (proxy or Safe) address for non-EOA signature types.
    #[serde(default)]
    pub polymarket_funder: Option<String>,

    // === Trading Parameters ===
    /// Notional spent per fired order, in USD.
    #[serde(default = "default_trade_size")]
    pub trade_size_usd: Decimal,

    /// Ordered target prices; first match wins.
    #[serde(
        default = "default_target_prices",
        deserialize_with = "deserialize_price_list"
    )]
    pub target_prices: Vec<Decimal>,

    /// Entry window: firing allowed at or below this many seconds before close.
    #[serde(default = "default_entry_seconds")]
    pub entry_seconds_before_expiry: i64,

    /// Safety floor: no firing below this many seconds before close.
    #[serde(default = "default_min_seconds")]
    pub min_seconds_before_expiry: i64,

    /// Fee rate carried on buy orders, in basis points.
    #[serde(default = "default_fee_rate_bps")]
    pub fee_rate_bps: u32,

    // === Operation Modes ===
    /// Simulation mode (no real orders).
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// Seconds between evaluations inside the entry window.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    // === Gas ===
    /// Priority fee in gwei.
    #[serde(default = "default_gas_tip")]
    pub gas_tip_gwei: u64,

    /// Explicit max fee in gwei; computed from the chain base fee when unset.
    #[serde(default)]
    pub gas_max_fee_gwei: Option<u64>,

    /// Polygon JSON-RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub polygon_rpc_url: String,

    // === Market Discovery ===
    /// Slug prefix; the market slug is `{prefix}-{epoch}`.
    #[serde(default = "default_slug_prefix")]
    pub market_slug_prefix: String,

    /// Gamma metadata API base URL.
    #[serde(default = "default_gamma_url")]
    pub gamma_api_url: String,

    /// Data API base URL (positions).
    #[serde(default = "default_data_url")]
    pub data_api_url: String,

    // === WebSocket Configuration ===
    /// WebSocket market channel URL.
    #[serde(default = "default_ws_url")]
    pub polymarket_ws_url: String,

    /// Fixed delay before reconnecting a dropped feed, in milliseconds.
    #[serde(default = "default_reconnect_delay")]
    pub ws_reconnect_delay_ms: u64,

    /// Keep-alive ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ws_ping_interval_s: u64,

    /// Websocket connect and handshake timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub ws_connect_timeout_s: u64,

    /// CLOB API base URL.
    #[serde(default = "default_clob_url")]
    pub polymarket_clob_url: String,

    // === Server Configuration ===
    /// HTTP server port for health/metrics endpoints.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_trade_size() -> Decimal {
    Decimal::ONE
}

fn default_target_prices() -> Vec<Decimal> {
    vec![Decimal::new(7, 2)] // 0.07
}

fn default_entry_seconds() -> i64 {
    60
}

fn default_min_seconds() -> i64 {
    5
}

fn default_fee_rate_bps() -> u32 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    2
}

fn default_gas_tip() -> u64 {
    30
}

fn default_rpc_url() -> String {
    "https://polygon-rpc.com".to_string()
}

fn default_slug_prefix() -> String {
    "btc-updown-5m".to_string()
}

fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_data_url() -> String {
    "https://data-api.polymarket.com".to_string()
}

fn default_ws_url() -> String {
    "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string()
}

fn default_reconnect_delay() -> u64 {
    2000
}

fn default_ping_interval() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_clob_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Parse a comma-separated, ordered list of prices.
pub fn parse_price_list(raw: &str) -> Result<Vec<Decimal>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Decimal>()
                .map_err(|e| format!("invalid price {:?}: {}", s, e))
        })
        .collect()
}

fn deserialize_price_list<'de, D>(deserializer: D) -> Result<Vec<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_price_list(&raw).map_err(serde::de::Error::custom)
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Build from explicit `KEY=value` pairs; unset keys take their defaults.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polymarket_private_key.is_empty() {
            return Err(ConfigError::Missing("POLYMARKET_PRIVATE_KEY"));
        }

        signing::create_signer(&self.polymarket_private_key)
            .map_err(|e| ConfigError::invalid("POLYMARKET_PRIVATE_KEY", e.to_string()))?;

        if self.polymarket_signature_type > 2 {
            return Err(ConfigError::invalid(
                "POLYMARKET_SIGNATURE_TYPE",
                "must be 0, 1 or 2",
            ));
        }

        if self.polymarket_signature_type != 0 && self.polymarket_funder.is_none() {
            return Err(ConfigError::Missing("POLYMARKET_FUNDER"));
        }

        if self.trade_size_usd <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "TRADE_SIZE_USD",
                "must be greater than 0",
            ));
        }

        if self.target_prices.is_empty() {
            return Err(ConfigError::Missing("TARGET_PRICES"));
        }

        if let Some(bad) = self
            .target_prices
            .iter()
            .find(|p| **p <= Decimal::ZERO || **p >= Decimal::ONE)
        {
            return Err(ConfigError::invalid(
                "TARGET_PRICES",
                format!("{} is outside (0, 1)", bad),
            ));
        }

        if self.entry_seconds_before_expiry <= 0 || self.entry_seconds_before_expiry >= EPOCH_SECONDS {
            return Err(ConfigError::invalid(
                "ENTRY_SECONDS_BEFORE_EXPIRY",
                format!("must be within 1..{}", EPOCH_SECONDS),
            ));
        }

        if self.min_seconds_before_expiry < 0
            || self.min_seconds_before_expiry > self.entry_seconds_before_expiry
        {
            return Err(ConfigError::invalid(
                "MIN_SECONDS_BEFORE_EXPIRY",
                "must be between 0 and ENTRY_SECONDS_BEFORE_EXPIRY",
            ));
        }

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::invalid("POLL_INTERVAL_SECS", "must be positive"));
        }

        for (field, value) in [
            ("POLYMARKET_WS_URL", &self.polymarket_ws_url),
            ("POLYMARKET_CLOB_URL", &self.polymarket_clob_url),
            ("GAMMA_API_URL", &self.gamma_api_url),
            ("DATA_API_URL", &self.data_api_url),
            ("POLYGON_RPC_URL", &self.polygon_rpc_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
        }

        Ok(())
    }

    /// Effective max-fee override; zero means "compute from chain".
    pub fn gas_max_fee_override(&self) -> Option<u64> {
        self.gas_max_fee_gwei.filter(|gwei| *gwei > 0)
    }

    /// Fixed feed reconnect delay.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.ws_reconnect_delay_ms)
    }

    /// Interval between evaluations inside the entry window.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Target prices formatted as cents for logging (e.g. "7¢, 93¢").
    pub fn target_prices_display(&self) -> String {
        self.target_prices
            .iter()
            .map(|p| format!("{}¢", (p * Decimal::ONE_HUNDRED).normalize()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
