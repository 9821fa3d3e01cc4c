//! Unified error types for the sniper bot.

use thiserror::Error;

/// Unified error type for the sniper bot.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration validation error.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Market-related error.
    #[error("market error: {0}")]
    Market(#[from] MarketError),

    /// Order or redemption execution error.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),

    /// The price feed stopped delivering quotes.
    #[error("price feed closed")]
    FeedClosed,
}

/// Configuration validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is missing or empty.
    #[error("{0} is required")]
    Missing(&'static str),

    /// A value failed to parse or is out of range.
    #[error("{field}: {reason}")]
    Invalid {
        /// Environment variable name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Market metadata and positions lookup errors.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Lookup returned a non-success status other than 404.
    #[error("failed to fetch {resource}: {reason}")]
    FetchFailed {
        /// Slug or URL that failed.
        resource: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to parse a lookup payload.
    #[error("failed to parse market data: {0}")]
    ParseError(String),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Order submission, signing and redemption errors.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Invalid order parameters.
    #[error("invalid order parameters: {0}")]
    InvalidParams(String),

    /// Signing error.
    #[error("signing error: {0}")]
    SigningError(String),

    /// Authentication with the exchange failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Order submission failed in transport or was refused.
    #[error("order submission failed: {0}")]
    SubmissionFailed(String),

    /// Order rejected by the exchange.
    #[error("order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason from the exchange.
        reason: String,
    },

    /// On-chain redemption failed.
    #[error("redemption failed: {0}")]
    RedemptionFailed(String),

    /// RPC provider error.
    #[error("rpc error: {0}")]
    Rpc(String),
}

/// WebSocket connection and message errors.
#[derive(Error, Debug)]
pub enum WsError {
    /// Connection failed.
    #[error("websocket connection failed: {0}")]
    ConnectionFailed(String),

    /// Handshake did not complete in time.
    #[error("websocket handshake timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// Nothing received from the server in time.
    #[error("no inbound frame for {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    /// Send failed.
    #[error("failed to send websocket message: {0}")]
    SendFailed(String),

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BotError>;
