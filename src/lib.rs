//! Epoch-synchronized trigger bot for BTC 5-minute Polymarket markets.
//!
//! Every 300 seconds a new binary market ("Bitcoin Up or Down") opens. The
//! bot follows the live epoch, streams best asks for both outcome tokens,
//! and buys once per epoch when an ask lands on a configured target price
//! inside a short window before close.
//!
//! # Flow
//!
//! ```text
//! Scheduler ─ resolve(epoch) ─▶ MarketResolver
//!     │
//!     ├─ subscribe(tokens) ─▶ PriceFeed ─ PriceQuote ─┐
//!     │                                               ▼
//!     └──────────────── drains quotes ──────▶ TriggerEngine ─ FireDecision ─▶ OrderExecutor
//! ```
//!
//! # Modules
//!
//! - [`epoch`]: Epoch arithmetic and clocks
//! - [`market`]: Market resolution, positions lookup, test doubles
//! - [`feed`]: Self-healing websocket price feed
//! - [`trigger`]: Target matching and the single-fire gate
//! - [`trading`]: Order sizing, gas bids, execution and redemption
//! - [`scheduler`]: Epoch-aligned main loop
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`signing`]: Signer and wallet address helpers
//! - [`api`]: HTTP API for health/status/metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod epoch;
pub mod error;
pub mod feed;
pub mod market;
pub mod metrics;
pub mod scheduler;
pub mod signing;
pub mod trading;
pub mod trigger;
pub mod utils;

pub use config::Config;
pub use error::{BotError, Result};
