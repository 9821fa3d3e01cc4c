//! Market module for BTC 5-minute prediction markets.
//!
//! This module handles:
//! - Market types and Gamma wire types
//! - Epoch → market resolution
//! - Redeemable position lookup
//! - In-memory doubles for testing

pub mod mock;
pub mod positions;
pub mod resolver;
pub mod types;

pub use mock::{mock_market, MockExecutionService, MockFeed, MockResolver};
pub use positions::{PositionsClient, RedeemablePosition};
pub use resolver::{GammaResolver, MarketResolver};
pub use types::{GammaMarket, MarketInfo, Outcome};
