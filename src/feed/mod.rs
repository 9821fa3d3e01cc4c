//! Real-time best-ask feed from the CLOB market channel.

pub mod types;
pub mod websocket;

pub use types::{parse_price_changes, PriceQuote, SubscribeMessage};
pub use websocket::{ConnectionState, FeedControl, FeedHandle, PriceFeed, ReconnectConfig};
