//! Market channel wire types and quote normalization.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use time::OffsetDateTime;

/// Latest best ask seen for one outcome token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuote {
    /// Outcome token ID.
    pub token_id: String,
    /// Lowest offered price, 0..1.
    pub best_ask: Decimal,
    /// When the quote was received locally.
    pub received_at: OffsetDateTime,
}

impl PriceQuote {
    /// Create a quote stamped with the current time.
    pub fn now(token_id: impl Into<String>, best_ask: Decimal) -> Self {
        Self {
            token_id: token_id.into(),
            best_ask,
            received_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Client → server subscription message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeMessage {
    /// Always "MARKET".
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Asset IDs to subscribe to.
    pub assets_ids: Vec<String>,
    /// Always "book".
    pub event_type: String,
}

impl SubscribeMessage {
    /// Market channel subscription for `tokens`.
    pub fn market(tokens: &[String]) -> Self {
        Self {
            msg_type: "MARKET".to_string(),
            assets_ids: tokens.to_vec(),
            event_type: "book".to_string(),
        }
    }

    /// Serialize to the text frame payload.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Price change entry within a `price_change` event.
#[derive(Debug, Clone, Deserialize)]
pub struct WsPriceChange {
    /// Asset ID.
    pub asset_id: Option<String>,
    /// Best ask after the change; string or number on the wire.
    pub best_ask: Option<Value>,
}

impl WsPriceChange {
    fn best_ask_decimal(&self) -> Option<Decimal> {
        match self.best_ask.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
            Value::Number(n) => n.to_string().parse().ok(),
            _ => None,
        }
    }
}

/// WebSocket event from the market channel.
#[derive(Debug, Clone, Deserialize)]
pub struct WsEvent {
    /// Event type: "book", "price_change", ...
    pub event_type: Option<String>,
    /// Price changes (for price_change events).
    pub price_changes: Option<Vec<WsPriceChange>>,
}

/// Whether a text frame is a keep-alive token or blank.
pub fn is_keepalive(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed == "PING" || trimmed == "PONG"
}

/// Normalize one text frame into quotes for tokens in `subscribed`.
///
/// Accepts a single event or an array of events. Only `price_change`
/// entries with a parseable best ask for a subscribed token produce a
/// quote; anything else yields nothing.
pub fn parse_price_changes(text: &str, subscribed: &[String]) -> SmallVec<[PriceQuote; 4]> {
    let mut quotes = SmallVec::new();

    if is_keepalive(text) {
        return quotes;
    }

    // Array elements are decoded one by one so a malformed entry only
    // drops itself.
    let events: Vec<WsEvent> = match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        Ok(item) => match serde_json::from_value(item) {
            Ok(event) => vec![event],
            Err(_) => return quotes,
        },
        Err(_) => return quotes,
    };

    let received_at = OffsetDateTime::now_utc();

    for event in events {
        if event.event_type.as_deref() != Some("price_change") {
            continue;
        }
        for change in event.price_changes.iter().flatten() {
            let Some(asset_id) = change.asset_id.as_ref() else {
                continue;
            };
            if !subscribed.iter().any(|t| t == asset_id) {
                continue;
            }
            if let Some(best_ask) = change.best_ask_decimal() {
                quotes.push(PriceQuote {
                    token_id: asset_id.clone(),
                    best_ask,
                    received_at,
                });
            }
        }
    }

    quotes
}
