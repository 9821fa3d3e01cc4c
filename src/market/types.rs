//! Market-related types for BTC 5-minute prediction markets.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::epoch::Epoch;

/// Market outcome for BTC 5min binary markets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// BTC goes up (affirmative, first token).
    #[strum(to_string = "UP", serialize = "up", serialize = "yes", serialize = "YES")]
    #[default]
    Up,
    /// BTC goes down (negative, second token).
    #[strum(to_string = "DOWN", serialize = "down", serialize = "no", serialize = "NO")]
    Down,
}

impl Outcome {
    /// Index set used when redeeming this outcome (1 for Up, 2 for Down).
    pub fn index_set(&self) -> u8 {
        match self {
            Outcome::Up => 1,
            Outcome::Down => 2,
        }
    }
}

/// Resolved market for one epoch. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketInfo {
    /// Condition identifier (0x-prefixed bytes32).
    pub condition_id: String,
    /// Human-readable market question.
    pub title: String,
    /// Affirmative (UP) token ID; the first token returned by the metadata service.
    pub up_token_id: String,
    /// Negative (DOWN) token ID; the second token returned by the metadata service.
    pub down_token_id: String,
    /// Epoch the market belongs to.
    pub epoch: Epoch,
    /// Whether the market reports itself closed.
    pub closed: bool,
}

impl MarketInfo {
    /// Get the token ID for a given outcome.
    pub fn token_id(&self, outcome: Outcome) -> &str {
        match outcome {
            Outcome::Up => &self.up_token_id,
            Outcome::Down => &self.down_token_id,
        }
    }

    /// Which outcome a token belongs to, if it belongs to this market.
    pub fn outcome_of(&self, token_id: &str) -> Option<Outcome> {
        if token_id == self.up_token_id {
            Some(Outcome::Up)
        } else if token_id == self.down_token_id {
            Some(Outcome::Down)
        } else {
            None
        }
    }

    /// Both token IDs in metadata order.
    pub fn token_ids(&self) -> Vec<String> {
        vec![self.up_token_id.clone(), self.down_token_id.clone()]
    }

    /// Unix timestamp when the market resolves.
    pub fn end_timestamp(&self) -> i64 {
        self.epoch.end()
    }
}

/// Market record from the Gamma API `markets/slug/{slug}` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GammaMarket {
    /// Gamma market ID.
    pub id: Option<String>,
    /// Condition ID.
    #[serde(rename = "conditionId")]
    pub condition_id: Option<String>,
    /// Market question.
    pub question: Option<String>,
    /// Market slug.
    pub slug: Option<String>,
    /// End date (ISO format).
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    /// Whether market is closed.
    pub closed: Option<bool>,
    /// CLOB token IDs, either a JSON array or a JSON-encoded string of one.
    #[serde(rename = "clobTokenIds", default, deserialize_with = "deserialize_token_ids")]
    pub clob_token_ids: Vec<String>,
}

impl GammaMarket {
    /// Convert to [`MarketInfo`]. `None` when fewer than two tokens are listed.
    pub fn into_market_info(self, epoch: Epoch) -> Option<MarketInfo> {
        let mut tokens = self.clob_token_ids.into_iter();
        let up_token_id = tokens.next()?;
        let down_token_id = tokens.next()?;

        Some(MarketInfo {
            condition_id: self.condition_id.or(self.id).unwrap_or_default(),
            title: self.question.unwrap_or_default(),
            up_token_id,
            down_token_id,
            epoch,
            closed: self.closed.unwrap_or(false),
        })
    }
}

fn deserialize_token_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(token_ids_from_value).unwrap_or_default())
}

fn token_ids_from_value(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(encoded) => serde_json::from_str::<Vec<String>>(&encoded).unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn market() -> MarketInfo {
        MarketInfo {
            condition_id: "0xabc".to_string(),
            title: "Bitcoin Up or Down".to_string(),
            up_token_id: "up-token".to_string(),
            down_token_id: "down-token".to_string(),
            epoch: Epoch::containing(1_700_000_100),
            closed: false,
        }
    }

    #[test]
    fn outcome_from_string_works() {
        use std::str::FromStr;
        assert_eq!(Outcome::from_str("up").unwrap(), Outcome::Up);
        assert_eq!(Outcome::from_str("no").unwrap(), Outcome::Down);
        assert_eq!(Outcome::Up.to_string(), "UP");
    }

    #[test]
    fn market_token_lookup_works() {
        let market = market();
        assert_eq!(market.token_id(Outcome::Up), "up-token");
        assert_eq!(market.outcome_of("down-token"), Some(Outcome::Down));
        assert_eq!(market.outcome_of("other"), None);
        assert_eq!(market.end_timestamp(), 1_700_000_400);
    }

    #[test]
    fn gamma_market_accepts_encoded_token_list() {
        let raw = r#"{
            "id": "12345",
            "conditionId": "0xcond",
            "question": "Bitcoin Up or Down - 5m",
            "closed": false,
            "clobTokenIds": "[\"111\", \"222\"]"
        }"#;
        let gamma: GammaMarket = serde_json::from_str(raw).unwrap();
        let info = gamma.into_market_info(Epoch::containing(300)).unwrap();

        assert_eq!(info.condition_id, "0xcond");
        assert_eq!(info.up_token_id, "111");
        assert_eq!(info.down_token_id, "222");
    }

    #[test]
    fn gamma_market_accepts_plain_token_array_and_falls_back_to_id() {
        let raw = r#"{"id": "12345", "clobTokenIds": ["111", "222"], "closed": true}"#;
        let gamma: GammaMarket = serde_json::from_str(raw).unwrap();
        let info = gamma.into_market_info(Epoch::containing(300)).unwrap();

        assert_eq!(info.condition_id, "12345");
        assert!(info.closed);
    }

    #[test]
    fn gamma_market_with_one_token_is_absent() {
        let raw = r#"{"conditionId": "0xcond", "clobTokenIds": ["111"]}"#;
        let gamma: GammaMarket = serde_json::from_str(raw).unwrap();
        assert!(gamma.into_market_info(Epoch::containing(300)).is_none());

        let raw = r#"{"conditionId": "0xcond"}"#;
        let gamma: GammaMarket = serde_json::from_str(raw).unwrap();
        assert!(gamma.into_market_info(Epoch::containing(300)).is_none());
    }
}
