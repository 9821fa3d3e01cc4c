//! Redeemable position lookup against the Polymarket data API.

use std::collections::HashSet;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::MarketError;

/// Timeout for a single positions page.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Page size requested from the data API.
pub const PAGE_SIZE: usize = 100;

/// A position row as returned by the data API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRow {
    /// Condition identifier.
    pub condition_id: Option<String>,
    /// Outcome token.
    pub asset: Option<String>,
    /// Share count.
    pub size: Option<Decimal>,
    /// Market title.
    pub title: Option<String>,
    /// Outcome label.
    pub outcome: Option<String>,
}

/// A settled condition with something to redeem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemablePosition {
    /// Condition identifier.
    pub condition_id: String,
    /// Market title, if reported.
    pub title: Option<String>,
    /// Share count, if reported.
    pub size: Option<Decimal>,
}

/// Client for the positions endpoint.
#[derive(Debug, Clone)]
pub struct PositionsClient {
    client: reqwest::Client,
    base_url: String,
}

impl PositionsClient {
    /// Create a client for `{base_url}/positions`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, MarketError> {
        let client = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch every redeemable position for `user`, one entry per condition.
    #[instrument(skip(self))]
    pub async fn fetch_redeemable(
        &self,
        user: &str,
    ) -> Result<Vec<RedeemablePosition>, MarketError> {
        let url = format!("{}/positions", self.base_url);
        let mut rows = Vec::new();
        let mut offset = 0usize;

        loop {
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("user", user.to_string()),
                    ("redeemable", "true".to_string()),
                    ("limit", PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(MarketError::FetchFailed {
                    resource: url,
                    reason: format!("HTTP {}", response.status()),
                });
            }

            let body: Value = response.json().await.map_err(|e| {
                MarketError::ParseError(format!("Failed to parse positions response: {}", e))
            })?;
            let page = parse_positions_page(body);
            let count = page.len();
            debug!(offset, count, "Fetched positions page");

            rows.extend(page);

            if count < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        Ok(dedupe_by_condition(rows))
    }
}

/// Accept either a bare array or `{"positions": [...]}`. Unparseable rows are skipped.
pub fn parse_positions_page(body: Value) -> Vec<PositionRow> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("positions") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

/// Keep the first row per condition id, dropping rows without one.
pub fn dedupe_by_condition(rows: Vec<PositionRow>) -> Vec<RedeemablePosition> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter_map(|row| {
            let condition_id = row.condition_id.filter(|c| !c.is_empty())?;
            seen.insert(condition_id.clone()).then(|| RedeemablePosition {
                condition_id,
                title: row.title,
                size: row.size,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn parses_bare_array_and_wrapped_pages() {
        let bare = json!([{"conditionId": "0x1", "size": 5.5, "title": "A"}]);
        let wrapped = json!({"positions": [{"conditionId": "0x2", "size": "3"}]});

        let bare = parse_positions_page(bare);
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0].size, Some(dec!(5.5)));

        let wrapped = parse_positions_page(wrapped);
        assert_eq!(wrapped[0].condition_id.as_deref(), Some("0x2"));

        assert!(parse_positions_page(json!({"error": "nope"})).is_empty());
    }

    #[test]
    fn dedupes_by_condition_keeping_first() {
        let rows = parse_positions_page(json!([
            {"conditionId": "0x1", "title": "first", "outcome": "Up"},
            {"conditionId": "0x1", "title": "second", "outcome": "Down"},
            {"title": "no condition"},
            {"conditionId": "0x2"}
        ]));

        let positions = dedupe_by_condition(rows);
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].title.as_deref(), Some("first"));
        assert_eq!(positions[1].condition_id, "0x2");
    }
}
