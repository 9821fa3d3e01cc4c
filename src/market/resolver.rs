//! Epoch → market resolution against the Gamma metadata API.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info, instrument, warn};

use super::types::{GammaMarket, MarketInfo};
use crate::epoch::Epoch;
use crate::error::MarketError;
use crate::metrics;

/// Timeout for a single metadata lookup.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves the market listed for an epoch.
pub trait MarketResolver: Send + Sync {
    /// Resolve the market for `epoch`.
    ///
    /// Returns `None` when the market is not listed yet, lists fewer than
    /// two outcome tokens, or the lookup failed. Failures are logged here and
    /// the caller retries on its next iteration.
    fn resolve(&self, epoch: Epoch) -> impl Future<Output = Option<MarketInfo>> + Send;
}

/// Gamma API backed resolver.
#[derive(Debug, Clone)]
pub struct GammaResolver {
    client: reqwest::Client,
    base_url: String,
    slug_prefix: String,
}

impl GammaResolver {
    /// Create a resolver for `{base_url}/markets/slug/{slug_prefix}-{epoch}`.
    pub fn new(
        base_url: impl Into<String>,
        slug_prefix: impl Into<String>,
    ) -> Result<Self, MarketError> {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .user_agent(concat!("polymarket-sniper/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            slug_prefix: slug_prefix.into(),
        })
    }

    /// Slug queried for `epoch`.
    pub fn slug_for(&self, epoch: Epoch) -> String {
        epoch.slug(&self.slug_prefix)
    }

    /// Fetch the market for `epoch`, distinguishing absence from failure.
    #[instrument(skip(self), fields(slug = %self.slug_for(epoch)))]
    pub async fn fetch(&self, epoch: Epoch) -> Result<Option<MarketInfo>, MarketError> {
        let slug = self.slug_for(epoch);
        let url = format!("{}/markets/slug/{}", self.base_url, slug);
        let _timer = metrics::timer_market_lookup();

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Market not listed yet");
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(MarketError::FetchFailed {
                resource: slug,
                reason: format!("HTTP {}", response.status()),
            });
        }

        let gamma: GammaMarket = response.json().await.map_err(|e| {
            MarketError::ParseError(format!("Failed to parse Gamma market response: {}", e))
        })?;

        if let Some(listed) = gamma.slug.as_deref() {
            if Epoch::from_slug(listed) != Some(epoch) {
                return Err(MarketError::ParseError(format!(
                    "Gamma returned {:?} for epoch {}",
                    listed, epoch
                )));
            }
        }

        let market = gamma.into_market_info(epoch);
        if market.is_none() {
            debug!("Market lists fewer than two outcome tokens");
        }
        Ok(market)
    }
}

impl MarketResolver for GammaResolver {
    async fn resolve(&self, epoch: Epoch) -> Option<MarketInfo> {
        match self.fetch(epoch).await {
            Ok(Some(market)) => {
                info!(
                    epoch = %epoch,
                    condition_id = %market.condition_id,
                    title = %market.title,
                    closed = market.closed,
                    "Resolved market"
                );
                metrics::record_market_lookup(metrics::LookupOutcome::Found);
                Some(market)
            }
            Ok(None) => {
                metrics::record_market_lookup(metrics::LookupOutcome::Absent);
                None
            }
            Err(e) => {
                warn!(epoch = %epoch, error = %e, "Market lookup failed");
                metrics::record_market_lookup(metrics::LookupOutcome::Failed);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_derived_from_epoch() {
        let resolver =
            GammaResolver::new("https://gamma-api.polymarket.com/", "btc-updown-5m").unwrap();
        assert_eq!(
            resolver.slug_for(Epoch::containing(1_700_000_123)),
            "btc-updown-5m-1700000100"
        );
        assert_eq!(resolver.base_url, "https://gamma-api.polymarket.com");
    }
}
