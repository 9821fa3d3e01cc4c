//! HTTP API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::market::MarketInfo;
use crate::scheduler::SchedulerStats;
use crate::trading::OrderResult;

/// Live market as reported by the status endpoints.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MarketSummary {
    /// Epoch start (unix seconds).
    pub epoch: i64,
    /// Epoch end (unix seconds).
    pub ends_at: i64,
    /// Market question.
    pub title: String,
    /// Condition ID.
    pub condition_id: String,
    /// Whether an order fired this epoch.
    pub traded: bool,
}

impl From<&MarketInfo> for MarketSummary {
    fn from(market: &MarketInfo) -> Self {
        Self {
            epoch: market.epoch.start(),
            ends_at: market.end_timestamp(),
            title: market.title.clone(),
            condition_id: market.condition_id.clone(),
            traded: false,
        }
    }
}

/// Most recent order outcome.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LastOrder {
    /// Epoch start.
    pub epoch: i64,
    /// UP or DOWN.
    pub side: String,
    /// Limit price.
    pub price: String,
    /// Whether the order was placed.
    pub success: bool,
    /// Order ID or error message.
    pub detail: String,
}

impl From<&OrderResult> for LastOrder {
    fn from(result: &OrderResult) -> Self {
        Self {
            epoch: result.epoch.start(),
            side: result.side.to_string(),
            price: result.price.to_string(),
            success: result.success(),
            detail: result
                .order_id()
                .or(result.error())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Whether a market is live for the current epoch.
    pub ready: Arc<AtomicBool>,
    /// Live market, if any.
    pub market: Arc<RwLock<Option<MarketSummary>>>,
    /// Last order outcome.
    pub last_order: Arc<RwLock<Option<LastOrder>>>,
    /// Scheduler counters.
    pub stats: Arc<RwLock<SchedulerStats>>,
    /// Whether orders are simulated.
    pub dry_run: bool,
    /// Prometheus exporter handle, when installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(dry_run: bool) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            market: Arc::new(RwLock::new(None)),
            last_order: Arc::new(RwLock::new(None)),
            stats: Arc::new(RwLock::new(SchedulerStats::default())),
            dry_run,
            prometheus: None,
        }
    }

    /// Attach the Prometheus handle served at `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Publish the live market (or its absence) and update readiness.
    pub async fn set_market(&self, market: Option<&MarketInfo>) {
        *self.market.write().await = market.map(MarketSummary::from);
        self.set_ready(market.is_some());
    }

    /// Record an order outcome and mark the live market traded.
    pub async fn record_order(&self, result: &OrderResult) {
        *self.last_order.write().await = Some(LastOrder::from(result));
        if let Some(market) = self.market.write().await.as_mut() {
            if market.epoch == result.epoch.start() {
                market.traded = true;
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether a market is live.
    pub ready: bool,
    /// Live market if available.
    pub market: Option<MarketSummary>,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// "dry_run" or "live".
    pub mode: &'static str,
    /// Live market.
    pub market: Option<MarketSummary>,
    /// Last order outcome.
    pub last_order: Option<LastOrder>,
    /// Statistics.
    pub stats: SchedulerStats,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if a market is live, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let market = state.market.read().await.clone();

    let response = ReadyResponse {
        ready: is_ready,
        market,
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns bot status and statistics.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let market = state.market.read().await.clone();
    let last_order = state.last_order.read().await.clone();
    let stats = state.stats.read().await.clone();

    Json(StatusResponse {
        status: if state.is_ready() { "trading" } else { "waiting" },
        mode: if state.dry_run { "dry_run" } else { "live" },
        market,
        last_order,
        stats,
    })
}

/// Prometheus scrape handler.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::NOT_FOUND,
            "metrics exporter not installed".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::Epoch;
    use crate::market::mock_market;
    use crate::market::Outcome;
    use crate::trading::OrderStatus;
    use rust_decimal_macros::dec;

    #[test]
    fn app_state_ready_toggle() {
        let state = AppState::new(true);
        assert!(!state.is_ready());

        state.set_ready(true);
        assert!(state.is_ready());

        state.set_ready(false);
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn order_marks_live_market_traded() {
        let state = AppState::new(true);
        let epoch = Epoch::containing(1_700_000_100);
        state.set_market(Some(&mock_market(epoch))).await;
        assert!(state.is_ready());

        let result = OrderResult {
            epoch,
            side: Outcome::Up,
            price: dec!(0.071),
            size: Some(dec!(14.09)),
            status: OrderStatus::Placed {
                order_id: "dry-1".to_string(),
            },
        };
        state.record_order(&result).await;

        assert!(state.market.read().await.as_ref().unwrap().traded);
        let last = state.last_order.read().await.clone().unwrap();
        assert_eq!(last.side, "UP");
        assert_eq!(last.detail, "dry-1");

        state.set_market(None).await;
        assert!(!state.is_ready());
    }
}
