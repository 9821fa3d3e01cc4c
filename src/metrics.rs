//! Prometheus metrics for the trigger pipeline.
//!
//! This module provides metrics for:
//! - Quote flow and feed reconnects
//! - Trigger fires and order outcomes
//! - Market lookups
//! - Order submission and lookup latency
//! - Redemptions

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use strum::{Display, IntoStaticStr};
use tracing::debug;

// === Metric Name Constants ===

/// Order submission latency metric name.
pub const METRIC_ORDER_SUBMIT_LATENCY: &str = "order_submit_latency_ms";
/// Market lookup latency metric name.
pub const METRIC_MARKET_LOOKUP_LATENCY: &str = "market_lookup_latency_ms";
/// Quotes received counter metric name.
pub const METRIC_QUOTES_RECEIVED: &str = "quotes_received_total";
/// Feed reconnects counter metric name.
pub const METRIC_FEED_RECONNECTS: &str = "feed_reconnects_total";
/// Trigger fires counter metric name.
pub const METRIC_TRIGGER_FIRES: &str = "trigger_fires_total";
/// Orders placed counter metric name.
pub const METRIC_ORDERS_PLACED: &str = "orders_placed_total";
/// Orders failed counter metric name.
pub const METRIC_ORDERS_FAILED: &str = "orders_failed_total";
/// Market lookups counter metric name.
pub const METRIC_MARKET_LOOKUPS: &str = "market_lookups_total";
/// Redemptions counter metric name.
pub const METRIC_REDEMPTIONS: &str = "redemptions_total";

/// Result label for market lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LookupOutcome {
    /// A tradable market was returned.
    Found,
    /// Not listed yet, or fewer than two tokens.
    Absent,
    /// Transport or decoding failure.
    Failed,
}

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_ORDER_SUBMIT_LATENCY,
        "Order submission latency in milliseconds"
    );
    describe_histogram!(
        METRIC_MARKET_LOOKUP_LATENCY,
        "Market metadata lookup latency in milliseconds"
    );

    describe_counter!(
        METRIC_QUOTES_RECEIVED,
        "Total number of best-ask quotes received for subscribed tokens"
    );
    describe_counter!(
        METRIC_FEED_RECONNECTS,
        "Total number of market channel reconnections"
    );
    describe_counter!(METRIC_TRIGGER_FIRES, "Total number of trigger fires");
    describe_counter!(METRIC_ORDERS_PLACED, "Total number of orders placed");
    describe_counter!(
        METRIC_ORDERS_FAILED,
        "Total number of orders that failed"
    );
    describe_counter!(
        METRIC_MARKET_LOOKUPS,
        "Total number of market lookups by result"
    );
    describe_counter!(
        METRIC_REDEMPTIONS,
        "Total number of redemptions by result"
    );

    debug!("Metrics initialized");
}

/// Record order submission latency.
pub fn record_order_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_ORDER_SUBMIT_LATENCY).record(latency_ms);
}

/// Increment quotes received counter.
pub fn inc_quotes_received() {
    counter!(METRIC_QUOTES_RECEIVED).increment(1);
}

/// Increment feed reconnects counter.
pub fn inc_feed_reconnects() {
    counter!(METRIC_FEED_RECONNECTS).increment(1);
}

/// Increment trigger fires counter.
pub fn inc_trigger_fires() {
    counter!(METRIC_TRIGGER_FIRES).increment(1);
}

/// Increment orders placed counter.
pub fn inc_orders_placed() {
    counter!(METRIC_ORDERS_PLACED).increment(1);
}

/// Increment orders failed counter.
pub fn inc_orders_failed() {
    counter!(METRIC_ORDERS_FAILED).increment(1);
}

/// Count a market lookup by result.
pub fn record_market_lookup(outcome: LookupOutcome) {
    let label: &'static str = outcome.into();
    counter!(METRIC_MARKET_LOOKUPS, "result" => label).increment(1);
}

/// Count a redemption attempt.
pub fn record_redemption(success: bool) {
    let label = if success { "success" } else { "failure" };
    counter!(METRIC_REDEMPTIONS, "result" => label).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for market lookups.
pub fn timer_market_lookup() -> LatencyTimer {
    LatencyTimer::new(METRIC_MARKET_LOOKUP_LATENCY)
}
