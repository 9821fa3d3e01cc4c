//! Order types, sizing and results.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::epoch::Epoch;
use crate::market::Outcome;

/// Minimum notional spent per order, in USD.
pub const MIN_NOTIONAL_USD: Decimal = Decimal::ONE;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order.
    #[strum(serialize = "BUY", serialize = "buy")]
    Buy,
}

/// Share quantity for `trade_size_usd` at `price`.
///
/// `ceil((max(trade_size_usd, 1) / price) * 100) / 100`, i.e. rounded up to
/// the cent of a share so the notional never falls below the floor.
pub fn share_size(trade_size_usd: Decimal, price: Decimal) -> Option<Decimal> {
    if price <= Decimal::ZERO {
        return None;
    }
    let notional = trade_size_usd.max(MIN_NOTIONAL_USD);
    let raw = notional.checked_div(price)?;
    Some(raw.round_dp_with_strategy(2, RoundingStrategy::AwayFromZero))
}

/// Limit buy submitted through the execution service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyOrder {
    /// Token ID to buy.
    pub token_id: String,
    /// Limit price.
    pub price: Decimal,
    /// Share quantity.
    pub size: Decimal,
    /// Always [`Side::Buy`].
    pub side: Side,
    /// Fee rate in basis points.
    pub fee_rate_bps: u32,
}

impl BuyOrder {
    /// Build a buy order sized for `trade_size_usd`.
    pub fn sized(
        token_id: impl Into<String>,
        price: Decimal,
        trade_size_usd: Decimal,
        fee_rate_bps: u32,
    ) -> Result<Self, String> {
        let size = share_size(trade_size_usd, price)
            .ok_or_else(|| format!("cannot size order at price {}", price))?;
        let order = Self {
            token_id: token_id.into(),
            price,
            size,
            side: Side::Buy,
            fee_rate_bps,
        };
        order.validate()?;
        Ok(order)
    }

    /// Validate order parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.token_id.is_empty() {
            return Err("token_id is required".to_string());
        }
        if self.price <= Decimal::ZERO || self.price >= Decimal::ONE {
            return Err("price must be within (0, 1)".to_string());
        }
        if self.size <= Decimal::ZERO {
            return Err("size must be positive".to_string());
        }
        Ok(())
    }

    /// Notional cost of the order.
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// How a fired order ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    /// Accepted; carries the exchange (or dry-run) order ID.
    Placed {
        /// Order identifier.
        order_id: String,
    },
    /// Not placed; carries a human-readable reason.
    Failed {
        /// Error message.
        error: String,
    },
}

/// Outcome of one fired order. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderResult {
    /// Epoch the order belongs to.
    pub epoch: Epoch,
    /// Side that was bought.
    pub side: Outcome,
    /// Limit price.
    pub price: Decimal,
    /// Share quantity, when sizing succeeded.
    pub size: Option<Decimal>,
    /// Placed or failed.
    pub status: OrderStatus,
}

impl OrderResult {
    /// Whether the order was placed.
    pub fn success(&self) -> bool {
        matches!(self.status, OrderStatus::Placed { .. })
    }

    /// Order ID, if placed.
    pub fn order_id(&self) -> Option<&str> {
        match &self.status {
            OrderStatus::Placed { order_id } => Some(order_id),
            OrderStatus::Failed { .. } => None,
        }
    }

    /// Error message, if failed.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            OrderStatus::Placed { .. } => None,
            OrderStatus::Failed { error } => Some(error),
        }
    }
}

/// Deterministic order ID for dry-run orders.
pub fn dry_run_order_id(epoch: Epoch, side: Outcome, price: Decimal) -> String {
    format!("dry-{}-{}-{}", epoch, side, price.normalize())
}
