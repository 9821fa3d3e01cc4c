//! Per-epoch single-fire trigger.
//!
//! The engine holds one session per epoch: the live market plus its
//! [`EpochTradeState`]. Both are replaced together under one lock, and the
//! Idle → Fired transition happens under the same lock before a decision is
//! handed out, so two quotes can never both fire for the same epoch.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use strum::Display;
use tracing::{debug, info};

use super::matcher::match_target;
use crate::config::Config;
use crate::epoch::Epoch;
use crate::feed::PriceQuote;
use crate::market::{MarketInfo, Outcome};

/// Trade status within one epoch. Idle → Fired is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Default)]
#[strum(serialize_all = "snake_case")]
pub enum TradeStatus {
    /// No order fired yet.
    #[default]
    Idle,
    /// An order fired; the gate stays shut until the next epoch.
    Fired,
}

/// Trade state for the live epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochTradeState {
    /// Epoch this state belongs to.
    pub epoch: Epoch,
    /// Trade status.
    pub status: TradeStatus,
    /// Latest best ask on the UP token.
    pub up_ask: Option<Decimal>,
    /// Latest best ask on the DOWN token.
    pub down_ask: Option<Decimal>,
}

impl EpochTradeState {
    fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            status: TradeStatus::Idle,
            up_ask: None,
            down_ask: None,
        }
    }

    /// Whether an order already fired this epoch.
    pub fn traded(&self) -> bool {
        self.status == TradeStatus::Fired
    }

    /// Latest ask for `outcome`.
    pub fn ask(&self, outcome: Outcome) -> Option<Decimal> {
        match outcome {
            Outcome::Up => self.up_ask,
            Outcome::Down => self.down_ask,
        }
    }

    fn record(&mut self, outcome: Outcome, ask: Decimal) {
        match outcome {
            Outcome::Up => self.up_ask = Some(ask),
            Outcome::Down => self.down_ask = Some(ask),
        }
    }
}

/// Decision to buy, produced at most once per epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireDecision {
    /// Epoch the order belongs to.
    pub epoch: Epoch,
    /// Token to buy.
    pub token_id: String,
    /// Side, from the token the quote belongs to.
    pub outcome: Outcome,
    /// Quoted best ask; the order's limit price.
    pub price: Decimal,
    /// Configured target the ask matched.
    pub matched_target: Decimal,
    /// Seconds left in the epoch when the decision was made.
    pub seconds_remaining: i64,
    /// Market title.
    pub title: String,
}

/// Trigger thresholds.
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Ordered target prices.
    pub targets: Vec<Decimal>,
    /// Fire only at or below this many seconds remaining.
    pub entry_seconds: i64,
    /// Fire only at or above this many seconds remaining.
    pub min_seconds: i64,
}

impl TriggerConfig {
    /// Create from config values.
    pub fn from_config(config: &Config) -> Self {
        Self {
            targets: config.target_prices.clone(),
            entry_seconds: config.entry_seconds_before_expiry,
            min_seconds: config.min_seconds_before_expiry,
        }
    }

    /// Whether `remaining` seconds lies inside the entry window.
    pub fn in_window(&self, remaining: i64) -> bool {
        remaining <= self.entry_seconds && remaining >= self.min_seconds
    }
}

#[derive(Debug)]
struct EpochSession {
    market: MarketInfo,
    state: EpochTradeState,
}

/// Evaluates quotes against the live epoch and fires at most once per epoch.
#[derive(Debug)]
pub struct TriggerEngine {
    config: TriggerConfig,
    session: Mutex<Option<EpochSession>>,
}

impl TriggerEngine {
    /// Create an engine with no live epoch.
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// Trigger thresholds.
    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Option<EpochSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `market` as the live session.
    ///
    /// A market for a new epoch gets fresh Idle state. Re-installing a market
    /// for the epoch already live keeps its trade state.
    pub fn begin_epoch(&self, market: MarketInfo) {
        let mut session = self.lock();
        match session.as_mut() {
            Some(live) if live.state.epoch == market.epoch => {
                live.market = market;
            }
            _ => {
                debug!(epoch = %market.epoch, "Starting epoch session");
                *session = Some(EpochSession {
                    state: EpochTradeState::new(market.epoch),
                    market,
                });
            }
        }
    }

    /// Drop the live session (no market for the current epoch).
    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Evaluate a quote at wall-clock `now` (unix seconds).
    ///
    /// Quotes for tokens outside the live market are ignored. The ask is
    /// recorded, then the gate is checked: remaining seconds inside the entry
    /// window, status Idle, ask within a target band. On success the session
    /// is marked Fired before returning.
    pub fn on_quote(&self, quote: &PriceQuote, now: i64) -> Option<FireDecision> {
        let mut guard = self.lock();
        let session = guard.as_mut()?;

        let outcome = session.market.outcome_of(&quote.token_id)?;
        session.state.record(outcome, quote.best_ask);

        let remaining = session.state.epoch.seconds_remaining(now);
        if !self.config.in_window(remaining) {
            return None;
        }
        if session.state.traded() {
            return None;
        }

        let matched_target = match_target(&self.config.targets, quote.best_ask)?;

        session.state.status = TradeStatus::Fired;

        info!(
            epoch = %session.state.epoch,
            side = %outcome,
            price = %quote.best_ask,
            target = %matched_target,
            seconds_remaining = remaining,
            "Trigger fired"
        );

        Some(FireDecision {
            epoch: session.state.epoch,
            token_id: quote.token_id.clone(),
            outcome,
            price: quote.best_ask,
            matched_target,
            seconds_remaining: remaining,
            title: session.market.title.clone(),
        })
    }

    /// Copy of the live trade state.
    pub fn snapshot(&self) -> Option<EpochTradeState> {
        self.lock().as_ref().map(|s| s.state.clone())
    }

    /// Copy of the live market.
    pub fn market(&self) -> Option<MarketInfo> {
        self.lock().as_ref().map(|s| s.market.clone())
    }

    /// Whether the live session for `epoch` has fired.
    pub fn has_traded(&self, epoch: Epoch) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|s| s.state.epoch == epoch && s.state.traded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    const EPOCH_START: i64 = 1_700_000_100;

    fn market(epoch_start: i64) -> MarketInfo {
        MarketInfo {
            condition_id: "0xcond".to_string(),
            title: "Bitcoin Up or Down".to_string(),
            up_token_id: format!("up-{}", epoch_start),
            down_token_id: format!("down-{}", epoch_start),
            epoch: Epoch::containing(epoch_start),
            closed: false,
        }
    }

    fn engine() -> TriggerEngine {
        TriggerEngine::new(TriggerConfig {
            targets: vec![dec!(0.07)],
            entry_seconds: 60,
            min_seconds: 5,
        })
    }

    fn at_remaining(remaining: i64) -> i64 {
        EPOCH_START + 300 - remaining
    }

    #[test]
    fn fires_on_matching_quote_inside_window() {
        let engine = engine();
        engine.begin_epoch(market(EPOCH_START));

        let quote = PriceQuote::now(format!("down-{}", EPOCH_START), dec!(0.071));
        let decision = engine.on_quote(&quote, at_remaining(40)).unwrap();

        assert_eq!(decision.outcome, Outcome::Down);
        assert_eq!(decision.price, dec!(0.071));
        assert_eq!(decision.matched_target, dec!(0.07));
        assert_eq!(decision.seconds_remaining, 40);
        assert!(engine.has_traded(Epoch::containing(EPOCH_START)));
    }

    #[test]
    fn window_edges() {
        let engine = engine();
        engine.begin_epoch(market(EPOCH_START));
        let quote = PriceQuote::now(format!("up-{}", EPOCH_START), dec!(0.07));

        assert!(engine.on_quote(&quote, at_remaining(61)).is_none());
        assert!(engine.on_quote(&quote, at_remaining(4)).is_none());
        assert!(engine.on_quote(&quote, at_remaining(60)).is_some());

        engine.begin_epoch(market(EPOCH_START + 300));
        let quote = PriceQuote::now(format!("up-{}", EPOCH_START + 300), dec!(0.07));
        assert!(engine.on_quote(&quote, at_remaining(5) + 300).is_some());
    }

    #[test]
    fn records_asks_outside_window() {
        let engine = engine();
        engine.begin_epoch(market(EPOCH_START));

        let quote = PriceQuote::now(format!("up-{}", EPOCH_START), dec!(0.45));
        assert!(engine.on_quote(&quote, at_remaining(200)).is_none());

        let state = engine.snapshot().unwrap();
        assert_eq!(state.up_ask, Some(dec!(0.45)));
        assert_eq!(state.down_ask, None);
        assert_eq!(state.status, TradeStatus::Idle);
    }

    #[test]
    fn stale_tokens_are_ignored_after_rollover() {
        let engine = engine();
        engine.begin_epoch(market(EPOCH_START));
        engine.begin_epoch(market(EPOCH_START + 300));

        let stale = PriceQuote::now(format!("up-{}", EPOCH_START), dec!(0.07));
        assert!(engine.on_quote(&stale, at_remaining(30) + 300).is_none());
        assert_eq!(engine.snapshot().unwrap().up_ask, None);
    }

    #[test]
    fn quote_after_epoch_end_cannot_fire() {
        let engine = engine();
        engine.begin_epoch(market(EPOCH_START));
        let quote = PriceQuote::now(format!("up-{}", EPOCH_START), dec!(0.07));
        assert!(engine.on_quote(&quote, EPOCH_START + 301).is_none());
    }

    #[test]
    fn reinstalling_same_epoch_keeps_fired_state() {
        let engine = engine();
        engine.begin_epoch(market(EPOCH_START));
        let quote = PriceQuote::now(format!("up-{}", EPOCH_START), dec!(0.07));
        assert!(engine.on_quote(&quote, at_remaining(30)).is_some());

        engine.begin_epoch(market(EPOCH_START));
        assert!(engine.on_quote(&quote, at_remaining(20)).is_none());
    }

    #[test]
    fn cleared_engine_ignores_quotes() {
        let engine = engine();
        engine.begin_epoch(market(EPOCH_START));
        engine.clear();
        let quote = PriceQuote::now(format!("up-{}", EPOCH_START), dec!(0.07));
        assert!(engine.on_quote(&quote, at_remaining(30)).is_none());
        assert!(engine.snapshot().is_none());
    }
}
