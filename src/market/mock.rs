//! In-memory doubles for the resolver, feed and execution service.
//!
//! These let the scheduler and executor run without network access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::resolver::MarketResolver;
use super::types::MarketInfo;
use crate::epoch::Epoch;
use crate::error::ExecutionError;
use crate::feed::FeedControl;
use crate::trading::execution::{ExecutionService, RedeemRequest};
use crate::trading::fees::GasParams;
use crate::trading::order::BuyOrder;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Market for `epoch` with tokens `up-{epoch}` and `down-{epoch}`.
pub fn mock_market(epoch: Epoch) -> MarketInfo {
    MarketInfo {
        condition_id: format!("0x{:064x}", epoch.start()),
        title: format!("Bitcoin Up or Down - {}", epoch),
        up_token_id: format!("up-{}", epoch),
        down_token_id: format!("down-{}", epoch),
        epoch,
        closed: false,
    }
}

#[derive(Debug, Default)]
struct ResolverState {
    responses: HashMap<Epoch, Option<MarketInfo>>,
    list_all: bool,
    calls: Vec<Epoch>,
}

/// Resolver returning canned markets.
#[derive(Debug, Clone, Default)]
pub struct MockResolver {
    state: Arc<Mutex<ResolverState>>,
}

impl MockResolver {
    /// Resolver that lists nothing unless told otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver that lists [`mock_market`] for every epoch not overridden.
    pub fn listing_all() -> Self {
        let resolver = Self::default();
        lock(&resolver.state).list_all = true;
        resolver
    }

    /// List `market` for its epoch.
    pub fn with_market(self, market: MarketInfo) -> Self {
        lock(&self.state).responses.insert(market.epoch, Some(market));
        self
    }

    /// Report `epoch` as not listed.
    pub fn without_market(self, epoch: Epoch) -> Self {
        lock(&self.state).responses.insert(epoch, None);
        self
    }

    /// Epochs resolved so far, in call order.
    pub fn calls(&self) -> Vec<Epoch> {
        lock(&self.state).calls.clone()
    }
}

impl MarketResolver for MockResolver {
    async fn resolve(&self, epoch: Epoch) -> Option<MarketInfo> {
        let mut state = lock(&self.state);
        state.calls.push(epoch);
        match state.responses.get(&epoch) {
            Some(response) => response.clone(),
            None if state.list_all => Some(mock_market(epoch)),
            None => None,
        }
    }
}

/// Feed control that records subscription requests.
#[derive(Debug, Clone, Default)]
pub struct MockFeed {
    subscriptions: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockFeed {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every token set requested, in order.
    pub fn subscriptions(&self) -> Vec<Vec<String>> {
        lock(&self.subscriptions).clone()
    }
}

impl FeedControl for MockFeed {
    fn subscribe(&self, tokens: Vec<String>) {
        lock(&self.subscriptions).push(tokens);
    }
}

#[derive(Debug, Default)]
struct ExecutionState {
    orders: Vec<BuyOrder>,
    redemptions: Vec<(RedeemRequest, GasParams)>,
    failure: Option<String>,
    base_fee: Option<u128>,
}

/// Execution service that records calls instead of signing anything.
#[derive(Debug, Clone, Default)]
pub struct MockExecutionService {
    state: Arc<Mutex<ExecutionState>>,
}

impl MockExecutionService {
    /// Service that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Service that rejects every order and redemption with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        let service = Self::default();
        lock(&service.state).failure = Some(reason.into());
        service
    }

    /// Report `base_fee` (wei) from [`ExecutionService::base_fee_per_gas`].
    pub fn with_base_fee(self, base_fee: Option<u128>) -> Self {
        lock(&self.state).base_fee = base_fee;
        self
    }

    /// Orders received.
    pub fn orders(&self) -> Vec<BuyOrder> {
        lock(&self.state).orders.clone()
    }

    /// Number of order submissions.
    pub fn order_calls(&self) -> usize {
        lock(&self.state).orders.len()
    }

    /// Redemptions received with their gas bids.
    pub fn redemptions(&self) -> Vec<(RedeemRequest, GasParams)> {
        lock(&self.state).redemptions.clone()
    }
}

impl ExecutionService for MockExecutionService {
    async fn place_buy_order(&self, order: &BuyOrder) -> Result<String, ExecutionError> {
        let mut state = lock(&self.state);
        state.orders.push(order.clone());
        match &state.failure {
            Some(reason) => Err(ExecutionError::OrderRejected {
                reason: reason.clone(),
            }),
            None => Ok(format!("mock-order-{}", state.orders.len())),
        }
    }

    async fn redeem_positions(
        &self,
        request: &RedeemRequest,
        gas: GasParams,
    ) -> Result<String, ExecutionError> {
        let mut state = lock(&self.state);
        if let Some(reason) = &state.failure {
            return Err(ExecutionError::RedemptionFailed(reason.clone()));
        }
        state.redemptions.push((request.clone(), gas));
        Ok(format!("0x{:064x}", state.redemptions.len()))
    }

    async fn base_fee_per_gas(&self) -> Result<Option<u128>, ExecutionError> {
        Ok(lock(&self.state).base_fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn resolver_records_calls_and_honours_overrides() {
        let epoch = Epoch::containing(600);
        let resolver = MockResolver::listing_all().without_market(epoch);

        assert!(resolver.resolve(epoch).await.is_none());
        assert_eq!(
            resolver.resolve(epoch.next()).await,
            Some(mock_market(epoch.next()))
        );
        assert_eq!(resolver.calls(), vec![epoch, epoch.next()]);
    }

    #[tokio::test]
    async fn execution_service_records_orders() {
        let service = MockExecutionService::new();
        let order = BuyOrder::sized("1", dec!(0.5), dec!(1), 1000).unwrap();

        let id = service.place_buy_order(&order).await.unwrap();

        assert_eq!(id, "mock-order-1");
        assert_eq!(service.orders(), vec![order]);
    }

    #[tokio::test]
    async fn failing_service_still_records_attempts() {
        let service = MockExecutionService::failing("nope");
        let order = BuyOrder::sized("1", dec!(0.5), dec!(1), 1000).unwrap();

        assert!(service.place_buy_order(&order).await.is_err());
        assert_eq!(service.order_calls(), 1);
    }

    #[test]
    fn feed_records_subscriptions() {
        let feed = MockFeed::new();
        feed.subscribe(vec!["a".to_string()]);
        assert_eq!(feed.subscriptions(), vec![vec!["a".to_string()]]);
    }
}
