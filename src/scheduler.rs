//! Epoch-aligned main loop.
//!
//! Each tick looks at the wall clock, resolves the market when a new epoch
//! starts, and then sleeps until the next thing worth doing: the entry
//! window, the next poll inside it, or the epoch boundary. Every sleep also
//! drains the quote channel so the trigger sees prices as they arrive.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::AppState;
use crate::config::Config;
use crate::epoch::{Clock, Epoch};
use crate::error::BotError;
use crate::feed::{FeedControl, PriceQuote};
use crate::market::{MarketResolver, Outcome};
use crate::metrics;
use crate::trading::{ExecutionService, OrderExecutor, OrderStatus};
use crate::trigger::{TriggerConfig, TriggerEngine};

/// Counters exposed on the status endpoint.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Epochs the scheduler entered.
    pub epochs_seen: u64,
    /// Epochs skipped because no open market was listed.
    pub epochs_skipped: u64,
    /// Trigger fires.
    pub fires: u64,
    /// Orders placed (or simulated).
    pub orders_placed: u64,
    /// Orders that failed.
    pub orders_failed: u64,
}

/// Drives the bot across epochs.
pub struct Scheduler<R, F, S, C> {
    resolver: R,
    feed: F,
    executor: OrderExecutor<S>,
    clock: C,
    engine: TriggerEngine,
    quotes: mpsc::Receiver<PriceQuote>,
    poll_interval: Duration,
    state: AppState,
    current_epoch: Option<Epoch>,
}

impl<R, F, S, C> Scheduler<R, F, S, C>
where
    R: MarketResolver,
    F: FeedControl,
    S: ExecutionService,
    C: Clock,
{
    /// Wire the scheduler to its collaborators.
    pub fn new(
        config: &Config,
        resolver: R,
        feed: F,
        executor: OrderExecutor<S>,
        quotes: mpsc::Receiver<PriceQuote>,
        clock: C,
        state: AppState,
    ) -> Self {
        Self {
            resolver,
            feed,
            executor,
            clock,
            engine: TriggerEngine::new(TriggerConfig::from_config(config)),
            quotes,
            poll_interval: config.poll_interval(),
            state,
            current_epoch: None,
        }
    }

    /// Trigger engine holding the live epoch.
    pub fn engine(&self) -> &TriggerEngine {
        &self.engine
    }

    /// Run until the quote channel closes.
    pub async fn run(mut self) -> Result<(), BotError> {
        let config = self.engine.config();
        info!(
            entry_seconds = config.entry_seconds,
            min_seconds = config.min_seconds,
            dry_run = self.executor.is_dry_run(),
            "Scheduler started"
        );

        loop {
            self.tick().await?;
        }
    }

    /// One pass: handle an epoch change if there is one, then wait.
    pub async fn tick(&mut self) -> Result<(), BotError> {
        let epoch = Epoch::containing(self.clock.now());

        if self.current_epoch != Some(epoch) {
            self.current_epoch = Some(epoch);
            self.enter_epoch(epoch).await;
        }

        let now = self.clock.now();
        if Epoch::containing(now) != epoch {
            // Resolution ran past the boundary.
            return Ok(());
        }
        let remaining = epoch.seconds_remaining(now);

        if self.engine.market().is_none() || self.engine.has_traded(epoch) {
            return self.wait_for(until_boundary(remaining)).await;
        }

        let entry = self.engine.config().entry_seconds;
        if remaining > entry {
            let sleep = remaining - entry;
            info!("{}s left, sleeping {}s until snipe window", remaining, sleep);
            return self.wait_for(Duration::from_secs(sleep as u64)).await;
        }

        if let Some(snapshot) = self.engine.snapshot() {
            info!(
                "SNIPE WINDOW | {}s left | UP: {} | DOWN: {}",
                remaining,
                cents(snapshot.ask(Outcome::Up)),
                cents(snapshot.ask(Outcome::Down))
            );
        }
        self.wait_for(self.poll_interval).await
    }

    async fn enter_epoch(&mut self, epoch: Epoch) {
        self.state.stats.write().await.epochs_seen += 1;

        match self.resolver.resolve(epoch).await {
            Some(market) if !market.closed => {
                info!("Epoch {} | {}", epoch, market.title);
                self.engine.begin_epoch(market.clone());
                self.feed.subscribe(market.token_ids());
                self.state.set_market(Some(&market)).await;
            }
            Some(_) => {
                warn!(epoch = %epoch, "Market already closed, skipping epoch");
                self.skip_epoch().await;
            }
            None => {
                warn!(epoch = %epoch, "No market for epoch, skipping");
                self.skip_epoch().await;
            }
        }
    }

    async fn skip_epoch(&mut self) {
        self.engine.clear();
        self.state.set_market(None).await;
        self.state.stats.write().await.epochs_skipped += 1;
    }

    /// Sleep for `duration` while feeding arriving quotes to the trigger.
    async fn wait_for(&mut self, duration: Duration) -> Result<(), BotError> {
        let deadline = tokio::time::Instant::now() + duration;

        loop {
            let quote = tokio::select! {
                biased;
                _ = tokio::time::sleep_until(deadline) => return Ok(()),
                quote = self.quotes.recv() => quote,
            };

            match quote {
                Some(quote) => self.handle_quote(quote).await,
                None => return Err(BotError::FeedClosed),
            }
        }
    }

    async fn handle_quote(&self, quote: PriceQuote) {
        let Some(decision) = self.engine.on_quote(&quote, self.clock.now()) else {
            return;
        };

        metrics::inc_trigger_fires();
        self.state.stats.write().await.fires += 1;

        info!("========================================");
        info!(
            "SNIPE: BUY {} @ {} ({}s left) | {}",
            decision.outcome,
            cents(Some(decision.price)),
            decision.seconds_remaining,
            decision.title
        );
        info!("========================================");

        let result = self.executor.execute(&decision).await;

        match &result.status {
            OrderStatus::Placed { order_id } => {
                info!("ORDER PLACED: {}", order_id);
                self.state.stats.write().await.orders_placed += 1;
            }
            OrderStatus::Failed { error } => {
                error!("ORDER FAILED: {}", error);
                self.state.stats.write().await.orders_failed += 1;
            }
        }
        debug!(?result, "Order result");

        self.state.record_order(&result).await;
    }
}

/// Sleep that lands one second past the epoch boundary.
fn until_boundary(remaining: i64) -> Duration {
    Duration::from_secs(remaining.max(0) as u64 + 1)
}

fn cents(price: Option<Decimal>) -> String {
    match price {
        Some(p) => format!("{}¢", (p * Decimal::ONE_HUNDRED).normalize()),
        None => "-".to_string(),
    }
}
