//! Scheduler loop on paused time against in-memory collaborators.

use std::time::Duration;

use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use polymarket_sniper::api::AppState;
use polymarket_sniper::config::Config;
use polymarket_sniper::epoch::{Epoch, TokioClock};
use polymarket_sniper::error::BotError;
use polymarket_sniper::feed::PriceQuote;
use polymarket_sniper::market::{mock_market, MockExecutionService, MockFeed, MockResolver};
use polymarket_sniper::scheduler::Scheduler;
use polymarket_sniper::trading::OrderExecutor;

const KEY: &str = "0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
const EPOCH_START: i64 = 1_700_000_100;

struct Running {
    task: JoinHandle<Result<(), BotError>>,
    quotes: mpsc::Sender<PriceQuote>,
    feed: MockFeed,
    service: MockExecutionService,
    state: AppState,
}

fn start(resolver: MockResolver, now: i64, dry_run: bool) -> Running {
    let config = Config::from_vars([
        ("POLYMARKET_PRIVATE_KEY".to_string(), KEY.to_string()),
        ("TARGET_PRICES".to_string(), "0.07".to_string()),
        ("DRY_RUN".to_string(), dry_run.to_string()),
    ])
    .unwrap();

    let (tx, rx) = mpsc::channel(16);
    let feed = MockFeed::new();
    let service = MockExecutionService::new();
    let state = AppState::new(dry_run);

    let scheduler = Scheduler::new(
        &config,
        resolver,
        feed.clone(),
        OrderExecutor::new(service.clone(), &config),
        rx,
        TokioClock::starting_at(now),
        state.clone(),
    );

    Running {
        task: tokio::spawn(scheduler.run()),
        quotes: tx,
        feed,
        service,
        state,
    }
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn unlisted_epoch_is_slept_through_without_subscribing() {
    let epoch = Epoch::containing(EPOCH_START);
    let resolver = MockResolver::listing_all().without_market(epoch);
    let run = start(resolver.clone(), EPOCH_START + 10, true);

    sleep_secs(100).await;
    assert_eq!(resolver.calls(), vec![epoch]);
    assert!(run.feed.subscriptions().is_empty());
    assert!(!run.state.is_ready());

    // Boundary at +290s; the scheduler wakes one second past it.
    sleep_secs(200).await;
    assert_eq!(resolver.calls(), vec![epoch, epoch.next()]);
    assert_eq!(
        run.feed.subscriptions(),
        vec![mock_market(epoch.next()).token_ids()]
    );
    assert!(run.state.is_ready());

    let stats = run.state.stats.read().await.clone();
    assert_eq!(stats.epochs_seen, 2);
    assert_eq!(stats.epochs_skipped, 1);

    run.task.abort();
}

#[tokio::test(start_paused = true)]
async fn one_order_per_epoch_through_the_loop() {
    let epoch = Epoch::containing(EPOCH_START);
    let run = start(MockResolver::listing_all(), EPOCH_START + 200, false);
    let up = mock_market(epoch).up_token_id;

    // 40s left.
    sleep_secs(60).await;
    run.quotes
        .send(PriceQuote::now(up.clone(), dec!(0.071)))
        .await
        .unwrap();

    // 35s left.
    sleep_secs(5).await;
    run.quotes
        .send(PriceQuote::now(up, dec!(0.07)))
        .await
        .unwrap();
    sleep_secs(1).await;

    assert_eq!(run.service.order_calls(), 1);
    assert_eq!(run.service.orders()[0].price, dec!(0.071));
    let last = run.state.last_order.read().await.clone().unwrap();
    assert!(last.success);
    assert_eq!(last.detail, "mock-order-1");
    assert!(run.state.market.read().await.as_ref().unwrap().traded);

    // Next epoch starts fresh: 34s before its close.
    let next = epoch.next();
    sleep_secs(300).await;
    run.quotes
        .send(PriceQuote::now(mock_market(next).down_token_id, dec!(0.068)))
        .await
        .unwrap();
    sleep_secs(1).await;

    assert_eq!(run.service.order_calls(), 2);
    let stats = run.state.stats.read().await.clone();
    assert_eq!(stats.fires, 2);
    assert_eq!(stats.orders_placed, 2);

    run.task.abort();
}

#[tokio::test(start_paused = true)]
async fn quotes_outside_the_window_are_ignored() {
    let epoch = Epoch::containing(EPOCH_START);
    let run = start(MockResolver::listing_all(), EPOCH_START + 10, false);

    sleep_secs(1).await;
    run.quotes
        .send(PriceQuote::now(mock_market(epoch).up_token_id, dec!(0.07)))
        .await
        .unwrap();
    sleep_secs(1).await;

    assert_eq!(run.service.order_calls(), 0);
    assert_eq!(run.state.stats.read().await.fires, 0);

    run.task.abort();
}

#[tokio::test(start_paused = true)]
async fn dropping_the_feed_ends_the_loop() {
    let run = start(MockResolver::listing_all(), EPOCH_START + 10, true);
    drop(run.quotes);

    let result = run.task.await.unwrap();

    assert!(matches!(result, Err(BotError::FeedClosed)));
}
