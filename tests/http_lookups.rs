//! Market and positions lookups against a local HTTP server.

use std::collections::HashMap;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use polymarket_sniper::config::Config;
use polymarket_sniper::epoch::Epoch;
use polymarket_sniper::market::{GammaResolver, MarketResolver, MockExecutionService, PositionsClient};
use polymarket_sniper::trading::{claim_all, OrderExecutor};

const KEY: &str = "0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
const EPOCH_START: i64 = 1_700_000_100;

async fn market_by_slug(Path(slug): Path<String>) -> Response {
    match slug.as_str() {
        "btc-updown-5m-1700000100" => Json(json!({
            "id": "517",
            "conditionId": "0xc0ffee",
            "question": "Bitcoin Up or Down - Nov 14, 5:15PM ET",
            "slug": slug.clone(),
            "closed": false,
            "clobTokenIds": "[\"111\", \"222\"]"
        }))
        .into_response(),
        "btc-updown-5m-1700000400" => Json(json!({
            "id": "518",
            "question": "one-sided",
            "clobTokenIds": ["333"]
        }))
        .into_response(),
        "btc-updown-5m-1700000700" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// 100 rows on the first page (two conditions), 3 on the second.
async fn positions(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(params.get("redeemable").map(String::as_str), Some("true"));
    assert_eq!(params.get("limit").map(String::as_str), Some("100"));

    let rows: Vec<Value> = match params.get("offset").map(String::as_str) {
        Some("0") => (0..100)
            .map(|i| {
                let condition_id = if i % 2 == 0 { "0xaa01" } else { "0xaa02" };
                json!({
                    "conditionId": condition_id,
                    "asset": i.to_string(),
                    "size": 5,
                    "title": "settled"
                })
            })
            .collect(),
        Some("100") => vec![
            json!({"conditionId": "0xaa02", "size": "1.5"}),
            json!({"conditionId": "0xaa03", "size": 2, "title": "late"}),
            json!({"size": 1}),
        ],
        _ => Vec::new(),
    };

    Json(Value::Array(rows))
}

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/markets/slug/:slug", get(market_by_slug))
        .route("/positions", get(positions));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn resolver_distinguishes_found_absent_and_failed() {
    let base = spawn_server().await;
    let resolver = GammaResolver::new(base, "btc-updown-5m").unwrap();
    let epoch = Epoch::containing(EPOCH_START);

    let market = resolver.fetch(epoch).await.unwrap().unwrap();
    assert_eq!(market.condition_id, "0xc0ffee");
    assert_eq!(market.up_token_id, "111");
    assert_eq!(market.down_token_id, "222");
    assert_eq!(market.epoch, epoch);
    assert!(!market.closed);

    // One token only.
    assert_eq!(resolver.fetch(epoch.next()).await.unwrap(), None);

    // Server error is a failure for `fetch` but simply absent for `resolve`.
    let failing = epoch.next().next();
    assert!(resolver.fetch(failing).await.is_err());
    assert_eq!(resolver.resolve(failing).await, None);

    // Not listed.
    let unlisted = Epoch::containing(EPOCH_START + 3000);
    assert_eq!(resolver.fetch(unlisted).await.unwrap(), None);
    assert_eq!(resolver.resolve(unlisted).await, None);
}

#[tokio::test]
async fn positions_paginate_and_dedupe() {
    let base = spawn_server().await;
    let client = PositionsClient::new(base).unwrap();

    let positions = client.fetch_redeemable("0xholder").await.unwrap();

    let ids: Vec<_> = positions.iter().map(|p| p.condition_id.as_str()).collect();
    assert_eq!(ids, vec!["0xaa01", "0xaa02", "0xaa03"]);
    assert_eq!(positions[2].title.as_deref(), Some("late"));
}

#[tokio::test]
async fn claim_redeems_each_condition_once() {
    let base = spawn_server().await;
    let config = Config::from_vars([
        ("POLYMARKET_PRIVATE_KEY".to_string(), KEY.to_string()),
        ("DRY_RUN".to_string(), "false".to_string()),
    ])
    .unwrap();
    let service = MockExecutionService::new().with_base_fee(Some(200_000_000_000));
    let executor = OrderExecutor::new(service.clone(), &config);
    let client = PositionsClient::new(base).unwrap();

    let summary = claim_all(&client, &executor, "0xholder").await.unwrap();

    assert_eq!(summary.found, 3);
    assert_eq!(summary.redeemed, 3);
    assert_eq!(summary.failed, 0);

    let redemptions = service.redemptions();
    assert_eq!(redemptions.len(), 3);
    for (request, gas) in &redemptions {
        assert_eq!(request.index_sets.len(), 2);
        // 200 gwei * 1.2 + 30 gwei tip.
        assert_eq!(gas.max_fee_per_gas, 270_000_000_000);
    }
}

#[tokio::test]
async fn dry_run_claim_only_lists() {
    let base = spawn_server().await;
    let config = Config::from_vars([
        ("POLYMARKET_PRIVATE_KEY".to_string(), KEY.to_string()),
        ("DRY_RUN".to_string(), "true".to_string()),
    ])
    .unwrap();
    let service = MockExecutionService::new();
    let executor = OrderExecutor::new(service.clone(), &config);
    let client = PositionsClient::new(base).unwrap();

    let summary = claim_all(&client, &executor, "0xholder").await.unwrap();

    assert_eq!(summary.found, 3);
    assert_eq!(summary.redeemed, 0);
    assert!(service.redemptions().is_empty());
}
