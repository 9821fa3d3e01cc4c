//! BTC 5-minute Polymarket sniper entry point.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use polymarket_sniper::api::{create_router, AppState};
use polymarket_sniper::config::Config;
use polymarket_sniper::epoch::{Clock, Epoch, SystemClock};
use polymarket_sniper::feed::{FeedControl, PriceFeed, ReconnectConfig};
use polymarket_sniper::market::{GammaResolver, PositionsClient};
use polymarket_sniper::metrics;
use polymarket_sniper::scheduler::Scheduler;
use polymarket_sniper::signing::{address_from_private_key, position_holder};
use polymarket_sniper::trading::{claim_all, LiveExecutionService, OrderExecutor};
use polymarket_sniper::utils::shutdown_signal;

/// BTC 5-minute Polymarket sniper.
#[derive(Parser, Debug)]
#[command(name = "polymarket-sniper")]
#[command(about = "Epoch-synchronized trigger bot for BTC 5-minute markets on Polymarket")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// Run in dry-run mode (no real orders).
    #[arg(long)]
    dry_run: Option<bool>,

    /// HTTP server port for health/metrics.
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the sniper loop (default).
    Run {
        /// Run in dry-run mode (no real orders).
        #[arg(long)]
        dry_run: Option<bool>,

        /// HTTP server port for health/metrics.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Resolve the market for the current (or a given) epoch.
    ResolveMarket {
        /// Epoch start in unix seconds; defaults to the live epoch.
        #[arg(long)]
        epoch: Option<i64>,
    },

    /// Test WebSocket connection (diagnostic).
    WsTest,

    /// Redeem all settled positions.
    Claim,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("polymarket_sniper=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(args.json_logs.then(|| fmt::layer().json()))
        .with((!args.json_logs).then(fmt::layer))
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::ResolveMarket { epoch }) => cmd_resolve_market(epoch).await,
        Some(Command::WsTest) => cmd_ws_test().await,
        Some(Command::Claim) => cmd_claim().await,
        Some(Command::Run { dry_run, port }) => cmd_run(dry_run, port).await,
        None => cmd_run(args.dry_run, args.port).await,
    }
}

/// Load and validate configuration; failure is fatal.
fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BTC 5M SNIPER - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    print!("Checking private key... ");
    match address_from_private_key(&config.polymarket_private_key) {
        Ok(addr) => {
            println!("OK");
            println!("  Wallet address: {}", addr);
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Private key invalid"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!(
        "  Signature Type: {} ({})",
        config.polymarket_signature_type,
        match config.polymarket_signature_type {
            0 => "EOA - Standard wallet",
            1 => "Magic.link - Proxy wallet",
            2 => "Gnosis Safe - Multi-sig",
            _ => "Unknown",
        }
    );
    if let Some(funder) = &config.polymarket_funder {
        println!("  Funder Address: {}", funder);
    }
    println!("  Trade Size: ${}", config.trade_size_usd);
    println!("  Target Prices: {}", config.target_prices_display());
    println!(
        "  Entry Window: {}s .. {}s before close",
        config.entry_seconds_before_expiry, config.min_seconds_before_expiry
    );
    println!("  Fee Rate: {} bps", config.fee_rate_bps);
    match config.gas_max_fee_override() {
        Some(max_fee) => println!("  Gas: tip {} gwei, max {} gwei", config.gas_tip_gwei, max_fee),
        None => println!("  Gas: tip {} gwei, max from chain", config.gas_tip_gwei),
    }
    println!("  Dry Run: {}", config.dry_run);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Resolve and print the market for an epoch.
async fn cmd_resolve_market(epoch: Option<i64>) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BTC 5M SNIPER - MARKET RESOLUTION");
    println!("======================================================================");

    let config = Config::load()?;
    let resolver = GammaResolver::new(&config.gamma_api_url, &config.market_slug_prefix)?;

    let now = SystemClock.now();
    let epoch = epoch.map(Epoch::containing).unwrap_or_else(|| Epoch::containing(now));

    println!("\nEpoch: {} (slug {})", epoch, resolver.slug_for(epoch));
    if let Some(start) = epoch.start_time() {
        println!("Starts: {}", start);
    }
    if epoch == Epoch::containing(now) {
        println!("Seconds remaining: {}", epoch.seconds_remaining(now));
    }

    match resolver.fetch(epoch).await {
        Ok(Some(market)) => {
            println!("MARKET FOUND");
            println!("----------------------------------------------------------------------");
            println!("  Title: {}", market.title);
            println!("  Condition ID: {}", market.condition_id);
            println!("  UP Token: {}", market.up_token_id);
            println!("  DOWN Token: {}", market.down_token_id);
            println!("  Closed: {}", market.closed);
            println!("======================================================================");
        }
        Ok(None) => {
            println!("NO MARKET LISTED FOR THIS EPOCH");
            println!("\nMarkets open every 5 minutes. Try again shortly.");
            println!("======================================================================");
        }
        Err(e) => {
            println!("LOOKUP FAILED");
            println!("  Error: {}", e);
            println!("======================================================================");
        }
    }

    Ok(())
}

/// Subscribe to the live market for ten seconds and print quotes.
async fn cmd_ws_test() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BTC 5M SNIPER - WEBSOCKET TEST");
    println!("======================================================================");

    let config = Config::load()?;
    let resolver = GammaResolver::new(&config.gamma_api_url, &config.market_slug_prefix)?;

    println!("\n1. Resolving live market...");
    let epoch = Epoch::containing(SystemClock.now());
    let market = resolver
        .fetch(epoch)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no market listed for epoch {}", epoch))?;
    println!("   Found: {}", market.title);
    println!("   UP Token: {}", market.up_token_id);
    println!("   DOWN Token: {}", market.down_token_id);

    println!("\n2. Connecting to WebSocket...");
    let (feed, mut quotes) =
        PriceFeed::new(config.polymarket_ws_url.clone(), ReconnectConfig::from_config(&config))
            .spawn();
    feed.subscribe(market.token_ids());

    println!("\n3. Waiting for price changes (10 seconds)...");
    let start = tokio::time::Instant::now();
    let deadline = start + Duration::from_secs(10);
    let mut message_count = 0u32;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            quote = quotes.recv() => match quote {
                Some(quote) => {
                    message_count += 1;
                    let side = market
                        .outcome_of(&quote.token_id)
                        .map(|o| o.to_string())
                        .unwrap_or_else(|| "?".to_string());
                    println!(
                        "   [{:.1}s] {} best ask {}",
                        start.elapsed().as_secs_f64(),
                        side,
                        quote.best_ask
                    );
                }
                None => break,
            }
        }
    }

    println!("\n======================================================================");
    println!("WEBSOCKET TEST COMPLETE");
    println!("  Connection state: {}", feed.state());
    println!("  Quotes received: {}", message_count);
    println!("======================================================================");

    Ok(())
}

/// Redeem all settled positions for the configured wallet.
async fn cmd_claim() -> anyhow::Result<()> {
    let config = load_config()?;

    info!("========================================");
    info!("CLAIM WINNINGS");
    info!("========================================");

    let service = LiveExecutionService::from_config(&config)?;
    let holder = position_holder(&config, service.signer())?;
    let positions = PositionsClient::new(&config.data_api_url)?;
    let executor = OrderExecutor::new(service, &config);

    info!("Wallet: {}", holder);
    info!("Mode: {}", if config.dry_run { "DRY RUN" } else { "LIVE" });

    let summary = claim_all(&positions, &executor, &holder.to_string()).await?;

    info!("========================================");
    info!("Conditions found: {}", summary.found);
    info!("Redeemed: {}", summary.redeemed);
    info!("Failed: {}", summary.failed);
    for tx in &summary.tx_hashes {
        info!("  tx {}", tx);
    }
    info!("========================================");

    Ok(())
}

/// Run the sniper loop until interrupted.
async fn cmd_run(dry_run_override: Option<bool>, port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = load_config()?;

    // Override with CLI args if provided
    if let Some(dry_run) = dry_run_override {
        config.dry_run = dry_run;
    }
    if let Some(port) = port_override {
        config.port = port;
    }

    info!("Configuration loaded successfully");
    info!("Mode: {}", if config.dry_run { "DRY RUN" } else { "LIVE TRADING" });
    info!("Trade size: ${}", config.trade_size_usd);
    info!("Target prices: {}", config.target_prices_display());
    info!(
        "Entry window: {}s .. {}s before close",
        config.entry_seconds_before_expiry, config.min_seconds_before_expiry
    );

    // Metrics
    let mut app_state = AppState::new(config.dry_run);
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => app_state = app_state.with_prometheus(handle),
        Err(e) => warn!("Prometheus exporter unavailable: {}", e),
    }
    metrics::init_metrics();

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());
    let _server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    // Collaborators
    let resolver = GammaResolver::new(&config.gamma_api_url, &config.market_slug_prefix)?;
    let service = LiveExecutionService::from_config(&config)?;
    if !config.dry_run {
        service.authenticate().await?;
    }
    let executor = OrderExecutor::new(service, &config);
    let (feed, quotes) =
        PriceFeed::new(config.polymarket_ws_url.clone(), ReconnectConfig::from_config(&config))
            .spawn();

    let scheduler = Scheduler::new(
        &config,
        resolver,
        feed,
        executor,
        quotes,
        SystemClock,
        app_state,
    );

    info!("Starting sniper...");

    tokio::select! {
        result = scheduler.run() => result?,
        _ = shutdown_signal() => info!("Shutting down"),
    }

    Ok(())
}
