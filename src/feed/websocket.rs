//! WebSocket client for the Polymarket CLOB market channel.
//!
//! The connection runs in its own task and publishes [`PriceQuote`]s on a
//! channel. The desired token set is held as data in a watch channel:
//! changing it on a live connection re-sends only the subscription message,
//! and every reconnect re-subscribes with the latest set.
//!
//! Features:
//! - Fixed-delay reconnection, unbounded
//! - Text `PING` keep-alive with an inbound heartbeat deadline
//! - Handshake timeout
//! - SmallVec batches for multi-change frames

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use strum::Display;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::types::{parse_price_changes, PriceQuote, SubscribeMessage};
use crate::config::Config;
use crate::error::WsError;
use crate::metrics;

/// Capacity of the quote channel.
const QUOTE_CHANNEL_CAPACITY: usize = 1000;

/// Ping intervals without any inbound frame before the session is dropped.
const HEARTBEAT_MISSES: u32 = 3;

/// Reconnection configuration for the feed.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Fixed delay between a disconnect and the next connection attempt.
    pub delay: Duration,
    /// Keep-alive ping interval.
    pub ping_interval: Duration,
    /// Upper bound on TCP connect plus websocket handshake.
    pub connect_timeout: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(2000),
            ping_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ReconnectConfig {
    /// Create from config values.
    pub fn from_config(config: &Config) -> Self {
        Self {
            delay: config.reconnect_delay(),
            ping_interval: Duration::from_secs(config.ws_ping_interval_s.max(1)),
            connect_timeout: Duration::from_secs(config.ws_connect_timeout_s.max(1)),
        }
    }

    /// How long a session may go without any inbound frame.
    pub fn heartbeat_timeout(&self) -> Duration {
        self.ping_interval * HEARTBEAT_MISSES
    }
}

/// WebSocket connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected, possibly waiting out the reconnect delay.
    Disconnected,
    /// Attempting to connect.
    Connecting,
    /// Connected and subscription message sent.
    Subscribed,
}

/// Requests a token subscription from a running feed.
pub trait FeedControl: Send + Sync {
    /// Replace the subscribed token set.
    fn subscribe(&self, tokens: Vec<String>);
}

/// Owner-side handle of a running feed task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct FeedHandle {
    subscription: watch::Sender<Vec<String>>,
    state: watch::Receiver<ConnectionState>,
}

impl FeedHandle {
    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Currently requested token set.
    pub fn tokens(&self) -> Vec<String> {
        self.subscription.borrow().clone()
    }
}

impl FeedControl for FeedHandle {
    fn subscribe(&self, tokens: Vec<String>) {
        let changed = self.subscription.send_if_modified(|current| {
            if *current == tokens {
                false
            } else {
                *current = tokens;
                true
            }
        });
        if changed {
            debug!(tokens = ?self.subscription.borrow(), "Subscription set updated");
        }
    }
}

/// Why a connection session ended.
enum SessionEnd {
    /// Handle or quote receiver dropped; stop for good.
    Shutdown,
    /// Connection lost; reconnect after the delay.
    Disconnected(WsError),
}

/// Market channel price feed.
pub struct PriceFeed {
    url: String,
    reconnect: ReconnectConfig,
}

impl PriceFeed {
    /// Create a feed for the market channel at `url`.
    pub fn new(url: impl Into<String>, reconnect: ReconnectConfig) -> Self {
        Self {
            url: url.into(),
            reconnect,
        }
    }

    /// Spawn the connection task. It idles until a token set is subscribed.
    pub fn spawn(self) -> (FeedHandle, mpsc::Receiver<PriceQuote>) {
        let (quote_tx, quote_rx) = mpsc::channel(QUOTE_CHANNEL_CAPACITY);
        let (sub_tx, sub_rx) = watch::channel(Vec::new());
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        tokio::spawn(self.run(sub_rx, state_tx, quote_tx));

        (
            FeedHandle {
                subscription: sub_tx,
                state: state_rx,
            },
            quote_rx,
        )
    }

    async fn run(
        self,
        mut subs: watch::Receiver<Vec<String>>,
        state: watch::Sender<ConnectionState>,
        quotes: mpsc::Sender<PriceQuote>,
    ) {
        loop {
            if quotes.is_closed() {
                debug!("Quote receiver dropped, stopping");
                return;
            }

            let tokens = loop {
                let tokens = subs.borrow_and_update().clone();
                if !tokens.is_empty() {
                    break tokens;
                }
                if subs.changed().await.is_err() {
                    debug!("Feed handle dropped, stopping");
                    return;
                }
            };

            state.send_replace(ConnectionState::Connecting);
            info!(url = %self.url, assets = tokens.len(), "Connecting to market channel");

            let connecting = connect_async(self.url.as_str());
            match tokio::time::timeout(self.reconnect.connect_timeout, connecting).await {
                Ok(Ok((ws_stream, _))) => {
                    match self
                        .session(ws_stream, tokens, &mut subs, &state, &quotes)
                        .await
                    {
                        SessionEnd::Shutdown => {
                            state.send_replace(ConnectionState::Disconnected);
                            info!("Price feed stopped");
                            return;
                        }
                        SessionEnd::Disconnected(e) => {
                            warn!(error = %e, "Market channel disconnected");
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Market channel connection failed");
                }
                Err(_) => {
                    let e = WsError::ConnectTimeout(self.reconnect.connect_timeout);
                    warn!(error = %e, "Market channel connection failed");
                }
            }

            state.send_replace(ConnectionState::Disconnected);
            metrics::inc_feed_reconnects();

            info!(delay_ms = self.reconnect.delay.as_millis() as u64, "Reconnecting after delay");
            tokio::time::sleep(self.reconnect.delay).await;
        }
    }

    async fn session<S>(
        &self,
        ws_stream: S,
        tokens: Vec<String>,
        subs: &mut watch::Receiver<Vec<String>>,
        state: &watch::Sender<ConnectionState>,
        quotes: &mpsc::Sender<PriceQuote>,
    ) -> SessionEnd
    where
        S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
            + Unpin,
    {
        let (mut write, mut read) = ws_stream.split();
        let mut current = tokens;

        if let Err(e) = send_subscription(&mut write, &current).await {
            return SessionEnd::Disconnected(e);
        }
        state.send_replace(ConnectionState::Subscribed);
        info!(assets = ?current, "Subscribed to market channel");

        let period = self.reconnect.ping_interval;
        let heartbeat_timeout = self.reconnect.heartbeat_timeout();
        let mut ping = interval_at(Instant::now() + period, period);
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                changed = subs.changed() => {
                    if changed.is_err() {
                        let _ = write.close().await;
                        return SessionEnd::Shutdown;
                    }
                    let next = subs.borrow_and_update().clone();
                    if next.is_empty() || next == current {
                        continue;
                    }
                    current = next;
                    if let Err(e) = send_subscription(&mut write, &current).await {
                        return SessionEnd::Disconnected(e);
                    }
                    info!(assets = ?current, "Re-subscribed on open connection");
                }
                msg = read.next() => {
                    if matches!(msg, Some(Ok(_))) {
                        last_inbound = Instant::now();
                    }
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            for quote in parse_price_changes(&text, &current) {
                                metrics::inc_quotes_received();
                                if quotes.send(quote).await.is_err() {
                                    let _ = write.close().await;
                                    return SessionEnd::Shutdown;
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return SessionEnd::Disconnected(WsError::ConnectionFailed(format!(
                                "closed by server: {:?}",
                                frame
                            )));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return SessionEnd::Disconnected(e.into()),
                        None => {
                            return SessionEnd::Disconnected(WsError::ConnectionFailed(
                                "stream ended".to_string(),
                            ));
                        }
                    }
                }
                _ = ping.tick() => {
                    if last_inbound.elapsed() > heartbeat_timeout {
                        return SessionEnd::Disconnected(WsError::HeartbeatTimeout(heartbeat_timeout));
                    }
                    if let Err(e) = write.send(Message::Text("PING".to_string())).await {
                        return SessionEnd::Disconnected(WsError::SendFailed(e.to_string()));
                    }
                }
            }
        }
    }
}

async fn send_subscription<W>(write: &mut W, tokens: &[String]) -> Result<(), WsError>
where
    W: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let payload = SubscribeMessage::market(tokens)
        .to_json()
        .map_err(|e| WsError::SendFailed(e.to_string()))?;

    write
        .send(Message::Text(payload))
        .await
        .map_err(|e| WsError::SendFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_config_uses_fixed_delay() {
        let config = ReconnectConfig::from_config(&crate::config::tests::test_config());
        assert_eq!(config.delay, Duration::from_millis(2000));
        assert_eq!(config.ping_interval, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.heartbeat_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn connection_state_display() {
        assert_eq!(ConnectionState::Subscribed.to_string(), "subscribed");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
    }

    #[tokio::test]
    async fn handle_ignores_identical_subscriptions() {
        let (sub_tx, mut sub_rx) = watch::channel(Vec::new());
        let (_state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let handle = FeedHandle {
            subscription: sub_tx,
            state: state_rx,
        };

        handle.subscribe(vec!["a".to_string(), "b".to_string()]);
        assert!(sub_rx.has_changed().unwrap());
        sub_rx.borrow_and_update();

        handle.subscribe(vec!["a".to_string(), "b".to_string()]);
        assert!(!sub_rx.has_changed().unwrap());
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn feed_idles_until_first_subscription() {
        let (handle, _quotes) =
            PriceFeed::new("ws://127.0.0.1:9", ReconnectConfig::default()).spawn();
        tokio::task::yield_now().await;
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(handle.tokens().is_empty());
    }
}
