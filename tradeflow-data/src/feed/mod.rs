//! Streaming connection lifecycle for the single-symbol trade feed.
//!
//! [`FeedConnection::run`] owns the WebSocket for the process lifetime:
//! connect, subscribe, dispatch decoded trades, and reconnect after a fixed
//! delay on any transport failure. The companion [`watchdog`] forces a
//! teardown when the stream goes silent without an explicit error.

pub mod message;
pub mod watchdog;

use crate::{buffer::TradeBuffer, store::RemoteStore, trade::Trade};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message,
};
use tracing::{debug, error, info, warn};

/// Feed connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Stalled,
}

/// Liveness state shared between the connection loop and the watchdog.
///
/// `last_trade_at` moves only on successful trade receipt. It starts at
/// construction time so a connection that never produces a single trade
/// still trips the stall threshold.
#[derive(Debug)]
pub struct FeedHealth {
    state: Mutex<ConnectionState>,
    last_trade_at: Mutex<DateTime<Utc>>,
    connect_attempts: AtomicU64,
}

impl FeedHealth {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
            last_trade_at: Mutex::new(Utc::now()),
            connect_attempts: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    pub fn mark_trade(&self, at: DateTime<Utc>) {
        *self.last_trade_at.lock() = at;
    }

    pub fn last_trade_at(&self) -> DateTime<Utc> {
        *self.last_trade_at.lock()
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> ChronoDuration {
        now - self.last_trade_at()
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    fn record_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for FeedHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Feed connection configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Symbol whose trade channel is subscribed.
    pub symbol: String,
    /// Fixed delay before retrying after a transport failure.
    pub reconnect_delay: Duration,
    /// Application-level ping cadence keeping the connection alive.
    pub ping_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "wss://stream.bybit.com/v5/public/spot".to_string(),
            symbol: "MONUSDT".to_string(),
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(20),
        }
    }
}

impl FeedConfig {
    pub fn new(url: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }
}

/// Destination for every decoded trade: the in-memory buffer, the optional
/// durable store, and the liveness timestamp.
pub struct TradeSink {
    buffer: Arc<TradeBuffer>,
    store: Option<Arc<RemoteStore>>,
    health: Arc<FeedHealth>,
}

impl TradeSink {
    pub fn new(
        buffer: Arc<TradeBuffer>,
        store: Option<Arc<RemoteStore>>,
        health: Arc<FeedHealth>,
    ) -> Self {
        Self {
            buffer,
            store,
            health,
        }
    }

    pub fn record(&self, trade: Trade) {
        self.health.mark_trade(Utc::now());
        if let Some(store) = &self.store {
            if let Err(e) = store.insert(&trade) {
                error!(error = %e, "trade store insert failed");
            }
        }
        self.buffer.record(trade);
    }
}

/// Owns the streaming connection for the process lifetime.
pub struct FeedConnection {
    config: FeedConfig,
    sink: TradeSink,
    health: Arc<FeedHealth>,
    reconnect_rx: mpsc::Receiver<()>,
}

impl FeedConnection {
    pub fn new(
        config: FeedConfig,
        sink: TradeSink,
        health: Arc<FeedHealth>,
        reconnect_rx: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            config,
            sink,
            health,
            reconnect_rx,
        }
    }

    /// Connect-and-stream loop. Never returns on transient errors; only a
    /// process-level shutdown (task drop) ends it. A watchdog-forced
    /// teardown reconnects immediately, skipping the backoff delay.
    pub async fn run(mut self) {
        info!(url = %self.config.url, symbol = %self.config.symbol, "starting trade feed");

        loop {
            self.health.set_state(ConnectionState::Connecting);
            self.health.record_attempt();

            let forced = match connect_async(&self.config.url).await {
                Ok((ws_stream, _)) => self.stream_trades(ws_stream).await,
                Err(e) => {
                    error!(error = %e, "failed to connect trade feed");
                    false
                }
            };

            self.health.set_state(ConnectionState::Disconnected);

            if forced {
                info!("reconnecting immediately after forced teardown");
                continue;
            }

            debug!(delay = ?self.config.reconnect_delay, "waiting before reconnect");
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    /// Subscribe and pump the read loop until the connection dies. Returns
    /// true when teardown was forced by the stall watchdog.
    async fn stream_trades(
        &mut self,
        ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ) -> bool {
        let (mut write, mut read) = ws_stream.split();

        let subscribe = message::subscribe_op(&self.config.symbol);
        if let Err(e) = write.send(Message::Text(subscribe.into())).await {
            error!(error = %e, "failed to subscribe trade channel");
            return false;
        }

        self.health.set_state(ConnectionState::Connected);
        info!(symbol = %self.config.symbol, "trade feed connected");

        let sink = &self.sink;
        let reconnect_rx = &mut self.reconnect_rx;

        // Drop any stale force-reconnect signal from a previous session.
        while reconnect_rx.try_recv().is_ok() {}

        let mut ping = tokio::time::interval(self.config.ping_interval);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ping.tick().await;

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => match message::decode_frame(&text) {
                        Ok(trades) => {
                            for trade in trades {
                                debug!(
                                    side = trade.side.as_str(),
                                    qty = %trade.quantity,
                                    price = %trade.price,
                                    "trade received"
                                );
                                sink.record(trade);
                            }
                        }
                        Err(e) => warn!(error = %e, "dropping malformed trade frame"),
                    },
                    Some(Ok(Message::Close(_))) => {
                        info!("server closed trade feed");
                        return false;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "trade feed transport error");
                        return false;
                    }
                    None => {
                        warn!("trade feed stream ended");
                        return false;
                    }
                },
                _ = ping.tick() => {
                    if let Err(e) = write.send(Message::Text(message::ping_op().into())).await {
                        error!(error = %e, "failed to send feed ping");
                        return false;
                    }
                }
                _ = reconnect_rx.recv() => {
                    warn!("stall watchdog forced reconnect, tearing down connection");
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sink_with(health: Arc<FeedHealth>) -> (TradeSink, Arc<TradeBuffer>) {
        let buffer = Arc::new(TradeBuffer::with_default_retention());
        (
            TradeSink::new(Arc::clone(&buffer), None, health),
            buffer,
        )
    }

    #[test]
    fn test_sink_records_trade_and_refreshes_liveness() {
        let health = Arc::new(FeedHealth::new());
        let stale = Utc::now() - ChronoDuration::hours(1);
        health.mark_trade(stale);

        let (sink, buffer) = sink_with(Arc::clone(&health));
        sink.record(Trade {
            occurred_at: Utc::now(),
            side: crate::trade::Side::Buy,
            quantity: dec!(1),
            price: dec!(2.0),
        });

        assert_eq!(buffer.len(), 1);
        assert!(health.last_trade_at() > stale);
    }

    #[test]
    fn test_single_and_batch_frames_fill_buffer_identically() {
        let single = {
            let (sink, buffer) = sink_with(Arc::new(FeedHealth::new()));
            for trade in message::decode_frame(
                r#"{"data": {"T": 1672304486865, "S": "Buy", "v": "2", "p": "1.05"}}"#,
            )
            .unwrap()
            {
                sink.record(trade);
            }
            buffer.snapshot_since(DateTime::from_timestamp_millis(0).unwrap())
        };

        let batch = {
            let (sink, buffer) = sink_with(Arc::new(FeedHealth::new()));
            for trade in message::decode_frame(
                r#"{"data": [{"T": 1672304486865, "S": "Buy", "v": "2", "p": "1.05"}]}"#,
            )
            .unwrap()
            {
                sink.record(trade);
            }
            buffer.snapshot_since(DateTime::from_timestamp_millis(0).unwrap())
        };

        assert_eq!(single, batch);
        assert_eq!(single.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failures_keep_retrying() {
        let health = Arc::new(FeedHealth::new());
        let (sink, _buffer) = sink_with(Arc::clone(&health));
        let (_reconnect_tx, reconnect_rx) = mpsc::channel(1);

        // Nothing listens here; every attempt fails fast.
        let config = FeedConfig::new("ws://127.0.0.1:9", "MONUSDT")
            .with_reconnect_delay(Duration::from_secs(5));
        let feed = FeedConnection::new(config, sink, Arc::clone(&health), reconnect_rx);
        let task = tokio::spawn(feed.run());

        tokio::time::timeout(Duration::from_secs(120), async {
            while health.connect_attempts() < 3 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("feed stopped retrying after failures");

        assert!(!task.is_finished());
        task.abort();
    }
}
