//! Silent-stall detection for the trade feed.
//!
//! A WebSocket can die without an explicit transport error; the watchdog
//! treats "no trades for longer than the threshold while nominally
//! connected" as a liveness failure and forces a reconnect.

use super::{ConnectionState, FeedHealth};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::{debug, warn};

/// Check liveness on a fixed tick, forever. The reconnect signal is a
/// non-blocking one-shot: if the channel is full or closed a teardown is
/// already in flight and the send is a no-op.
pub async fn run_stall_watchdog(
    health: Arc<FeedHealth>,
    reconnect_tx: mpsc::Sender<()>,
    tick: Duration,
    threshold: Duration,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        check_stall(&health, &reconnect_tx, threshold);
    }
}

pub(crate) fn check_stall(
    health: &FeedHealth,
    reconnect_tx: &mpsc::Sender<()>,
    threshold: Duration,
) {
    if health.state() != ConnectionState::Connected {
        return;
    }

    let idle = health.idle_for(Utc::now());
    if idle.to_std().map(|idle| idle > threshold).unwrap_or(false) {
        warn!(
            idle_secs = idle.num_seconds(),
            "trade feed stalled, forcing reconnect"
        );
        health.set_state(ConnectionState::Stalled);
        let _ = reconnect_tx.try_send(());
    } else {
        debug!(idle_secs = idle.num_seconds(), "trade feed alive");
    }
}
