//! Rolling in-memory trade retention.

use crate::trade::Trade;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Thread-safe trade store bounded by time rather than count.
///
/// Trades are kept in insertion order (monotonically non-decreasing by
/// arrival, not necessarily by `occurred_at`). After every mutation each
/// retained trade satisfies `occurred_at > now - retention`; a trade exactly
/// at the retention boundary is evicted. Append, eviction and snapshot all
/// run under the same lock, so a snapshot always observes a buffer state
/// that existed at a single instant.
#[derive(Debug)]
pub struct TradeBuffer {
    retention: Duration,
    trades: Mutex<VecDeque<Trade>>,
}

impl TradeBuffer {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            trades: Mutex::new(VecDeque::new()),
        }
    }

    /// 24 hour retention horizon.
    pub fn with_default_retention() -> Self {
        Self::new(Duration::hours(24))
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Append a trade, then evict everything past the retention horizon
    /// computed against the current wall clock.
    pub fn record(&self, trade: Trade) {
        self.record_at(trade, Utc::now());
    }

    /// Append with an explicit clock instant.
    pub fn record_at(&self, trade: Trade, now: DateTime<Utc>) {
        let mut trades = self.trades.lock();
        trades.push_back(trade);
        Self::evict(&mut trades, now - self.retention);
    }

    /// Evict stale entries without inserting.
    pub fn evict_expired(&self) {
        self.evict_expired_at(Utc::now());
    }

    pub fn evict_expired_at(&self, now: DateTime<Utc>) {
        let mut trades = self.trades.lock();
        Self::evict(&mut trades, now - self.retention);
    }

    fn evict(trades: &mut VecDeque<Trade>, cutoff: DateTime<Utc>) {
        // Strict comparison: a trade exactly at the cutoff is dropped.
        trades.retain(|trade| trade.occurred_at > cutoff);
    }

    /// Stable copy of all retained trades with `occurred_at > cutoff`.
    pub fn snapshot_since(&self, cutoff: DateTime<Utc>) -> Vec<Trade> {
        self.trades
            .lock()
            .iter()
            .filter(|trade| trade.occurred_at > cutoff)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.trades.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::Side;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn trade_at(occurred_at: DateTime<Utc>) -> Trade {
        Trade {
            occurred_at,
            side: Side::Buy,
            quantity: dec!(1),
            price: dec!(2.0),
        }
    }

    #[test]
    fn test_retention_invariant() {
        let buffer = TradeBuffer::with_default_retention();
        let now = Utc::now();

        buffer.record_at(trade_at(now - Duration::hours(25)), now);
        buffer.record_at(trade_at(now - Duration::hours(23)), now);
        buffer.record_at(trade_at(now), now);

        assert_eq!(buffer.len(), 2);
        for trade in buffer.snapshot_since(now - Duration::hours(24)) {
            assert!(trade.occurred_at > now - Duration::hours(24));
        }
    }

    #[test]
    fn test_boundary_trade_is_evicted() {
        let buffer = TradeBuffer::with_default_retention();
        let now = Utc::now();

        // Exactly at the 24h cutoff: strict comparison drops it.
        buffer.record_at(trade_at(now - Duration::hours(24)), now);
        assert!(buffer.is_empty());

        buffer.record_at(trade_at(now - Duration::hours(24) + Duration::milliseconds(1)), now);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_independent_eviction() {
        let buffer = TradeBuffer::with_default_retention();
        let now = Utc::now();

        buffer.record_at(trade_at(now - Duration::hours(23)), now);
        assert_eq!(buffer.len(), 1);

        // Two hours later the same trade is past the horizon.
        buffer.evict_expired_at(now + Duration::hours(2));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_snapshot_is_stable_copy() {
        let buffer = TradeBuffer::with_default_retention();
        let now = Utc::now();

        buffer.record_at(trade_at(now - Duration::minutes(5)), now);
        let snapshot = buffer.snapshot_since(now - Duration::hours(24));
        assert_eq!(snapshot.len(), 1);

        buffer.record_at(trade_at(now), now);
        // The earlier snapshot does not alias the live structure.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_snapshot_since_filters() {
        let buffer = TradeBuffer::with_default_retention();
        let now = Utc::now();

        buffer.record_at(trade_at(now - Duration::hours(10)), now);
        buffer.record_at(trade_at(now - Duration::hours(2)), now);

        let recent = buffer.snapshot_since(now - Duration::hours(6));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].occurred_at, now - Duration::hours(2));

        // Cutoff is an open lower bound.
        let at_cutoff = buffer.snapshot_since(now - Duration::hours(2));
        assert!(at_cutoff.is_empty());
    }

    #[test]
    fn test_concurrent_record_and_snapshot() {
        let buffer = Arc::new(TradeBuffer::with_default_retention());
        let writer_buffer = Arc::clone(&buffer);

        let writer = std::thread::spawn(move || {
            let now = Utc::now();
            for _ in 0..1_000 {
                writer_buffer.record_at(trade_at(now), now);
            }
        });

        // Every snapshot must observe a state that existed at one instant:
        // sizes only grow because nothing here is old enough to evict.
        let cutoff = Utc::now() - Duration::hours(1);
        let mut previous = 0;
        while previous < 1_000 {
            let seen = buffer.snapshot_since(cutoff).len();
            assert!(seen >= previous, "snapshot went backwards: {seen} < {previous}");
            previous = previous.max(seen);
            if writer.is_finished() && seen == buffer.len() {
                break;
            }
        }

        writer.join().unwrap();
        assert_eq!(buffer.len(), 1_000);
    }
}
