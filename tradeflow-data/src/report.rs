//! Windowed flow aggregation and report rendering.

use crate::trade::{Side, Trade};
use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// The closed-open interval `[reference - span, reference)` a report covers,
/// plus the label and frequency normalisation base it is rendered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationWindow {
    pub span: Duration,
    pub label: &'static str,
    pub base_minutes: i64,
}

/// Select the aggregation window from the local wall-clock hour of the
/// evaluation time. The 06:00 report covers the night session, the 18:00
/// report the day session; any other hour falls back to a full day.
pub fn window_for_hour(hour: u32) -> AggregationWindow {
    match hour {
        6 => AggregationWindow {
            span: Duration::hours(6),
            label: "past 6 hours (00:00 to 06:00)",
            base_minutes: 6 * 60,
        },
        18 => AggregationWindow {
            span: Duration::hours(18),
            label: "past 18 hours (00:00 to 18:00)",
            base_minutes: 18 * 60,
        },
        _ => AggregationWindow {
            span: Duration::hours(24),
            label: "fallback: past 24 hours",
            base_minutes: 24 * 60,
        },
    }
}

/// Aggregate flow statistics for one reporting window.
///
/// All volumes are two-decimal fixed point; `activity_ratio` is the
/// percentage of minute buckets inside the window containing at least one
/// trade, also at two decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowReport {
    pub generated_at: DateTime<Tz>,
    pub window_label: &'static str,
    pub buy_volume: Decimal,
    pub sell_volume: Decimal,
    pub notional_volume: Decimal,
    pub activity_ratio: Decimal,
    pub trade_count: usize,
}

impl FlowReport {
    pub fn subject(&self, symbol: &str) -> String {
        format!("Bybit {symbol} Flow Report")
    }

    pub fn body(&self) -> String {
        format!(
            "Time: {}\n{}\n\n\
             Buy Volume: {}\n\
             Sell Volume: {}\n\
             Notional Volume: {}\n\
             Trading Frequency: {}%",
            self.generated_at.format("%Y-%m-%d %H:%M:%S %Z"),
            self.window_label,
            self.buy_volume,
            self.sell_volume,
            self.notional_volume,
            self.activity_ratio,
        )
    }
}

/// A source of trades for the aggregation pass, chosen once at startup.
pub trait TradeSource: Send + Sync {
    /// All known trades with `occurred_at > cutoff`.
    fn trades_since(&self, cutoff: DateTime<Utc>) -> Vec<Trade>;
}

impl TradeSource for crate::buffer::TradeBuffer {
    fn trades_since(&self, cutoff: DateTime<Utc>) -> Vec<Trade> {
        self.snapshot_since(cutoff)
    }
}

/// Pure aggregation over a trade slice for the window implied by
/// `reference`'s local hour. An empty window produces an all-zero report.
pub fn aggregate(trades: &[Trade], reference: DateTime<Tz>) -> FlowReport {
    let window = window_for_hour(reference.hour());
    let cutoff = reference.with_timezone(&Utc) - window.span;

    let mut buy_volume = Decimal::ZERO;
    let mut sell_volume = Decimal::ZERO;
    let mut notional_volume = Decimal::ZERO;
    let mut active_minutes: HashSet<i64> = HashSet::new();
    let mut trade_count = 0;

    for trade in trades.iter().filter(|trade| trade.occurred_at > cutoff) {
        match trade.side {
            Side::Buy => buy_volume += trade.quantity,
            Side::Sell => sell_volume += trade.quantity,
        }
        notional_volume += trade.notional();
        active_minutes.insert(trade.occurred_at.timestamp().div_euclid(60));
        trade_count += 1;
    }

    let activity_ratio = Decimal::from(active_minutes.len() as i64)
        / Decimal::from(window.base_minutes)
        * Decimal::from(100);

    FlowReport {
        generated_at: reference,
        window_label: window.label,
        buy_volume: fixed_2dp(buy_volume),
        sell_volume: fixed_2dp(sell_volume),
        notional_volume: fixed_2dp(notional_volume),
        activity_ratio: fixed_2dp(activity_ratio),
        trade_count,
    }
}

/// Round to two decimal places and pin the rendered scale, so `13` reports
/// as `13.00` and `0` as `0.00`.
fn fixed_2dp(value: Decimal) -> Decimal {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value
}
