/// Tradeflow Data - Single-Symbol Trade Flow Monitoring
///
/// This library provides everything the reporter service wires together:
/// - Trade domain types and the rolling 24h in-memory buffer
/// - Windowed flow aggregation and report rendering
/// - The Bybit WebSocket connection lifecycle with stall detection
/// - Wall-clock report scheduling and the heartbeat loop
/// - Email delivery and the optional SQLite trade store
pub mod buffer;
pub mod config;
pub mod de;
pub mod error;
pub mod feed;
pub mod notify;
pub mod report;
pub mod schedule;
pub mod store;
pub mod trade;

// Re-export commonly used types for convenience
pub use buffer::TradeBuffer;
pub use config::{Config, ReportSource, SmtpConfig};
pub use feed::{ConnectionState, FeedConfig, FeedConnection, FeedHealth, TradeSink};
pub use notify::{EmailNotifier, Notifier};
pub use report::{AggregationWindow, FlowReport, TradeSource, aggregate, window_for_hour};
pub use schedule::ReportSchedule;
pub use store::RemoteStore;
pub use trade::{Side, Trade};
