//! Bybit v5 public trade stream wire format.
//!
//! See docs: <https://bybit-exchange.github.io/docs/v5/websocket/public/trade>

use crate::{
    de,
    error::DecodeError,
    trade::{Side, Trade},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Messages received on the trade channel. Anything without a trade payload
/// (subscribe acks, pong frames, ...) is [`FeedMessage::Ignore`].
#[derive(Clone, Debug)]
pub enum FeedMessage {
    Ignore,
    Trades(Vec<TradeEntry>),
}

/// ### Raw Payload Example
/// ```json
/// {
///     "T": 1672304486865,
///     "s": "BTCUSDT",
///     "S": "Buy",
///     "v": "0.001",
///     "p": "16578.50"
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct TradeEntry {
    #[serde(alias = "T", deserialize_with = "de::de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,

    #[serde(rename = "S")]
    pub side: Side,

    #[serde(alias = "v", deserialize_with = "de::de_decimal_str_or_number")]
    pub amount: Decimal,

    #[serde(alias = "p", deserialize_with = "de::de_decimal_str_or_number")]
    pub price: Decimal,
}

impl From<TradeEntry> for Trade {
    fn from(entry: TradeEntry) -> Self {
        Self {
            occurred_at: entry.time,
            side: entry.side,
            quantity: entry.amount,
            price: entry.price,
        }
    }
}

impl<'de> Deserialize<'de> for FeedMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let Some(data) = value.get("data") else {
            return Ok(FeedMessage::Ignore);
        };

        // The feed delivers either a single trade object or a batch; both
        // normalise to a sequence.
        let entries = match data {
            Value::Array(_) => {
                Vec::<TradeEntry>::deserialize(data).map_err(serde::de::Error::custom)?
            }
            Value::Object(_) => {
                vec![TradeEntry::deserialize(data).map_err(serde::de::Error::custom)?]
            }
            _ => return Err(serde::de::Error::custom("unsupported trade payload shape")),
        };

        Ok(FeedMessage::Trades(entries))
    }
}

/// Decode one text frame into the trades it carries. A frame without a
/// trade payload yields an empty sequence.
pub fn decode_frame(text: &str) -> Result<Vec<Trade>, DecodeError> {
    match serde_json::from_str::<FeedMessage>(text)? {
        FeedMessage::Ignore => Ok(Vec::new()),
        FeedMessage::Trades(entries) => Ok(entries.into_iter().map(Trade::from).collect()),
    }
}

/// Subscribe op for the single symbol's trade channel.
pub fn subscribe_op(symbol: &str) -> String {
    serde_json::json!({
        "op": "subscribe",
        "args": [format!("publicTrade.{symbol}")],
    })
    .to_string()
}

/// Application-level ping keeping the connection alive.
pub fn ping_op() -> String {
    serde_json::json!({ "op": "ping" }).to_string()
}
