//! Deserialisation helpers for exchange wire formats.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use serde::{Deserialize, Deserializer, de};
use std::str::FromStr;

/// Deserialise a `u64` epoch millisecond timestamp into a `DateTime<Utc>`.
pub fn de_u64_epoch_ms_as_datetime_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    DateTime::from_timestamp_millis(millis as i64)
        .ok_or_else(|| de::Error::custom(format!("epoch millis out of range: {millis}")))
}

/// Deserialise a [`Decimal`] from either a JSON string (`"0.001"`) or a bare
/// JSON number (`0.001`). Bybit quotes quantity and price as strings, but
/// older feed revisions sent plain numbers.
pub fn de_decimal_str_or_number<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MaybeQuoted {
        Text(String),
        Number(f64),
    }

    match MaybeQuoted::deserialize(deserializer)? {
        MaybeQuoted::Text(text) => Decimal::from_str(&text).map_err(de::Error::custom),
        MaybeQuoted::Number(number) => Decimal::from_f64(number)
            .ok_or_else(|| de::Error::custom(format!("unrepresentable number: {number}"))),
    }
}
