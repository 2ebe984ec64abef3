use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Aggressor side of an executed trade.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" => Ok(Side::Buy),
            "Sell" => Ok(Side::Sell),
            other => Err(format!("unknown trade side: {other}")),
        }
    }
}

/// One executed transaction reported by the feed.
///
/// `occurred_at` is the feed-reported execution time normalised to UTC, not
/// the local receive time. Quantity and price are exact decimals so volume
/// sums do not drift over thousands of trades.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Trade {
    pub occurred_at: DateTime<Utc>,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl Trade {
    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_round_trip() {
        assert_eq!("Buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("Sell".parse::<Side>().unwrap(), Side::Sell);
        assert!("Unknown".parse::<Side>().is_err());
        assert_eq!(Side::Buy.as_str(), "Buy");
        assert_eq!(Side::Sell.as_str(), "Sell");
    }

    #[test]
    fn test_trade_notional() {
        let trade = Trade {
            occurred_at: Utc::now(),
            side: Side::Sell,
            quantity: dec!(5),
            price: dec!(2.1),
        };
        assert_eq!(trade.notional(), dec!(10.5));
    }
}
