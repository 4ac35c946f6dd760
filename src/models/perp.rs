use crate::prelude::*;

/// One wallet entry of the futures balance endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct FuturesBalance {
    pub asset: String,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub balance: f64,
}

/// Position-risk row for one symbol. `position_amt` is signed: positive for
/// long, negative for short, zero when flat.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRisk {
    pub symbol: String,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub position_amt: f64,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub entry_price: f64,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub leverage: f64,
    pub margin_type: String,
}

/// Mark/last price answer of the futures price ticker.
#[derive(Clone, Debug, Deserialize)]
pub struct PriceTicker {
    pub symbol: String,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub price: f64,
}

/// One public futures trade; the most recent one doubles as the futures
/// ticker snapshot.
#[derive(Clone, Debug, Deserialize)]
pub struct FuturesTrade {
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub price: f64,
    /// Trade time, milliseconds.
    pub time: i64,
}

/// Last trade snapshot used by the futures strategies for price and
/// staleness checks. Timestamp in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FutureTickerInfo {
    pub last_price: f64,
    pub timestamp: i64,
}

impl From<&FuturesTrade> for FutureTickerInfo {
    fn from(trade: &FuturesTrade) -> Self {
        FutureTickerInfo {
            last_price: trade.price,
            timestamp: trade.time / 1000,
        }
    }
}

/// Acknowledgement of a futures order submission.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesOrderAck {
    pub order_id: u64,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarginType {
    Isolated,
    Crossed,
}

impl MarginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarginType::Isolated => "ISOLATED",
            MarginType::Crossed => "CROSSED",
        }
    }
}

/// Position side from the strategy's point of view; the futures order side is
/// derived from it per intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Order side that opens the position.
    pub fn entry_side(&self) -> Side {
        match self {
            PositionSide::Long => Side::Buy,
            PositionSide::Short => Side::Sell,
        }
    }

    /// Order side that reduces the position.
    pub fn exit_side(&self) -> Side {
        self.entry_side().opposite()
    }
}
