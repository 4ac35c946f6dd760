use crate::prelude::*;

/// One row of the 24h ticker statistics endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub last_price: f64,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub bid_price: f64,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub ask_price: f64,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub quote_volume: f64,
    /// Statistics window close, milliseconds.
    pub close_time: i64,
}

/// Immutable per-symbol snapshot combining the live ticker with the listing
/// filters. Refetched on demand, never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct TickerInfo {
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub quote_volume: f64,
    /// Server time of the snapshot, seconds.
    pub timestamp: i64,
    pub internal_symbol: String,
    pub tick_size: f64,
    pub step_size: f64,
}

/// The slice of the 24h statistics the strategies screen with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickerStats {
    pub last_price: f64,
    pub quote_volume: f64,
}

impl From<&Ticker24h> for TickerStats {
    fn from(ticker: &Ticker24h) -> Self {
        TickerStats {
            last_price: ticker.last_price,
            quote_volume: ticker.quote_volume,
        }
    }
}
