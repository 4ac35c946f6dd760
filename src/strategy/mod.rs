mod abd;
mod adt;
mod alt_book;
mod bfdt;
mod bfht;
mod bfwht;
mod bmt;

pub use abd::*;
pub use adt::*;
pub use alt_book::*;
pub use bfdt::*;
pub use bfht::*;
pub use bfwht::*;
pub use bmt::*;

use crate::errors::Result;
use crate::exchange::{FuturesExchange, SpotExchange};
use crate::models::{CancelSpec, OcoOrder, PositionSide, Symbol};
use crate::pivot::Pivot;
use crate::telemetry::{BalanceSnapshot, Recorder};
use crate::util::{now_secs, round_to};
use log::{info, warn};

/// Spot macro bias of the BTC leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BtcStatus {
    Init,
    Buy,
    Sell,
}

/// Futures position state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FutureStatus {
    Init,
    Long,
    Short,
}

/// Quote asset the pair-rotation strategy currently trades its alts against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BasePair {
    Init,
    Btc,
    Usdt,
}

impl BasePair {
    pub fn asset(&self) -> Option<&'static str> {
        match self {
            BasePair::Init => None,
            BasePair::Btc => Some("BTC"),
            BasePair::Usdt => Some("USDT"),
        }
    }
}

/// Book entry for an open spot position with its protective orders.
#[derive(Clone, Copy, Debug, Default)]
pub struct TradingAlt {
    /// Initial fill baseline the order portions are derived from.
    pub total_quantity: f64,
    /// Cumulative quantity executed by the stop legs.
    pub s1_quantity: f64,
    pub r2_filled: bool,
    pub r3_filled: bool,
    /// Plain stop-limit on the remainder portion; zero until placed.
    pub stop_order_id: u64,
    pub r2_order: OcoOrder,
    pub r3_order: OcoOrder,
}

/// Book entry for an in-flight pivot-P limit buy.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenAlt {
    pub order_id: u64,
    pub timestamp: i64,
}

/// A ticker snapshot older than this is treated as stale and the step skips.
pub const STALE_TICKER_SECS: i64 = 3600;

pub(crate) fn ticker_is_stale(ticker_timestamp: i64) -> bool {
    now_secs() - STALE_TICKER_SECS > ticker_timestamp
}

/// Shutdown hook body shared by the spot strategies: up to five cancel-all
/// sweeps, stopping at the first that goes through.
pub(crate) async fn cancel_all_with_retries<E: SpotExchange>(exchange: &E, name: &str) {
    for attempt in 1..=5 {
        match exchange.cancel_all_orders(CancelSpec::ALL).await {
            Ok(_) => return,
            Err(err) => warn!("{name}: shutdown cancel-all attempt {attempt} failed: {err}"),
        }
    }
}

/// Futures counterpart: sweep the perp's order book on shutdown.
pub(crate) async fn cancel_all_futures_with_retries<E: FuturesExchange>(
    exchange: &E,
    symbol: &Symbol,
    name: &str,
) {
    for attempt in 1..=5 {
        match exchange.cancel_all_future_orders(symbol).await {
            Ok(()) => return,
            Err(err) => warn!("{name}: shutdown cancel-all attempt {attempt} failed: {err}"),
        }
    }
}

/// Take-profit level for a fresh futures position: the next R (long) or S
/// (short) ring beyond the last price, capped at `outer_ratio` away when the
/// rings are exceeded or too far.
pub(crate) fn profit_limit_price(
    side: PositionSide,
    last_price: f64,
    pivot: &Pivot,
    outer_ratio: f64,
) -> f64 {
    match side {
        PositionSide::Long => {
            let mut limit_price = 0.0;
            if last_price < pivot.r1 {
                limit_price = pivot.r1;
            } else if last_price < pivot.r2 {
                limit_price = pivot.r2;
            } else if last_price < pivot.r3 {
                limit_price = pivot.r3;
            }
            let outer = last_price * (1.0 + outer_ratio);
            if limit_price == 0.0 || limit_price > outer {
                outer
            } else {
                limit_price
            }
        }
        PositionSide::Short => {
            let mut limit_price = 0.0;
            if last_price > pivot.s1 {
                limit_price = pivot.s1;
            } else if last_price > pivot.s2 {
                limit_price = pivot.s2;
            } else if last_price > pivot.s3 {
                limit_price = pivot.s3;
            }
            let outer = last_price * (1.0 - outer_ratio);
            if limit_price == 0.0 || limit_price < outer {
                outer
            } else {
                limit_price
            }
        }
    }
}

/// Daily balance snapshot of the spot wallet, valued in USDT and BTC.
/// `extra_usdt_value` carries whatever else the strategy wants counted
/// (alt positions, futures wallet).
pub(crate) async fn record_balance_snapshot<E: SpotExchange>(
    exchange: &E,
    recorder: &Recorder,
    extra_usdt_value: f64,
    leverage: Option<u8>,
) -> Result<()> {
    info!("Record trading bot information");
    exchange.update_ticker_data().await?;
    let btc_price = exchange
        .ticker_statistics(&Symbol::btc_usdt(), false)
        .await?
        .last_price;
    let mut usdt_balance = extra_usdt_value;
    usdt_balance += exchange.balance("BTC").await?.total * btc_price;
    usdt_balance += exchange.balance("USDT").await?.total;
    let btc_balance = round_to(usdt_balance / btc_price, 3);
    recorder.append(&BalanceSnapshot::now(btc_balance, usdt_balance, leverage))?;
    info!("Estimated balance in BTC: {btc_balance}");
    info!("Estimated balance in USDT: {usdt_balance}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivot::pivot_levels;

    #[test]
    fn profit_price_picks_next_ring() {
        let pivot = pivot_levels(120.0, 80.0, 100.0);
        // Below R1: target R1.
        assert_eq!(
            profit_limit_price(PositionSide::Long, pivot.p + 1.0, &pivot, 0.14),
            pivot.r1
        );
        // Between R1 and R2: target R2.
        assert_eq!(
            profit_limit_price(PositionSide::Long, pivot.r1 + 1.0, &pivot, 0.14),
            pivot.r2
        );
        // Beyond R3: capped at the outer ratio.
        let last = pivot.r3 + 10.0;
        assert_eq!(
            profit_limit_price(PositionSide::Long, last, &pivot, 0.14),
            last * 1.14
        );
    }

    #[test]
    fn profit_price_short_mirrors() {
        let pivot = pivot_levels(120.0, 80.0, 100.0);
        assert_eq!(
            profit_limit_price(PositionSide::Short, pivot.p - 1.0, &pivot, 0.14),
            pivot.s1
        );
        let last = pivot.s3 - 10.0;
        assert_eq!(
            profit_limit_price(PositionSide::Short, last, &pivot, 0.14),
            last * 0.86
        );
    }
}
