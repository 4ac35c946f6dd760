use crate::api::{Futures, API};
use crate::client::Client;
use crate::errors::{BinanceError, Result};
use crate::models::{
    FutureTickerInfo, FuturesBalance, FuturesOrderAck, FuturesTrade, Interval, Kline, MarginType,
    OrderType, PositionRisk, PositionSide, PriceTicker, Symbol,
};
use crate::pivot::{self, Pivot};
use crate::trade::Trader;
use crate::util::{build_request, round_to, snap_to_increment};
use log::info;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::BTreeMap;

/// Hard-coded BTCUSDT perpetual filters; the futures leg trades nothing else.
pub const FUTURES_BTC_TICK_SIZE: f64 = 0.01;
pub const FUTURES_BTC_MIN_QTY: f64 = 0.001;
pub const FUTURES_BTC_MAX_QTY: f64 = 1000.0;

/// One maintenance-margin bracket of the leveraged-notional ladder.
#[derive(Clone, Copy, Debug)]
pub struct LeverageBracket {
    pub notional_cap: f64,
    pub maintenance_margin_rate: f64,
    pub maintenance_amount: f64,
}

/// Bracket ladder for BTCUSDT isolated positions, smallest notional first.
pub static LEVERAGE_BRACKETS: Lazy<Vec<LeverageBracket>> = Lazy::new(|| {
    vec![
        LeverageBracket {
            notional_cap: 50_000.0,
            maintenance_margin_rate: 0.004,
            maintenance_amount: 0.0,
        },
        LeverageBracket {
            notional_cap: 250_000.0,
            maintenance_margin_rate: 0.005,
            maintenance_amount: 50.0,
        },
        LeverageBracket {
            notional_cap: 1_000_000.0,
            maintenance_margin_rate: 0.01,
            maintenance_amount: 1_300.0,
        },
        LeverageBracket {
            notional_cap: 5_000_000.0,
            maintenance_margin_rate: 0.025,
            maintenance_amount: 16_300.0,
        },
    ]
});

/// Isolated-margin liquidation price for a position of `quantity` contracts
/// entered at `entry_price` with `wallet_balance` as collateral.
///
/// `liq = (B + MA - d*Q*P) / (Q * (MMR - d))` with `d = +1` long, `-1`
/// short; `(MMR, MA)` come from the notional bracket. Notional above the top
/// bracket is a domain error.
pub fn liquidation_price(
    entry_price: f64,
    quantity: f64,
    wallet_balance: f64,
    side: PositionSide,
) -> Result<f64> {
    let notional = quantity * entry_price;
    let bracket = LEVERAGE_BRACKETS
        .iter()
        .find(|bracket| notional <= bracket.notional_cap)
        .ok_or_else(|| {
            BinanceError::Unexpected(format!("notional {notional} above the top leverage bracket"))
        })?;
    let direction = match side {
        PositionSide::Long => 1.0,
        PositionSide::Short => -1.0,
    };
    Ok(
        (wallet_balance + bracket.maintenance_amount - direction * quantity * entry_price)
            / (quantity * (bracket.maintenance_margin_rate - direction)),
    )
}

/// Sizes a position so its liquidation price sits on the safe side of the
/// strategy's SR2 level, making leverage implicit in the risk plan.
///
/// Walks leverage 1..=125, sizing `Q = round(L*B/P, 3)`, and returns the
/// largest `(L, Q)` whose liquidation price does not cross SR2 (at or below
/// for longs, at or above for shorts).
pub fn sr2_leverage(
    entry_price: f64,
    sr2: f64,
    wallet_balance: f64,
    side: PositionSide,
) -> Result<(u8, f64)> {
    let mut best: Option<(u8, f64)> = None;
    for leverage in 1..=125u8 {
        let quantity = round_to(leverage as f64 * wallet_balance / entry_price, 3);
        if quantity <= 0.0 {
            continue;
        }
        let liquidation = match liquidation_price(entry_price, quantity, wallet_balance, side) {
            Ok(price) => price,
            // Notional walked off the bracket ladder; nothing larger fits.
            Err(_) => break,
        };
        let safe = match side {
            PositionSide::Long => liquidation <= sr2,
            PositionSide::Short => liquidation >= sr2,
        };
        if safe {
            best = Some((leverage, quantity));
        }
    }
    best.ok_or_else(|| {
        BinanceError::Unexpected(format!(
            "no leverage keeps liquidation on the safe side of {sr2}"
        ))
    })
}

/// Futures order manager for the USDT-margined perpetual. Embeds the spot
/// [`Trader`] the way the futures strategies also read spot balances and
/// tickers.
#[derive(Clone)]
pub struct FuturesTrader {
    pub client: Client,
    pub recv_window: u64,
    pub spot: Trader,
}

impl FuturesTrader {
    pub(crate) fn from_parts(client: Client, spot: Trader, recv_window: u64) -> Self {
        FuturesTrader {
            client,
            recv_window,
            spot,
        }
    }

    pub async fn get_future_ohlcv(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: Option<u16>,
    ) -> Result<Vec<Kline>> {
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("interval".into(), interval.as_str().into());
        if let Some(limit) = limit {
            parameters.insert("limit".into(), limit.to_string());
        }
        let request = build_request(&parameters);
        let rows: Vec<Value> = self
            .client
            .get(API::Futures(Futures::Klines), Some(request))
            .await?;
        crate::models::parse_klines(&rows)
    }

    pub async fn get_future_monthly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        let monthly = self.get_future_ohlcv(symbol, Interval::Month1, Some(5)).await?;
        Ok(pivot::previous_candle_pivot(&monthly))
    }

    pub async fn get_future_weekly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        let weekly = self.get_future_ohlcv(symbol, Interval::Week1, Some(5)).await?;
        Ok(pivot::previous_candle_pivot(&weekly))
    }

    pub async fn get_future_daily_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        let daily = self.get_future_ohlcv(symbol, Interval::Day1, Some(5)).await?;
        Ok(pivot::previous_candle_pivot(&daily))
    }

    /// Pivot anchored on `hours`-wide buckets, aggregated locally so the
    /// bucketing matches the strategy's own clock even off the exchange's
    /// native widths.
    pub async fn get_future_hourly_pivot(&self, symbol: &Symbol, hours: u32) -> Result<Option<Pivot>> {
        let hourly = self
            .get_future_ohlcv(symbol, Interval::Hour1, Some((hours * 6) as u16))
            .await?;
        let aggregated = pivot::aggregate_hours(&hourly, hours);
        Ok(pivot::previous_candle_pivot(&aggregated))
    }

    pub async fn get_last_price(&self, symbol: &Symbol) -> Result<f64> {
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        let request = build_request(&parameters);
        let ticker: PriceTicker = self
            .client
            .get(API::Futures(Futures::TickerPrice), Some(request))
            .await?;
        Ok(ticker.price)
    }

    /// Most recent public trade, doubling as the futures ticker snapshot for
    /// price and staleness checks.
    pub async fn get_future_ticker_info(&self, symbol: &Symbol) -> Result<FutureTickerInfo> {
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("limit".into(), "20".into());
        let request = build_request(&parameters);
        let trades: Vec<FuturesTrade> = self
            .client
            .get(API::Futures(Futures::RecentTrades), Some(request))
            .await?;
        trades
            .last()
            .map(FutureTickerInfo::from)
            .ok_or_else(|| BinanceError::Unexpected(format!("{symbol}: no recent futures trades")))
    }

    /// USDT wallet balance of the futures account.
    pub async fn get_future_balance(&self) -> Result<f64> {
        let balances: Vec<FuturesBalance> = self
            .client
            .get_signed(
                API::Futures(Futures::Balance),
                self.recv_window,
                BTreeMap::new(),
            )
            .await?;
        Ok(balances
            .iter()
            .find(|balance| balance.asset == "USDT")
            .map(|balance| balance.balance)
            .unwrap_or(0.0))
    }

    pub async fn set_leverage(&self, symbol: &Symbol, leverage: u8) -> Result<()> {
        if !(1..=125).contains(&leverage) {
            return Err(BinanceError::Unexpected(format!(
                "leverage {leverage} outside 1..=125"
            )));
        }
        info!("{symbol}: set leverage to {leverage}");
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("leverage".into(), leverage.to_string());
        let _: Value = self
            .client
            .post_signed(API::Futures(Futures::Leverage), self.recv_window, parameters)
            .await?;
        Ok(())
    }

    /// Switches the margin mode; already being in the requested mode is a
    /// no-op (the exchange answers code -4046).
    pub async fn set_margin_type(&self, symbol: &Symbol, margin_type: MarginType) -> Result<()> {
        info!("{symbol}: set margin type to {}", margin_type.as_str());
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("marginType".into(), margin_type.as_str().into());
        let result: Result<Value> = self
            .client
            .post_signed(
                API::Futures(Futures::MarginType),
                self.recv_window,
                parameters,
            )
            .await;
        margin_type_outcome(result)
    }

    /// Places a futures order. Quantity and prices snap to the hard-coded
    /// BTCUSDT filters; quantities outside the lot bounds are rejected.
    pub async fn create_future_order(
        &self,
        symbol: &Symbol,
        side: crate::models::Side,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
        stop_price: Option<f64>,
        reduce_only: bool,
    ) -> Result<FuturesOrderAck> {
        let quantity = snap_to_increment(quantity, FUTURES_BTC_MIN_QTY);
        if quantity < FUTURES_BTC_MIN_QTY || quantity > FUTURES_BTC_MAX_QTY {
            return Err(BinanceError::InvalidOrder(format!(
                "quantity {quantity} outside [{FUTURES_BTC_MIN_QTY}, {FUTURES_BTC_MAX_QTY}]"
            )));
        }
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("side".into(), side.as_str().into());
        parameters.insert("quantity".into(), quantity.to_string());
        if reduce_only {
            parameters.insert("reduceOnly".into(), "true".into());
        }
        match order_type {
            OrderType::Market => {
                parameters.insert("type".into(), OrderType::Market.as_str().into());
            }
            OrderType::Limit => {
                let price = price.ok_or_else(|| {
                    BinanceError::Unexpected("limit order requires a price".into())
                })?;
                parameters.insert("type".into(), OrderType::Limit.as_str().into());
                parameters.insert(
                    "price".into(),
                    snap_to_increment(price, FUTURES_BTC_TICK_SIZE).to_string(),
                );
                parameters.insert("timeInForce".into(), "GTC".into());
            }
            OrderType::Stop => {
                let price = price.ok_or_else(|| {
                    BinanceError::Unexpected("stop order requires a price".into())
                })?;
                let stop_price = stop_price.ok_or_else(|| {
                    BinanceError::Unexpected("stop order requires a stop price".into())
                })?;
                parameters.insert("type".into(), OrderType::Stop.as_str().into());
                parameters.insert(
                    "price".into(),
                    snap_to_increment(price, FUTURES_BTC_TICK_SIZE).to_string(),
                );
                parameters.insert(
                    "stopPrice".into(),
                    snap_to_increment(stop_price, FUTURES_BTC_TICK_SIZE).to_string(),
                );
            }
            OrderType::StopMarket => {
                let stop_price = stop_price.ok_or_else(|| {
                    BinanceError::Unexpected("stop-market order requires a stop price".into())
                })?;
                parameters.insert("type".into(), OrderType::StopMarket.as_str().into());
                parameters.insert(
                    "stopPrice".into(),
                    snap_to_increment(stop_price, FUTURES_BTC_TICK_SIZE).to_string(),
                );
            }
            other => {
                return Err(BinanceError::Unexpected(format!(
                    "unsupported futures order type: {other:?}"
                )))
            }
        }
        info!(
            "Create futures order: {symbol}, {side:?}, {:?}, quantity={quantity}, \
             reduce_only={reduce_only}",
            order_type
        );
        self.client
            .post_signed(API::Futures(Futures::Order), self.recv_window, parameters)
            .await
    }

    pub async fn cancel_all_future_orders(&self, symbol: &Symbol) -> Result<()> {
        info!("{symbol}: cancel all futures orders");
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        let _: Value = self
            .client
            .delete_signed(
                API::Futures(Futures::AllOpenOrders),
                self.recv_window,
                parameters,
            )
            .await?;
        Ok(())
    }

    /// Cancels one futures order; an already-gone order is not an error so
    /// the trailing-stop replace stays race-safe.
    pub async fn cancel_future_order(&self, symbol: &Symbol, order_id: u64) -> Result<()> {
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("orderId".into(), order_id.to_string());
        let result: Result<Value> = self
            .client
            .delete_signed(API::Futures(Futures::Order), self.recv_window, parameters)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(BinanceError::InvalidOrder(msg)) => {
                info!("{symbol}: futures order {order_id} already gone ({msg})");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn get_position_information(&self, symbol: &Symbol) -> Result<PositionRisk> {
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        let positions: Vec<PositionRisk> = self
            .client
            .get_signed(
                API::Futures(Futures::PositionRisk),
                self.recv_window,
                parameters,
            )
            .await?;
        positions
            .into_iter()
            .next()
            .ok_or_else(|| BinanceError::Unexpected(format!("{symbol}: no position information")))
    }

    /// Flattens whatever position is open with a reduce-only market order.
    pub async fn close_position(&self, symbol: &Symbol) -> Result<()> {
        let position = self.get_position_information(symbol).await?;
        if position.position_amt == 0.0 {
            info!("{symbol}: no position to close");
            return Ok(());
        }
        let side = if position.position_amt > 0.0 {
            crate::models::Side::Sell
        } else {
            crate::models::Side::Buy
        };
        info!("{symbol}: close position of {}", position.position_amt);
        self.create_future_order(
            symbol,
            side,
            OrderType::Market,
            position.position_amt.abs(),
            None,
            None,
            true,
        )
        .await?;
        Ok(())
    }
}

/// Classifies the margin-type switch response. The exchange rejects the call
/// with code -4046 when the account already sits in the requested mode; that
/// answer counts as success.
fn margin_type_outcome(result: Result<Value>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(BinanceError::Base { code: -4046, .. }) => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liquidation_sits_below_entry_for_longs() {
        let liq = liquidation_price(9813.0, 0.132, 100.0, PositionSide::Long).unwrap();
        assert!(liq < 9813.0);
        let liq = liquidation_price(9813.0, 0.132, 100.0, PositionSide::Short).unwrap();
        assert!(liq > 9813.0);
    }

    #[test]
    fn liquidation_moves_away_with_balance() {
        let poor = liquidation_price(10_000.0, 0.5, 100.0, PositionSide::Long).unwrap();
        let rich = liquidation_price(10_000.0, 0.5, 500.0, PositionSide::Long).unwrap();
        assert!(rich < poor);
        let poor = liquidation_price(10_000.0, 0.5, 100.0, PositionSide::Short).unwrap();
        let rich = liquidation_price(10_000.0, 0.5, 500.0, PositionSide::Short).unwrap();
        assert!(rich > poor);
    }

    #[test]
    fn notional_above_top_bracket_is_a_domain_error() {
        assert!(liquidation_price(100_000.0, 60.0, 1_000.0, PositionSide::Long).is_err());
    }

    #[test]
    fn sr2_solver_returns_largest_safe_leverage() {
        let entry = 9_813.0;
        let sr2 = 9_130.0;
        let balance = 100.0;
        let (leverage, quantity) = sr2_leverage(entry, sr2, balance, PositionSide::Long).unwrap();
        assert!((1..=125).contains(&leverage));
        assert_eq!(quantity, round_to(leverage as f64 * balance / entry, 3));
        let liq = liquidation_price(entry, quantity, balance, PositionSide::Long).unwrap();
        assert!(liq <= sr2);
        if leverage < 125 {
            let next_qty = round_to((leverage + 1) as f64 * balance / entry, 3);
            let next_liq = liquidation_price(entry, next_qty, balance, PositionSide::Long).unwrap();
            assert!(next_liq > sr2);
        }
    }

    #[test]
    fn sr2_solver_short_side_mirrors() {
        let entry = 9_813.0;
        let sr2 = 10_400.0;
        let balance = 100.0;
        let (leverage, quantity) = sr2_leverage(entry, sr2, balance, PositionSide::Short).unwrap();
        let liq = liquidation_price(entry, quantity, balance, PositionSide::Short).unwrap();
        assert!(liq >= sr2);
        assert!(leverage >= 1);
    }

    #[test]
    fn margin_type_switch_is_a_noop_when_already_in_mode() {
        let already_set = BinanceError::Base {
            code: -4046,
            msg: "No need to change margin type.".into(),
        };
        assert!(margin_type_outcome(Err(already_set)).is_ok());
        assert!(margin_type_outcome(Ok(serde_json::json!({"code": 200}))).is_ok());
    }

    #[test]
    fn other_margin_type_rejections_surface() {
        let open_position = BinanceError::Base {
            code: -4047,
            msg: "Margin type cannot be changed if there exists position.".into(),
        };
        assert!(matches!(
            margin_type_outcome(Err(open_position)),
            Err(BinanceError::Base { code: -4047, .. })
        ));
    }
}
