use crate::account::AccountManager;
use crate::api::{Spot, API};
use crate::client::Client;
use crate::errors::{BinanceError, Result};
use crate::market::MarketData;
use crate::models::{CancelSpec, OcoAck, OcoOrder, OrderAck, OrderType, Side, Symbol};
use crate::util::{generate_client_order_id, snap_to_increment};
use log::info;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::time::{sleep, Duration};

/// Screening floor for BTC-quoted orders: 1.3x the exchange minimum notional.
pub const BTC_MINIMUM_ORDER_SIZE: f64 = 0.001 * 1.3;
/// Screening floor for USDT-quoted orders.
pub const USDT_MINIMUM_ORDER_SIZE: f64 = 10.0 * 1.3;

/// Spot order manager: order creation and cancellation plus the two
/// balance-aware composite operations the strategies lean on (sell-all,
/// book-walked buy-all).
#[derive(Clone)]
pub struct Trader {
    pub client: Client,
    pub recv_window: u64,
    pub market: MarketData,
    pub account: AccountManager,
}

impl Trader {
    pub(crate) fn from_parts(
        client: Client,
        market: MarketData,
        account: AccountManager,
        recv_window: u64,
    ) -> Self {
        Trader {
            client,
            recv_window,
            market,
            account,
        }
    }

    /// Screens an order quantity against the lot step and the crate's padded
    /// minimum notional. Quote assets other than BTC/USDT are a hard error:
    /// no minimum is defined for them.
    pub async fn check_order_quantity(&self, symbol: &Symbol, quantity: f64) -> Result<bool> {
        let ticker_info = self.market.get_ticker_info(symbol, false).await?;
        if quantity < ticker_info.step_size {
            return Ok(false);
        }
        let quote_quantity = quantity * ticker_info.last_price;
        match symbol.quote.as_str() {
            "BTC" => Ok(quote_quantity >= BTC_MINIMUM_ORDER_SIZE),
            "USDT" => Ok(quote_quantity >= USDT_MINIMUM_ORDER_SIZE),
            other => Err(BinanceError::Unexpected(format!(
                "{other} pair order size is not defined"
            ))),
        }
    }

    /// Creates a spot order. Quantity and prices are snapped to the symbol's
    /// step and tick increments before submission.
    pub async fn create_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: f64,
        price: Option<f64>,
        stop_price: Option<f64>,
        order_type: OrderType,
    ) -> Result<OrderAck> {
        let ticker_info = self.market.get_ticker_info(symbol, false).await?;
        let quantity = snap_to_increment(quantity, ticker_info.step_size);
        let price = price.map(|p| snap_to_increment(p, ticker_info.tick_size));
        let stop_price = stop_price.map(|p| snap_to_increment(p, ticker_info.tick_size));

        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("side".into(), side.as_str().into());
        parameters.insert("quantity".into(), quantity.to_string());
        parameters.insert("newClientOrderId".into(), generate_client_order_id(22));
        match order_type {
            OrderType::Market => {
                info!("Create Order: {symbol}, {side:?}, quantity={quantity}");
                parameters.insert("type".into(), OrderType::Market.as_str().into());
            }
            OrderType::Limit => {
                let price = price.ok_or_else(|| {
                    BinanceError::Unexpected("limit order requires a price".into())
                })?;
                info!("Create Order: {symbol}, {side:?}, quantity={quantity}, price={price}");
                parameters.insert("type".into(), OrderType::Limit.as_str().into());
                parameters.insert("price".into(), price.to_string());
                parameters.insert("timeInForce".into(), "GTC".into());
            }
            OrderType::StopLossLimit => {
                let price = price.ok_or_else(|| {
                    BinanceError::Unexpected("stop-limit order requires a price".into())
                })?;
                let stop_price = stop_price.ok_or_else(|| {
                    BinanceError::Unexpected("stop-limit order requires a stop price".into())
                })?;
                info!(
                    "Create Order: {symbol}, {side:?}, quantity={quantity}, price={price}, \
                     stop_price={stop_price}"
                );
                parameters.insert("type".into(), OrderType::StopLossLimit.as_str().into());
                parameters.insert("price".into(), price.to_string());
                parameters.insert("stopPrice".into(), stop_price.to_string());
                parameters.insert("timeInForce".into(), "GTC".into());
            }
            other => {
                return Err(BinanceError::Unexpected(format!(
                    "unsupported spot order type: {other:?}"
                )))
            }
        }
        self.client
            .post_signed(API::Spot(Spot::Order), self.recv_window, parameters)
            .await
    }

    /// Creates an OCO pair: a LIMIT_MAKER take-profit and a STOP_LOSS_LIMIT
    /// protective stop sharing one order-list id.
    pub async fn create_oco_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: f64,
        price: f64,
        stop_price: f64,
        stop_limit_price: f64,
    ) -> Result<OcoOrder> {
        let ticker_info = self.market.get_ticker_info(symbol, false).await?;
        let quantity = snap_to_increment(quantity, ticker_info.step_size);
        let price = snap_to_increment(price, ticker_info.tick_size);
        let stop_price = snap_to_increment(stop_price, ticker_info.tick_size);
        let stop_limit_price = snap_to_increment(stop_limit_price, ticker_info.tick_size);
        info!(
            "Create OCO Order: {symbol}, {side:?}, quantity={quantity}, price={price}, \
             stop_price={stop_price}, stop_limit_price={stop_limit_price}"
        );
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("side".into(), side.as_str().into());
        parameters.insert("quantity".into(), quantity.to_string());
        parameters.insert("price".into(), price.to_string());
        parameters.insert("stopPrice".into(), stop_price.to_string());
        parameters.insert("stopLimitPrice".into(), stop_limit_price.to_string());
        parameters.insert("stopLimitTimeInForce".into(), "GTC".into());
        let ack: OcoAck = self
            .client
            .post_signed(API::Spot(Spot::Oco), self.recv_window, parameters)
            .await?;
        OcoOrder::try_from(&ack)
    }

    /// Cancels one order by id. Cancelling an order that is no longer open is
    /// not an error: reconciliation races resolve in our favor.
    pub async fn cancel_order(&self, symbol: &Symbol, order_id: u64) -> Result<()> {
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("orderId".into(), order_id.to_string());
        let result: Result<Value> = self
            .client
            .delete_signed(API::Spot(Spot::Order), self.recv_window, parameters)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(BinanceError::InvalidOrder(msg)) => {
                info!("{symbol}: order {order_id} already gone ({msg})");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Cancels both children of an OCO by list id, with the same idempotent
    /// treatment as [`Trader::cancel_order`].
    pub async fn cancel_order_list(&self, symbol: &Symbol, order_list_id: i64) -> Result<()> {
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("orderListId".into(), order_list_id.to_string());
        let result: Result<Value> = self
            .client
            .delete_signed(API::Spot(Spot::OrderList), self.recv_window, parameters)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(BinanceError::InvalidOrder(msg)) => {
                info!("{symbol}: order list {order_list_id} already gone ({msg})");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Sweeps the open-order list and cancels the requested classes: plain
    /// orders, OCO lists, or both. Calling it again with nothing open is a
    /// no-op.
    pub async fn cancel_all_order(&self, spec: CancelSpec) -> Result<bool> {
        if spec.oco {
            info!("Cancel all OCO orders");
        }
        if spec.normal {
            info!("Cancel all normal orders");
        }
        if !spec.normal && !spec.oco {
            return Err(BinanceError::Unexpected(
                "either normal or OCO must be selected".into(),
            ));
        }
        let open_orders = self.account.get_open_orders().await?;
        if open_orders.is_empty() {
            info!("Nothing to cancel");
            return Ok(true);
        }
        if self.market.market_snapshot().is_empty() {
            self.market.update_market_data().await?;
        }
        let markets = self.market.market_snapshot();
        let mut cancelled_lists: Vec<i64> = Vec::new();
        let mut cancelled = 0usize;
        for order in &open_orders {
            let symbol = markets
                .iter()
                .find(|info| info.symbol == order.internal_symbol)
                .map(|info| info.pair())
                .ok_or_else(|| {
                    BinanceError::Unexpected(format!(
                        "unknown internal symbol {}",
                        order.internal_symbol
                    ))
                })?;
            if order.order_list_id != -1 {
                if !spec.oco || cancelled_lists.contains(&order.order_list_id) {
                    continue;
                }
                cancelled_lists.push(order.order_list_id);
                self.cancel_order_list(&symbol, order.order_list_id).await?;
                cancelled += 1;
            } else if spec.normal {
                self.cancel_order(&symbol, order.order_id).await?;
                cancelled += 1;
            }
        }
        info!("Cancelled {cancelled} orders/lists");
        Ok(true)
    }

    /// Sells the full free balance (or an explicit quantity) at market.
    /// `Ok(false)` means the order was screened out or lacked funds, not that
    /// something broke.
    pub async fn sell_at_market(&self, symbol: &Symbol, quantity: Option<f64>) -> Result<bool> {
        info!("Sell {symbol} at market");
        let quantity = match quantity {
            Some(quantity) => quantity,
            None => self.account.get_balance(&symbol.base).await?.free,
        };
        if !self.check_order_quantity(symbol, quantity).await? {
            info!("{symbol}: quantity {quantity} is under minimum order size. Cancel order");
            return Ok(false);
        }
        info!("{} quantity: {quantity}", symbol.base);
        match self
            .create_order(symbol, Side::Sell, quantity, None, None, OrderType::Market)
            .await
        {
            Ok(ack) => {
                info!("Order result: order_id={}", ack.order_id);
                Ok(true)
            }
            Err(err) if err.is_insufficient_funds() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Buys with `quote_quantity` (default: the full quote balance) after
    /// walking the order book for a volume-weighted ask that covers the
    /// notional plus a slippage budget. A book too thin for the budget grows
    /// the depth request and retries; insufficient funds retries after a
    /// short pause.
    pub async fn buy_at_market(&self, symbol: &Symbol, quote_quantity: Option<f64>) -> Result<bool> {
        const SLIP_RATE: f64 = 0.3;
        info!("Buy {symbol} at market");
        let quote_quantity = match quote_quantity {
            Some(quantity) => quantity,
            None => self.account.get_balance(&symbol.quote).await?.total,
        };
        let ticker_info = self.market.get_ticker_info(symbol, false).await?;
        let quantity = quote_quantity / ticker_info.last_price;
        if !self.check_order_quantity(symbol, quantity).await? {
            info!("{symbol}: quantity {quantity} is under minimum order size. Cancel order");
            return Ok(false);
        }

        let mut orderbook_limit = 100u16;
        let mut max_try = 10;
        while max_try > 0 {
            max_try -= 1;
            let orderbook = self.market.get_orderbook(symbol, orderbook_limit).await?;
            let weighted_ask_price =
                match weighted_ask_price(&orderbook.asks, quote_quantity, SLIP_RATE) {
                    Some(price) => price,
                    None => {
                        orderbook_limit += 100;
                        info!("Orderbook is weak. Enhance orderbook limit");
                        continue;
                    }
                };
            info!("{symbol} weighted average ask price: {weighted_ask_price}");
            let amount = quote_quantity / weighted_ask_price;
            match self
                .create_order(symbol, Side::Buy, amount, None, None, OrderType::Market)
                .await
            {
                Ok(ack) => {
                    info!("Order result: order_id={}", ack.order_id);
                    return Ok(true);
                }
                Err(err) if err.is_insufficient_funds() => {
                    info!(
                        "Insufficient funds when market buying. Try again after 500ms. \
                         Remaining try: {max_try}"
                    );
                    sleep(Duration::from_millis(500)).await;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(false)
    }
}

/// Walks the ask side until the cumulative quote volume covers the order
/// notional plus the slippage budget, and returns the volume-weighted price
/// of the walked depth. `None` means the book is too thin for the budget.
pub fn weighted_ask_price(
    asks: &[crate::models::BookLevel],
    quote_quantity: f64,
    slip_rate: f64,
) -> Option<f64> {
    let mut ask_volume = 0.0;
    let mut ask_quantity = 0.0;
    for level in asks {
        ask_volume += level.price * level.qty;
        ask_quantity += level.qty;
        if quote_quantity * (1.0 + slip_rate) < ask_volume {
            return Some(ask_volume / ask_quantity);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookLevel;

    #[test]
    fn ask_walk_returns_weighted_price_once_budget_is_covered() {
        let asks = vec![
            BookLevel { price: 100.0, qty: 1.0 },
            BookLevel { price: 101.0, qty: 2.0 },
            BookLevel { price: 105.0, qty: 10.0 },
        ];
        let price = weighted_ask_price(&asks, 100.0, 0.3).unwrap();
        // Needs more than 130 quote volume: first two levels give 302.
        assert!((price - 302.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn thin_book_yields_no_price() {
        let asks = vec![BookLevel { price: 100.0, qty: 1.0 }];
        assert!(weighted_ask_price(&asks, 100.0, 0.3).is_none());
        assert!(weighted_ask_price(&[], 10.0, 0.3).is_none());
    }
}
