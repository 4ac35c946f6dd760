use async_trait::async_trait;
use pivot_trader::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Everything the strategies may do to the exchange, recorded for
/// assertions.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    MarketBuy {
        symbol: Symbol,
        quote_quantity: f64,
    },
    MarketSell {
        symbol: Symbol,
        quantity: f64,
    },
    LimitOrder {
        symbol: Symbol,
        side: Side,
        quantity: f64,
        price: f64,
    },
    StopLimitOrder {
        symbol: Symbol,
        quantity: f64,
        price: f64,
        stop_price: f64,
    },
    OcoOrder {
        symbol: Symbol,
        quantity: f64,
        price: f64,
        stop_price: f64,
        stop_limit_price: f64,
    },
    CancelOrder {
        symbol: Symbol,
        order_id: u64,
    },
    CancelAll,
    FutureOrder {
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
        stop_price: Option<f64>,
        reduce_only: bool,
    },
    CancelAllFutureOrders,
    CancelFutureOrder {
        order_id: u64,
    },
    ClosePosition,
    SetLeverage(u8),
    SetMarginType(MarginType),
}

/// Scriptable per-symbol market state.
#[derive(Clone, Debug)]
pub struct FakeMarket {
    pub active: bool,
    pub last_price: f64,
    pub quote_volume: f64,
    pub tick_size: f64,
    pub step_size: f64,
    pub monthly_pivot: Option<Pivot>,
    /// Daily closes, oldest first; the last entry is the forming candle.
    pub daily_closes: Vec<f64>,
    /// Monthly closes, oldest first, same convention.
    pub monthly_closes: Vec<f64>,
}

impl Default for FakeMarket {
    fn default() -> Self {
        FakeMarket {
            active: true,
            last_price: 0.0,
            quote_volume: 0.0,
            tick_size: 0.01,
            step_size: 0.0001,
            monthly_pivot: None,
            daily_closes: Vec::new(),
            monthly_closes: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct FakeState {
    pub balances: HashMap<String, Balance>,
    pub markets: HashMap<Symbol, FakeMarket>,
    pub yearly_pivot: Option<Pivot>,
    pub open_orders: Vec<OpenOrder>,
    pub order_stats: HashMap<u64, OrderStat>,
    pub next_order_id: u64,
    pub actions: Vec<Action>,
    // Futures side.
    pub future_balance: f64,
    pub future_last_price: f64,
    pub future_position_amt: f64,
    pub future_monthly_pivot: Option<Pivot>,
    pub future_weekly_pivot: Option<Pivot>,
    pub future_hourly_pivot: Option<Pivot>,
    pub future_candles: Vec<Kline>,
}

/// In-memory exchange double driving the strategy state machines in the
/// integration suites. Clones share the underlying state, so a test keeps
/// one handle while the strategy owns another.
#[derive(Clone)]
pub struct FakeExchange {
    pub state: Arc<Mutex<FakeState>>,
}

#[allow(dead_code)]
impl FakeExchange {
    pub fn new(state: FakeState) -> Self {
        FakeExchange {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn set_balance(&self, asset: &str, amount: f64) {
        self.state.lock().unwrap().balances.insert(
            asset.to_string(),
            Balance {
                total: amount,
                free: amount,
                used: 0.0,
            },
        );
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn clear_actions(&self) {
        self.state.lock().unwrap().actions.clear();
    }

    pub fn market_buys(&self) -> Vec<Action> {
        self.actions()
            .into_iter()
            .filter(|action| matches!(action, Action::MarketBuy { .. }))
            .collect()
    }

    pub fn market_sells(&self) -> Vec<Action> {
        self.actions()
            .into_iter()
            .filter(|action| matches!(action, Action::MarketSell { .. }))
            .collect()
    }

    fn next_id(state: &mut FakeState) -> u64 {
        state.next_order_id += 1;
        state.next_order_id
    }

    fn quantity_ok(state: &FakeState, symbol: &Symbol, quantity: f64) -> Result<bool> {
        let market = state
            .markets
            .get(symbol)
            .ok_or_else(|| BinanceError::Unexpected(format!("{symbol}: unknown market")))?;
        if quantity < market.step_size {
            return Ok(false);
        }
        let notional = quantity * market.last_price;
        match symbol.quote.as_str() {
            "BTC" => Ok(notional >= BTC_MINIMUM_ORDER_SIZE),
            "USDT" => Ok(notional >= USDT_MINIMUM_ORDER_SIZE),
            other => Err(BinanceError::Unexpected(format!(
                "{other} pair order size is not defined"
            ))),
        }
    }

    fn credit(state: &mut FakeState, asset: &str, delta: f64) {
        let balance = state.balances.entry(asset.to_string()).or_default();
        balance.total += delta;
        balance.free += delta;
    }

    fn closes_to_klines(closes: &[f64], width_secs: i64) -> Vec<Kline> {
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| Kline {
                timestamp: i as i64 * width_secs,
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: 1.0,
            })
            .collect()
    }
}

#[async_trait]
impl SpotExchange for FakeExchange {
    async fn exchange_alive(&self) -> Result<bool> {
        Ok(true)
    }

    async fn update_market_data(&self) -> Result<()> {
        Ok(())
    }

    async fn update_ticker_data(&self) -> Result<()> {
        Ok(())
    }

    async fn update_open_orders(&self) -> Result<()> {
        Ok(())
    }

    async fn ticker_active(&self, symbol: &Symbol, _data_update: bool) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .markets
            .get(symbol)
            .map(|market| market.active)
            .unwrap_or(false))
    }

    async fn ticker_info(&self, symbol: &Symbol, _data_update: bool) -> Result<TickerInfo> {
        let state = self.state.lock().unwrap();
        let market = state
            .markets
            .get(symbol)
            .ok_or_else(|| BinanceError::Unexpected(format!("{symbol}: unknown market")))?;
        Ok(TickerInfo {
            last_price: market.last_price,
            bid: market.last_price,
            ask: market.last_price,
            quote_volume: market.quote_volume,
            timestamp: now_secs(),
            internal_symbol: symbol.flat(),
            tick_size: market.tick_size,
            step_size: market.step_size,
        })
    }

    async fn ticker_statistics(&self, symbol: &Symbol, _data_update: bool) -> Result<TickerStats> {
        let state = self.state.lock().unwrap();
        let market = state
            .markets
            .get(symbol)
            .ok_or_else(|| BinanceError::Unexpected(format!("{symbol}: unknown market")))?;
        Ok(TickerStats {
            last_price: market.last_price,
            quote_volume: market.quote_volume,
        })
    }

    async fn tickers_by_quote(&self, quote: &str, _data_update: bool) -> Result<Vec<Symbol>> {
        let state = self.state.lock().unwrap();
        let mut symbols: Vec<Symbol> = state
            .markets
            .keys()
            .filter(|symbol| symbol.quote == quote)
            .cloned()
            .collect();
        symbols.sort();
        Ok(symbols)
    }

    async fn ohlcv(
        &self,
        symbol: &Symbol,
        interval: Interval,
        _limit: Option<u16>,
    ) -> Result<Vec<Kline>> {
        let state = self.state.lock().unwrap();
        let market = state
            .markets
            .get(symbol)
            .ok_or_else(|| BinanceError::Unexpected(format!("{symbol}: unknown market")))?;
        Ok(match interval {
            Interval::Month1 => Self::closes_to_klines(&market.monthly_closes, 2_592_000),
            _ => Self::closes_to_klines(&market.daily_closes, 86_400),
        })
    }

    async fn yearly_pivot(&self, _symbol: &Symbol) -> Result<Option<Pivot>> {
        Ok(self.state.lock().unwrap().yearly_pivot)
    }

    async fn monthly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .markets
            .get(symbol)
            .and_then(|market| market.monthly_pivot))
    }

    async fn balance(&self, asset: &str) -> Result<Balance> {
        let state = self.state.lock().unwrap();
        Ok(state.balances.get(asset).copied().unwrap_or_default())
    }

    async fn open_orders(&self) -> Result<Vec<OpenOrder>> {
        Ok(self.state.lock().unwrap().open_orders.clone())
    }

    async fn open_order_info(
        &self,
        order_id: u64,
        _data_update: bool,
    ) -> Result<Option<OpenOrder>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .open_orders
            .iter()
            .find(|order| order.order_id == order_id)
            .cloned())
    }

    async fn order_stat(&self, order_id: u64, _symbol: &Symbol) -> Result<OrderStat> {
        let state = self.state.lock().unwrap();
        Ok(state
            .order_stats
            .get(&order_id)
            .cloned()
            .unwrap_or(OrderStat {
                status: OrderStatus::New,
                executed_quantity: 0.0,
            }))
    }

    async fn order_quantity_ok(&self, symbol: &Symbol, quantity: f64) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Self::quantity_ok(&state, symbol, quantity)
    }

    async fn sell_at_market(&self, symbol: &Symbol, quantity: Option<f64>) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let quantity = match quantity {
            Some(quantity) => quantity,
            None => state
                .balances
                .get(&symbol.base)
                .map(|balance| balance.free)
                .unwrap_or(0.0),
        };
        if !Self::quantity_ok(&state, symbol, quantity)? {
            return Ok(false);
        }
        let last_price = state.markets[symbol].last_price;
        Self::credit(&mut state, &symbol.base.clone(), -quantity);
        Self::credit(&mut state, &symbol.quote.clone(), quantity * last_price);
        state.actions.push(Action::MarketSell {
            symbol: symbol.clone(),
            quantity,
        });
        Ok(true)
    }

    async fn buy_at_market(&self, symbol: &Symbol, quote_quantity: Option<f64>) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let quote_quantity = match quote_quantity {
            Some(quantity) => quantity,
            None => state
                .balances
                .get(&symbol.quote)
                .map(|balance| balance.total)
                .unwrap_or(0.0),
        };
        let last_price = state
            .markets
            .get(symbol)
            .ok_or_else(|| BinanceError::Unexpected(format!("{symbol}: unknown market")))?
            .last_price;
        let quantity = quote_quantity / last_price;
        if !Self::quantity_ok(&state, symbol, quantity)? {
            return Ok(false);
        }
        Self::credit(&mut state, &symbol.quote.clone(), -quote_quantity);
        Self::credit(&mut state, &symbol.base.clone(), quantity);
        state.actions.push(Action::MarketBuy {
            symbol: symbol.clone(),
            quote_quantity,
        });
        Ok(true)
    }

    async fn create_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: f64,
        price: Option<f64>,
        stop_price: Option<f64>,
        order_type: OrderType,
    ) -> Result<OrderAck> {
        let mut state = self.state.lock().unwrap();
        let order_id = Self::next_id(&mut state);
        match order_type {
            OrderType::Limit => {
                let price = price.unwrap_or(0.0);
                state.open_orders.push(OpenOrder {
                    order_id,
                    order_list_id: -1,
                    internal_symbol: symbol.flat(),
                    price,
                    original_quantity: quantity,
                    executed_quantity: 0.0,
                    order_type,
                    side,
                    time: now_secs() * 1000,
                });
                state.actions.push(Action::LimitOrder {
                    symbol: symbol.clone(),
                    side,
                    quantity,
                    price,
                });
            }
            OrderType::StopLossLimit => {
                let price = price.unwrap_or(0.0);
                let stop = stop_price.unwrap_or(0.0);
                state.open_orders.push(OpenOrder {
                    order_id,
                    order_list_id: -1,
                    internal_symbol: symbol.flat(),
                    price,
                    original_quantity: quantity,
                    executed_quantity: 0.0,
                    order_type,
                    side,
                    time: now_secs() * 1000,
                });
                state.actions.push(Action::StopLimitOrder {
                    symbol: symbol.clone(),
                    quantity,
                    price,
                    stop_price: stop,
                });
            }
            _ => {
                return Err(BinanceError::Unexpected(format!(
                    "fake exchange: unsupported spot order type {order_type:?}"
                )))
            }
        }
        Ok(OrderAck {
            order_id,
            order_list_id: -1,
            executed_qty: None,
            status: Some(OrderStatus::New),
        })
    }

    async fn create_oco_order(
        &self,
        symbol: &Symbol,
        _side: Side,
        quantity: f64,
        price: f64,
        stop_price: f64,
        stop_limit_price: f64,
    ) -> Result<OcoOrder> {
        let mut state = self.state.lock().unwrap();
        let limit_order_id = Self::next_id(&mut state);
        let stop_order_id = Self::next_id(&mut state);
        let order_list_id = limit_order_id as i64;
        for (order_id, order_type, order_price) in [
            (limit_order_id, OrderType::LimitMaker, price),
            (stop_order_id, OrderType::StopLossLimit, stop_limit_price),
        ] {
            state.open_orders.push(OpenOrder {
                order_id,
                order_list_id,
                internal_symbol: symbol.flat(),
                price: order_price,
                original_quantity: quantity,
                executed_quantity: 0.0,
                order_type,
                side: Side::Sell,
                time: now_secs() * 1000,
            });
        }
        state.actions.push(Action::OcoOrder {
            symbol: symbol.clone(),
            quantity,
            price,
            stop_price,
            stop_limit_price,
        });
        Ok(OcoOrder {
            order_list_id,
            limit_order_id,
            stop_order_id,
        })
    }

    async fn cancel_order(&self, symbol: &Symbol, order_id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.open_orders.retain(|order| order.order_id != order_id);
        state.actions.push(Action::CancelOrder {
            symbol: symbol.clone(),
            order_id,
        });
        Ok(())
    }

    async fn cancel_order_list(&self, symbol: &Symbol, order_list_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let ids: Vec<u64> = state
            .open_orders
            .iter()
            .filter(|order| order.order_list_id == order_list_id)
            .map(|order| order.order_id)
            .collect();
        state
            .open_orders
            .retain(|order| order.order_list_id != order_list_id);
        for order_id in ids {
            state.actions.push(Action::CancelOrder {
                symbol: symbol.clone(),
                order_id,
            });
        }
        Ok(())
    }

    async fn cancel_all_orders(&self, _spec: CancelSpec) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.open_orders.clear();
        state.actions.push(Action::CancelAll);
        Ok(true)
    }
}

#[async_trait]
impl FuturesExchange for FakeExchange {
    async fn future_ohlcv(
        &self,
        _symbol: &Symbol,
        _interval: Interval,
        _limit: Option<u16>,
    ) -> Result<Vec<Kline>> {
        Ok(self.state.lock().unwrap().future_candles.clone())
    }

    async fn future_monthly_pivot(&self, _symbol: &Symbol) -> Result<Option<Pivot>> {
        Ok(self.state.lock().unwrap().future_monthly_pivot)
    }

    async fn future_weekly_pivot(&self, _symbol: &Symbol) -> Result<Option<Pivot>> {
        Ok(self.state.lock().unwrap().future_weekly_pivot)
    }

    async fn future_hourly_pivot(&self, _symbol: &Symbol, _hours: u32) -> Result<Option<Pivot>> {
        Ok(self.state.lock().unwrap().future_hourly_pivot)
    }

    async fn last_price(&self, _symbol: &Symbol) -> Result<f64> {
        Ok(self.state.lock().unwrap().future_last_price)
    }

    async fn future_ticker_info(&self, _symbol: &Symbol) -> Result<FutureTickerInfo> {
        let state = self.state.lock().unwrap();
        Ok(FutureTickerInfo {
            last_price: state.future_last_price,
            timestamp: now_secs(),
        })
    }

    async fn future_balance(&self) -> Result<f64> {
        Ok(self.state.lock().unwrap().future_balance)
    }

    async fn set_leverage(&self, _symbol: &Symbol, leverage: u8) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(Action::SetLeverage(leverage));
        Ok(())
    }

    async fn set_margin_type(&self, _symbol: &Symbol, margin_type: MarginType) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(Action::SetMarginType(margin_type));
        Ok(())
    }

    async fn create_future_order(
        &self,
        symbol: &Symbol,
        side: Side,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
        stop_price: Option<f64>,
        reduce_only: bool,
    ) -> Result<FuturesOrderAck> {
        let mut state = self.state.lock().unwrap();
        let order_id = Self::next_id(&mut state);
        if order_type == OrderType::Market && !reduce_only {
            state.future_position_amt += match side {
                Side::Buy => quantity,
                Side::Sell => -quantity,
            };
        }
        state.actions.push(Action::FutureOrder {
            symbol: symbol.clone(),
            side,
            order_type,
            quantity,
            price,
            stop_price,
            reduce_only,
        });
        Ok(FuturesOrderAck {
            order_id,
            status: Some(OrderStatus::New),
        })
    }

    async fn cancel_all_future_orders(&self, _symbol: &Symbol) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(Action::CancelAllFutureOrders);
        Ok(())
    }

    async fn cancel_future_order(&self, _symbol: &Symbol, order_id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(Action::CancelFutureOrder { order_id });
        Ok(())
    }

    async fn close_position(&self, _symbol: &Symbol) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.future_position_amt = 0.0;
        state.actions.push(Action::ClosePosition);
        Ok(())
    }

    async fn position_amount(&self, _symbol: &Symbol) -> Result<f64> {
        Ok(self.state.lock().unwrap().future_position_amt)
    }
}
