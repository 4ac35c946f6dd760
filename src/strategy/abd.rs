use crate::control::load_coin_filters;
use crate::errors::{BinanceError, Result};
use crate::exchange::SpotExchange;
use crate::models::{Interval, OrderType, Side, Symbol};
use crate::pivot::previous_candle;
use crate::runtime::{Every, Strategy, TickGate};
use crate::strategy::{
    cancel_all_with_retries, record_balance_snapshot, ticker_is_stale, AltBook, BasePair,
    BtcStatus, OpenAlt, TradingAlt, COIN_DATA_PATH,
};
use crate::telemetry::Recorder;
use crate::util::now_secs;
use async_trait::async_trait;
use log::info;
use std::collections::HashMap;

/// Limit buys resting at the pivot are abandoned after this age.
pub const OPEN_ALT_MAX_AGE_SECS: i64 = 3600;
/// A stale open order at least this filled is promoted instead of unwound.
pub const EXECUTED_QUANTITY_RATIO: f64 = 0.5;

/// Alt/BTC day-pair strategy: the BTC macro leg decides whether alts trade
/// against BTC or USDT; the alt leg runs the daily book each minute and, on
/// the bullish side, keeps a queue of limit buys resting at the monthly
/// pivot.
pub struct AltBtcDayTrade<E: SpotExchange> {
    exchange: E,
    gate: TickGate,
    btc_status: BtcStatus,
    base_pair: BasePair,
    base_symbol: Symbol,
    book: AltBook,
    open_alts: HashMap<Symbol, OpenAlt>,
    recorder: Recorder,
}

impl<E: SpotExchange> AltBtcDayTrade<E> {
    pub fn new(exchange: E) -> Self {
        info!("Setting alt/BTC day trading module...");
        AltBtcDayTrade {
            exchange,
            gate: TickGate::new(),
            btc_status: BtcStatus::Init,
            base_pair: BasePair::Init,
            base_symbol: Symbol::btc_usdt(),
            book: AltBook::new(5),
            open_alts: HashMap::new(),
            recorder: Recorder::new("AltBtcDayTrading", false),
        }
    }

    pub fn btc_status(&self) -> BtcStatus {
        self.btc_status
    }

    pub fn base_pair(&self) -> BasePair {
        self.base_pair
    }

    pub fn trading_alts(&self) -> &HashMap<Symbol, TradingAlt> {
        &self.book.trading_alts
    }

    pub fn open_alts(&self) -> &HashMap<Symbol, OpenAlt> {
        &self.open_alts
    }

    /// Daily BTC macro leg, the monthly-spot rules: the outcome only matters
    /// here as the bias consumed by the alt leg.
    pub async fn btc_trade(&mut self) -> Result<()> {
        info!("Starting BTC trade...");
        if !self.exchange.exchange_alive().await? {
            info!("Exchange is not active. Exit BTC trade");
        }
        let symbol = self.base_symbol.clone();
        let pivot = self
            .exchange
            .yearly_pivot(&symbol)
            .await?
            .ok_or_else(|| BinanceError::Unexpected(format!("{symbol}: yearly pivot unavailable")))?;
        info!("{symbol} pivot: {pivot:?}");
        let btc_info = self.exchange.ticker_info(&symbol, true).await?;
        if ticker_is_stale(btc_info.timestamp) {
            info!("Last transaction is too long ago. Exit BTC trade");
            return Ok(());
        }
        let monthly = self.exchange.ohlcv(&symbol, Interval::Month1, Some(5)).await?;
        let prev_close = previous_candle(&monthly)
            .ok_or_else(|| {
                BinanceError::Unexpected(format!("{symbol}: not enough monthly candles"))
            })?
            .close;

        info!("Current btc status is {:?}", self.btc_status);
        if btc_info.last_price < pivot.s1 {
            info!("{symbol}: last price is under pivot S1");
            if self.btc_status != BtcStatus::Sell {
                self.sell_all_btc().await?;
                self.btc_status = BtcStatus::Sell;
                info!("Change btc status to 'sell'");
            }
        } else if prev_close < pivot.p {
            info!("{symbol}: previous monthly close price is under pivot P");
            if self.btc_status != BtcStatus::Sell {
                self.sell_all_btc().await?;
                self.btc_status = BtcStatus::Sell;
                info!("Change btc status to 'sell'");
            }
        } else {
            info!("{symbol}: previous monthly close price is more than pivot P");
            if self.btc_status != BtcStatus::Buy {
                self.buy_all_btc().await?;
                self.btc_status = BtcStatus::Buy;
                info!("Change btc status to 'buy'");
            }
        }
        info!("Exit BTC trade");
        Ok(())
    }

    async fn sell_all_btc(&mut self) -> Result<()> {
        info!("Sell all BTC");
        self.delete_open_alts_orders().await?;
        self.exchange.sell_at_market(&self.base_symbol, None).await?;
        Ok(())
    }

    async fn buy_all_btc(&mut self) -> Result<()> {
        info!("Buy all BTC");
        self.delete_open_alts_orders().await?;
        self.exchange.buy_at_market(&self.base_symbol, None).await?;
        Ok(())
    }

    /// Minute alt leg: rotate the book when the macro bias moved, maintain
    /// the resting pivot buys, then run the daily book mechanics.
    pub async fn alt_trade(&mut self) -> Result<()> {
        info!("Starting alt trade...");
        if !self.exchange.exchange_alive().await? {
            info!("Exchange is not active. Exit alt trade");
        }
        self.exchange.update_market_data().await?;
        self.exchange.update_ticker_data().await?;
        self.book.check_trading_alts(&self.exchange).await?;
        info!("Current alt base pair is {:?}", self.base_pair);

        if self.btc_status == BtcStatus::Buy && self.base_pair != BasePair::Btc {
            info!("BTC status has been changed to 'buy'");
            self.sell_invalid_alts("BTC").await?;
            info!("Change alt pair to BTC");
            self.base_pair = BasePair::Btc;
        } else if self.btc_status == BtcStatus::Sell && self.base_pair != BasePair::Usdt {
            info!("BTC status has been changed to 'sell'");
            self.sell_invalid_alts("USDT").await?;
            info!("Change alt pair to USDT");
            self.base_pair = BasePair::Usdt;
        }
        let quote = match self.base_pair.asset() {
            Some(quote) => quote,
            None => {
                info!("Base pair is not decided yet. Exit alt trade");
                return Ok(());
            }
        };

        self.manage_pivot_order().await?;
        self.book.apply_exit_conditions(&self.exchange).await?;
        self.book.enter_new_positions(&self.exchange, &[quote]).await?;
        if self.base_pair == BasePair::Btc {
            self.make_pivot_open_orders(quote).await?;
        }
        self.book.place_protective_orders(&self.exchange).await?;
        info!("Exit alt trade");
        Ok(())
    }

    /// Sweeps the resting pivot buys: fills promote into the trading book;
    /// orders older than an hour are cancelled, with a half-filled one
    /// promoted and a lesser fragment sold off.
    pub async fn manage_pivot_order(&mut self) -> Result<()> {
        info!("Managing pivot open orders...");
        self.exchange.update_open_orders().await?;
        let open_alts: Vec<(Symbol, OpenAlt)> = self
            .open_alts
            .iter()
            .map(|(symbol, open_alt)| (symbol.clone(), *open_alt))
            .collect();
        for (symbol, open_alt) in open_alts {
            let order = self.exchange.open_order_info(open_alt.order_id, false).await?;
            let stat = self.exchange.order_stat(open_alt.order_id, &symbol).await?;
            match order {
                None => {
                    self.open_alts.remove(&symbol);
                    if stat.status == crate::models::OrderStatus::Filled {
                        info!("{symbol}: open order has been filled. Move to trading alts");
                        self.book
                            .trading_alts
                            .insert(symbol.clone(), TradingAlt::default());
                    } else {
                        info!("{symbol}: open order disappeared, drop from open alts");
                    }
                }
                Some(order) if order.created_secs() < now_secs() - OPEN_ALT_MAX_AGE_SECS => {
                    self.exchange.cancel_order(&symbol, open_alt.order_id).await?;
                    info!("{symbol}: cancelled open order older than an hour");
                    let filled_ratio = if order.original_quantity > 0.0 {
                        order.executed_quantity / order.original_quantity
                    } else {
                        0.0
                    };
                    if filled_ratio >= EXECUTED_QUANTITY_RATIO {
                        info!(
                            "{symbol}: open order was {:.0}% filled. Move to trading alts",
                            filled_ratio * 100.0
                        );
                        self.book
                            .trading_alts
                            .insert(symbol.clone(), TradingAlt::default());
                    } else if self
                        .exchange
                        .order_quantity_ok(&symbol, order.executed_quantity)
                        .await?
                    {
                        info!("{symbol}: sell partially filled fragment");
                        self.exchange.sell_at_market(&symbol, None).await?;
                    }
                    self.open_alts.remove(&symbol);
                }
                Some(_) => {}
            }
        }
        info!("Exit managing pivot open orders");
        Ok(())
    }

    /// Bullish-side entry queue: for candidates sitting above the monthly
    /// pivot, rest a limit buy at P. Candidates that fell out of the set get
    /// their resting orders cancelled and any bought fragment sold.
    pub async fn make_pivot_open_orders(&mut self, quote: &str) -> Result<()> {
        info!("Start making pivot order sequence...");
        let mut slots = self
            .book
            .max_trade_limit
            .saturating_sub(self.book.trading_alts.len() + self.open_alts.len());

        let mut over_pivot: Vec<Symbol> = Vec::new();
        for symbol in self.exchange.tickers_by_quote(quote, false).await? {
            if !self.book.is_valid_alt(&self.exchange, &symbol).await? {
                continue;
            }
            let pivot = match self.exchange.monthly_pivot(&symbol).await? {
                Some(pivot) => pivot,
                None => continue,
            };
            let stats = self.exchange.ticker_statistics(&symbol, false).await?;
            let daily = self.exchange.ohlcv(&symbol, Interval::Day1, Some(5)).await?;
            let prev_close = match previous_candle(&daily) {
                Some(candle) => candle.close,
                None => continue,
            };
            if prev_close >= pivot.p && stats.last_price > pivot.p {
                over_pivot.push(symbol);
            }
        }
        info!("Over pivot P ticker count: {}", over_pivot.len());

        let resting: Vec<Symbol> = self.open_alts.keys().cloned().collect();
        for symbol in resting {
            if over_pivot.contains(&symbol) {
                continue;
            }
            info!("{symbol} is no longer an open-alt candidate. Delete from open alts");
            if let Some(open_alt) = self.open_alts.remove(&symbol) {
                self.exchange.cancel_order(&symbol, open_alt.order_id).await?;
                let balance = self.exchange.balance(&symbol.base).await?.total;
                if self.exchange.order_quantity_ok(&symbol, balance).await? {
                    self.exchange.sell_at_market(&symbol, None).await?;
                }
            }
        }

        for symbol in over_pivot {
            if slots == 0 {
                break;
            }
            if self.open_alts.contains_key(&symbol) {
                info!("{symbol}: open order is already made");
                continue;
            }
            let pivot = match self.exchange.monthly_pivot(&symbol).await? {
                Some(pivot) => pivot,
                None => continue,
            };
            let free_quote = self.exchange.balance(quote).await?.free;
            let quantity = free_quote / slots as f64 / pivot.p;
            let ack = self
                .exchange
                .create_order(
                    &symbol,
                    Side::Buy,
                    quantity,
                    Some(pivot.p),
                    None,
                    OrderType::Limit,
                )
                .await?;
            info!("{symbol}: limit order {} resting at pivot P", ack.order_id);
            self.open_alts.insert(
                symbol,
                OpenAlt {
                    order_id: ack.order_id,
                    timestamp: now_secs(),
                },
            );
            slots -= 1;
        }
        info!("Exit making pivot order sequence");
        Ok(())
    }

    /// Cancels every resting pivot buy and clears the queue.
    pub async fn delete_open_alts_orders(&mut self) -> Result<()> {
        info!("Delete open alts orders");
        self.exchange.update_open_orders().await?;
        for (symbol, open_alt) in self.open_alts.drain() {
            if self
                .exchange
                .open_order_info(open_alt.order_id, false)
                .await?
                .is_some()
            {
                info!("{symbol}: cancel open order");
                self.exchange.cancel_order(&symbol, open_alt.order_id).await?;
            }
        }
        info!("Open alts is cleared");
        Ok(())
    }

    /// Rotates the book onto the new quote side: positions whose counterpart
    /// market qualifies switch their protective orders over; the rest are
    /// sold and the proceeds repositioned into the new base currency.
    pub async fn sell_invalid_alts(&mut self, new_quote: &str) -> Result<()> {
        info!("Sell invalid alts");
        if self.book.trading_alts.is_empty() {
            info!("No trading alts. Exit sell invalid alts sequence");
            return Ok(());
        }
        let symbols: Vec<Symbol> = self.book.trading_alts.keys().cloned().collect();
        for symbol in symbols {
            if symbol.quote == new_quote {
                continue;
            }
            let counterpart = symbol.with_quote(new_quote);
            if self.book.is_valid_alt(&self.exchange, &counterpart).await? {
                info!("{symbol}: switch position to {counterpart}");
                self.book
                    .cancel_protective_orders(&self.exchange, &symbol)
                    .await?;
                self.book.trading_alts.remove(&symbol);
                self.book
                    .trading_alts
                    .insert(counterpart, TradingAlt::default());
            } else {
                info!("{symbol}: counterpart is not tradable, liquidate");
                self.book
                    .cancel_protective_orders(&self.exchange, &symbol)
                    .await?;
                self.exchange.sell_at_market(&symbol, None).await?;
                self.book.trading_alts.remove(&symbol);
                match new_quote {
                    "BTC" => {
                        self.exchange.buy_at_market(&self.base_symbol, None).await?;
                    }
                    "USDT" => {
                        self.exchange.sell_at_market(&self.base_symbol, None).await?;
                    }
                    _ => {}
                }
            }
        }
        info!("Sold all invalid alts");
        Ok(())
    }

    pub fn reload_coin_filters(&mut self) {
        match load_coin_filters(COIN_DATA_PATH) {
            Ok(filters) => {
                info!(
                    "Coin data reloaded: {} stable, {} option entries",
                    filters.stable_list.len(),
                    filters.option_list.len()
                );
                self.book.coin_filters = filters;
            }
            Err(err) => info!("Coin data not reloaded ({err}), keeping current filters"),
        }
    }

    pub async fn record_information(&self) -> Result<()> {
        self.exchange.update_ticker_data().await?;
        let btc_price = self
            .exchange
            .ticker_statistics(&Symbol::btc_usdt(), false)
            .await?
            .last_price;
        let mut extra_value = self.book.usdt_value(&self.exchange, btc_price).await?;
        for symbol in self.open_alts.keys() {
            let balance = self.exchange.balance(&symbol.base).await?.total;
            let stats = self.exchange.ticker_statistics(symbol, false).await?;
            let mut value = balance * stats.last_price;
            if symbol.quote == "BTC" {
                value *= btc_price;
            }
            extra_value += value;
        }
        record_balance_snapshot(&self.exchange, &self.recorder, extra_value, None).await
    }
}

#[async_trait]
impl<E: SpotExchange + 'static> Strategy for AltBtcDayTrade<E> {
    fn name(&self) -> &'static str {
        "binance_abd_trade"
    }

    async fn tick(&mut self) -> Result<()> {
        if self.gate.fires("coin_data", Every::Days(1)) {
            self.reload_coin_filters();
        }
        if self.gate.fires("btc_trade", Every::Days(1)) {
            self.btc_trade().await?;
        }
        if self.gate.fires("alt_trade", Every::Minutes(1)) {
            self.alt_trade().await?;
        }
        if self.gate.fires("record", Every::Days(1)) {
            self.record_information().await?;
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        cancel_all_with_retries(&self.exchange, self.name()).await;
    }
}
