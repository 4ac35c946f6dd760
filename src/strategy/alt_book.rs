use crate::control::CoinFilters;
use crate::errors::{BinanceError, Result};
use crate::exchange::SpotExchange;
use crate::models::{Interval, OcoOrder, OrderType, Side, Symbol};
use crate::pivot::previous_candle;
use crate::strategy::TradingAlt;
use chrono::{Datelike, Utc};
use itertools::Itertools;
use log::info;
use std::collections::HashMap;

/// Minimum 24h quote volume for BTC-quoted candidates, in BTC.
pub const BTC_PAIR_MIN_VOLUME: f64 = 100.0;
/// BTC-quoted price floor; anything cheaper trades in satoshi dust.
pub const BTC_PAIR_MIN_PRICE: f64 = 0.000_000_40;
/// Minimum 24h quote volume for USDT-quoted candidates.
pub const USDT_PAIR_MIN_VOLUME: f64 = 1e6;

/// Position split: the R2 take-profit OCO covers 20%, R3 30%, the plain stop
/// the remainder.
pub const R2_QUANTITY_RATIO: f64 = 0.2;
pub const R3_QUANTITY_RATIO: f64 = 0.3;
/// Stop-limit price offset under the S1 trigger.
pub const STOP_LIMIT_PRICE_RATIO: f64 = 0.1;
/// Fallback take-profit offsets when the price already ran past R2/R3.
pub const R2_PRICE_OUTER_RATIO: f64 = 0.15;
pub const R3_PRICE_OUTER_RATIO: f64 = 0.30;

/// The alt position book shared by the daily and day-pair strategies:
/// validity screening, reconciliation against the exchange, exits, entries
/// and protective-order maintenance.
pub struct AltBook {
    pub trading_alts: HashMap<Symbol, TradingAlt>,
    pub max_trade_limit: usize,
    pub coin_filters: CoinFilters,
    prev_day: i64,
}

impl AltBook {
    pub fn new(max_trade_limit: usize) -> Self {
        AltBook {
            trading_alts: HashMap::new(),
            max_trade_limit,
            coin_filters: CoinFilters::defaults(),
            prev_day: Utc::now().day() as i64 - 1,
        }
    }

    fn trading_alt_names(&self) -> String {
        self.trading_alts
            .keys()
            .map(|symbol| symbol.to_string())
            .sorted()
            .join(", ")
    }

    /// Validity screen for an entry candidate: listed and trading, not
    /// already held, not a leveraged token, and above the per-quote volume
    /// and price floors. Stable bases are never traded against USDT.
    pub async fn is_valid_alt<E: SpotExchange>(&self, exchange: &E, symbol: &Symbol) -> Result<bool> {
        if !exchange.ticker_active(symbol, false).await? {
            return Ok(false);
        }
        if self.trading_alts.contains_key(symbol) {
            return Ok(false);
        }
        let stats = exchange.ticker_statistics(symbol, false).await?;
        match symbol.quote.as_str() {
            "BTC" => Ok(stats.quote_volume >= BTC_PAIR_MIN_VOLUME
                && stats.last_price >= BTC_PAIR_MIN_PRICE),
            "USDT" => Ok(stats.quote_volume >= USDT_PAIR_MIN_VOLUME
                && !self.coin_filters.is_stable(&symbol.base)
                && !self.coin_filters.is_leveraged_token(&symbol.base)),
            _ => Ok(false),
        }
    }

    /// Reconciliation pass: adopt live protective orders the book does not
    /// know (restart recovery), drop entries whose balance fell under the
    /// notional floor, and refresh executed quantities and filled flags from
    /// the exchange.
    pub async fn check_trading_alts<E: SpotExchange>(&mut self, exchange: &E) -> Result<()> {
        info!("Checking trading alts status...");
        exchange.update_open_orders().await?;
        self.rediscover_trading_alts(exchange).await?;

        let symbols: Vec<Symbol> = self.trading_alts.keys().cloned().collect();
        for symbol in symbols {
            let balance = exchange.balance(&symbol.base).await?.total;
            if !exchange.order_quantity_ok(&symbol, balance).await? {
                self.cancel_protective_orders(exchange, &symbol).await?;
                self.trading_alts.remove(&symbol);
                info!("{symbol} is deleted from trading alts");
                continue;
            }
            let mut stat = match self.trading_alts.get(&symbol) {
                Some(stat) => *stat,
                None => continue,
            };
            if stat.total_quantity == 0.0 {
                continue;
            }
            let mut total_stop_quantity = 0.0;
            if stat.stop_order_id != 0 {
                let stop_stat = exchange.order_stat(stat.stop_order_id, &symbol).await?;
                total_stop_quantity += stop_stat.executed_quantity;
            }
            if stat.r3_order.is_placed() {
                let stop_stat = exchange
                    .order_stat(stat.r3_order.stop_order_id, &symbol)
                    .await?;
                total_stop_quantity += stop_stat.executed_quantity;
                let limit_stat = exchange
                    .order_stat(stat.r3_order.limit_order_id, &symbol)
                    .await?;
                if limit_stat.status == crate::models::OrderStatus::Filled {
                    stat.r3_filled = true;
                }
            }
            if stat.r2_order.is_placed() {
                let stop_stat = exchange
                    .order_stat(stat.r2_order.stop_order_id, &symbol)
                    .await?;
                total_stop_quantity += stop_stat.executed_quantity;
                let limit_stat = exchange
                    .order_stat(stat.r2_order.limit_order_id, &symbol)
                    .await?;
                if limit_stat.status == crate::models::OrderStatus::Filled {
                    stat.r2_filled = true;
                }
            }
            stat.s1_quantity = total_stop_quantity;
            self.trading_alts.insert(symbol, stat);
        }
        info!("Checked all trading alts status");
        Ok(())
    }

    /// Rebuilds book entries from live sell-side protective orders found on
    /// the exchange for symbols we hold but do not track. A restarted process
    /// re-observes its stops and OCOs here instead of double-submitting them.
    async fn rediscover_trading_alts<E: SpotExchange>(&mut self, exchange: &E) -> Result<()> {
        let open_orders = exchange.open_orders().await?;
        let mut by_symbol: HashMap<String, Vec<&crate::models::OpenOrder>> = HashMap::new();
        for order in open_orders.iter().filter(|order| order.side == Side::Sell) {
            by_symbol
                .entry(order.internal_symbol.clone())
                .or_default()
                .push(order);
        }
        for (internal_symbol, orders) in by_symbol {
            let symbol = match split_internal_symbol(&internal_symbol) {
                Some(symbol) => symbol,
                None => continue,
            };
            if self.trading_alts.contains_key(&symbol) {
                continue;
            }
            let balance = exchange.balance(&symbol.base).await?.total;
            if !exchange.order_quantity_ok(&symbol, balance).await? {
                continue;
            }
            let mut stat = TradingAlt {
                total_quantity: balance,
                ..TradingAlt::default()
            };
            let mut oco_lists: HashMap<i64, OcoOrder> = HashMap::new();
            let mut oco_limit_prices: HashMap<i64, f64> = HashMap::new();
            for order in orders {
                if order.order_list_id == -1 {
                    if order.order_type == OrderType::StopLossLimit {
                        stat.stop_order_id = order.order_id;
                    }
                    continue;
                }
                let oco = oco_lists.entry(order.order_list_id).or_insert(OcoOrder {
                    order_list_id: order.order_list_id,
                    ..OcoOrder::default()
                });
                match order.order_type {
                    OrderType::LimitMaker => {
                        oco.limit_order_id = order.order_id;
                        oco_limit_prices.insert(order.order_list_id, order.price);
                    }
                    OrderType::StopLossLimit => oco.stop_order_id = order.order_id,
                    _ => {}
                }
            }
            // The lower take-profit is the R2 leg, the higher one R3.
            let ordered: Vec<OcoOrder> = oco_lists
                .values()
                .copied()
                .sorted_by(|a, b| {
                    let pa = oco_limit_prices.get(&a.order_list_id).copied().unwrap_or(0.0);
                    let pb = oco_limit_prices.get(&b.order_list_id).copied().unwrap_or(0.0);
                    pa.total_cmp(&pb)
                })
                .collect();
            if let Some(first) = ordered.first() {
                stat.r2_order = *first;
            }
            if let Some(second) = ordered.get(1) {
                stat.r3_order = *second;
            }
            if stat.stop_order_id == 0 && !stat.r2_order.is_placed() {
                continue;
            }
            info!("{symbol}: re-discovered live protective orders, restored to trading alts");
            self.trading_alts.insert(symbol, stat);
        }
        Ok(())
    }

    /// Cancels whichever of the three protective orders are still live.
    pub async fn cancel_protective_orders<E: SpotExchange>(
        &self,
        exchange: &E,
        symbol: &Symbol,
    ) -> Result<()> {
        info!("{symbol}: cancel protective orders");
        let stat = match self.trading_alts.get(symbol) {
            Some(stat) => *stat,
            None => return Ok(()),
        };
        exchange.update_open_orders().await?;
        if stat.stop_order_id != 0
            && exchange
                .open_order_info(stat.stop_order_id, false)
                .await?
                .is_some()
        {
            info!("{symbol}: cancel s1 stop order");
            exchange.cancel_order(symbol, stat.stop_order_id).await?;
        }
        for (name, oco) in [("r3", stat.r3_order), ("r2", stat.r2_order)] {
            if !oco.is_placed() {
                continue;
            }
            if exchange
                .open_order_info(oco.stop_order_id, false)
                .await?
                .is_some()
            {
                info!("{symbol}: cancel {name} stop order");
                exchange.cancel_order(symbol, oco.stop_order_id).await?;
            }
            if exchange
                .open_order_info(oco.limit_order_id, false)
                .await?
                .is_some()
            {
                info!("{symbol}: cancel {name} limit order");
                exchange.cancel_order(symbol, oco.limit_order_id).await?;
            }
        }
        info!("{symbol}: cancelled all protective orders");
        Ok(())
    }

    /// Cancels the protective orders, dumps the position at market and drops
    /// the book entry.
    pub async fn liquidate<E: SpotExchange>(&mut self, exchange: &E, symbol: &Symbol) -> Result<()> {
        self.cancel_protective_orders(exchange, symbol).await?;
        exchange.sell_at_market(symbol, None).await?;
        self.trading_alts.remove(symbol);
        info!("{symbol} is deleted from trading alts");
        Ok(())
    }

    /// Exit pass: S1 break, a daily close under P on day rollover, or an
    /// actually-triggered stop each liquidate the position.
    pub async fn apply_exit_conditions<E: SpotExchange>(&mut self, exchange: &E) -> Result<()> {
        let day_now = Utc::now().day() as i64;
        let new_day = self.prev_day != day_now;
        if new_day {
            self.prev_day = day_now;
        }
        let symbols: Vec<Symbol> = self.trading_alts.keys().cloned().collect();
        for symbol in symbols {
            let ticker_info = exchange.ticker_info(&symbol, true).await?;
            let pivot = exchange.monthly_pivot(&symbol).await?.ok_or_else(|| {
                BinanceError::Unexpected(format!("{symbol}: monthly pivot unavailable"))
            })?;
            let daily = exchange.ohlcv(&symbol, Interval::Day1, Some(5)).await?;
            let prev_close = previous_candle(&daily)
                .ok_or_else(|| {
                    BinanceError::Unexpected(format!("{symbol}: not enough daily candles"))
                })?
                .close;
            let balance = exchange.balance(&symbol.base).await?.total;
            let mut stat = match self.trading_alts.get(&symbol) {
                Some(stat) => *stat,
                None => continue,
            };
            if stat.total_quantity == 0.0 {
                stat.total_quantity = balance;
                self.trading_alts.insert(symbol.clone(), stat);
            }

            if ticker_info.last_price <= pivot.s1 {
                info!("{symbol}: last price is under pivot S1");
                self.liquidate(exchange, &symbol).await?;
            } else if prev_close < pivot.p && new_day {
                info!("{symbol}: previous daily close price is under pivot P");
                self.liquidate(exchange, &symbol).await?;
            } else if stat.s1_quantity > 0.0 {
                info!("{symbol}: stop order has been triggered");
                self.liquidate(exchange, &symbol).await?;
            }
        }
        Ok(())
    }

    /// Entry pass over the given quote universes: a symbol qualifies when its
    /// previous daily close crossed the monthly pivot P from below
    /// (`C-2 < P <= C-1`). Each entry market-buys an equal share of the
    /// remaining quote balance.
    pub async fn enter_new_positions<E: SpotExchange>(
        &mut self,
        exchange: &E,
        quotes: &[&str],
    ) -> Result<()> {
        let mut slots = self.max_trade_limit.saturating_sub(self.trading_alts.len());
        if slots == 0 {
            return Ok(());
        }
        let mut candidates: Vec<Symbol> = Vec::new();
        for quote in quotes {
            for symbol in exchange.tickers_by_quote(quote, false).await? {
                if self.is_valid_alt(exchange, &symbol).await? {
                    candidates.push(symbol);
                }
            }
        }
        info!("Valid ticker count: {}", candidates.len());

        for symbol in candidates {
            if slots == 0 {
                break;
            }
            let pivot = match exchange.monthly_pivot(&symbol).await? {
                Some(pivot) => pivot,
                None => continue,
            };
            let daily = exchange.ohlcv(&symbol, Interval::Day1, Some(5)).await?;
            if daily.len() < 3 {
                continue;
            }
            let prev_close = daily[daily.len() - 2].close;
            let prev_prev_close = daily[daily.len() - 3].close;
            if !(prev_prev_close < pivot.p && pivot.p <= prev_close) {
                continue;
            }
            let quote_balance = exchange.balance(&symbol.quote).await?.total;
            let quantity = quote_balance / slots as f64;
            if exchange.buy_at_market(&symbol, Some(quantity)).await? {
                self.trading_alts.insert(symbol.clone(), TradingAlt::default());
                slots -= 1;
                info!("Trading alts is updated to [{}]", self.trading_alt_names());
            }
        }
        Ok(())
    }

    /// Places the protective set for every position missing part of it: two
    /// sell OCOs (R2 and R3 take-profits against an S1 stop) and a plain
    /// stop-limit on the remainder. A take-profit the price already ran past
    /// is pushed out by a fixed offset from the last price instead.
    pub async fn place_protective_orders<E: SpotExchange>(&mut self, exchange: &E) -> Result<()> {
        let symbols: Vec<Symbol> = self.trading_alts.keys().cloned().collect();
        for symbol in symbols {
            let mut stat = match self.trading_alts.get(&symbol) {
                Some(stat) => *stat,
                None => continue,
            };
            if stat.r3_order.is_placed() && stat.r2_order.is_placed() && stat.stop_order_id != 0 {
                continue;
            }
            let ticker_info = exchange.ticker_info(&symbol, false).await?;
            let balance = exchange.balance(&symbol.base).await?.total;
            if stat.total_quantity == 0.0 {
                stat.total_quantity = balance;
            }
            let pivot = exchange.monthly_pivot(&symbol).await?.ok_or_else(|| {
                BinanceError::Unexpected(format!("{symbol}: monthly pivot unavailable"))
            })?;
            let stop_price = pivot.s1;
            let stop_limit_price = stop_price * (1.0 - STOP_LIMIT_PRICE_RATIO);
            let r3_amount = stat.total_quantity * R3_QUANTITY_RATIO;
            let r2_amount = stat.total_quantity * R2_QUANTITY_RATIO;
            let stop_amount = balance - r3_amount - r2_amount;

            if !stat.r3_order.is_placed() {
                info!("{symbol}: create pivot r3 OCO order");
                let take_profit = if ticker_info.last_price >= pivot.r3 {
                    ticker_info.last_price * (1.0 + R3_PRICE_OUTER_RATIO)
                } else {
                    pivot.r3
                };
                stat.r3_order = exchange
                    .create_oco_order(
                        &symbol,
                        Side::Sell,
                        r3_amount,
                        take_profit,
                        stop_price,
                        stop_limit_price,
                    )
                    .await?;
            }
            if !stat.r2_order.is_placed() {
                info!("{symbol}: create pivot r2 OCO order");
                let take_profit = if ticker_info.last_price >= pivot.r2 {
                    ticker_info.last_price * (1.0 + R2_PRICE_OUTER_RATIO)
                } else {
                    pivot.r2
                };
                stat.r2_order = exchange
                    .create_oco_order(
                        &symbol,
                        Side::Sell,
                        r2_amount,
                        take_profit,
                        stop_price,
                        stop_limit_price,
                    )
                    .await?;
            }
            if stat.stop_order_id == 0 {
                info!("{symbol}: create stop order");
                let ack = exchange
                    .create_order(
                        &symbol,
                        Side::Sell,
                        stop_amount,
                        Some(stop_limit_price),
                        Some(stop_price),
                        OrderType::StopLossLimit,
                    )
                    .await?;
                stat.stop_order_id = ack.order_id;
            }
            self.trading_alts.insert(symbol, stat);
        }
        Ok(())
    }

    /// Values every held alt in USDT for the daily telemetry row.
    pub async fn usdt_value<E: SpotExchange>(&self, exchange: &E, btc_price: f64) -> Result<f64> {
        let mut value = 0.0;
        for symbol in self.trading_alts.keys() {
            let balance = exchange.balance(&symbol.base).await?.total;
            let stats = exchange.ticker_statistics(symbol, false).await?;
            let mut position_value = balance * stats.last_price;
            if symbol.quote == "BTC" {
                position_value *= btc_price;
            }
            value += position_value;
        }
        Ok(value)
    }
}

/// Splits the exchange-internal flat form against the quote universe the alt
/// strategies trade.
pub fn split_internal_symbol(internal: &str) -> Option<Symbol> {
    for quote in ["USDT", "BTC"] {
        if let Some(base) = internal.strip_suffix(quote) {
            if !base.is_empty() {
                return Some(Symbol::new(base, quote));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_symbols_split_on_known_quotes() {
        assert_eq!(split_internal_symbol("FOOUSDT"), Some(Symbol::new("FOO", "USDT")));
        assert_eq!(split_internal_symbol("LTCBTC"), Some(Symbol::new("LTC", "BTC")));
        assert_eq!(split_internal_symbol("FOOEUR"), None);
        assert_eq!(split_internal_symbol("USDT"), None);
    }
}
