use crate::api::{Spot, API};
use crate::client::Client;
use crate::errors::{BinanceError, Result};
use crate::models::{
    ExchangeInfo, Interval, Kline, OrderBook, Symbol, SymbolInfo, Ticker24h, TickerInfo,
    TickerStats,
};
use crate::pivot::{self, Pivot};
use crate::util::build_request;
use chrono::{Datelike, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Market-data manager: public endpoints plus the pivot anchors.
///
/// Listing and 24h-ticker data are cached on the manager and refreshed by the
/// explicit `update_*` calls; reads pass `data_update = false` to consume the
/// cached snapshot, the way the strategies do once per step.
#[derive(Clone)]
pub struct MarketData {
    pub client: Client,
    pub recv_window: u64,
    market_data: Arc<RwLock<Vec<SymbolInfo>>>,
    ticker_data: Arc<RwLock<Vec<Ticker24h>>>,
}

impl MarketData {
    pub(crate) fn from_client(client: Client, recv_window: u64) -> Self {
        MarketData {
            client,
            recv_window,
            market_data: Arc::new(RwLock::new(Vec::new())),
            ticker_data: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Pings the exchange; `false` means it answered but is not usable.
    pub async fn check_exchange_status(&self) -> Result<bool> {
        let _: Value = self.client.get(API::Spot(Spot::Ping), None).await?;
        Ok(true)
    }

    /// Refreshes the cached listing data (symbols, status, filters).
    pub async fn update_market_data(&self) -> Result<()> {
        let info: ExchangeInfo = self.client.get(API::Spot(Spot::ExchangeInfo), None).await?;
        *self.market_data.write().expect("market cache poisoned") = info.symbols;
        Ok(())
    }

    /// Refreshes the cached 24h statistics for every symbol.
    pub async fn update_ticker_data(&self) -> Result<()> {
        let tickers: Vec<Ticker24h> = self.client.get(API::Spot(Spot::Ticker24h), None).await?;
        *self.ticker_data.write().expect("ticker cache poisoned") = tickers;
        Ok(())
    }

    /// Consistent copy of the listing cache for one decision pass.
    pub fn market_snapshot(&self) -> Vec<SymbolInfo> {
        self.market_data.read().expect("market cache poisoned").clone()
    }

    pub fn ticker_snapshot(&self) -> Vec<Ticker24h> {
        self.ticker_data.read().expect("ticker cache poisoned").clone()
    }

    fn cached_symbol(&self, symbol: &Symbol) -> Option<SymbolInfo> {
        let flat = symbol.flat();
        self.market_data
            .read()
            .expect("market cache poisoned")
            .iter()
            .find(|info| info.symbol == flat)
            .cloned()
    }

    /// Whether the pair is listed and actively trading.
    pub async fn check_ticker_status(&self, symbol: &Symbol, data_update: bool) -> Result<bool> {
        if data_update {
            self.update_market_data().await?;
        }
        Ok(self
            .cached_symbol(symbol)
            .map(|info| info.is_trading())
            .unwrap_or(false))
    }

    /// Live snapshot for a symbol: fresh 24h ticker combined with the listing
    /// filters (tick and step increments).
    pub async fn get_ticker_info(&self, symbol: &Symbol, data_update: bool) -> Result<TickerInfo> {
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        let request = build_request(&parameters);
        let ticker: Ticker24h = self
            .client
            .get(API::Spot(Spot::Ticker24h), Some(request))
            .await?;
        if data_update {
            self.update_market_data().await?;
        }
        let info = self
            .cached_symbol(symbol)
            .ok_or_else(|| BinanceError::Unexpected(format!("{symbol} is not a known market")))?;
        Ok(TickerInfo {
            last_price: ticker.last_price,
            bid: ticker.bid_price,
            ask: ticker.ask_price,
            quote_volume: ticker.quote_volume,
            timestamp: ticker.close_time / 1000,
            internal_symbol: ticker.symbol,
            tick_size: info.tick_size().unwrap_or(0.0),
            step_size: info.step_size().unwrap_or(0.0),
        })
    }

    /// 24h price/volume statistics, from the shared cache unless a fresh
    /// fetch is requested or the symbol is missing from it.
    pub async fn get_ticker_statistics(
        &self,
        symbol: &Symbol,
        data_update: bool,
    ) -> Result<TickerStats> {
        let flat = symbol.flat();
        if !data_update {
            let cached = self
                .ticker_data
                .read()
                .expect("ticker cache poisoned")
                .iter()
                .find(|ticker| ticker.symbol == flat)
                .map(TickerStats::from);
            if let Some(stats) = cached {
                return Ok(stats);
            }
        }
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), flat);
        let request = build_request(&parameters);
        let ticker: Ticker24h = self
            .client
            .get(API::Spot(Spot::Ticker24h), Some(request))
            .await?;
        Ok(TickerStats::from(&ticker))
    }

    /// Every listed pair quoted in `quote`, from the listing cache.
    pub async fn get_tickers_by_quote(&self, quote: &str, data_update: bool) -> Result<Vec<Symbol>> {
        if data_update {
            self.update_market_data().await?;
        }
        Ok(self
            .market_data
            .read()
            .expect("market cache poisoned")
            .iter()
            .filter(|info| info.quote_asset == quote)
            .map(|info| info.pair())
            .collect())
    }

    /// Candles, oldest first.
    pub async fn get_ohlcv(
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
            .get(API::Spot(Spot::Klines), Some(request))
            .await?;
        crate::models::parse_klines(&rows)
    }

    pub async fn get_orderbook(&self, symbol: &Symbol, limit: u16) -> Result<OrderBook> {
        if limit > 5000 {
            return Err(BinanceError::Unexpected(
                "orderbook limit must be under 5000".into(),
            ));
        }
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("limit".into(), limit.to_string());
        let request = build_request(&parameters);
        self.client.get(API::Spot(Spot::Depth), Some(request)).await
    }

    /// Pivot of the previous calendar year. `None` until the symbol has
    /// traded across a year boundary.
    pub async fn get_yearly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        let monthly = self.get_ohlcv(symbol, Interval::Month1, Some(25)).await?;
        Ok(pivot::yearly_pivot(&monthly, Utc::now().year()))
    }

    pub async fn get_monthly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        let monthly = self.get_ohlcv(symbol, Interval::Month1, Some(5)).await?;
        Ok(pivot::previous_candle_pivot(&monthly))
    }

    pub async fn get_weekly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        let weekly = self.get_ohlcv(symbol, Interval::Week1, Some(5)).await?;
        Ok(pivot::previous_candle_pivot(&weekly))
    }

    pub async fn get_daily_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        let daily = self.get_ohlcv(symbol, Interval::Day1, Some(5)).await?;
        Ok(pivot::previous_candle_pivot(&daily))
    }

    /// Pivot anchored on `hours`-wide candles. Uses the exchange's native
    /// interval when it has one, otherwise aggregates locally from 1h data.
    pub async fn get_hourly_pivot(&self, symbol: &Symbol, hours: u32) -> Result<Option<Pivot>> {
        match Interval::native_hours(hours) {
            Some(interval) => {
                let candles = self.get_ohlcv(symbol, interval, Some(5)).await?;
                Ok(pivot::previous_candle_pivot(&candles))
            }
            None => {
                let hourly = self
                    .get_ohlcv(symbol, Interval::Hour1, Some((hours * 6) as u16))
                    .await?;
                let aggregated = pivot::aggregate_hours(&hourly, hours);
                Ok(pivot::previous_candle_pivot(&aggregated))
            }
        }
    }
}
