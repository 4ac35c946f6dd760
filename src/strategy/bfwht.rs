use crate::errors::{BinanceError, Result};
use crate::exchange::{FuturesExchange, SpotExchange};
use crate::models::{Interval, MarginType, OrderType, PositionSide, Symbol};
use crate::pivot::{previous_candle, Pivot};
use crate::runtime::{Every, Strategy, TickGate};
use crate::strategy::{
    cancel_all_futures_with_retries, profit_limit_price, record_balance_snapshot, ticker_is_stale,
    FutureStatus,
};
use crate::telemetry::Recorder;
use crate::util::now_secs;
use async_trait::async_trait;
use log::info;

const POSITION_BY_BALANCE: f64 = 0.7;
const PROFIT_ORDER_RATIO: f64 = 0.5;
const PRICE_OUTER_RATIO: f64 = 0.14;
/// Liquidation re-arm window matches the 4h candle cadence.
const LIQUIDATION_WINDOW_SECS: i64 = 4 * 3600;

/// BTC futures weekly-hour strategy: hourly steps on the weekly pivot with
/// 4h candles gating entries. Stop rests at S1/R1 and stays put (no
/// trailing ratchet on this anchor).
pub struct BtcFutureWeeklyHourTrade<E: FuturesExchange> {
    exchange: E,
    gate: TickGate,
    status: FutureStatus,
    base_symbol: Symbol,
    liquidation_timestamp: i64,
    leverage: u8,
    recorder: Recorder,
}

impl<E: FuturesExchange> BtcFutureWeeklyHourTrade<E> {
    pub fn new(exchange: E) -> Self {
        info!("Setting BTC future weekly-hour trading module...");
        BtcFutureWeeklyHourTrade {
            exchange,
            gate: TickGate::new(),
            status: FutureStatus::Init,
            base_symbol: Symbol::btc_usdt(),
            liquidation_timestamp: 0,
            leverage: 0,
            recorder: Recorder::new("BtcFutureWeeklyHourTrading", true),
        }
    }

    pub fn status(&self) -> FutureStatus {
        self.status
    }

    pub async fn future_trade(&mut self) -> Result<()> {
        info!("Starting BTC future trade...");
        if !self.exchange.exchange_alive().await? {
            info!("Exchange is not active. Exit BTC trade");
        }
        let symbol = self.base_symbol.clone();
        let pivot = self
            .exchange
            .future_weekly_pivot(&symbol)
            .await?
            .ok_or_else(|| {
                BinanceError::Unexpected(format!("{symbol}: weekly futures pivot unavailable"))
            })?;
        info!("{symbol} future pivot: {pivot:?}");
        let btc_info = self.exchange.future_ticker_info(&symbol).await?;
        if ticker_is_stale(btc_info.timestamp) {
            info!("Last transaction is too long ago. Exit BTC trade");
            return Ok(());
        }
        let candles = self
            .exchange
            .future_ohlcv(&symbol, Interval::Hour4, Some(5))
            .await?;
        let previous = previous_candle(&candles).ok_or_else(|| {
            BinanceError::Unexpected(format!("{symbol}: not enough 4h candles"))
        })?;
        let prev_open = previous.open;
        let prev_close = previous.close;

        self.check_liquidation(LIQUIDATION_WINDOW_SECS).await?;

        match self.status {
            FutureStatus::Init => {
                if prev_close >= pivot.p && pivot.p >= prev_open {
                    self.switch_position(PositionSide::Long, &pivot).await?;
                    self.status = FutureStatus::Long;
                } else if prev_close < pivot.p && pivot.p <= prev_open {
                    self.switch_position(PositionSide::Short, &pivot).await?;
                    self.status = FutureStatus::Short;
                }
            }
            FutureStatus::Long => {
                if prev_close < pivot.p {
                    self.switch_position(PositionSide::Short, &pivot).await?;
                    self.status = FutureStatus::Short;
                }
            }
            FutureStatus::Short => {
                if prev_close > pivot.p {
                    self.switch_position(PositionSide::Long, &pivot).await?;
                    self.status = FutureStatus::Long;
                }
            }
        }
        info!("Exit future trade");
        Ok(())
    }

    async fn check_liquidation(&mut self, window_secs: i64) -> Result<()> {
        info!("Check position status");
        let position_amount = self.exchange.position_amount(&self.base_symbol).await?;
        if self.status != FutureStatus::Init
            && position_amount == 0.0
            && self.liquidation_timestamp == 0
        {
            self.liquidation_timestamp = now_secs();
            info!("There is no position. Liquidated.");
        }
        if self.liquidation_timestamp != 0
            && now_secs() / window_secs != self.liquidation_timestamp / window_secs
        {
            self.status = FutureStatus::Init;
            self.liquidation_timestamp = 0;
        }
        Ok(())
    }

    async fn switch_position(&mut self, side: PositionSide, pivot: &Pivot) -> Result<()> {
        let symbol = self.base_symbol.clone();
        self.exchange.cancel_all_future_orders(&symbol).await?;
        self.exchange.close_position(&symbol).await?;
        let last_price = self.exchange.last_price(&symbol).await?;
        let balance = self.exchange.future_balance().await? * POSITION_BY_BALANCE;
        let (leverage, quantity) =
            self.exchange
                .solve_sr2(last_price, pivot.sr2(side), balance, side)?;
        info!("Position plan: leverage={leverage}, quantity={quantity}");
        self.leverage = leverage;
        self.exchange
            .set_margin_type(&symbol, MarginType::Isolated)
            .await?;
        self.exchange.set_leverage(&symbol, leverage).await?;

        let entry = self
            .exchange
            .create_future_order(
                &symbol,
                side.entry_side(),
                OrderType::Market,
                quantity,
                None,
                None,
                false,
            )
            .await?;
        info!("{side:?} position market order result: {}", entry.order_id);

        let stop_price = match side {
            PositionSide::Long => pivot.s1,
            PositionSide::Short => pivot.r1,
        };
        let stop = self
            .exchange
            .create_future_order(
                &symbol,
                side.exit_side(),
                OrderType::StopMarket,
                quantity,
                None,
                Some(stop_price),
                true,
            )
            .await?;
        info!("{side:?} position stop order result: {}", stop.order_id);

        let last_price = self.exchange.last_price(&symbol).await?;
        let limit_price = profit_limit_price(side, last_price, pivot, PRICE_OUTER_RATIO);
        let profit = self
            .exchange
            .create_future_order(
                &symbol,
                side.exit_side(),
                OrderType::Limit,
                quantity * PROFIT_ORDER_RATIO,
                Some(limit_price),
                None,
                true,
            )
            .await?;
        info!("{side:?} position limit profit order result: {}", profit.order_id);
        Ok(())
    }

    pub async fn record_information(&self) -> Result<()> {
        let future_balance = self.exchange.future_balance().await?;
        record_balance_snapshot(
            &self.exchange,
            &self.recorder,
            future_balance,
            Some(self.leverage),
        )
        .await
    }
}

#[async_trait]
impl<E: FuturesExchange + 'static> Strategy for BtcFutureWeeklyHourTrade<E> {
    fn name(&self) -> &'static str {
        "binance_bfwht_trade"
    }

    async fn tick(&mut self) -> Result<()> {
        if self.gate.fires("btc_trade", Every::Hours(1)) {
            self.future_trade().await?;
        }
        if self.gate.fires("record", Every::Days(1)) {
            self.record_information().await?;
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        cancel_all_futures_with_retries(&self.exchange, &self.base_symbol, self.name()).await;
    }
}
