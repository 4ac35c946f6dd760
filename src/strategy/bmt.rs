use crate::errors::{BinanceError, Result};
use crate::exchange::SpotExchange;
use crate::models::{Interval, Symbol};
use crate::pivot::previous_candle;
use crate::runtime::{Every, Strategy, TickGate};
use crate::strategy::{
    cancel_all_with_retries, record_balance_snapshot, ticker_is_stale, BtcStatus,
};
use crate::telemetry::Recorder;
use async_trait::async_trait;
use log::info;

/// BTC monthly spot strategy: hold BTC while the previous monthly close sits
/// above the yearly pivot, exit to USDT under it or on an S1 break.
pub struct BtcMonthlyTrade<E: SpotExchange> {
    exchange: E,
    gate: TickGate,
    status: BtcStatus,
    base_symbol: Symbol,
    recorder: Recorder,
}

impl<E: SpotExchange> BtcMonthlyTrade<E> {
    pub fn new(exchange: E) -> Self {
        info!("Setting BTC monthly trading module...");
        BtcMonthlyTrade {
            exchange,
            gate: TickGate::new(),
            status: BtcStatus::Init,
            base_symbol: Symbol::btc_usdt(),
            recorder: Recorder::new("BtcMonthlyTrading", false),
        }
    }

    pub fn status(&self) -> BtcStatus {
        self.status
    }

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

        info!("Current btc status is {:?}", self.status);
        if btc_info.last_price < pivot.s1 {
            info!("{symbol}: last price is under pivot S1");
            if self.status != BtcStatus::Sell {
                info!("{symbol}: start sell BTC procedure");
                self.sell_all_btc().await?;
                self.status = BtcStatus::Sell;
                info!("Change btc status to 'sell'");
            }
        } else if prev_close < pivot.p {
            info!("{symbol}: previous monthly close price is under pivot P");
            if self.status != BtcStatus::Sell {
                info!("{symbol}: start sell BTC procedure");
                self.sell_all_btc().await?;
                self.status = BtcStatus::Sell;
                info!("Change btc status to 'sell'");
            }
        } else {
            info!("{symbol}: previous monthly close price is more than pivot P");
            if self.status != BtcStatus::Buy {
                info!("{symbol}: start buy BTC procedure");
                self.buy_all_btc().await?;
                self.status = BtcStatus::Buy;
                info!("Change btc status to 'buy'");
            }
        }
        info!("Exit BTC trade");
        Ok(())
    }

    async fn sell_all_btc(&self) -> Result<()> {
        info!("Sell all BTC");
        self.exchange.sell_at_market(&self.base_symbol, None).await?;
        Ok(())
    }

    async fn buy_all_btc(&self) -> Result<()> {
        info!("Buy all BTC");
        self.exchange.buy_at_market(&self.base_symbol, None).await?;
        Ok(())
    }

    pub async fn record_information(&self) -> Result<()> {
        record_balance_snapshot(&self.exchange, &self.recorder, 0.0, None).await
    }
}

#[async_trait]
impl<E: SpotExchange + 'static> Strategy for BtcMonthlyTrade<E> {
    fn name(&self) -> &'static str {
        "binance_bmt_trade"
    }

    async fn tick(&mut self) -> Result<()> {
        if self.gate.fires("btc_trade", Every::Days(1)) {
            self.btc_trade().await?;
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
