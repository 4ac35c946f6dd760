use crate::control::load_coin_filters;
use crate::errors::Result;
use crate::exchange::SpotExchange;
use crate::models::Symbol;
use crate::runtime::{Every, Strategy, TickGate};
use crate::strategy::{cancel_all_with_retries, record_balance_snapshot, AltBook, TradingAlt};
use crate::telemetry::Recorder;
use async_trait::async_trait;
use log::info;
use std::collections::HashMap;

/// Coin-data configuration reloaded once per day into the validity filters.
pub const COIN_DATA_PATH: &str = "data/binance/coin_data.csv";

/// Alt daily strategy: hourly sweep over the BTC- and USDT-quoted universe,
/// entering on a fresh upward cross of the monthly pivot and guarding each
/// position with an R2/R3 OCO pair and an S1 stop.
pub struct AltDailyTrade<E: SpotExchange> {
    exchange: E,
    gate: TickGate,
    book: AltBook,
    recorder: Recorder,
}

impl<E: SpotExchange> AltDailyTrade<E> {
    pub fn new(exchange: E) -> Self {
        info!("Setting alt daily trading module...");
        AltDailyTrade {
            exchange,
            gate: TickGate::new(),
            book: AltBook::new(5),
            recorder: Recorder::new("AltDailyTrading", false),
        }
    }

    pub fn trading_alts(&self) -> &HashMap<Symbol, TradingAlt> {
        &self.book.trading_alts
    }

    pub fn book_mut(&mut self) -> &mut AltBook {
        &mut self.book
    }

    pub fn max_trade_limit(&self) -> usize {
        self.book.max_trade_limit
    }

    pub async fn alt_trade(&mut self) -> Result<()> {
        info!("Starting alt trade...");
        if !self.exchange.exchange_alive().await? {
            info!("Exchange is not active. Exit alt trade");
        }
        self.exchange.update_market_data().await?;
        self.exchange.update_ticker_data().await?;

        self.book.check_trading_alts(&self.exchange).await?;
        self.book.apply_exit_conditions(&self.exchange).await?;
        self.book
            .enter_new_positions(&self.exchange, &["BTC", "USDT"])
            .await?;
        self.book.place_protective_orders(&self.exchange).await?;
        info!("Exit alt trade");
        Ok(())
    }

    /// Daily reload of the stable/option lists; a missing or unreadable file
    /// keeps the current filters.
    pub fn reload_coin_filters(&mut self) {
        match load_coin_filters(COIN_DATA_PATH) {
            Ok(filters) => {
                info!("Coin data reloaded: {} stable, {} option entries",
                    filters.stable_list.len(), filters.option_list.len());
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
        let alt_value = self.book.usdt_value(&self.exchange, btc_price).await?;
        record_balance_snapshot(&self.exchange, &self.recorder, alt_value, None).await
    }
}

#[async_trait]
impl<E: SpotExchange + 'static> Strategy for AltDailyTrade<E> {
    fn name(&self) -> &'static str {
        "binance_adt_trade"
    }

    async fn tick(&mut self) -> Result<()> {
        if self.gate.fires("coin_data", Every::Days(1)) {
            self.reload_coin_filters();
        }
        if self.gate.fires("alt_trade", Every::Hours(1)) {
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
