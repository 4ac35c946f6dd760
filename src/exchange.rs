use crate::errors::Result;
use crate::futures::{sr2_leverage, FuturesTrader};
use crate::models::{
    Balance, CancelSpec, FutureTickerInfo, Interval, Kline, MarginType, OcoOrder, OpenOrder,
    OrderAck, OrderStat, OrderType, PositionSide, Side, Symbol, TickerInfo, TickerStats,
};
use crate::pivot::Pivot;
use crate::trade::Trader;
use async_trait::async_trait;

/// The spot surface a strategy consumes.
///
/// The production implementation is [`Trader`]; the integration suites drive
/// the same state machines against an in-memory fake.
#[async_trait]
pub trait SpotExchange: Send + Sync {
    async fn exchange_alive(&self) -> Result<bool>;

    async fn update_market_data(&self) -> Result<()>;
    async fn update_ticker_data(&self) -> Result<()>;
    async fn update_open_orders(&self) -> Result<()>;

    async fn ticker_active(&self, symbol: &Symbol, data_update: bool) -> Result<bool>;
    async fn ticker_info(&self, symbol: &Symbol, data_update: bool) -> Result<TickerInfo>;
    async fn ticker_statistics(&self, symbol: &Symbol, data_update: bool) -> Result<TickerStats>;
    async fn tickers_by_quote(&self, quote: &str, data_update: bool) -> Result<Vec<Symbol>>;
    async fn ohlcv(&self, symbol: &Symbol, interval: Interval, limit: Option<u16>)
        -> Result<Vec<Kline>>;
    async fn yearly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>>;
    async fn monthly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>>;

    async fn balance(&self, asset: &str) -> Result<Balance>;
    async fn open_orders(&self) -> Result<Vec<OpenOrder>>;
    async fn open_order_info(&self, order_id: u64, data_update: bool) -> Result<Option<OpenOrder>>;
    async fn order_stat(&self, order_id: u64, symbol: &Symbol) -> Result<OrderStat>;

    async fn order_quantity_ok(&self, symbol: &Symbol, quantity: f64) -> Result<bool>;
    async fn sell_at_market(&self, symbol: &Symbol, quantity: Option<f64>) -> Result<bool>;
    async fn buy_at_market(&self, symbol: &Symbol, quote_quantity: Option<f64>) -> Result<bool>;
    async fn create_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: f64,
        price: Option<f64>,
        stop_price: Option<f64>,
        order_type: OrderType,
    ) -> Result<OrderAck>;
    async fn create_oco_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: f64,
        price: f64,
        stop_price: f64,
        stop_limit_price: f64,
    ) -> Result<OcoOrder>;
    async fn cancel_order(&self, symbol: &Symbol, order_id: u64) -> Result<()>;
    async fn cancel_order_list(&self, symbol: &Symbol, order_list_id: i64) -> Result<()>;
    async fn cancel_all_orders(&self, spec: CancelSpec) -> Result<bool>;
}

/// The futures surface, on top of the spot one the futures strategies also
/// read for telemetry.
#[async_trait]
pub trait FuturesExchange: SpotExchange {
    async fn future_ohlcv(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: Option<u16>,
    ) -> Result<Vec<Kline>>;
    async fn future_monthly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>>;
    async fn future_weekly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>>;
    async fn future_hourly_pivot(&self, symbol: &Symbol, hours: u32) -> Result<Option<Pivot>>;

    async fn last_price(&self, symbol: &Symbol) -> Result<f64>;
    async fn future_ticker_info(&self, symbol: &Symbol) -> Result<FutureTickerInfo>;
    async fn future_balance(&self) -> Result<f64>;

    async fn set_leverage(&self, symbol: &Symbol, leverage: u8) -> Result<()>;
    async fn set_margin_type(&self, symbol: &Symbol, margin_type: MarginType) -> Result<()>;
    async fn create_future_order(
        &self,
        symbol: &Symbol,
        side: Side,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
        stop_price: Option<f64>,
        reduce_only: bool,
    ) -> Result<crate::models::FuturesOrderAck>;
    async fn cancel_all_future_orders(&self, symbol: &Symbol) -> Result<()>;
    async fn cancel_future_order(&self, symbol: &Symbol, order_id: u64) -> Result<()>;
    async fn close_position(&self, symbol: &Symbol) -> Result<()>;
    async fn position_amount(&self, symbol: &Symbol) -> Result<f64>;

    /// Pure sizing pass-through so strategies and fakes share one solver.
    fn solve_sr2(
        &self,
        entry_price: f64,
        sr2: f64,
        wallet_balance: f64,
        side: PositionSide,
    ) -> Result<(u8, f64)> {
        sr2_leverage(entry_price, sr2, wallet_balance, side)
    }
}

#[async_trait]
impl SpotExchange for Trader {
    async fn exchange_alive(&self) -> Result<bool> {
        self.market.check_exchange_status().await
    }

    async fn update_market_data(&self) -> Result<()> {
        self.market.update_market_data().await
    }

    async fn update_ticker_data(&self) -> Result<()> {
        self.market.update_ticker_data().await
    }

    async fn update_open_orders(&self) -> Result<()> {
        self.account.update_open_order_data().await
    }

    async fn ticker_active(&self, symbol: &Symbol, data_update: bool) -> Result<bool> {
        self.market.check_ticker_status(symbol, data_update).await
    }

    async fn ticker_info(&self, symbol: &Symbol, data_update: bool) -> Result<TickerInfo> {
        self.market.get_ticker_info(symbol, data_update).await
    }

    async fn ticker_statistics(&self, symbol: &Symbol, data_update: bool) -> Result<TickerStats> {
        self.market.get_ticker_statistics(symbol, data_update).await
    }

    async fn tickers_by_quote(&self, quote: &str, data_update: bool) -> Result<Vec<Symbol>> {
        self.market.get_tickers_by_quote(quote, data_update).await
    }

    async fn ohlcv(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: Option<u16>,
    ) -> Result<Vec<Kline>> {
        self.market.get_ohlcv(symbol, interval, limit).await
    }

    async fn yearly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        self.market.get_yearly_pivot(symbol).await
    }

    async fn monthly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        self.market.get_monthly_pivot(symbol).await
    }

    async fn balance(&self, asset: &str) -> Result<Balance> {
        self.account.get_balance(asset).await
    }

    async fn open_orders(&self) -> Result<Vec<OpenOrder>> {
        self.account.get_open_orders().await
    }

    async fn open_order_info(&self, order_id: u64, data_update: bool) -> Result<Option<OpenOrder>> {
        self.account.get_open_order_info(order_id, data_update).await
    }

    async fn order_stat(&self, order_id: u64, symbol: &Symbol) -> Result<OrderStat> {
        self.account.get_order_stat(order_id, symbol).await
    }

    async fn order_quantity_ok(&self, symbol: &Symbol, quantity: f64) -> Result<bool> {
        self.check_order_quantity(symbol, quantity).await
    }

    async fn sell_at_market(&self, symbol: &Symbol, quantity: Option<f64>) -> Result<bool> {
        Trader::sell_at_market(self, symbol, quantity).await
    }

    async fn buy_at_market(&self, symbol: &Symbol, quote_quantity: Option<f64>) -> Result<bool> {
        Trader::buy_at_market(self, symbol, quote_quantity).await
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
        Trader::create_order(self, symbol, side, quantity, price, stop_price, order_type).await
    }

    async fn create_oco_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: f64,
        price: f64,
        stop_price: f64,
        stop_limit_price: f64,
    ) -> Result<OcoOrder> {
        Trader::create_oco_order(self, symbol, side, quantity, price, stop_price, stop_limit_price)
            .await
    }

    async fn cancel_order(&self, symbol: &Symbol, order_id: u64) -> Result<()> {
        Trader::cancel_order(self, symbol, order_id).await
    }

    async fn cancel_order_list(&self, symbol: &Symbol, order_list_id: i64) -> Result<()> {
        Trader::cancel_order_list(self, symbol, order_list_id).await
    }

    async fn cancel_all_orders(&self, spec: CancelSpec) -> Result<bool> {
        self.cancel_all_order(spec).await
    }
}

#[async_trait]
impl SpotExchange for FuturesTrader {
    async fn exchange_alive(&self) -> Result<bool> {
        self.spot.exchange_alive().await
    }

    async fn update_market_data(&self) -> Result<()> {
        SpotExchange::update_market_data(&self.spot).await
    }

    async fn update_ticker_data(&self) -> Result<()> {
        SpotExchange::update_ticker_data(&self.spot).await
    }

    async fn update_open_orders(&self) -> Result<()> {
        self.spot.update_open_orders().await
    }

    async fn ticker_active(&self, symbol: &Symbol, data_update: bool) -> Result<bool> {
        self.spot.ticker_active(symbol, data_update).await
    }

    async fn ticker_info(&self, symbol: &Symbol, data_update: bool) -> Result<TickerInfo> {
        self.spot.ticker_info(symbol, data_update).await
    }

    async fn ticker_statistics(&self, symbol: &Symbol, data_update: bool) -> Result<TickerStats> {
        self.spot.ticker_statistics(symbol, data_update).await
    }

    async fn tickers_by_quote(&self, quote: &str, data_update: bool) -> Result<Vec<Symbol>> {
        self.spot.tickers_by_quote(quote, data_update).await
    }

    async fn ohlcv(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: Option<u16>,
    ) -> Result<Vec<Kline>> {
        self.spot.ohlcv(symbol, interval, limit).await
    }

    async fn yearly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        self.spot.yearly_pivot(symbol).await
    }

    async fn monthly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        self.spot.monthly_pivot(symbol).await
    }

    async fn balance(&self, asset: &str) -> Result<Balance> {
        self.spot.balance(asset).await
    }

    async fn open_orders(&self) -> Result<Vec<OpenOrder>> {
        SpotExchange::open_orders(&self.spot).await
    }

    async fn open_order_info(&self, order_id: u64, data_update: bool) -> Result<Option<OpenOrder>> {
        self.spot.open_order_info(order_id, data_update).await
    }

    async fn order_stat(&self, order_id: u64, symbol: &Symbol) -> Result<OrderStat> {
        self.spot.order_stat(order_id, symbol).await
    }

    async fn order_quantity_ok(&self, symbol: &Symbol, quantity: f64) -> Result<bool> {
        self.spot.order_quantity_ok(symbol, quantity).await
    }

    async fn sell_at_market(&self, symbol: &Symbol, quantity: Option<f64>) -> Result<bool> {
        self.spot.sell_at_market(symbol, quantity).await
    }

    async fn buy_at_market(&self, symbol: &Symbol, quote_quantity: Option<f64>) -> Result<bool> {
        self.spot.buy_at_market(symbol, quote_quantity).await
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
        self.spot
            .create_order(symbol, side, quantity, price, stop_price, order_type)
            .await
    }

    async fn create_oco_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: f64,
        price: f64,
        stop_price: f64,
        stop_limit_price: f64,
    ) -> Result<OcoOrder> {
        self.spot
            .create_oco_order(symbol, side, quantity, price, stop_price, stop_limit_price)
            .await
    }

    async fn cancel_order(&self, symbol: &Symbol, order_id: u64) -> Result<()> {
        Trader::cancel_order(&self.spot, symbol, order_id).await
    }

    async fn cancel_order_list(&self, symbol: &Symbol, order_list_id: i64) -> Result<()> {
        Trader::cancel_order_list(&self.spot, symbol, order_list_id).await
    }

    async fn cancel_all_orders(&self, spec: CancelSpec) -> Result<bool> {
        self.spot.cancel_all_order(spec).await
    }
}

#[async_trait]
impl FuturesExchange for FuturesTrader {
    async fn future_ohlcv(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: Option<u16>,
    ) -> Result<Vec<Kline>> {
        self.get_future_ohlcv(symbol, interval, limit).await
    }

    async fn future_monthly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        self.get_future_monthly_pivot(symbol).await
    }

    async fn future_weekly_pivot(&self, symbol: &Symbol) -> Result<Option<Pivot>> {
        self.get_future_weekly_pivot(symbol).await
    }

    async fn future_hourly_pivot(&self, symbol: &Symbol, hours: u32) -> Result<Option<Pivot>> {
        self.get_future_hourly_pivot(symbol, hours).await
    }

    async fn last_price(&self, symbol: &Symbol) -> Result<f64> {
        self.get_last_price(symbol).await
    }

    async fn future_ticker_info(&self, symbol: &Symbol) -> Result<FutureTickerInfo> {
        self.get_future_ticker_info(symbol).await
    }

    async fn future_balance(&self) -> Result<f64> {
        self.get_future_balance().await
    }

    async fn set_leverage(&self, symbol: &Symbol, leverage: u8) -> Result<()> {
        FuturesTrader::set_leverage(self, symbol, leverage).await
    }

    async fn set_margin_type(&self, symbol: &Symbol, margin_type: MarginType) -> Result<()> {
        FuturesTrader::set_margin_type(self, symbol, margin_type).await
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
    ) -> Result<crate::models::FuturesOrderAck> {
        FuturesTrader::create_future_order(
            self,
            symbol,
            side,
            order_type,
            quantity,
            price,
            stop_price,
            reduce_only,
        )
        .await
    }

    async fn cancel_all_future_orders(&self, symbol: &Symbol) -> Result<()> {
        FuturesTrader::cancel_all_future_orders(self, symbol).await
    }

    async fn cancel_future_order(&self, symbol: &Symbol, order_id: u64) -> Result<()> {
        FuturesTrader::cancel_future_order(self, symbol, order_id).await
    }

    async fn close_position(&self, symbol: &Symbol) -> Result<()> {
        FuturesTrader::close_position(self, symbol).await
    }

    async fn position_amount(&self, symbol: &Symbol) -> Result<f64> {
        Ok(self.get_position_information(symbol).await?.position_amt)
    }
}
