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

/// Pivot anchor width. Aggregated locally from 1h candles so the buckets
/// match the strategy's own clock.
const PIVOT_ANCHOR_HOURS: u32 = 6;
const PIVOT_WINDOW_SECS: i64 = PIVOT_ANCHOR_HOURS as i64 * 3600;
/// Grace period before a freshly rolled pivot is acted on.
const PIVOT_ROLL_GRACE_SECS: i64 = 3600;

const POSITION_BY_BALANCE: f64 = 0.5;
const PROFIT_ORDER_RATIO: f64 = 0.5;
const PRICE_OUTER_RATIO: f64 = 0.14;
/// The stop trigger is nudged past the level so a touch does not fire it.
const STOP_PRICE_BIAS: f64 = 0.0005;
/// Fraction of the last-to-pivot distance used when every ring is exceeded.
const OUTER_STOP_RATIO: f64 = 0.3;

/// BTC futures hourly strategy: 15-minute steps on a six-hour pivot, entries
/// on the previous candle crossing P, with a trailing stop that ratchets one
/// ring at a time as closes clear R1/R2/R3 (S-side mirrored).
pub struct BtcFutureHourlyTrade<E: FuturesExchange> {
    exchange: E,
    gate: TickGate,
    status: FutureStatus,
    base_symbol: Symbol,
    /// Which ring the stop sits under: 0 = initial, 1 = P, 2 = R1/S1,
    /// -1 = beyond the ladder.
    stop_order_location: i8,
    stop_order_id: u64,
    position_quantity: f64,
    leverage: u8,
    liquidation_timestamp: i64,
    prev_pivot: Option<Pivot>,
    pivot_timestamp: i64,
    recorder: Recorder,
}

impl<E: FuturesExchange> BtcFutureHourlyTrade<E> {
    pub fn new(exchange: E) -> Self {
        info!("Setting BTC future hourly trading module...");
        BtcFutureHourlyTrade {
            exchange,
            gate: TickGate::new(),
            status: FutureStatus::Init,
            base_symbol: Symbol::btc_usdt(),
            stop_order_location: 0,
            stop_order_id: 0,
            position_quantity: 0.0,
            leverage: 0,
            liquidation_timestamp: 0,
            prev_pivot: None,
            pivot_timestamp: 0,
            recorder: Recorder::new("BtcFutureHourlyTrading", true),
        }
    }

    pub fn status(&self) -> FutureStatus {
        self.status
    }

    pub fn stop_order_location(&self) -> i8 {
        self.stop_order_location
    }

    pub async fn future_trade(&mut self) -> Result<()> {
        info!("Starting BTC future trade...");
        if !self.exchange.exchange_alive().await? {
            info!("Exchange is not active. Exit BTC trade");
        }
        let symbol = self.base_symbol.clone();
        let mut pivot = self
            .exchange
            .future_hourly_pivot(&symbol, PIVOT_ANCHOR_HOURS)
            .await?
            .ok_or_else(|| {
                BinanceError::Unexpected(format!("{symbol}: hourly futures pivot unavailable"))
            })?;
        let hourly = self
            .exchange
            .future_ohlcv(&symbol, Interval::Hour1, Some(5))
            .await?;
        let previous = previous_candle(&hourly).ok_or_else(|| {
            BinanceError::Unexpected(format!("{symbol}: not enough hourly candles"))
        })?;
        let prev_open = previous.open;
        let prev_close = previous.close;
        let latest_timestamp = hourly.last().map(|kline| kline.timestamp).unwrap_or(0);

        // A freshly rolled pivot is held back for an hour so the step never
        // acts on a candle that closed into the old anchor.
        match self.prev_pivot {
            None => {
                self.prev_pivot = Some(pivot);
                self.pivot_timestamp = latest_timestamp;
            }
            Some(prev_pivot) if prev_pivot.p != pivot.p => {
                let prev_bucket = self.pivot_timestamp.div_euclid(PIVOT_WINDOW_SECS);
                let delayed_bucket =
                    (now_secs() - PIVOT_ROLL_GRACE_SECS).div_euclid(PIVOT_WINDOW_SECS);
                if prev_bucket == delayed_bucket {
                    info!("Current pivot is a new pivot. Delay for an hour");
                    pivot = prev_pivot;
                } else {
                    info!("An hour passed. Change to the new pivot");
                    self.prev_pivot = Some(pivot);
                    self.pivot_timestamp = latest_timestamp;
                }
            }
            Some(_) => {}
        }

        let btc_info = self.exchange.future_ticker_info(&symbol).await?;
        if ticker_is_stale(btc_info.timestamp) {
            info!("Last transaction is too long ago. Exit BTC trade");
            return Ok(());
        }

        self.check_liquidation(Every::Hours(1).period_secs()).await?;

        match self.status {
            FutureStatus::Init => {
                if prev_close >= pivot.p && pivot.p >= prev_open {
                    self.enter_position(PositionSide::Long, &pivot).await?;
                    self.status = FutureStatus::Long;
                } else if prev_close < pivot.p && pivot.p <= prev_open {
                    self.enter_position(PositionSide::Short, &pivot).await?;
                    self.status = FutureStatus::Short;
                }
            }
            FutureStatus::Long => {
                if prev_close < pivot.p {
                    self.enter_position(PositionSide::Short, &pivot).await?;
                    self.status = FutureStatus::Short;
                } else {
                    self.manage_stop_price(PositionSide::Long, &pivot, prev_close)
                        .await?;
                }
            }
            FutureStatus::Short => {
                if prev_close > pivot.p {
                    self.enter_position(PositionSide::Long, &pivot).await?;
                    self.status = FutureStatus::Long;
                } else {
                    self.manage_stop_price(PositionSide::Short, &pivot, prev_close)
                        .await?;
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

    async fn enter_position(&mut self, side: PositionSide, pivot: &Pivot) -> Result<()> {
        let symbol = self.base_symbol.clone();
        self.exchange.cancel_all_future_orders(&symbol).await?;
        self.exchange.close_position(&symbol).await?;
        let last_price = self.exchange.last_price(&symbol).await?;
        let balance = self.exchange.future_balance().await?.floor() * POSITION_BY_BALANCE;
        let (leverage, quantity) =
            self.exchange
                .solve_sr2(last_price, pivot.sr2(side), balance, side)?;
        info!("Position plan: leverage={leverage}, quantity={quantity}");
        self.leverage = leverage;
        self.position_quantity = quantity;
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

        let (stop_base, location) = initial_stop(side, last_price, pivot);
        self.place_stop_order(side, stop_base, location, quantity).await?;

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

    async fn place_stop_order(
        &mut self,
        side: PositionSide,
        stop_base: f64,
        location: i8,
        quantity: f64,
    ) -> Result<()> {
        let stop_price = biased_stop(side, stop_base);
        let stop = self
            .exchange
            .create_future_order(
                &self.base_symbol,
                side.exit_side(),
                OrderType::StopMarket,
                quantity,
                None,
                Some(stop_price),
                true,
            )
            .await?;
        info!("{side:?} stop order at {stop_price} (location {location}): {}", stop.order_id);
        self.stop_order_id = stop.order_id;
        self.stop_order_location = location;
        Ok(())
    }

    /// Trailing ratchet: when the previous close clears the next ring, the
    /// stop is cancelled and re-placed one level higher (short: lower).
    async fn manage_stop_price(
        &mut self,
        side: PositionSide,
        pivot: &Pivot,
        prev_close: f64,
    ) -> Result<()> {
        let next = match side {
            PositionSide::Long => match self.stop_order_location {
                0 if prev_close >= pivot.r1 => Some((pivot.p, 1)),
                1 if prev_close >= pivot.r2 => Some((pivot.r1, 2)),
                2 if prev_close >= pivot.r3 => Some((pivot.r2, -1)),
                _ => None,
            },
            PositionSide::Short => match self.stop_order_location {
                0 if prev_close <= pivot.s1 => Some((pivot.p, 1)),
                1 if prev_close <= pivot.s2 => Some((pivot.s1, 2)),
                2 if prev_close <= pivot.s3 => Some((pivot.s2, -1)),
                _ => None,
            },
        };
        if let Some((stop_base, location)) = next {
            info!("Raise stop order to location {location}");
            if self.stop_order_id != 0 {
                self.exchange
                    .cancel_future_order(&self.base_symbol, self.stop_order_id)
                    .await?;
            }
            self.place_stop_order(side, stop_base, location, self.position_quantity)
                .await?;
        }
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

/// Initial stop placement by where the last price sits in the ring ladder.
fn initial_stop(side: PositionSide, last_price: f64, pivot: &Pivot) -> (f64, i8) {
    match side {
        PositionSide::Long => {
            if last_price < pivot.r1 {
                (pivot.s1, 0)
            } else if last_price < pivot.r2 {
                (pivot.p, 1)
            } else if last_price < pivot.r3 {
                (pivot.r1, 2)
            } else {
                (last_price - OUTER_STOP_RATIO * (last_price - pivot.p).abs(), -1)
            }
        }
        PositionSide::Short => {
            if last_price > pivot.s1 {
                (pivot.r1, 0)
            } else if last_price > pivot.s2 {
                (pivot.p, 1)
            } else if last_price > pivot.s3 {
                (pivot.s1, 2)
            } else {
                (last_price + OUTER_STOP_RATIO * (last_price - pivot.p).abs(), -1)
            }
        }
    }
}

fn biased_stop(side: PositionSide, stop_base: f64) -> f64 {
    match side {
        PositionSide::Long => stop_base * (1.0 - STOP_PRICE_BIAS),
        PositionSide::Short => stop_base * (1.0 + STOP_PRICE_BIAS),
    }
}

#[async_trait]
impl<E: FuturesExchange + 'static> Strategy for BtcFutureHourlyTrade<E> {
    fn name(&self) -> &'static str {
        "binance_bfht_trade"
    }

    async fn tick(&mut self) -> Result<()> {
        if self.gate.fires("btc_trade", Every::Minutes(15)) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivot::pivot_levels;

    #[test]
    fn initial_stop_follows_the_ring_ladder() {
        let pivot = pivot_levels(120.0, 80.0, 100.0);
        assert_eq!(initial_stop(PositionSide::Long, pivot.p + 0.1, &pivot), (pivot.s1, 0));
        assert_eq!(initial_stop(PositionSide::Long, pivot.r1 + 0.1, &pivot), (pivot.p, 1));
        assert_eq!(initial_stop(PositionSide::Long, pivot.r2 + 0.1, &pivot), (pivot.r1, 2));
        let far = pivot.r3 + 5.0;
        let (stop, location) = initial_stop(PositionSide::Long, far, &pivot);
        assert_eq!(location, -1);
        assert!((stop - (far - 0.3 * (far - pivot.p))).abs() < 1e-9);
    }

    #[test]
    fn initial_stop_short_mirrors() {
        let pivot = pivot_levels(120.0, 80.0, 100.0);
        assert_eq!(initial_stop(PositionSide::Short, pivot.p - 0.1, &pivot), (pivot.r1, 0));
        assert_eq!(initial_stop(PositionSide::Short, pivot.s1 - 0.1, &pivot), (pivot.p, 1));
        assert_eq!(initial_stop(PositionSide::Short, pivot.s2 - 0.1, &pivot), (pivot.s1, 2));
    }

    #[test]
    fn stop_bias_nudges_past_the_level() {
        assert!(biased_stop(PositionSide::Long, 100.0) < 100.0);
        assert!(biased_stop(PositionSide::Short, 100.0) > 100.0);
    }
}
