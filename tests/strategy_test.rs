mod common;

use common::{Action, FakeExchange, FakeMarket, FakeState};
use pivot_trader::prelude::*;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn btc_market(last_price: f64, monthly_closes: Vec<f64>) -> FakeMarket {
    FakeMarket {
        last_price,
        quote_volume: 1e9,
        monthly_closes,
        daily_closes: vec![last_price, last_price, last_price],
        ..FakeMarket::default()
    }
}

#[tokio::test]
async fn bmt_enters_on_bullish_monthly_close() {
    let mut state = FakeState::default();
    state.yearly_pivot = Some(pivot_levels(13_000.0, 5_000.0, 12_000.0));
    state
        .markets
        .insert(Symbol::btc_usdt(), btc_market(11_000.0, vec![9_800.0, 10_500.0, 11_000.0]));
    let fake = FakeExchange::new(state);
    fake.set_balance("USDT", 1_000.0);
    fake.set_balance("BTC", 0.0);

    let mut strategy = BtcMonthlyTrade::new(fake.clone());
    assert_eq!(strategy.status(), BtcStatus::Init);
    strategy.btc_trade().await.unwrap();
    assert_eq!(strategy.status(), BtcStatus::Buy);

    let buys = fake.market_buys();
    assert_eq!(buys.len(), 1);
    match &buys[0] {
        Action::MarketBuy { symbol, quote_quantity } => {
            assert_eq!(*symbol, Symbol::btc_usdt());
            assert!(approx(*quote_quantity, 1_000.0));
        }
        other => panic!("unexpected action: {other:?}"),
    }

    // A second pass in the same state is a no-op: the status already matches.
    strategy.btc_trade().await.unwrap();
    assert_eq!(fake.market_buys().len(), 1);
}

#[tokio::test]
async fn bmt_sells_all_on_s1_break() {
    let pivot = pivot_levels(13_000.0, 5_000.0, 12_000.0);
    let mut state = FakeState::default();
    state.yearly_pivot = Some(pivot);
    state
        .markets
        .insert(Symbol::btc_usdt(), btc_market(11_000.0, vec![9_800.0, 10_500.0, 11_000.0]));
    let fake = FakeExchange::new(state);
    fake.set_balance("USDT", 1_000.0);

    let mut strategy = BtcMonthlyTrade::new(fake.clone());
    strategy.btc_trade().await.unwrap();
    assert_eq!(strategy.status(), BtcStatus::Buy);

    // Price collapses below S1.
    let below_s1 = pivot.s1 - 500.0;
    fake.state
        .lock()
        .unwrap()
        .markets
        .get_mut(&Symbol::btc_usdt())
        .unwrap()
        .last_price = below_s1;
    fake.set_balance("BTC", 0.1);
    fake.set_balance("USDT", 0.0);
    fake.clear_actions();

    strategy.btc_trade().await.unwrap();
    assert_eq!(strategy.status(), BtcStatus::Sell);
    let sells = fake.market_sells();
    assert_eq!(sells.len(), 1);
    match &sells[0] {
        Action::MarketSell { quantity, .. } => assert!(approx(*quantity, 0.1)),
        other => panic!("unexpected action: {other:?}"),
    }
}

fn foo_usdt() -> Symbol {
    Symbol::new("FOO", "USDT")
}

/// FOO/USDT with monthly pivot P = 100 (range 90..110).
fn foo_market(last_price: f64, daily_closes: Vec<f64>) -> FakeMarket {
    FakeMarket {
        last_price,
        quote_volume: 2e6,
        monthly_pivot: Some(pivot_levels(110.0, 90.0, 100.0)),
        daily_closes,
        ..FakeMarket::default()
    }
}

#[tokio::test]
async fn adt_enters_on_fresh_pivot_cross_and_places_protective_orders() {
    let pivot = pivot_levels(110.0, 90.0, 100.0);
    let mut state = FakeState::default();
    // C-2 = 95 < P = 100 <= C-1 = 105: freshly crossed upward.
    state.markets.insert(foo_usdt(), foo_market(104.0, vec![95.0, 105.0, 104.0]));
    let fake = FakeExchange::new(state);
    fake.set_balance("USDT", 500.0);

    let mut strategy = AltDailyTrade::new(fake.clone());
    strategy.alt_trade().await.unwrap();

    assert_eq!(strategy.trading_alts().len(), 1);
    let stat = strategy.trading_alts()[&foo_usdt()];
    assert!(stat.stop_order_id != 0);
    assert!(stat.r2_order.is_placed());
    assert!(stat.r3_order.is_placed());

    let buys = fake.market_buys();
    assert_eq!(buys.len(), 1);
    let filled_base = match &buys[0] {
        Action::MarketBuy { quote_quantity, .. } => {
            assert!(approx(*quote_quantity, 500.0 / 5.0));
            quote_quantity / 104.0
        }
        other => panic!("unexpected action: {other:?}"),
    };

    let mut oco_quantities = 0.0;
    let mut stop_quantity = 0.0;
    let mut protective_orders = 0;
    for action in fake.actions() {
        match action {
            Action::OcoOrder { quantity, price, stop_price, .. } => {
                protective_orders += 1;
                oco_quantities += quantity;
                assert!(approx(stop_price, pivot.s1));
                assert!(approx(price, pivot.r2) || approx(price, pivot.r3));
            }
            Action::StopLimitOrder { quantity, stop_price, price, .. } => {
                protective_orders += 1;
                stop_quantity = quantity;
                assert!(approx(stop_price, pivot.s1));
                assert!(approx(price, pivot.s1 * 0.9));
            }
            _ => {}
        }
    }
    assert_eq!(protective_orders, 3);
    assert!(approx(oco_quantities, filled_base * 0.5));
    assert!(oco_quantities + stop_quantity <= filled_base + 1e-9);
}

#[tokio::test]
async fn adt_respects_max_trade_limit() {
    let mut state = FakeState::default();
    for base in ["AAA", "BBB", "CCC"] {
        state.markets.insert(
            Symbol::new(base, "USDT"),
            foo_market(104.0, vec![95.0, 105.0, 104.0]),
        );
    }
    let fake = FakeExchange::new(state);
    fake.set_balance("USDT", 500.0);

    let mut strategy = AltDailyTrade::new(fake.clone());
    strategy.book_mut().max_trade_limit = 2;
    strategy.alt_trade().await.unwrap();

    assert!(strategy.trading_alts().len() <= 2);
    assert_eq!(fake.market_buys().len(), 2);
}

/// Seeds the fake with a held FOO position and its three live protective
/// orders (ids 11..=15), the way a restarted process would find them.
fn seed_protective_orders(fake: &FakeExchange) {
    let pivot = pivot_levels(110.0, 90.0, 100.0);
    let mut state = fake.state.lock().unwrap();
    let rows = [
        (11, -1, OrderType::StopLossLimit, pivot.s1 * 0.9),
        (12, 1, OrderType::LimitMaker, pivot.r2),
        (13, 1, OrderType::StopLossLimit, pivot.s1 * 0.9),
        (14, 2, OrderType::LimitMaker, pivot.r3),
        (15, 2, OrderType::StopLossLimit, pivot.s1 * 0.9),
    ];
    for (order_id, order_list_id, order_type, price) in rows {
        state.open_orders.push(OpenOrder {
            order_id,
            order_list_id,
            internal_symbol: "FOOUSDT".into(),
            price,
            original_quantity: 1.0,
            executed_quantity: 0.0,
            order_type,
            side: Side::Sell,
            time: 0,
        });
    }
    state.next_order_id = 100;
}

#[tokio::test]
async fn adt_exits_when_daily_close_breaks_pivot() {
    let pivot = pivot_levels(110.0, 90.0, 100.0);
    let mut state = FakeState::default();
    // Previous daily close 95 < P = 100, day has rolled over.
    state.markets.insert(foo_usdt(), foo_market(104.0, vec![105.0, 95.0, 104.0]));
    let fake = FakeExchange::new(state);
    fake.set_balance("FOO", 4.8);
    fake.set_balance("USDT", 0.0);
    seed_protective_orders(&fake);

    let mut strategy = AltDailyTrade::new(fake.clone());
    strategy.book_mut().trading_alts.insert(
        foo_usdt(),
        TradingAlt {
            total_quantity: 4.8,
            stop_order_id: 11,
            r2_order: OcoOrder {
                order_list_id: 1,
                limit_order_id: 12,
                stop_order_id: 13,
            },
            r3_order: OcoOrder {
                order_list_id: 2,
                limit_order_id: 14,
                stop_order_id: 15,
            },
            ..TradingAlt::default()
        },
    );

    strategy.alt_trade().await.unwrap();

    assert!(strategy.trading_alts().is_empty());
    let sells = fake.market_sells();
    assert_eq!(sells.len(), 1);
    match &sells[0] {
        Action::MarketSell { quantity, .. } => assert!(approx(*quantity, 4.8)),
        other => panic!("unexpected action: {other:?}"),
    }
    let cancels = fake
        .actions()
        .into_iter()
        .filter(|action| matches!(action, Action::CancelOrder { .. }))
        .count();
    assert!(cancels >= 5, "all protective orders cancelled, got {cancels}");
    assert!(approx(pivot.p, 100.0));
}

#[tokio::test]
async fn adt_rediscovers_live_protective_orders_after_restart() {
    let mut state = FakeState::default();
    // No exit condition (prev close 103 >= P) and no fresh cross (C-2 above P).
    state.markets.insert(foo_usdt(), foo_market(104.0, vec![104.0, 103.0, 104.0]));
    let fake = FakeExchange::new(state);
    fake.set_balance("FOO", 4.8);
    fake.set_balance("USDT", 0.0);
    seed_protective_orders(&fake);

    // Fresh process: the book starts empty.
    let mut strategy = AltDailyTrade::new(fake.clone());
    strategy.alt_trade().await.unwrap();

    let stat = strategy.trading_alts()[&foo_usdt()];
    assert_eq!(stat.stop_order_id, 11);
    assert_eq!(stat.r2_order.order_list_id, 1);
    assert_eq!(stat.r2_order.limit_order_id, 12);
    assert_eq!(stat.r3_order.order_list_id, 2);
    assert_eq!(stat.r3_order.limit_order_id, 14);
    assert!(approx(stat.total_quantity, 4.8));

    // Nothing was re-submitted or torn down.
    for action in fake.actions() {
        assert!(
            !matches!(
                action,
                Action::OcoOrder { .. }
                    | Action::StopLimitOrder { .. }
                    | Action::MarketBuy { .. }
                    | Action::MarketSell { .. }
                    | Action::CancelOrder { .. }
            ),
            "unexpected order traffic after restart: {action:?}"
        );
    }
}

#[tokio::test]
async fn abd_rests_pivot_buys_on_the_bullish_side_and_promotes_fills() {
    let bar_btc = Symbol::new("BAR", "BTC");
    let bar_pivot = pivot_levels(0.0011, 0.0009, 0.001);
    let mut state = FakeState::default();
    state.yearly_pivot = Some(pivot_levels(13_000.0, 5_000.0, 12_000.0));
    state
        .markets
        .insert(Symbol::btc_usdt(), btc_market(11_000.0, vec![9_800.0, 10_500.0, 11_000.0]));
    state.markets.insert(
        bar_btc.clone(),
        FakeMarket {
            last_price: 0.00102,
            quote_volume: 150.0,
            monthly_pivot: Some(bar_pivot),
            // Above the pivot without a fresh cross: queue a limit at P.
            daily_closes: vec![0.00102, 0.00105, 0.00102],
            ..FakeMarket::default()
        },
    );
    let fake = FakeExchange::new(state);
    fake.set_balance("USDT", 1_000.0);

    let mut strategy = AltBtcDayTrade::new(fake.clone());
    strategy.btc_trade().await.unwrap();
    assert_eq!(strategy.btc_status(), BtcStatus::Buy);

    strategy.alt_trade().await.unwrap();
    assert_eq!(strategy.base_pair(), BasePair::Btc);
    assert_eq!(strategy.open_alts().len(), 1);
    assert!(strategy.trading_alts().is_empty());
    assert!(fake.actions().iter().any(|action| matches!(
        action,
        Action::LimitOrder { symbol, side: Side::Buy, price, .. }
            if *symbol == bar_btc && approx(*price, bar_pivot.p)
    )));

    // Age the resting order past an hour with more than half of it filled:
    // the next sweep promotes it into the trading book.
    {
        let mut locked = fake.state.lock().unwrap();
        let order = locked
            .open_orders
            .iter_mut()
            .find(|order| order.internal_symbol == "BARBTC")
            .expect("resting limit order");
        order.time = (now_secs() - 7_200) * 1000;
        order.executed_quantity = order.original_quantity * 0.6;
    }
    fake.set_balance("BAR", 18.0);
    fake.clear_actions();

    strategy.alt_trade().await.unwrap();
    assert!(strategy.open_alts().is_empty());
    assert!(strategy.trading_alts().contains_key(&bar_btc));
    let stat = strategy.trading_alts()[&bar_btc];
    assert!(stat.r2_order.is_placed());
    assert!(stat.r3_order.is_placed());
    assert!(stat.stop_order_id != 0);
}

#[tokio::test]
async fn bfdt_enters_long_above_monthly_pivot() {
    let pivot = pivot_levels(12_000.0, 8_000.0, 10_000.0);
    let mut state = FakeState::default();
    state.future_monthly_pivot = Some(pivot);
    state.future_last_price = 10_500.0;
    state.future_balance = 1_000.0;
    state.future_candles = (0..5)
        .map(|i| Kline {
            timestamp: i * 86_400,
            open: 10_100.0,
            high: 10_600.0,
            low: 10_000.0,
            close: 10_200.0,
            volume: 1.0,
        })
        .collect();
    let fake = FakeExchange::new(state);

    let mut strategy = BtcFutureDailyTrade::new(fake.clone());
    strategy.future_trade().await.unwrap();
    assert_eq!(strategy.status(), FutureStatus::Long);
    assert!(strategy.leverage() >= 1);

    let actions = fake.actions();
    assert!(actions.contains(&Action::CancelAllFutureOrders));
    assert!(actions.contains(&Action::ClosePosition));
    assert!(actions.contains(&Action::SetMarginType(MarginType::Isolated)));
    assert!(actions
        .iter()
        .any(|action| matches!(action, Action::SetLeverage(l) if *l >= 1)));

    let orders: Vec<&Action> = actions
        .iter()
        .filter(|action| matches!(action, Action::FutureOrder { .. }))
        .collect();
    assert_eq!(orders.len(), 3);
    let entry_quantity = match orders[0] {
        Action::FutureOrder { side, order_type, quantity, reduce_only, .. } => {
            assert_eq!(*side, Side::Buy);
            assert_eq!(*order_type, OrderType::Market);
            assert!(!reduce_only);
            *quantity
        }
        other => panic!("unexpected action: {other:?}"),
    };
    match orders[1] {
        Action::FutureOrder { side, order_type, quantity, stop_price, reduce_only, .. } => {
            assert_eq!(*side, Side::Sell);
            assert_eq!(*order_type, OrderType::StopMarket);
            assert!(*reduce_only);
            assert!(approx(*quantity, entry_quantity));
            assert!(approx(stop_price.unwrap(), pivot.s1));
        }
        other => panic!("unexpected action: {other:?}"),
    }
    match orders[2] {
        Action::FutureOrder { side, order_type, quantity, price, reduce_only, .. } => {
            assert_eq!(*side, Side::Sell);
            assert_eq!(*order_type, OrderType::Limit);
            assert!(*reduce_only);
            assert!(approx(*quantity, entry_quantity * 0.5));
            // Last price sits under R1, so the take-profit targets R1.
            assert!(approx(price.unwrap(), pivot.r1));
        }
        other => panic!("unexpected action: {other:?}"),
    }

    // The SR2 sizing holds: liquidation stays on the safe side of S2.
    let liq = liquidation_price(10_500.0, entry_quantity, 700.0, PositionSide::Long).unwrap();
    assert!(liq <= pivot.sr2(PositionSide::Long));
}

#[tokio::test]
async fn bfht_ratchets_stop_after_close_clears_r1() {
    let pivot = pivot_levels(12_000.0, 8_000.0, 10_000.0);
    let mut state = FakeState::default();
    state.future_hourly_pivot = Some(pivot);
    state.future_last_price = 10_100.0;
    state.future_balance = 1_000.0;
    // Previous candle crossed P upward: open below, close above.
    state.future_candles = (0..5)
        .map(|i| Kline {
            timestamp: i * 3_600,
            open: 9_900.0,
            high: 10_200.0,
            low: 9_800.0,
            close: 10_100.0,
            volume: 1.0,
        })
        .collect();
    let fake = FakeExchange::new(state);

    let mut strategy = BtcFutureHourlyTrade::new(fake.clone());
    strategy.future_trade().await.unwrap();
    assert_eq!(strategy.status(), FutureStatus::Long);
    assert_eq!(strategy.stop_order_location(), 0);

    // Next candle closes above R1: the stop must move up to P.
    {
        let mut locked = fake.state.lock().unwrap();
        let above_r1 = pivot.r1 + 10.0;
        locked.future_candles = (0..5)
            .map(|i| Kline {
                timestamp: i * 3_600,
                open: pivot.p + 10.0,
                high: above_r1 + 50.0,
                low: pivot.p,
                close: above_r1,
                volume: 1.0,
            })
            .collect();
        locked.future_last_price = above_r1;
    }
    fake.clear_actions();
    strategy.future_trade().await.unwrap();

    assert_eq!(strategy.status(), FutureStatus::Long);
    assert_eq!(strategy.stop_order_location(), 1);
    let actions = fake.actions();
    assert!(actions
        .iter()
        .any(|action| matches!(action, Action::CancelFutureOrder { .. })));
    assert!(actions.iter().any(|action| matches!(
        action,
        Action::FutureOrder { order_type: OrderType::StopMarket, stop_price: Some(price), .. }
            if approx(*price, pivot.p * (1.0 - 0.0005))
    )));
}
