use crate::account::AccountManager;
use crate::client::Client;
use crate::config::Config;
use crate::futures::FuturesTrader;
use crate::market::MarketData;
use crate::trade::Trader;

/// Binance REST routes used by the robot, grouped by product.
pub enum API {
    Spot(Spot),
    Futures(Futures),
}

pub enum Spot {
    Ping,
    ExchangeInfo,
    Ticker24h,
    Klines,
    Depth,
    Account,
    OpenOrders,
    Order,
    Oco,
    OrderList,
}

pub enum Futures {
    Klines,
    TickerPrice,
    RecentTrades,
    Balance,
    PositionRisk,
    Order,
    AllOpenOrders,
    Leverage,
    MarginType,
}

impl AsRef<str> for API {
    fn as_ref(&self) -> &str {
        match self {
            API::Spot(route) => match route {
                Spot::Ping => "/api/v3/ping",
                Spot::ExchangeInfo => "/api/v3/exchangeInfo",
                Spot::Ticker24h => "/api/v3/ticker/24hr",
                Spot::Klines => "/api/v3/klines",
                Spot::Depth => "/api/v3/depth",
                Spot::Account => "/api/v3/account",
                Spot::OpenOrders => "/api/v3/openOrders",
                Spot::Order => "/api/v3/order",
                Spot::Oco => "/api/v3/order/oco",
                Spot::OrderList => "/api/v3/orderList",
            },
            API::Futures(route) => match route {
                Futures::Klines => "/fapi/v1/klines",
                Futures::TickerPrice => "/fapi/v1/ticker/price",
                Futures::RecentTrades => "/fapi/v1/trades",
                Futures::Balance => "/fapi/v2/balance",
                Futures::PositionRisk => "/fapi/v2/positionRisk",
                Futures::Order => "/fapi/v1/order",
                Futures::AllOpenOrders => "/fapi/v1/allOpenOrders",
                Futures::Leverage => "/fapi/v1/leverage",
                Futures::MarginType => "/fapi/v1/marginType",
            },
        }
    }
}

/// Constructor contract shared by every adapter module.
///
/// Mirrors the two ways a module can be built: with the default production
/// endpoints, or against a custom `Config` (testnet, tuned recv window).
pub trait Binance {
    fn new(api_key: Option<String>, secret_key: Option<String>) -> Self;

    fn new_with_config(config: &Config, api_key: Option<String>, secret_key: Option<String>)
        -> Self;
}

impl Binance for MarketData {
    fn new(api_key: Option<String>, secret_key: Option<String>) -> MarketData {
        Self::new_with_config(&Config::default(), api_key, secret_key)
    }

    fn new_with_config(
        config: &Config,
        api_key: Option<String>,
        secret_key: Option<String>,
    ) -> MarketData {
        MarketData::from_client(
            Client::new(api_key, secret_key, config.rest_api_endpoint.to_string()),
            config.recv_window,
        )
    }
}

impl Binance for AccountManager {
    fn new(api_key: Option<String>, secret_key: Option<String>) -> AccountManager {
        Self::new_with_config(&Config::default(), api_key, secret_key)
    }

    fn new_with_config(
        config: &Config,
        api_key: Option<String>,
        secret_key: Option<String>,
    ) -> AccountManager {
        AccountManager::from_client(
            Client::new(api_key, secret_key, config.rest_api_endpoint.to_string()),
            config.recv_window,
        )
    }
}

impl Binance for Trader {
    fn new(api_key: Option<String>, secret_key: Option<String>) -> Trader {
        Self::new_with_config(&Config::default(), api_key, secret_key)
    }

    fn new_with_config(config: &Config, api_key: Option<String>, secret_key: Option<String>) -> Trader {
        let client = Client::new(
            api_key.clone(),
            secret_key.clone(),
            config.rest_api_endpoint.to_string(),
        );
        Trader::from_parts(
            client,
            MarketData::new_with_config(config, api_key.clone(), secret_key.clone()),
            AccountManager::new_with_config(config, api_key, secret_key),
            config.recv_window,
        )
    }
}

impl Binance for FuturesTrader {
    fn new(api_key: Option<String>, secret_key: Option<String>) -> FuturesTrader {
        Self::new_with_config(&Config::default(), api_key, secret_key)
    }

    fn new_with_config(
        config: &Config,
        api_key: Option<String>,
        secret_key: Option<String>,
    ) -> FuturesTrader {
        let client = Client::new(
            api_key.clone(),
            secret_key.clone(),
            config.futures_api_endpoint.to_string(),
        );
        FuturesTrader::from_parts(
            client,
            Trader::new_with_config(config, api_key, secret_key),
            config.recv_window,
        )
    }
}
