#[derive(Clone, Debug)]
pub struct Config {
    pub rest_api_endpoint: &'static str,
    pub futures_api_endpoint: &'static str,
    pub recv_window: u64,
}

impl Config {
    pub const DEFAULT_REST_API_ENDPOINT: &'static str = "https://api.binance.com";
    pub const DEFAULT_FUTURES_API_ENDPOINT: &'static str = "https://fapi.binance.com";

    pub const fn default() -> Self {
        Self {
            rest_api_endpoint: Self::DEFAULT_REST_API_ENDPOINT,
            futures_api_endpoint: Self::DEFAULT_FUTURES_API_ENDPOINT,
            recv_window: 5000,
        }
    }

    pub const fn testnet() -> Self {
        Self {
            rest_api_endpoint: "https://testnet.binance.vision",
            futures_api_endpoint: "https://testnet.binancefuture.com",
            recv_window: 5000,
        }
    }

    pub const fn set_recv_window(self, recv_window: u64) -> Self {
        Self {
            recv_window,
            ..self
        }
    }
}
