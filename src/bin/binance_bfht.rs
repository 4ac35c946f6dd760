use pivot_trader::prelude::*;
use tokio::time::{sleep, Duration};

const CREDENTIALS_PATH: &str = "api/binance.txt";
const BOT_SWITCH_PATH: &str = "data/binance/BtcFutureHourlyTrading/bot_switch.txt";

#[tokio::main]
async fn main() {
    if let Err(err) = DailyFileLogger::init("binance_bfht_main") {
        eprintln!("logger setup failed: {err}");
        std::process::exit(1);
    }
    log::info!("Set up Binance BTC future hourly trading...");
    let credentials = match Credentials::from_file(CREDENTIALS_PATH) {
        Ok(credentials) => credentials,
        Err(err) => {
            log::error!("Startup failed: {err}");
            std::process::exit(1);
        }
    };
    let trader: FuturesTrader = Binance::new(
        Some(credentials.api_key),
        Some(credentials.secret_key),
    );
    log::info!("Start Binance BTC future hourly trading");
    let trade_loop = TradeLoop::start(BtcFutureHourlyTrade::new(trader));

    loop {
        if let Ok(false) = read_bot_switch(BOT_SWITCH_PATH) {
            log::info!("Trading bot switch is turned off");
            log::info!("Terminating the bot...");
            break;
        }
        sleep(Duration::from_secs(1)).await;
    }
    trade_loop.stop().await;
    log::info!("BFHT bot terminated.");
}
