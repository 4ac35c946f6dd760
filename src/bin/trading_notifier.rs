use chrono::{Days, Utc};
use pivot_trader::prelude::*;
use tokio::time::{sleep, Duration};

const CHAT_CREDENTIALS_PATH: &str = "api/telegram.txt";
/// Log of the daemon this notifier reports on.
const WATCHED_LOG_NAME: &str = "binance_adt_main";
const BOT_SWITCH_PATH: &str = "data/binance/AltDailyTrading/bot_switch.txt";

const HELP_TEXT: &str = "Commands: help, kill_telegram_bot, kill_trading_bot, turn_on_trading_bot";

#[tokio::main]
async fn main() {
    if let Err(err) = DailyFileLogger::init("trading_notifier") {
        eprintln!("logger setup failed: {err}");
        std::process::exit(1);
    }
    let notifier = match ChatNotifier::from_file(CHAT_CREDENTIALS_PATH) {
        Ok(notifier) => notifier,
        Err(err) => {
            log::error!("Startup failed: {err}");
            std::process::exit(1);
        }
    };
    log::info!("Trading notifier started");
    if let Err(err) = notifier.send_message("Trading notifier is up").await {
        log::warn!("Greeting failed: {err}");
    }

    let mut gate = TickGate::new();
    let mut offset = 0i64;
    let mut running = true;
    while running {
        if gate.fires("report", Every::Hours(12)) {
            send_daily_report(&notifier).await;
        }
        match notifier.poll_commands(&mut offset).await {
            Ok(commands) => {
                for command in commands {
                    running = handle_command(&notifier, &command).await && running;
                }
            }
            Err(err) => log::warn!("Polling chat commands failed: {err}"),
        }
        sleep(Duration::from_secs(1)).await;
    }
    log::info!("Trading notifier terminated.");
}

async fn send_daily_report(notifier: &ChatNotifier) {
    let yesterday = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .unwrap_or_default();
    let path = rotated_log_path(WATCHED_LOG_NAME, yesterday);
    let report = match std::fs::read_to_string(&path) {
        Ok(text) => scan_log(&text),
        Err(_) => {
            notify(notifier, "No log file was recorded for yesterday.").await;
            return;
        }
    };
    if report.error_lines.is_empty() {
        let balance = report
            .usdt_balance
            .map(|balance| format!("{balance:.1}"))
            .unwrap_or_else(|| "unknown".into());
        notify(notifier, &format!("Total balance : {balance} USDT")).await;
        notify(notifier, "All clear, nothing to report.").await;
    } else {
        notify(notifier, "=====ERROR LIST=====").await;
        for line in &report.error_lines {
            notify(notifier, line).await;
        }
        notify(notifier, "====================").await;
        notify(notifier, "Errors were found in yesterday's log!").await;
    }
}

/// Returns whether the notifier should keep running.
async fn handle_command(notifier: &ChatNotifier, command: &str) -> bool {
    match command {
        "help" => notify(notifier, HELP_TEXT).await,
        "kill_telegram_bot" => {
            notify(notifier, "Shutting the notifier down. Bye.").await;
            return false;
        }
        "kill_trading_bot" => {
            match write_bot_switch(BOT_SWITCH_PATH, false) {
                Ok(()) => notify(notifier, "Trading bot switch turned off.").await,
                Err(err) => notify(notifier, &format!("Could not flip the switch: {err}")).await,
            }
        }
        "turn_on_trading_bot" => {
            match write_bot_switch(BOT_SWITCH_PATH, true) {
                Ok(()) => notify(notifier, "Trading bot switch turned on.").await,
                Err(err) => notify(notifier, &format!("Could not flip the switch: {err}")).await,
            }
        }
        _ => {}
    }
    true
}

async fn notify(notifier: &ChatNotifier, text: &str) {
    if let Err(err) = notifier.send_message(text).await {
        log::warn!("Sending chat message failed: {err}");
    }
}
