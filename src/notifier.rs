use crate::errors::{BinanceError, Result};
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use std::path::Path;

/// Chat side channel over the Telegram bot HTTP API: daily log digests out,
/// a handful of control commands in.
pub struct ChatNotifier {
    token: String,
    pub chat_id: String,
    client: ReqwestClient,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    text: Option<String>,
}

impl ChatNotifier {
    /// Loads the bot token (line 1) and chat id (line 2) from a plain-text
    /// file, the same shape as the exchange credentials file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<ChatNotifier> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            BinanceError::Unexpected(format!(
                "cannot read chat credentials {}: {err}",
                path.as_ref().display()
            ))
        })?;
        let mut lines = text.lines();
        let token = lines.next().unwrap_or("").trim().to_string();
        let chat_id = lines.next().unwrap_or("").trim().to_string();
        if token.is_empty() || chat_id.is_empty() {
            return Err(BinanceError::Unexpected(
                "chat credentials file must hold the token on line 1 and the chat id on line 2"
                    .into(),
            ));
        }
        Ok(ChatNotifier {
            token,
            chat_id,
            client: ReqwestClient::new(),
        })
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        self.client
            .post(&url)
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .await?
            .error_for_status()
            .map_err(BinanceError::from)?;
        Ok(())
    }

    /// Drains pending chat commands. `offset` advances past every update
    /// seen so a command is handled exactly once.
    pub async fn poll_commands(&self, offset: &mut i64) -> Result<Vec<String>> {
        let url = format!("https://api.telegram.org/bot{}/getUpdates", self.token);
        let response: UpdatesResponse = self
            .client
            .get(&url)
            .query(&[("offset", offset.to_string())])
            .send()
            .await?
            .json()
            .await
            .map_err(BinanceError::from)?;
        let mut commands = Vec::new();
        for update in response.result {
            *offset = (*offset).max(update.update_id + 1);
            if let Some(text) = update.message.and_then(|message| message.text) {
                commands.push(text.trim().to_string());
            }
        }
        Ok(commands)
    }
}

/// What a day's log boils down to for the chat report.
#[derive(Debug, Default)]
pub struct LogReport {
    /// Up to the last ten ERROR lines of the day.
    pub error_lines: Vec<String>,
    /// Last balance estimate logged by the telemetry pass.
    pub usdt_balance: Option<f64>,
}

/// Scans one rotated log file for ERROR lines and the closing balance.
pub fn scan_log(text: &str) -> LogReport {
    let mut report = LogReport::default();
    for line in text.lines() {
        if line.to_uppercase().contains("ERROR") {
            report.error_lines.push(line.to_string());
        } else if line.contains("Estimated balance in USDT") {
            if let Some(value) = line.split_whitespace().last() {
                if let Ok(balance) = value.parse::<f64>() {
                    report.usdt_balance = Some(balance);
                }
            }
        }
    }
    if report.error_lines.len() > 10 {
        report.error_lines = report
            .error_lines
            .split_off(report.error_lines.len() - 10);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_collects_errors_and_balance() {
        let log = "\
2026-07-31 00:00:01 - binance_adt_trade - INFO - Starting alt trade...
2026-07-31 00:00:02 - binance_adt_trade - ERROR - network error: timeout
2026-07-31 00:00:03 - binance_adt_trade - INFO - Estimated balance in USDT: 1234.5
";
        let report = scan_log(log);
        assert_eq!(report.error_lines.len(), 1);
        assert!(report.error_lines[0].contains("network error"));
        assert_eq!(report.usdt_balance, Some(1234.5));
    }

    #[test]
    fn scan_keeps_only_last_ten_errors() {
        let mut log = String::new();
        for i in 0..15 {
            log.push_str(&format!("line - ERROR - failure {i}\n"));
        }
        let report = scan_log(&log);
        assert_eq!(report.error_lines.len(), 10);
        assert!(report.error_lines[0].contains("failure 5"));
        assert!(report.error_lines[9].contains("failure 14"));
    }
}
