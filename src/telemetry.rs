use crate::errors::Result;
use crate::util::now_secs;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// One row of the balance-history table.
#[derive(Clone, Debug)]
pub struct BalanceSnapshot {
    pub timestamp: i64,
    pub time: String,
    pub btc_balance: f64,
    pub usdt_balance: f64,
    pub leverage: Option<u8>,
}

impl BalanceSnapshot {
    pub fn now(btc_balance: f64, usdt_balance: f64, leverage: Option<u8>) -> Self {
        let timestamp = now_secs();
        BalanceSnapshot {
            timestamp,
            time: iso8601(timestamp),
            btc_balance,
            usdt_balance,
            leverage,
        }
    }
}

pub fn iso8601(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Append-only balance history per strategy at
/// `data/binance/<strategy>/bot_data_history.csv`. Single writer; the
/// telemetry keeps growing whatever the trading legs do.
pub struct Recorder {
    dir: PathBuf,
    with_leverage: bool,
}

impl Recorder {
    pub fn new(strategy_dir: &str, with_leverage: bool) -> Recorder {
        Recorder {
            dir: PathBuf::from(format!("data/binance/{strategy_dir}")),
            with_leverage,
        }
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join("bot_data_history.csv")
    }

    pub fn append(&self, snapshot: &BalanceSnapshot) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.history_path();
        let write_header = !path.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if write_header {
            if self.with_leverage {
                writer.write_record(["timestamp", "time", "btc_balance", "usdt_balance", "leverage"])?;
            } else {
                writer.write_record(["timestamp", "time", "btc_balance", "usdt_balance"])?;
            }
        }
        let mut record = vec![
            snapshot.timestamp.to_string(),
            snapshot.time.clone(),
            snapshot.btc_balance.to_string(),
            snapshot.usdt_balance.to_string(),
        ];
        if self.with_leverage {
            record.push(snapshot.leverage.unwrap_or(0).to_string());
        }
        writer.write_record(&record)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_rows_with_single_header() {
        let dir = std::env::temp_dir().join("pivot_trader_recorder_test");
        let _ = std::fs::remove_dir_all(&dir);
        let recorder = Recorder {
            dir: dir.clone(),
            with_leverage: true,
        };
        let snapshot = BalanceSnapshot {
            timestamp: 1_600_000_000,
            time: iso8601(1_600_000_000),
            btc_balance: 0.5,
            usdt_balance: 5000.0,
            leverage: Some(13),
        };
        recorder.append(&snapshot).unwrap();
        recorder.append(&snapshot).unwrap();
        let text = std::fs::read_to_string(recorder.history_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,time,btc_balance,usdt_balance,leverage");
        assert!(lines[1].starts_with("1600000000,2020-09-13T12:26:40.000Z,0.5,5000,13"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
