use crate::prelude::*;
use chrono::{DateTime, Datelike, Timelike, Utc};

/// Candle intervals the robot requests. `as_str` renders the exchange's
/// interval token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interval {
    Min1,
    Min15,
    Hour1,
    Hour4,
    Hour6,
    Hour8,
    Hour12,
    Day1,
    Week1,
    Month1,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Min1 => "1m",
            Interval::Min15 => "15m",
            Interval::Hour1 => "1h",
            Interval::Hour4 => "4h",
            Interval::Hour6 => "6h",
            Interval::Hour8 => "8h",
            Interval::Hour12 => "12h",
            Interval::Day1 => "1d",
            Interval::Week1 => "1w",
            Interval::Month1 => "1M",
        }
    }

    /// The native interval for an `n`-hour anchor, when the exchange offers
    /// one. Non-native widths are aggregated locally from 1h candles.
    pub fn native_hours(hours: u32) -> Option<Interval> {
        match hours {
            1 => Some(Interval::Hour1),
            4 => Some(Interval::Hour4),
            6 => Some(Interval::Hour6),
            8 => Some(Interval::Hour8),
            12 => Some(Interval::Hour12),
            _ => None,
        }
    }
}

/// One OHLCV candle, timestamp in seconds, oldest-first in every series the
/// adapter returns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kline {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Kline {
    pub fn utc_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp, 0).unwrap_or_default()
    }

    pub fn year(&self) -> i32 {
        self.utc_time().year()
    }

    pub fn month(&self) -> u32 {
        self.utc_time().month()
    }

    pub fn day(&self) -> u32 {
        self.utc_time().day()
    }

    pub fn hour(&self) -> u32 {
        self.utc_time().hour()
    }

    /// Builds a candle from one row of the exchange's kline array format:
    /// `[open_time_ms, open, high, low, close, volume, ...]`.
    pub fn from_row(row: &[Value]) -> Result<Kline> {
        Ok(Kline {
            timestamp: row
                .first()
                .and_then(Value::as_i64)
                .ok_or(BinanceError::KlineValueMissing {
                    index: 0,
                    name: "open_time",
                })?
                / 1000,
            open: numeric_field(row, 1, "open")?,
            high: numeric_field(row, 2, "high")?,
            low: numeric_field(row, 3, "low")?,
            close: numeric_field(row, 4, "close")?,
            volume: numeric_field(row, 5, "volume")?,
        })
    }
}

/// Parses a whole kline response body. Rows arrive oldest-first and stay that
/// way.
pub fn parse_klines(rows: &[Value]) -> Result<Vec<Kline>> {
    rows.iter()
        .map(|row| {
            let row = row
                .as_array()
                .ok_or(BinanceError::KlineValueMissing { index: 0, name: "row" })?;
            Kline::from_row(row)
        })
        .collect()
}

/// The exchange encodes kline prices as strings but some endpoints hand back
/// plain numbers; accept both.
fn numeric_field(row: &[Value], index: usize, name: &'static str) -> Result<f64> {
    let value = row
        .get(index)
        .ok_or(BinanceError::KlineValueMissing { index, name })?;
    match value {
        Value::String(s) => Ok(f64::from_str(s)?),
        Value::Number(n) => n
            .as_f64()
            .ok_or(BinanceError::KlineValueMissing { index, name }),
        _ => Err(BinanceError::KlineValueMissing { index, name }),
    }
}
