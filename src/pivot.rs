use crate::models::{Kline, PositionSide};

/// Fibonacci fractions spacing the three resistance/support rings around the
/// pivot.
pub const FIBONACCI_RATIOS: [f64; 3] = [0.236, 0.618, 1.0];

/// Floor-trader pivot levels derived from one anchor period's high, low and
/// close.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pivot {
    pub p: f64,
    pub r1: f64,
    pub s1: f64,
    pub r2: f64,
    pub s2: f64,
    pub r3: f64,
    pub s3: f64,
}

impl Pivot {
    /// The protective level the futures strategies size against: S2 when
    /// long, R2 when short.
    pub fn sr2(&self, side: PositionSide) -> f64 {
        match side {
            PositionSide::Long => self.s2,
            PositionSide::Short => self.r2,
        }
    }
}

/// `P = (H+L+C)/3`, `R_k = P + (H-L)*f_k`, `S_k = P - (H-L)*f_k`.
pub fn pivot_levels(high: f64, low: f64, close: f64) -> Pivot {
    let p = (high + low + close) / 3.0;
    let range = high - low;
    Pivot {
        p,
        r1: p + range * FIBONACCI_RATIOS[0],
        s1: p - range * FIBONACCI_RATIOS[0],
        r2: p + range * FIBONACCI_RATIOS[1],
        s2: p - range * FIBONACCI_RATIOS[1],
        r3: p + range * FIBONACCI_RATIOS[2],
        s3: p - range * FIBONACCI_RATIOS[2],
    }
}

/// Pivot of the last full calendar year before `current_year`, from monthly
/// candles: H is the year's maximum high, L its minimum low, C the close of
/// its final candle. `None` when the series has no candle outside the
/// current year (freshly listed symbols).
pub fn yearly_pivot(monthly: &[Kline], current_year: i32) -> Option<Pivot> {
    if monthly.iter().all(|kline| kline.year() == current_year) {
        return None;
    }
    let previous: Vec<&Kline> = monthly
        .iter()
        .filter(|kline| kline.year() == current_year - 1)
        .collect();
    let last = previous.last()?;
    let high = previous.iter().map(|k| k.high).fold(f64::MIN, f64::max);
    let low = previous.iter().map(|k| k.low).fold(f64::MAX, f64::min);
    Some(pivot_levels(high, low, last.close))
}

/// Pivot of the previous anchor candle (the next-to-last row of an
/// oldest-first series). `None` with fewer than two candles.
pub fn previous_candle_pivot(klines: &[Kline]) -> Option<Pivot> {
    let previous = previous_candle(klines)?;
    Some(pivot_levels(previous.high, previous.low, previous.close))
}

/// The last closed candle of an oldest-first series whose final row is the
/// forming one.
pub fn previous_candle(klines: &[Kline]) -> Option<&Kline> {
    if klines.len() < 2 {
        return None;
    }
    klines.get(klines.len() - 2)
}

/// Aggregates 1h candles into `hours`-wide buckets aligned to UTC epoch
/// multiples, for anchor widths the exchange does not serve natively.
pub fn aggregate_hours(hourly: &[Kline], hours: u32) -> Vec<Kline> {
    let width = hours as i64 * 3600;
    let mut buckets: Vec<Kline> = Vec::new();
    for kline in hourly {
        let bucket_start = kline.timestamp - kline.timestamp.rem_euclid(width);
        match buckets.last_mut() {
            Some(current) if current.timestamp == bucket_start => {
                current.high = current.high.max(kline.high);
                current.low = current.low.min(kline.low);
                current.close = kline.close;
                current.volume += kline.volume;
            }
            _ => buckets.push(Kline {
                timestamp: bucket_start,
                ..*kline
            }),
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Kline {
        Kline {
            timestamp,
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn pivot_identities_hold() {
        let pivot = pivot_levels(120.0, 80.0, 100.0);
        assert!((pivot.p - 100.0).abs() < 1e-12);
        for (k, f) in FIBONACCI_RATIOS.iter().enumerate() {
            let (r, s) = match k {
                0 => (pivot.r1, pivot.s1),
                1 => (pivot.r2, pivot.s2),
                _ => (pivot.r3, pivot.s3),
            };
            assert!((r - pivot.p - 40.0 * f).abs() < 1e-9);
            assert!((pivot.p - s - 40.0 * f).abs() < 1e-9);
        }
    }

    #[test]
    fn levels_are_ordered() {
        for (h, l, c) in [(120.0, 80.0, 100.0), (0.5, 0.1, 0.45), (9000.0, 8999.0, 9000.0)] {
            let pivot = pivot_levels(h, l, c);
            assert!(pivot.s3 <= pivot.s2);
            assert!(pivot.s2 <= pivot.s1);
            assert!(pivot.s1 <= pivot.p);
            assert!(pivot.p <= pivot.r1);
            assert!(pivot.r1 <= pivot.r2);
            assert!(pivot.r2 <= pivot.r3);
        }
    }

    #[test]
    fn yearly_pivot_spans_previous_year() {
        // Monthly candles across 2019 plus two from 2020.
        let mut monthly = Vec::new();
        for month in 0..12 {
            monthly.push(candle(
                1546300800 + month * 2_592_000, // 2019-01-01 + ~30d steps
                100.0,
                110.0 + month as f64,
                90.0 - month as f64,
                105.0,
            ));
        }
        monthly.push(candle(1577836800, 105.0, 120.0, 95.0, 118.0)); // 2020-01
        monthly.push(candle(1580515200, 118.0, 125.0, 100.0, 122.0)); // 2020-02
        let pivot = yearly_pivot(&monthly, 2020).unwrap();
        // H = 121, L = 79, C = close of the last 2019 candle.
        assert!((pivot.p - (121.0 + 79.0 + 105.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn yearly_pivot_needs_prior_year_history() {
        let monthly = vec![
            candle(1577836800, 100.0, 110.0, 90.0, 105.0),
            candle(1580515200, 105.0, 115.0, 95.0, 108.0),
        ];
        assert!(yearly_pivot(&monthly, 2020).is_none());
    }

    #[test]
    fn previous_candle_pivot_needs_two_candles() {
        assert!(previous_candle_pivot(&[candle(0, 1.0, 2.0, 0.5, 1.5)]).is_none());
        let pivot =
            previous_candle_pivot(&[candle(0, 1.0, 2.0, 0.5, 1.5), candle(60, 1.5, 1.6, 1.4, 1.5)])
                .unwrap();
        assert!((pivot.p - (2.0 + 0.5 + 1.5) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn hour_buckets_align_to_epoch_multiples() {
        let hourly: Vec<Kline> = (0..12)
            .map(|i| candle(i * 3600, 1.0 + i as f64, 2.0 + i as f64, 0.5, 1.5 + i as f64))
            .collect();
        let aggregated = aggregate_hours(&hourly, 6);
        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].timestamp, 0);
        assert_eq!(aggregated[1].timestamp, 6 * 3600);
        assert_eq!(aggregated[0].open, 1.0);
        assert_eq!(aggregated[0].close, 1.5 + 5.0);
        assert_eq!(aggregated[0].high, 2.0 + 5.0);
        assert_eq!(aggregated[1].volume, 6.0);
    }
}
