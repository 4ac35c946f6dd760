use rand::distr::Alphanumeric;
use rand::Rng;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn build_request(parameters: &BTreeMap<String, String>) -> String {
    parameters
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Milliseconds since the Unix epoch, the timestamp unit the exchange expects.
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as u64
}

/// Seconds since the Unix epoch, the unit the tick scheduler works in.
pub fn now_secs() -> i64 {
    (get_timestamp() / 1000) as i64
}

pub fn generate_client_order_id(length: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Number of decimal places needed to render a tick/step increment exactly.
pub fn increment_decimals(increment: f64) -> u32 {
    for decimals in 0..=12u32 {
        let scaled = increment * 10f64.powi(decimals as i32);
        if (scaled - scaled.round()).abs() < 1e-9 {
            return decimals;
        }
    }
    12
}

/// Snaps `value` down to a multiple of `increment`, rendered in the
/// increment's native precision: `snap(x, s) = floor(x / s) * s`.
///
/// Snapping an already snapped value is the identity. A value strictly below
/// the increment snaps to zero and is rejected downstream by the notional
/// gate.
pub fn snap_to_increment(value: f64, increment: f64) -> f64 {
    if increment <= 0.0 {
        return value;
    }
    if value <= 0.0 {
        return 0.0;
    }
    let steps = (value / increment + 1e-9).floor();
    round_to(steps * increment, increment_decimals(increment))
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_is_floor_multiple() {
        assert_eq!(snap_to_increment(0.123456, 0.001), 0.123);
        assert_eq!(snap_to_increment(10.07, 0.01), 10.07);
        assert_eq!(snap_to_increment(0.3, 0.1), 0.3);
    }

    #[test]
    fn snap_bounds() {
        let cases = [(0.123456, 0.001), (57.31, 0.25), (7.0, 3.0), (0.999, 0.01)];
        for (x, s) in cases {
            let snapped = snap_to_increment(x, s);
            assert!(snapped <= x + 1e-12, "snap({x}, {s}) = {snapped} > {x}");
            assert!(x < snapped + s, "snap({x}, {s}) = {snapped} too far below");
        }
    }

    #[test]
    fn snap_is_idempotent() {
        for (x, s) in [(0.1234567, 0.0001), (42.42, 0.05), (1.0, 0.001)] {
            let once = snap_to_increment(x, s);
            assert_eq!(snap_to_increment(once, s), once);
        }
    }

    #[test]
    fn below_increment_snaps_to_zero() {
        assert_eq!(snap_to_increment(0.0004, 0.001), 0.0);
    }

    #[test]
    fn increment_decimals_counts() {
        assert_eq!(increment_decimals(1.0), 0);
        assert_eq!(increment_decimals(0.01), 2);
        assert_eq!(increment_decimals(0.00000040), 8);
    }

    #[test]
    fn request_is_sorted_and_joined() {
        let mut parameters = BTreeMap::new();
        parameters.insert("symbol".to_string(), "BTCUSDT".to_string());
        parameters.insert("interval".to_string(), "1d".to_string());
        assert_eq!(build_request(&parameters), "interval=1d&symbol=BTCUSDT");
    }

    #[test]
    fn client_order_id_has_requested_length() {
        assert_eq!(generate_client_order_id(22).len(), 22);
    }
}
