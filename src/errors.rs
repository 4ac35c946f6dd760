/// Error taxonomy for the trading robot.
///
/// `BinanceContentError` is the `{code, msg}` payload the exchange returns on
/// rejected requests. `BinanceError` is the crate-wide error enum: every
/// adapter call surfaces one of its variants, and the strategies decide per
/// variant whether to retry, skip the symbol, or abort the step.
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Raw error body returned by the Binance REST API.
#[derive(Debug, Deserialize)]
pub struct BinanceContentError {
    pub code: i64,
    pub msg: String,
}

pub type Result<T> = std::result::Result<T, BinanceError>;

#[derive(Debug, Error)]
pub enum BinanceError {
    /// Transport failure. The retry kernel replays these up to its attempt
    /// budget before surfacing the variant.
    #[error("network error: {0}")]
    Network(String),

    /// The exchange throttled us. The kernel has already slept for the
    /// cool-down window by the time a caller sees this.
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    /// Order rejected for lack of balance. Non-fatal for market buys, which
    /// re-try against a refreshed book; fatal for every other intent.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Order rejected by exchange filters (price, lot size, precision) or
    /// cancellation of an unknown order.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// Any other documented exchange rejection.
    #[error("exchange error {code}: {msg}")]
    Base { code: i64, msg: String },

    /// A kline row came back with fewer columns than the wire format
    /// promises.
    #[error("invalid kline row: {name} at {index} is missing")]
    KlineValueMissing { index: usize, name: &'static str },

    /// Everything the other variants do not cover: decode failures, local IO,
    /// programming errors on our side of the wire.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl BinanceError {
    /// Whether the retry kernel may replay the failed call.
    pub fn is_transient(&self) -> bool {
        matches!(self, BinanceError::Network(_))
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, BinanceError::RateLimit(_))
    }

    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, BinanceError::InsufficientFunds(_))
    }

    /// Classifies an exchange `{code, msg}` rejection into the taxonomy.
    ///
    /// The mapping follows the documented REST error codes: `-1003` (and the
    /// HTTP 418/429 statuses handled by the client before this point) are
    /// throttling, `-2010` with an insufficient-balance message is a funding
    /// problem, and the filter/precision/unknown-order family is an invalid
    /// order. Everything else stays a `Base` exchange error.
    pub fn from_content(error: BinanceContentError) -> Self {
        let BinanceContentError { code, msg } = error;
        match code {
            -1003 => BinanceError::RateLimit(msg),
            -2010 if msg.to_lowercase().contains("insufficient") => {
                BinanceError::InsufficientFunds(msg)
            }
            -1013 | -1111 | -2010 | -2011 => BinanceError::InvalidOrder(msg),
            _ => BinanceError::Base { code, msg },
        }
    }
}

impl fmt::Display for BinanceContentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.msg)
    }
}

impl From<reqwest::Error> for BinanceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_builder() {
            BinanceError::Unexpected(err.to_string())
        } else {
            BinanceError::Network(err.to_string())
        }
    }
}

impl From<reqwest::header::InvalidHeaderValue> for BinanceError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        BinanceError::Unexpected(err.to_string())
    }
}

impl From<serde_json::Error> for BinanceError {
    fn from(err: serde_json::Error) -> Self {
        BinanceError::Unexpected(err.to_string())
    }
}

impl From<std::io::Error> for BinanceError {
    fn from(err: std::io::Error) -> Self {
        BinanceError::Unexpected(err.to_string())
    }
}

impl From<csv::Error> for BinanceError {
    fn from(err: csv::Error) -> Self {
        BinanceError::Unexpected(err.to_string())
    }
}

impl From<std::num::ParseFloatError> for BinanceError {
    fn from(err: std::num::ParseFloatError) -> Self {
        BinanceError::Unexpected(err.to_string())
    }
}

impl From<std::string::String> for BinanceError {
    fn from(err: String) -> Self {
        BinanceError::Unexpected(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_code_classifies() {
        let err = BinanceError::from_content(BinanceContentError {
            code: -1003,
            msg: "Too many requests".into(),
        });
        assert!(err.is_rate_limit());
    }

    #[test]
    fn insufficient_balance_classifies() {
        let err = BinanceError::from_content(BinanceContentError {
            code: -2010,
            msg: "Account has insufficient balance for requested action.".into(),
        });
        assert!(err.is_insufficient_funds());
    }

    #[test]
    fn filter_failure_is_invalid_order() {
        let err = BinanceError::from_content(BinanceContentError {
            code: -1013,
            msg: "Filter failure: LOT_SIZE".into(),
        });
        assert!(matches!(err, BinanceError::InvalidOrder(_)));
    }

    #[test]
    fn unknown_code_stays_base() {
        let err = BinanceError::from_content(BinanceContentError {
            code: -1121,
            msg: "Invalid symbol.".into(),
        });
        assert!(matches!(err, BinanceError::Base { code: -1121, .. }));
    }
}
