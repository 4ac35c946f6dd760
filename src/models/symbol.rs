use crate::prelude::*;
use std::fmt;

/// A trading pair in its `BASE/QUOTE` form.
///
/// The exchange itself speaks the flat form (`BTCUSDT`); the strategies and
/// their books are keyed by the slash form. Both renderings live here so the
/// conversion has exactly one home.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    pub base: String,
    pub quote: String,
}

impl Symbol {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Symbol {
            base: base.into(),
            quote: quote.into(),
        }
    }

    pub fn btc_usdt() -> Self {
        Symbol::new("BTC", "USDT")
    }

    /// Exchange-internal flat form, e.g. `BTCUSDT`.
    pub fn flat(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// The same base against another quote asset, used by the pair-rotation
    /// strategy when the macro bias flips.
    pub fn with_quote(&self, quote: &str) -> Self {
        Symbol::new(self.base.clone(), quote)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Symbol {
    type Err = BinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() => {
                Ok(Symbol::new(base, quote))
            }
            _ => Err(BinanceError::Unexpected(format!(
                "invalid symbol: {s:?}, expected BASE/QUOTE"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_both_forms() {
        let symbol = Symbol::new("LTC", "BTC");
        assert_eq!(symbol.to_string(), "LTC/BTC");
        assert_eq!(symbol.flat(), "LTCBTC");
    }

    #[test]
    fn parses_slash_form() {
        let symbol: Symbol = "FOO/USDT".parse().unwrap();
        assert_eq!(symbol.base, "FOO");
        assert_eq!(symbol.quote, "USDT");
        assert!("FOOUSDT".parse::<Symbol>().is_err());
    }

    #[test]
    fn quote_rotation_keeps_base() {
        let symbol = Symbol::new("ADA", "USDT");
        assert_eq!(symbol.with_quote("BTC"), Symbol::new("ADA", "BTC"));
    }
}
