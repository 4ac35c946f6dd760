use crate::prelude::*;

/// Depth snapshot. Asks ascend from the touch, bids descend; both arrive as
/// `["price", "qty"]` string pairs.
#[derive(Clone, Debug, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BookLevel {
    pub price: f64,
    pub qty: f64,
}

impl<'de> Deserialize<'de> for BookLevel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (price, qty): (String, String) = Deserialize::deserialize(deserializer)?;
        Ok(BookLevel {
            price: f64::from_str(&price).map_err(serde::de::Error::custom)?,
            qty: f64::from_str(&qty).map_err(serde::de::Error::custom)?,
        })
    }
}
