use crate::prelude::*;

/// Response of the exchange-information endpoint; the adapter's market cache
/// holds the `symbols` list.
#[derive(Clone, Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

/// Static listing data for one trading pair, including the filters the order
/// managers quantize against.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

impl SymbolInfo {
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }

    pub fn pair(&self) -> Symbol {
        Symbol::new(self.base_asset.clone(), self.quote_asset.clone())
    }

    /// Price increment from the PRICE_FILTER entry.
    pub fn tick_size(&self) -> Option<f64> {
        self.filters.iter().find_map(|filter| match filter {
            SymbolFilter::PriceFilter { tick_size } => Some(*tick_size),
            _ => None,
        })
    }

    /// Quantity increment from the LOT_SIZE entry.
    pub fn step_size(&self) -> Option<f64> {
        self.filters.iter().find_map(|filter| match filter {
            SymbolFilter::LotSize { step_size, .. } => Some(*step_size),
            _ => None,
        })
    }
}

/// Exchange symbol filters. Only the two the robot quantizes against are
/// modeled; the rest deserialize to `Other`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    PriceFilter {
        #[serde(with = "crate::serde_helpers::string_to_float")]
        tick_size: f64,
    },
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        #[serde(with = "crate::serde_helpers::string_to_float")]
        step_size: f64,
        #[serde(with = "crate::serde_helpers::string_to_float")]
        min_qty: f64,
    },
    #[serde(other)]
    Other,
}
