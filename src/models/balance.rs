use crate::prelude::*;

/// Signed account endpoint response; only the balances are consumed.
#[derive(Clone, Debug, Deserialize)]
pub struct AccountInfo {
    pub balances: Vec<AssetBalance>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub free: f64,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub locked: f64,
}

/// Total/free/used triple per asset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Balance {
    pub total: f64,
    pub free: f64,
    pub used: f64,
}

impl From<&AssetBalance> for Balance {
    fn from(balance: &AssetBalance) -> Self {
        Balance {
            total: balance.free + balance.locked,
            free: balance.free,
            used: balance.locked,
        }
    }
}
