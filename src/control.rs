use crate::errors::Result;
use std::path::Path;

/// Kill-switch polarity: `switch : 1` means the bot keeps running, `0` tells
/// the daemon to terminate. Lines starting with `#` are comments.
///
/// Reads the whole file each poll; the last matching line wins.
pub fn read_bot_switch(path: impl AsRef<Path>) -> Result<bool> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_bot_switch(&text).unwrap_or(true))
}

pub fn parse_bot_switch(text: &str) -> Option<bool> {
    let mut state = None;
    for line in text.lines() {
        if line.starts_with('#') || !line.contains("switch :") {
            continue;
        }
        match line.trim_end().chars().last() {
            Some('0') => state = Some(false),
            Some('1') => state = Some(true),
            _ => {}
        }
    }
    state
}

/// Rewrites the kill-switch file; used by the chat notifier's bot commands.
pub fn write_bot_switch(path: impl AsRef<Path>, on: bool) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("switch : {}\n", if on { 1 } else { 0 }))?;
    Ok(())
}

/// Symbol screening lists the alt strategies reload once per day: stable
/// quote assets never traded as alts, and the leveraged-token name fragments
/// excluded outright.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinFilters {
    pub stable_list: Vec<String>,
    pub option_list: Vec<String>,
}

impl CoinFilters {
    pub fn defaults() -> Self {
        CoinFilters {
            stable_list: ["USDT", "BUSD", "PAX", "TUSD", "USDC", "NGN", "USDS", "EUR"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            option_list: ["BULL", "BEAR", "UP", "DOWN"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn is_stable(&self, asset: &str) -> bool {
        self.stable_list.iter().any(|stable| stable == asset)
    }

    pub fn is_leveraged_token(&self, asset: &str) -> bool {
        self.option_list.iter().any(|tag| asset.contains(tag))
    }
}

/// Loads the coin-data CSV (`stable_list`, `option_list` columns, cells
/// whitespace-stripped, short columns tolerated).
pub fn load_coin_filters(path: impl AsRef<Path>) -> Result<CoinFilters> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path.as_ref())
        .map_err(crate::errors::BinanceError::from)?;
    let headers = reader.headers()?.clone();
    let stable_idx = headers.iter().position(|h| h.trim() == "stable_list");
    let option_idx = headers.iter().position(|h| h.trim() == "option_list");
    let mut filters = CoinFilters {
        stable_list: Vec::new(),
        option_list: Vec::new(),
    };
    for record in reader.records() {
        let record = record?;
        if let Some(idx) = stable_idx {
            if let Some(cell) = record.get(idx) {
                let cell = cell.trim();
                if !cell.is_empty() {
                    filters.stable_list.push(cell.to_string());
                }
            }
        }
        if let Some(idx) = option_idx {
            if let Some(cell) = record.get(idx) {
                let cell = cell.trim();
                if !cell.is_empty() {
                    filters.option_list.push(cell.to_string());
                }
            }
        }
    }
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_parses_last_matching_line() {
        let text = "# bot switch file\nswitch : 1\n";
        assert_eq!(parse_bot_switch(text), Some(true));
        let text = "switch : 1\nswitch : 0\n";
        assert_eq!(parse_bot_switch(text), Some(false));
        assert_eq!(parse_bot_switch("# switch : 0\n"), None);
        assert_eq!(parse_bot_switch("unrelated\n"), None);
    }

    #[test]
    fn switch_round_trips_through_file() {
        let path = std::env::temp_dir().join("pivot_trader_switch_test.txt");
        write_bot_switch(&path, false).unwrap();
        assert!(!read_bot_switch(&path).unwrap());
        write_bot_switch(&path, true).unwrap();
        assert!(read_bot_switch(&path).unwrap());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn coin_filters_load_and_trim() {
        let path = std::env::temp_dir().join("pivot_trader_coin_data_test.csv");
        std::fs::write(
            &path,
            "stable_list,option_list\nUSDT, BULL\nBUSD,BEAR\n EUR,\n",
        )
        .unwrap();
        let filters = load_coin_filters(&path).unwrap();
        assert_eq!(filters.stable_list, vec!["USDT", "BUSD", "EUR"]);
        assert_eq!(filters.option_list, vec!["BULL", "BEAR"]);
        assert!(filters.is_stable("EUR"));
        assert!(filters.is_leveraged_token("ETHBULL"));
        assert!(!filters.is_leveraged_token("ETH"));
        let _ = std::fs::remove_file(&path);
    }
}
