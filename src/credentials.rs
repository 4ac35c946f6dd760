use crate::errors::{BinanceError, Result};
use std::path::Path;

/// API credentials loaded from a plain-text file: line 1 the key, line 2 the
/// secret, trailing newlines tolerated.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Credentials> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            BinanceError::Unexpected(format!(
                "cannot read credentials file {}: {err}",
                path.as_ref().display()
            ))
        })?;
        let mut lines = text.lines();
        let api_key = lines.next().unwrap_or("").trim().to_string();
        let secret_key = lines.next().unwrap_or("").trim().to_string();
        if api_key.is_empty() || secret_key.is_empty() {
            return Err(BinanceError::Unexpected(format!(
                "credentials file {} must hold the key on line 1 and the secret on line 2",
                path.as_ref().display()
            )));
        }
        Ok(Credentials { api_key, secret_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_key_and_secret_lines() {
        let path = std::env::temp_dir().join("pivot_trader_credentials_test.txt");
        std::fs::write(&path, "my-api-key\nmy-secret\n").unwrap();
        let credentials = Credentials::from_file(&path).unwrap();
        assert_eq!(credentials.api_key, "my-api-key");
        assert_eq!(credentials.secret_key, "my-secret");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_secret_is_a_startup_error() {
        let path = std::env::temp_dir().join("pivot_trader_credentials_short_test.txt");
        std::fs::write(&path, "only-a-key\n").unwrap();
        assert!(Credentials::from_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
