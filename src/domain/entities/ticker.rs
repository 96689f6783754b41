use crate::domain::values::priority::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A watchlist entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    /// Six-character KRX code, e.g. `005930`.
    pub code: String,
    pub name: String,
    pub priority: Priority,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticker {
    pub fn new(code: &str, name: &str, priority: Priority) -> Result<Self, String> {
        let code = code.trim();
        if code.chars().count() != 6 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("Ticker code must be 6 alphanumeric characters, got '{code}'"));
        }
        if name.trim().is_empty() {
            return Err("Ticker name must not be empty".into());
        }
        let now = Utc::now();
        Ok(Self {
            code: code.to_string(),
            name: name.trim().to_string(),
            priority,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_validation() {
        assert!(Ticker::new("005930", "삼성전자", Priority::HIGHEST).is_ok());
        assert!(Ticker::new("5930", "삼성전자", Priority::HIGHEST).is_err());
        assert!(Ticker::new("005930", " ", Priority::HIGHEST).is_err());
    }
}
