use serde::{Deserialize, Serialize};
use std::fmt;

/// Crawl priority of a watchlist ticker: 1 is the highest, 5 the lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    pub const LOWEST: Priority = Priority(5);

    pub fn new(value: u8) -> Result<Self, String> {
        if !(1..=5).contains(&value) {
            return Err(format!("Priority must be between 1 and 5, got {value}"));
        }
        Ok(Priority(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Priority 1-2 tickers get disclosures, reports and the largest search budget.
    pub fn is_core(&self) -> bool {
        self.0 <= 2
    }

    /// Number of search results fetched per tick for a ticker of this priority.
    pub fn search_budget(&self) -> usize {
        match self.0 {
            1 | 2 => 10,
            3 => 5,
            _ => 3,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority(3)
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}
