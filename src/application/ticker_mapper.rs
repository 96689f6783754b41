use crate::domain::entities::content_item::ContentItem;
use crate::domain::entities::ticker::Ticker;
use crate::domain::error::DomainError;
use crate::domain::ports::ticker_repository::TickerRepository;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
struct AliasEntry {
    alias: String,
    code: String,
    priority: u8,
    len: usize,
}

/// Resolves company mentions to watchlist codes.
///
/// Every ticker's code and name are aliases; an optional JSON file adds more
/// (`{"삼성": "005930", ...}`). Aliases pointing outside the watchlist are ignored.
#[derive(Debug, Clone, Default)]
pub struct TickerMapper {
    /// Longest alias first; ties by priority value, then code.
    entries: Vec<AliasEntry>,
    exact: HashMap<String, String>,
}

impl TickerMapper {
    pub fn from_parts(tickers: &[Ticker], extra_aliases: &HashMap<String, String>) -> Self {
        let priorities: HashMap<&str, u8> = tickers
            .iter()
            .map(|t| (t.code.as_str(), t.priority.value()))
            .collect();

        let mut pairs: Vec<(String, String)> = Vec::new();
        for t in tickers {
            pairs.push((t.code.clone(), t.code.clone()));
            pairs.push((t.name.clone(), t.code.clone()));
        }
        let mut skipped = 0;
        for (alias, code) in extra_aliases {
            if priorities.contains_key(code.as_str()) {
                pairs.push((alias.clone(), code.clone()));
            } else {
                skipped += 1;
            }
        }
        if skipped > 0 {
            tracing::debug!(skipped, "Aliases for codes outside the watchlist ignored");
        }

        let mut entries: Vec<AliasEntry> = pairs
            .into_iter()
            .map(|(alias, code)| (alias.trim().to_string(), code))
            .filter(|(alias, _)| !alias.is_empty())
            .map(|(alias, code)| AliasEntry {
                len: alias.chars().count(),
                priority: priorities.get(code.as_str()).copied().unwrap_or(u8::MAX),
                alias,
                code,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.len
                .cmp(&a.len)
                .then(a.priority.cmp(&b.priority))
                .then(a.code.cmp(&b.code))
        });
        entries.dedup_by(|a, b| a.alias == b.alias && a.code == b.code);

        let mut exact = HashMap::new();
        for e in &entries {
            exact.entry(e.alias.clone()).or_insert_with(|| e.code.clone());
        }

        Self { entries, exact }
    }

    /// Builds the mapper from the active watchlist plus an optional alias file.
    pub fn load(repo: &dyn TickerRepository, alias_path: Option<&Path>) -> Result<Self, DomainError> {
        let tickers = repo.list_active()?;
        let aliases = match alias_path {
            Some(path) => load_alias_file(path)?,
            None => HashMap::new(),
        };
        let mapper = Self::from_parts(&tickers, &aliases);
        tracing::info!(tickers = tickers.len(), aliases = mapper.entries.len(), "Ticker mapper loaded");
        Ok(mapper)
    }

    pub fn alias_count(&self) -> usize {
        self.entries.len()
    }

    /// Explicit company name first, then the longest alias in the title, then in the body.
    pub fn resolve(&self, item: &ContentItem) -> Option<String> {
        if let Some(name) = item.company_name.as_deref() {
            let name = name.trim();
            if let Some(code) = self.exact.get(name) {
                return Some(code.clone());
            }
            if let Some(code) = self.find_in(name) {
                return Some(code);
            }
        }
        self.find_in(&item.title).or_else(|| self.find_in(&item.body))
    }

    /// Code of the longest alias contained in `text`.
    pub fn find_in(&self, text: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|e| text.contains(e.alias.as_str()))
            .map(|e| e.code.clone())
    }
}

pub fn load_alias_file(path: &Path) -> Result<HashMap<String, String>, DomainError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DomainError::Config(format!("alias file {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| DomainError::Config(format!("alias file {}: {e}", path.display())))
}
