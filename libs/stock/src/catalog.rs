use serde::{Deserialize, Deserializer};

use crate::settings::normalize_symbol;

/// A configured stock: ticker, display name and keyword filters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    pub name: String,
    #[serde(default, deserialize_with = "keywords")]
    pub keywords: Vec<String>,
}

impl WatchlistEntry {
    pub fn bare(symbol: &str) -> Self {
        let symbol = normalize_symbol(symbol);
        Self {
            name: symbol.clone(),
            symbol,
            keywords: Vec::new(),
        }
    }
}

/// Keywords may be written as a list or as one comma separated string.
fn keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    let list = match raw {
        Some(Raw::List(list)) => list,
        Some(Raw::Text(text)) => text.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };

    Ok(list
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect())
}

/// Lookup over the configured stocks.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<WatchlistEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<WatchlistEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|mut e| {
                e.symbol = normalize_symbol(&e.symbol);
                e
            })
            .collect();
        Self { entries }
    }

    /// Configured entry, or a bare one named after the symbol.
    pub fn entry(&self, symbol: &str) -> WatchlistEntry {
        let symbol = normalize_symbol(symbol);
        self.entries
            .iter()
            .find(|e| e.symbol == symbol)
            .cloned()
            .unwrap_or_else(|| WatchlistEntry::bare(&symbol))
    }

    pub fn name(&self, symbol: &str) -> String {
        self.entry(symbol).name
    }

    /// Find a stock mentioned in free text: the chat's watchlist first,
    /// then configured symbols and their keywords.
    pub fn detect(&self, text: &str, watchlist: &[String]) -> Option<String> {
        let words: Vec<String> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '.' || c == '-'))
            .filter(|w| !w.is_empty())
            .map(str::to_uppercase)
            .collect();
        let upper = text.to_uppercase();
        let mentions = |symbol: &str| {
            // CJK text has no word breaks around tickers
            words.iter().any(|w| w == symbol)
                || (!upper.is_ascii() && upper.contains(symbol))
        };

        if let Some(symbol) = watchlist.iter().find(|s| mentions(s)) {
            return Some(symbol.clone());
        }

        for entry in &self.entries {
            if mentions(&entry.symbol) {
                return Some(entry.symbol.clone());
            }
            if entry
                .keywords
                .iter()
                .any(|k| upper.contains(&k.to_uppercase()))
            {
                return Some(entry.symbol.clone());
            }
        }

        None
    }
}
