use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{Error, bail};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Chat identifier the settings are keyed by.
pub type ChatId = u64;

pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 1440;

const MAX_SYMBOL_LEN: usize = 10;

/// Trim and upper-case a ticker.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Normalize a ticker and reject anything that cannot be one.
pub fn parse_symbol(raw: &str) -> Result<String, Error> {
    let symbol = normalize_symbol(raw);

    if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
        bail!("`{}` is not a valid symbol", raw.trim());
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        bail!("`{}` is not a valid symbol", raw.trim());
    }

    Ok(symbol)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Zh => "中文",
            Language::En => "English",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zh" | "cn" | "chinese" | "中文" => Ok(Language::Zh),
            "en" | "english" => Ok(Language::En),
            other => bail!("unsupported language `{other}` (use zh or en)"),
        }
    }
}

/// Per-chat preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub watchlist: Vec<String>,
    pub interval_minutes: u32,
    #[serde(default)]
    pub language: Language,
    /// When each symbol was last evaluated by the monitor.
    #[serde(default)]
    pub last_checked: BTreeMap<String, DateTime<Utc>>,
}

impl UserSettings {
    pub fn new(watchlist: Vec<String>, interval_minutes: u32, language: Language) -> Self {
        let mut settings = Self {
            watchlist: Vec::new(),
            interval_minutes,
            language,
            last_checked: BTreeMap::new(),
        };
        for symbol in watchlist {
            settings.add_symbol(&symbol);
        }
        settings
    }

    pub fn contains(&self, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        self.watchlist.iter().any(|s| *s == symbol)
    }

    /// Returns true if the symbol was newly added.
    pub fn add_symbol(&mut self, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() || self.contains(&symbol) {
            return false;
        }
        self.watchlist.push(symbol);
        true
    }

    /// Returns true if the symbol was present.
    pub fn remove_symbol(&mut self, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        let before = self.watchlist.len();
        self.watchlist.retain(|s| *s != symbol);
        self.last_checked.remove(&symbol);
        self.watchlist.len() != before
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }

    /// A symbol is due when it was never checked or its interval has elapsed.
    pub fn is_due(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        match self.last_checked.get(symbol) {
            Some(last) => now - *last >= self.interval(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_case_insensitive() {
        let mut s = UserSettings::new(vec![], 60, Language::En);
        assert!(s.add_symbol("nvda"));
        assert!(!s.add_symbol("NVDA"));
        assert!(!s.add_symbol(" Nvda "));
        assert_eq!(s.watchlist, vec!["NVDA".to_string()]);
    }

    #[test]
    fn new_dedups_seed_watchlist() {
        let s = UserSettings::new(
            vec!["lunr".into(), "NVDA".into(), "LUNR".into()],
            60,
            Language::Zh,
        );
        assert_eq!(s.watchlist, vec!["LUNR".to_string(), "NVDA".to_string()]);
    }

    #[test]
    fn remove_absent_leaves_watchlist() {
        let mut s = UserSettings::new(vec!["NVDA".into()], 60, Language::En);
        assert!(!s.remove_symbol("TSLA"));
        assert_eq!(s.watchlist, vec!["NVDA".to_string()]);
        assert!(s.remove_symbol("nvda"));
        assert!(s.watchlist.is_empty());
    }

    #[test]
    fn language_aliases() {
        assert_eq!("zh".parse::<Language>().unwrap(), Language::Zh);
        assert_eq!("中文".parse::<Language>().unwrap(), Language::Zh);
        assert_eq!("English".parse::<Language>().unwrap(), Language::En);
        assert!("xx".parse::<Language>().is_err());
    }

    #[test]
    fn symbol_validation() {
        assert_eq!(parse_symbol(" brk.b ").unwrap(), "BRK.B");
        assert!(parse_symbol("").is_err());
        assert!(parse_symbol("NV DA").is_err());
        assert!(parse_symbol("ABCDEFGHIJK").is_err());
    }

    #[test]
    fn due_after_interval() {
        let mut s = UserSettings::new(vec!["NVDA".into()], 30, Language::En);
        let t0 = Utc::now();
        assert!(s.is_due("NVDA", t0));

        s.last_checked.insert("NVDA".into(), t0);
        assert!(!s.is_due("NVDA", t0 + Duration::minutes(29)));
        assert!(s.is_due("NVDA", t0 + Duration::minutes(30)));
    }
}
