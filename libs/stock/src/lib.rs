mod catalog;
mod market_client;
mod settings;
mod settings_store;

pub use catalog::{Catalog, WatchlistEntry};
pub use market_client::{Bar, MarketClient, MarketData, NewsItem, Quote, Snapshot};
pub use settings::{
    ChatId, Language, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES, UserSettings,
    normalize_symbol, parse_symbol,
};
pub use settings_store::{
    FileBackend, RedisBackend, SettingsBackend, SettingsDefaults, SettingsStore, SettingsTable,
};
