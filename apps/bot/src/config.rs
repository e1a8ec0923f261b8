use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use analyst::{LlmConfig, Provider};
use chrono_tz::Tz;
use serde::Deserialize;
use stock::{
    Language, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES, SettingsDefaults, WatchlistEntry,
    parse_symbol,
};

use crate::error::BotError;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ai: AiConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub stocks: Vec<WatchlistEntry>,
    #[serde(default)]
    pub alerts: AlertSettings,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_ai_timeout() -> u64 {
    60
}

impl AiConfig {
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            provider: self.provider,
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: std::time::Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub token: String,
    /// Chat that receives scheduled pushes.
    pub channel_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataConfig {
    #[serde(default = "default_market_url")]
    pub base_url: String,
    #[serde(default)]
    pub key_id: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_feed")]
    pub feed: String,
}

fn default_market_url() -> String {
    "https://data.alpaca.markets".to_string()
}

fn default_feed() -> String {
    "iex".to_string()
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_market_url(),
            key_id: String::new(),
            secret: String::new(),
            feed: default_feed(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Never alert the same article to the same chat twice within the window.
    #[default]
    PerItem,
    /// Alert on whatever the news window returns.
    Off,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub interval_minutes: u32,
    pub min_importance: u8,
    pub price_change_threshold: f64,
    pub news_timeframe_hours: u32,
    pub dedup: DedupPolicy,
    pub dedup_window_hours: u32,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            min_importance: 5,
            price_change_threshold: 3.0,
            news_timeframe_hours: 24,
            dedup: DedupPolicy::PerItem,
            dedup_window_hours: 72,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub cron: String,
    pub timezone: String,
    pub tick_seconds: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "0 9-16 * * 1-5".to_string(),
            timezone: "America/New_York".to_string(),
            tick_seconds: 60,
        }
    }
}

impl ScheduleConfig {
    /// The scheduler wants a seconds field; classic 5-field crontab lines get one.
    pub fn cron_expression(&self) -> String {
        let expr = self.cron.trim();
        if expr.split_whitespace().count() == 5 {
            format!("0 {expr}")
        } else {
            expr.to_string()
        }
    }

    pub fn tz(&self) -> Result<Tz, BotError> {
        Tz::from_str(self.timezone.trim())
            .map_err(|_| BotError::config(format!("unknown timezone `{}`", self.timezone)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
    pub redis_url: Option<String>,
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: PathBuf::from("user_settings.json"),
            redis_url: None,
            key_prefix: "stock-noti".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some(PathBuf::from("logs/stock_noti.log")),
        }
    }
}

impl Config {
    /// Read the YAML file, apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, BotError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BotError::config(format!(
                "cannot read {}: {e} (copy config.example.yaml to config.yaml and fill in your keys)",
                path.display()
            ))
        })?;

        Self::from_yaml(&raw, |key| std::env::var(key).ok())
    }

    pub fn from_yaml(raw: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self, BotError> {
        let mut config: Config = serde_yaml::from_str(raw)
            .map_err(|e| BotError::config(format!("invalid config: {e}")))?;

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), BotError> {
        let set = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = set("AI_API_KEY") {
            self.ai.api_key = v;
        }
        if let Some(v) = set("DISCORD_TOKEN") {
            self.discord.token = v;
        }
        if let Some(v) = set("DISCORD_TARGET_CHANNEL_ID") {
            let id = v.trim().parse().map_err(|_| {
                BotError::config(format!("DISCORD_TARGET_CHANNEL_ID `{v}` is not a number"))
            })?;
            self.discord.channel_id = Some(id);
        }
        if let Some(v) = set("APCA_API_BASE_URL") {
            self.market_data.base_url = v;
        }
        if let Some(v) = set("APCA_API_KEY_ID") {
            self.market_data.key_id = v;
        }
        if let Some(v) = set("APCA_API_SECRET_KEY") {
            self.market_data.secret = v;
        }
        if let Some(v) = set("REDIS_URL") {
            self.storage.redis_url = Some(v);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<(), BotError> {
        if self.ai.api_key.trim().is_empty() {
            return Err(BotError::config("ai.api_key is not set (or AI_API_KEY)"));
        }
        if self.discord.token.trim().is_empty() {
            return Err(BotError::config("discord.token is not set (or DISCORD_TOKEN)"));
        }
        if !matches!(self.discord.channel_id, Some(id) if id > 0) {
            return Err(BotError::config(
                "discord.channel_id is not set (or DISCORD_TARGET_CHANNEL_ID)",
            ));
        }
        if self.market_data.key_id.trim().is_empty() || self.market_data.secret.trim().is_empty() {
            return Err(BotError::config(
                "market_data.key_id / market_data.secret are not set (or APCA_API_KEY_ID / APCA_API_SECRET_KEY)",
            ));
        }

        if self.alerts.min_importance > 10 {
            return Err(BotError::config("alerts.min_importance must be within 0..=10"));
        }
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&self.alerts.interval_minutes) {
            return Err(BotError::config(format!(
                "alerts.interval_minutes must be within {MIN_INTERVAL_MINUTES}..={MAX_INTERVAL_MINUTES}"
            )));
        }
        if self.alerts.price_change_threshold < 0.0 {
            return Err(BotError::config("alerts.price_change_threshold must not be negative"));
        }
        if self.schedule.tick_seconds == 0 {
            return Err(BotError::config("schedule.tick_seconds must be positive"));
        }
        let fields = self.schedule.cron.split_whitespace().count();
        if fields != 5 && fields != 6 {
            return Err(BotError::config(format!(
                "schedule.cron `{}` must have 5 or 6 fields",
                self.schedule.cron
            )));
        }
        self.schedule.tz()?;

        if self.storage.backend == StorageBackend::Redis && self.storage.redis_url.is_none() {
            return Err(BotError::config(
                "storage.redis_url is required for the redis backend (or REDIS_URL)",
            ));
        }

        for entry in &mut self.stocks {
            entry.symbol = parse_symbol(&entry.symbol)
                .map_err(|e| BotError::config(format!("stocks: {e}")))?;
        }

        Ok(())
    }

    /// Validated target chat.
    pub fn target_chat(&self) -> u64 {
        self.discord.channel_id.unwrap_or_default()
    }

    pub fn settings_defaults(&self) -> SettingsDefaults {
        SettingsDefaults {
            watchlist: self.stocks.iter().map(|s| s.symbol.clone()).collect(),
            interval_minutes: self.alerts.interval_minutes,
            language: Language::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const MINIMAL: &str = r#"
ai:
  provider: xai
  api_key: file-key
discord:
  token: tok
  channel_id: 42
market_data:
  key_id: id
  secret: sec
stocks:
  - symbol: nvda
    name: NVIDIA Corporation
    keywords: NVIDIA, GPU
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_yaml(MINIMAL, no_env).unwrap();

        assert_eq!(config.ai.provider, Provider::Xai);
        assert_eq!(config.ai.max_tokens, 1000);
        assert_eq!(config.stocks[0].symbol, "NVDA");
        assert_eq!(config.stocks[0].keywords, vec!["NVIDIA", "GPU"]);
        assert_eq!(config.alerts.interval_minutes, 60);
        assert_eq!(config.alerts.dedup, DedupPolicy::PerItem);
        assert_eq!(config.schedule.cron_expression(), "0 0 9-16 * * 1-5");
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.target_chat(), 42);
        assert_eq!(config.settings_defaults().watchlist, vec!["NVDA"]);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AI_API_KEY", "env-key"),
            ("DISCORD_TARGET_CHANNEL_ID", "777"),
            ("REDIS_URL", "redis://localhost"),
        ]);
        let config =
            Config::from_yaml(MINIMAL, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.ai.api_key, "env-key");
        assert_eq!(config.target_chat(), 777);
        assert_eq!(config.storage.redis_url.as_deref(), Some("redis://localhost"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let raw = MINIMAL.replace("provider: xai", "provider: mistral");
        assert!(matches!(
            Config::from_yaml(&raw, no_env),
            Err(BotError::Configuration(_))
        ));
    }

    #[test]
    fn bad_values_are_rejected() {
        let raw = format!("{MINIMAL}alerts:\n  min_importance: 11\n");
        assert!(Config::from_yaml(&raw, no_env).is_err());

        let raw = format!("{MINIMAL}schedule:\n  timezone: Mars/Olympus\n");
        assert!(Config::from_yaml(&raw, no_env).is_err());

        let raw = format!("{MINIMAL}storage:\n  backend: redis\n");
        assert!(Config::from_yaml(&raw, no_env).is_err());

        let raw = MINIMAL.replace("api_key: file-key", "api_key: ''");
        assert!(Config::from_yaml(&raw, no_env).is_err());
    }

    #[test]
    fn six_field_cron_is_kept() {
        let schedule = ScheduleConfig {
            cron: "0 30 16 * * Mon-Fri".into(),
            ..Default::default()
        };
        assert_eq!(schedule.cron_expression(), "0 30 16 * * Mon-Fri");
    }
}
