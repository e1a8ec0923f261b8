use std::{
    collections::BTreeMap,
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fred::prelude::*;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::settings::{ChatId, Language, UserSettings, normalize_symbol};

pub type SettingsTable = BTreeMap<ChatId, UserSettings>;

/// Where the settings table is persisted. Every save replaces the whole table.
#[async_trait]
pub trait SettingsBackend: Send + Sync {
    async fn load(&self) -> Result<Option<SettingsTable>, Error>;

    async fn save(&self, table: &SettingsTable) -> Result<(), Error>;

    fn describe(&self) -> String;
}

/// Pretty JSON file, replaced atomically through a sibling temp file.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SettingsBackend for FileBackend {
    async fn load(&self) -> Result<Option<SettingsTable>, Error> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let table = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt settings file {}", self.path.display()))?;
                Ok(Some(table))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from(e)
                .context(format!("failed to read settings file {}", self.path.display()))),
        }
    }

    async fn save(&self, table: &SettingsTable) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_string_pretty(table)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Whole table stored as one JSON string under `<prefix>:settings`.
#[derive(Clone)]
pub struct RedisBackend {
    client: Client,
    key_prefix: String,
}

impl RedisBackend {
    pub async fn new(redis_url: &str, key: impl Into<String>) -> Result<Self, Error> {
        let config = Config::from_url(redis_url)?;

        let client = Builder::from_config(config)
            .with_connection_config(|config| {
                config.connection_timeout = Duration::from_secs(5);
                config.tcp = TcpConfig {
                    nodelay: Some(true),
                    ..Default::default()
                };
            })
            .build()?;

        client.on_error(|(error, server)| async move {
            error!("{:?}: Redis connection error: {:?}", server, error);
            Ok(())
        });

        client.connect();
        client.wait_for_connect().await?;

        Ok(Self {
            client,
            key_prefix: key.into(),
        })
    }

    fn settings_key(&self) -> String {
        format!("{}:settings", self.key_prefix)
    }
}

#[async_trait]
impl SettingsBackend for RedisBackend {
    async fn load(&self) -> Result<Option<SettingsTable>, Error> {
        let raw: Option<String> = self.client.get(self.settings_key()).await?;
        match raw {
            Some(raw) => Ok(Some(
                serde_json::from_str(&raw).context("corrupt settings value in redis")?,
            )),
            None => Ok(None),
        }
    }

    async fn save(&self, table: &SettingsTable) -> Result<(), Error> {
        let body = serde_json::to_string(table)?;
        let _: () = self
            .client
            .set(self.settings_key(), body, None, None, false)
            .await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("redis:{}", self.settings_key())
    }
}

/// Defaults for records created on first interaction.
#[derive(Debug, Clone)]
pub struct SettingsDefaults {
    pub watchlist: Vec<String>,
    pub interval_minutes: u32,
    pub language: Language,
}

impl SettingsDefaults {
    fn record(&self) -> UserSettings {
        UserSettings::new(self.watchlist.clone(), self.interval_minutes, self.language)
    }
}

struct State {
    table: SettingsTable,
    dirty: bool,
}

/// Chat id → settings, persisted after every mutation.
///
/// A failed write is logged and the in-memory table stays authoritative;
/// the store reports itself dirty until a later write succeeds.
pub struct SettingsStore {
    backend: Box<dyn SettingsBackend>,
    defaults: SettingsDefaults,
    state: Mutex<State>,
}

impl SettingsStore {
    pub async fn open(
        backend: Box<dyn SettingsBackend>,
        defaults: SettingsDefaults,
    ) -> Result<Self, Error> {
        let table = backend.load().await?.unwrap_or_default();
        info!(
            backend = %backend.describe(),
            records = table.len(),
            "settings loaded"
        );

        Ok(Self {
            backend,
            defaults,
            state: Mutex::new(State {
                table,
                dirty: false,
            }),
        })
    }

    /// Current record for a chat, creating it from defaults on first use.
    pub async fn get_or_create(&self, chat: ChatId) -> UserSettings {
        self.update(chat, |record| record.clone()).await
    }

    /// Record for a chat without creating one.
    pub async fn get(&self, chat: ChatId) -> Option<UserSettings> {
        self.state.lock().await.table.get(&chat).cloned()
    }

    /// Snapshot of every record.
    pub async fn records(&self) -> Vec<(ChatId, UserSettings)> {
        self.state
            .lock()
            .await
            .table
            .iter()
            .map(|(chat, settings)| (*chat, settings.clone()))
            .collect()
    }

    /// Add a stock symbol
    /// Returns true if it was newly added
    pub async fn add(&self, chat: ChatId, symbol: &str) -> bool {
        self.update(chat, |record| record.add_symbol(symbol)).await
    }

    /// Remove a stock symbol
    /// Returns true if it existed
    pub async fn remove(&self, chat: ChatId, symbol: &str) -> bool {
        self.update(chat, |record| record.remove_symbol(symbol)).await
    }

    pub async fn set_interval(&self, chat: ChatId, minutes: u32) -> u32 {
        self.update(chat, |record| {
            record.interval_minutes = minutes;
            minutes
        })
        .await
    }

    pub async fn set_language(&self, chat: ChatId, language: Language) -> Language {
        self.update(chat, |record| {
            record.language = language;
            language
        })
        .await
    }

    pub async fn mark_checked(&self, chat: ChatId, symbol: &str, at: DateTime<Utc>) {
        let symbol = normalize_symbol(symbol);
        self.update(chat, |record| {
            record.last_checked.insert(symbol, at);
        })
        .await
    }

    /// Apply a mutation to one record and persist the whole table.
    pub async fn update<T>(&self, chat: ChatId, f: impl FnOnce(&mut UserSettings) -> T) -> T {
        let mut state = self.state.lock().await;

        let before = state.table.get(&chat).cloned();
        let record = state
            .table
            .entry(chat)
            .or_insert_with(|| self.defaults.record());
        let out = f(record);

        if before.as_ref() != state.table.get(&chat) {
            debug!(chat_id = chat, "settings changed");
            state.dirty = true;
        }

        if state.dirty {
            match self.backend.save(&state.table).await {
                Ok(()) => state.dirty = false,
                Err(e) => error!(
                    chat_id = chat,
                    backend = %self.backend.describe(),
                    error = ?e,
                    "failed to persist settings; keeping in-memory copy"
                ),
            }
        }

        out
    }

    /// Write the table if an earlier write failed.
    pub async fn flush(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if !state.dirty {
            return Ok(());
        }
        self.backend.save(&state.table).await?;
        state.dirty = false;
        Ok(())
    }

    pub async fn is_dirty(&self) -> bool {
        self.state.lock().await.dirty
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;

    fn defaults() -> SettingsDefaults {
        SettingsDefaults {
            watchlist: vec!["NVDA".into(), "LUNR".into()],
            interval_minutes: 60,
            language: Language::Zh,
        }
    }

    struct FlakyBackend {
        fail: Arc<AtomicBool>,
        saved: std::sync::Mutex<Option<SettingsTable>>,
    }

    #[async_trait]
    impl SettingsBackend for FlakyBackend {
        async fn load(&self) -> Result<Option<SettingsTable>, Error> {
            Ok(None)
        }

        async fn save(&self, table: &SettingsTable) -> Result<(), Error> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            *self.saved.lock().unwrap() = Some(table.clone());
            Ok(())
        }

        fn describe(&self) -> String {
            "flaky".into()
        }
    }

    #[tokio::test]
    async fn records_created_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("settings.json"));
        let store = SettingsStore::open(Box::new(backend), defaults())
            .await
            .unwrap();

        let record = store.get_or_create(7).await;
        assert_eq!(record.watchlist, vec!["NVDA".to_string(), "LUNR".to_string()]);
        assert_eq!(record.interval_minutes, 60);
        assert_eq!(record.language, Language::Zh);
    }

    #[tokio::test]
    async fn reload_reproduces_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        {
            let store = SettingsStore::open(Box::new(FileBackend::new(&path)), defaults())
                .await
                .unwrap();
            assert!(store.add(42, "tsla").await);
            assert!(store.remove(42, "LUNR").await);
            store.set_interval(42, 15).await;
            store.set_language(42, Language::En).await;
        }

        let store = SettingsStore::open(Box::new(FileBackend::new(&path)), defaults())
            .await
            .unwrap();
        let record = store.get(42).await.unwrap();
        assert_eq!(record.watchlist, vec!["NVDA".to_string(), "TSLA".to_string()]);
        assert_eq!(record.interval_minutes, 15);
        assert_eq!(record.language, Language::En);
        assert!(store.get(43).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = SettingsStore::open(Box::new(FileBackend::new(&path)), defaults()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn failed_write_keeps_memory_authoritative() {
        let fail = Arc::new(AtomicBool::new(true));
        let backend = FlakyBackend {
            fail: fail.clone(),
            saved: std::sync::Mutex::new(None),
        };
        let store = SettingsStore::open(Box::new(backend), defaults())
            .await
            .unwrap();

        assert!(store.add(1, "AMD").await);
        assert!(store.is_dirty().await);
        assert!(store.get(1).await.unwrap().contains("AMD"));
        assert!(store.flush().await.is_err());

        fail.store(false, Ordering::SeqCst);
        store.flush().await.unwrap();
        assert!(!store.is_dirty().await);
    }

    #[tokio::test]
    async fn next_mutation_retries_pending_write() {
        let fail = Arc::new(AtomicBool::new(true));
        let store = SettingsStore::open(
            Box::new(FlakyBackend {
                fail: fail.clone(),
                saved: std::sync::Mutex::new(None),
            }),
            defaults(),
        )
        .await
        .unwrap();

        store.add(1, "AMD").await;
        fail.store(false, Ordering::SeqCst);

        // no-op mutation still flushes the pending table
        assert!(!store.add(1, "amd").await);
        assert!(!store.is_dirty().await);
    }
}
