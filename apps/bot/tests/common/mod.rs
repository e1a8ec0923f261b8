#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use analyst::Analyst;
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use bot::{chat::ChatSink, desk::Desk};
use chrono::{DateTime, TimeZone, Utc};
use stock::{
    Catalog, ChatId, Language, MarketData, NewsItem, Quote, SettingsBackend, SettingsDefaults,
    SettingsStore, SettingsTable, WatchlistEntry,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap()
}

pub fn quote(symbol: &str, price: f64, previous_close: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        price,
        previous_close: Some(previous_close),
        open: None,
        day_high: None,
        day_low: None,
        volume: None,
        year_high: None,
        year_low: None,
        as_of: t0(),
    }
}

pub fn article(id: u64, symbol: &str, headline: &str) -> NewsItem {
    NewsItem {
        id,
        headline: headline.to_string(),
        summary: String::new(),
        author: String::new(),
        source: "benzinga".to_string(),
        url: Some(format!("https://example.com/{id}")),
        symbols: vec![symbol.to_string()],
        created_at: t0(),
    }
}

#[derive(Default)]
pub struct FakeMarket {
    pub quotes: Mutex<HashMap<String, Quote>>,
    pub news: Mutex<HashMap<String, Vec<NewsItem>>>,
    pub down: AtomicBool,
}

impl FakeMarket {
    pub fn with_quote(self, q: Quote) -> Self {
        self.quotes.lock().unwrap().insert(q.symbol.clone(), q);
        self
    }

    pub fn with_news(self, symbol: &str, items: Vec<NewsItem>) -> Self {
        self.news.lock().unwrap().insert(symbol.to_string(), items);
        self
    }
}

#[async_trait]
impl MarketData for FakeMarket {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        if self.down.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        self.quotes
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow!("no trades reported for {symbol}"))
    }

    async fn news(
        &self,
        symbol: &str,
        _since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<NewsItem>> {
        if self.down.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        let mut items = self
            .news
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default();
        items.truncate(limit);
        Ok(items)
    }
}

/// Replies with a fixed text and records every prompt.
pub struct FakeAnalyst {
    pub reply: Mutex<Option<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeAnalyst {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Mutex::new(Some(reply.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Analyst for FakeAnalyst {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("operation timed out"))
    }
}

#[derive(Default)]
pub struct RecordingChat {
    pub sent: Mutex<Vec<(ChatId, String)>>,
}

impl RecordingChat {
    pub fn messages(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSink for RecordingChat {
    async fn send(&self, chat: ChatId, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push((chat, text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    pub table: Mutex<Option<SettingsTable>>,
}

#[async_trait]
impl SettingsBackend for MemoryBackend {
    async fn load(&self) -> Result<Option<SettingsTable>> {
        Ok(self.table.lock().unwrap().clone())
    }

    async fn save(&self, table: &SettingsTable) -> Result<()> {
        *self.table.lock().unwrap() = Some(table.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

pub async fn store(watchlist: &[&str]) -> Arc<SettingsStore> {
    let defaults = SettingsDefaults {
        watchlist: watchlist.iter().map(|s| s.to_string()).collect(),
        interval_minutes: 60,
        language: Language::En,
    };
    Arc::new(
        SettingsStore::open(Box::new(MemoryBackend::default()), defaults)
            .await
            .unwrap(),
    )
}

pub fn desk(market: Arc<FakeMarket>, analyst: Arc<FakeAnalyst>) -> Arc<Desk> {
    let catalog = Catalog::new(vec![WatchlistEntry {
        symbol: "NVDA".to_string(),
        name: "NVIDIA Corporation".to_string(),
        keywords: vec!["nvidia".to_string()],
    }]);
    Arc::new(Desk::new(market, analyst, catalog))
}
