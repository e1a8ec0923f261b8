use std::sync::Arc;

use chrono::{Duration, Utc};
use serenity::futures::{StreamExt, stream};
use stock::{ChatId, Language, SettingsStore, UserSettings};
use tracing::{debug, info, instrument, warn};

use super::{format, parse::Command};
use crate::{desk::Desk, error::BotError};

const NEWS_COMMAND_HOURS: i64 = 48;
const NEWS_COMMAND_LIMIT: usize = 5;
const BRIEFING_NEWS_LIMIT: usize = 10;
const QUOTE_CONCURRENCY: usize = 4;

/// Routes parsed commands to the settings store and the desk.
pub struct Dispatcher {
    store: Arc<SettingsStore>,
    desk: Arc<Desk>,
    briefing_window: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<SettingsStore>, desk: Arc<Desk>, briefing_window: Duration) -> Self {
        Self {
            store,
            desk,
            briefing_window,
        }
    }

    pub fn store(&self) -> &Arc<SettingsStore> {
        &self.store
    }

    /// Parse and run a message; errors become reply text.
    pub async fn respond(&self, chat: ChatId, text: &str) -> String {
        self.respond_to(chat, Command::parse(text)).await
    }

    /// Run an already decoded command, rendering any error as the reply.
    pub async fn respond_to(&self, chat: ChatId, parsed: Result<Command, BotError>) -> String {
        let result = match parsed {
            Ok(command) => self.dispatch(chat, command).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            match &e {
                BotError::InvalidArgument(msg) => debug!(chat_id = chat, reason = %msg, "rejected"),
                other => warn!(chat_id = chat, error = %other, "command failed"),
            }
            e.user_message()
        })
    }

    #[instrument(skip(self, command), fields(command = command.name()))]
    pub async fn dispatch(&self, chat: ChatId, command: Command) -> Result<String, BotError> {
        let settings = self.store.get_or_create(chat).await;

        match command {
            Command::Help => Ok(format::help(&settings)),
            Command::Watchlist => Ok(format::watchlist(&settings)),
            Command::Add { symbols } => Ok(self.add(chat, symbols).await),
            Command::Remove { symbols } => Ok(self.remove(chat, symbols).await),
            Command::Interval(None) => Ok(format!(
                "⏱️ Current interval: {} min",
                settings.interval_minutes
            )),
            Command::Interval(Some(minutes)) => {
                self.store.set_interval(chat, minutes).await;
                info!(chat_id = chat, minutes, "interval updated");
                Ok(format!("✅ Interval set to {minutes} min"))
            }
            Command::Lang(None) => Ok(format!(
                "🌐 Current language: {} ({})",
                settings.language.display_name(),
                settings.language
            )),
            Command::Lang(Some(language)) => {
                self.store.set_language(chat, language).await;
                info!(chat_id = chat, %language, "language updated");
                Ok(format!("✅ Language set to {}", language.display_name()))
            }
            Command::Stocks => self.stocks(&settings).await,
            Command::Price { symbol } => {
                let quote = self.desk.quote(&symbol).await?;
                Ok(format::quote(&self.desk.entry(&symbol).name, &quote))
            }
            Command::News { symbol } => {
                let since = Utc::now() - Duration::hours(NEWS_COMMAND_HOURS);
                let news = self
                    .desk
                    .recent_news(&symbol, since, NEWS_COMMAND_LIMIT)
                    .await?;
                Ok(format::news_list(
                    &symbol,
                    &self.desk.entry(&symbol).name,
                    &news,
                ))
            }
            Command::Ask { symbol, question } => {
                let symbol = symbol.or_else(|| {
                    self.desk
                        .catalog()
                        .detect(&question, &settings.watchlist)
                });
                let answer = self
                    .desk
                    .answer(&question, symbol.as_deref(), settings.language)
                    .await?;
                Ok(format::answer(symbol.as_deref(), &answer))
            }
            Command::Deep { symbol, topic } => {
                let dive = self
                    .desk
                    .deep_dive(&symbol, &topic, settings.language)
                    .await?;
                Ok(format::deep_dive(
                    &symbol,
                    &self.desk.entry(&symbol).name,
                    &dive,
                ))
            }
            Command::Now => self.briefing(chat, &settings).await,
        }
    }

    async fn add(&self, chat: ChatId, symbols: Vec<String>) -> String {
        let mut added = Vec::new();
        let mut already = Vec::new();

        for symbol in symbols {
            if self.store.add(chat, &symbol).await {
                added.push(symbol);
            } else {
                already.push(symbol);
            }
        }
        info!(chat_id = chat, added = ?added, already = ?already, "watchlist add");

        let mut lines = Vec::new();
        if !added.is_empty() {
            lines.push(format!("✅ Now watching: {}", added.join(", ")));
        }
        if !already.is_empty() {
            lines.push(format!(
                "ℹ️ {} already in your watchlist",
                already.join(", ")
            ));
        }
        lines.join("\n")
    }

    async fn remove(&self, chat: ChatId, symbols: Vec<String>) -> String {
        let mut removed = Vec::new();
        let mut missing = Vec::new();

        for symbol in symbols {
            if self.store.remove(chat, &symbol).await {
                removed.push(symbol);
            } else {
                missing.push(symbol);
            }
        }
        info!(chat_id = chat, removed = ?removed, missing = ?missing, "watchlist remove");

        let mut lines = Vec::new();
        if !removed.is_empty() {
            lines.push(format!("✅ Removed: {}", removed.join(", ")));
        }
        if !missing.is_empty() {
            lines.push(format!(
                "❌ {} not found in your watchlist",
                missing.join(", ")
            ));
        }
        lines.join("\n")
    }

    async fn stocks(&self, settings: &UserSettings) -> Result<String, BotError> {
        if settings.watchlist.is_empty() {
            return Ok("📋 Your watchlist is empty. Use /add <symbol>.".to_string());
        }

        let lines: Vec<String> = stream::iter(settings.watchlist.clone())
            .map(|symbol| async move {
                match self.desk.quote(&symbol).await {
                    Ok(quote) => format::quote_line(&quote),
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "quote failed");
                        format!("⚠️ {symbol}: unavailable")
                    }
                }
            })
            .buffered(QUOTE_CONCURRENCY)
            .collect()
            .await;

        Ok(format!("📊 **Watchlist quotes**\n{}", lines.join("\n")))
    }

    /// News briefing for every watched symbol, regardless of importance.
    async fn briefing(&self, chat: ChatId, settings: &UserSettings) -> Result<String, BotError> {
        if settings.watchlist.is_empty() {
            return Ok("📋 Your watchlist is empty. Use /add <symbol>.".to_string());
        }

        let now = Utc::now();
        let since = now - self.briefing_window;
        let mut sections = Vec::with_capacity(settings.watchlist.len());

        for symbol in &settings.watchlist {
            let section = match self.brief(symbol, since, settings.language).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(chat_id = chat, symbol = %symbol, error = %e, "briefing failed");
                    format!("⚠️ {symbol}: {}", e.user_message())
                }
            };
            sections.push(section);
            self.store.mark_checked(chat, symbol, now).await;
        }

        Ok(sections.join("\n\n"))
    }

    async fn brief(
        &self,
        symbol: &str,
        since: chrono::DateTime<Utc>,
        language: Language,
    ) -> Result<String, BotError> {
        let entry = self.desk.entry(symbol);
        let quote = self.desk.quote(symbol).await?;
        let news = self
            .desk
            .recent_news(symbol, since, BRIEFING_NEWS_LIMIT)
            .await?;
        let analysis = self
            .desk
            .analyze(symbol, Some(&quote), &news, language)
            .await?;

        Ok(format::news_alert(&entry, Some(&quote), &analysis, &news))
    }
}
