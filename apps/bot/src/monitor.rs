use std::{collections::HashMap, ops::AddAssign, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serenity::futures::{StreamExt, stream};
use stock::{ChatId, Language, NewsItem, SettingsStore};
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, instrument, warn};
use tracing_futures::Instrument;

use crate::{
    chat::ChatSink,
    command::format,
    config::{AlertSettings, DedupPolicy},
    desk::Desk,
};

const CONCURRENCY: usize = 4;
const NEWS_LIMIT: usize = 10;

/// Counts from one monitor pass or digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub checked: usize,
    pub alerts: usize,
    pub failures: usize,
}

impl AddAssign for PassReport {
    fn add_assign(&mut self, other: Self) {
        self.checked += other.checked;
        self.alerts += other.alerts;
        self.failures += other.failures;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Quiet,
    Alerted,
    Failed,
}

/// News ids already analysed or pushed, per chat.
#[derive(Default)]
struct SeenNews {
    by_chat: HashMap<ChatId, HashMap<u64, DateTime<Utc>>>,
}

impl SeenNews {
    fn fresh(
        &mut self,
        chat: ChatId,
        news: Vec<NewsItem>,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Vec<NewsItem> {
        let seen = self.by_chat.entry(chat).or_default();
        seen.retain(|_, at| now - *at < window);
        news.into_iter().filter(|n| !seen.contains_key(&n.id)).collect()
    }

    fn record(&mut self, chat: ChatId, news: &[NewsItem], now: DateTime<Utc>) {
        let seen = self.by_chat.entry(chat).or_default();
        for item in news {
            seen.insert(item.id, now);
        }
    }
}

/// Decides which watched symbols deserve an alert and pushes it.
pub struct Monitor {
    store: Arc<SettingsStore>,
    desk: Arc<Desk>,
    chat: Arc<dyn ChatSink>,
    alerts: AlertSettings,
    target: Option<ChatId>,
    seen: Mutex<SeenNews>,
}

impl Monitor {
    pub fn new(
        store: Arc<SettingsStore>,
        desk: Arc<Desk>,
        chat: Arc<dyn ChatSink>,
        alerts: AlertSettings,
    ) -> Self {
        Self {
            store,
            desk,
            chat,
            alerts,
            target: None,
            seen: Mutex::new(SeenNews::default()),
        }
    }

    /// Monitor `chat` with the default watchlist even before it sends a command.
    pub fn with_target(mut self, chat: ChatId) -> Self {
        self.target = Some(chat);
        self
    }

    /// Check every chat's due symbols.
    #[instrument(name = "monitor_pass", skip(self))]
    pub async fn run_pass(&self, now: DateTime<Utc>) -> PassReport {
        let mut report = PassReport::default();

        if let Some(target) = self.target {
            self.store.get_or_create(target).await;
        }

        for (chat, settings) in self.store.records().await {
            let due: Vec<String> = settings
                .watchlist
                .iter()
                .filter(|s| settings.is_due(s, now))
                .cloned()
                .collect();
            if due.is_empty() {
                continue;
            }

            debug!(chat_id = chat, due = due.len(), "symbols due");
            report += self
                .check_chat(chat, due, settings.language, now, self.alerts.min_importance)
                .await;
        }

        if report.checked > 0 {
            info!(
                checked = report.checked,
                alerts = report.alerts,
                failures = report.failures,
                "monitor pass complete"
            );
        }
        report
    }

    /// Check `symbols` (or the chat's whole watchlist) regardless of interval.
    #[instrument(name = "digest", skip(self, symbols))]
    pub async fn run_digest(
        &self,
        chat: ChatId,
        symbols: Option<Vec<String>>,
        now: DateTime<Utc>,
        min_importance: Option<u8>,
    ) -> PassReport {
        let settings = self.store.get_or_create(chat).await;
        let symbols = symbols.unwrap_or(settings.watchlist);
        let min_importance = min_importance.unwrap_or(self.alerts.min_importance);

        let report = self
            .check_chat(chat, symbols, settings.language, now, min_importance)
            .await;
        info!(
            checked = report.checked,
            alerts = report.alerts,
            failures = report.failures,
            "digest complete"
        );
        report
    }

    async fn check_chat(
        &self,
        chat: ChatId,
        symbols: Vec<String>,
        language: Language,
        now: DateTime<Utc>,
        min_importance: u8,
    ) -> PassReport {
        let outcomes: Vec<Outcome> = stream::iter(symbols)
            .map(|symbol| {
                let span = info_span!("monitor_symbol", chat_id = chat, symbol = %symbol);
                async move {
                    self.check_symbol(chat, &symbol, language, now, min_importance)
                        .await
                }
                .instrument(span)
            })
            .buffer_unordered(CONCURRENCY)
            .collect()
            .await;

        let mut report = PassReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Quiet => report.checked += 1,
                Outcome::Alerted => {
                    report.checked += 1;
                    report.alerts += 1;
                }
                Outcome::Failed => report.failures += 1,
            }
        }
        report
    }

    async fn check_symbol(
        &self,
        chat: ChatId,
        symbol: &str,
        language: Language,
        now: DateTime<Utc>,
        min_importance: u8,
    ) -> Outcome {
        let quote = match self.desk.quote(symbol).await {
            Ok(q) => q,
            Err(e) => {
                warn!(error = %e, "quote failed; skipping");
                return Outcome::Failed;
            }
        };

        let since = now - Duration::hours(i64::from(self.alerts.news_timeframe_hours));
        let news = match self.desk.recent_news(symbol, since, NEWS_LIMIT).await {
            Ok(news) => news,
            Err(e) => {
                warn!(error = %e, "news unavailable");
                Vec::new()
            }
        };
        let news = self.fresh_news(chat, news, now).await;

        let moved = quote.moved_beyond(self.alerts.price_change_threshold);
        let entry = self.desk.entry(symbol);

        let message = if moved || !news.is_empty() {
            match self.desk.analyze(symbol, Some(&quote), &news, language).await {
                Ok(analysis) if moved || analysis.importance_score >= min_importance => {
                    Some(format::news_alert(&entry, Some(&quote), &analysis, &news))
                }
                Ok(analysis) => {
                    debug!(score = analysis.importance_score, "below importance threshold");
                    self.remember(chat, &news, now).await;
                    None
                }
                Err(e) if moved => {
                    warn!(error = %e, "analysis failed; sending price alert");
                    Some(format::price_alert(&entry, &quote))
                }
                Err(e) => {
                    warn!(error = %e, "analysis failed");
                    // wait a full interval before asking the model again
                    self.store.mark_checked(chat, symbol, now).await;
                    return Outcome::Failed;
                }
            }
        } else {
            debug!("quiet");
            None
        };

        let outcome = match message {
            Some(text) => match self.chat.send(chat, &text).await {
                Ok(()) => {
                    self.remember(chat, &news, now).await;
                    info!(moved, articles = news.len(), "alert sent");
                    Outcome::Alerted
                }
                Err(e) => {
                    warn!(error = ?e, "alert delivery failed");
                    return Outcome::Failed;
                }
            },
            None => Outcome::Quiet,
        };

        self.store.mark_checked(chat, symbol, now).await;
        outcome
    }

    async fn remember(&self, chat: ChatId, news: &[NewsItem], now: DateTime<Utc>) {
        if self.alerts.dedup == DedupPolicy::PerItem {
            self.seen.lock().await.record(chat, news, now);
        }
    }

    async fn fresh_news(
        &self,
        chat: ChatId,
        news: Vec<NewsItem>,
        now: DateTime<Utc>,
    ) -> Vec<NewsItem> {
        match self.alerts.dedup {
            DedupPolicy::Off => news,
            DedupPolicy::PerItem => {
                let window = Duration::hours(i64::from(self.alerts.dedup_window_hours));
                self.seen.lock().await.fresh(chat, news, now, window)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn item(id: u64) -> NewsItem {
        NewsItem {
            id,
            headline: format!("headline {id}"),
            summary: String::new(),
            author: String::new(),
            source: "benzinga".into(),
            url: None,
            symbols: vec!["NVDA".into()],
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn seen_news_expires_after_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap();
        let window = Duration::hours(72);
        let mut seen = SeenNews::default();

        seen.record(1, &[item(10)], now);
        let fresh = seen.fresh(1, vec![item(10), item(11)], now, window);
        assert_eq!(fresh.iter().map(|n| n.id).collect::<Vec<_>>(), vec![11]);

        // other chats are unaffected
        assert_eq!(seen.fresh(2, vec![item(10)], now, window).len(), 1);

        let later = now + Duration::hours(73);
        assert_eq!(seen.fresh(1, vec![item(10)], later, window).len(), 1);
    }

    #[test]
    fn reports_add_up() {
        let mut total = PassReport {
            checked: 1,
            alerts: 1,
            failures: 0,
        };
        total += PassReport {
            checked: 2,
            alerts: 0,
            failures: 1,
        };
        assert_eq!(
            total,
            PassReport {
                checked: 3,
                alerts: 1,
                failures: 1
            }
        );
    }
}
