use std::{collections::HashMap, sync::Arc};

use analyst::{
    Analyst, Answer, DeepDive, NewsAnalysis, prompt::QuestionContext, research,
};
use chrono::{DateTime, Duration, Utc};
use stock::{Catalog, Language, MarketData, NewsItem, Quote, WatchlistEntry, normalize_symbol};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::BotError;

/// Articles fed into a question or deep dive.
const CONTEXT_NEWS: usize = 5;
const CONTEXT_NEWS_HOURS: i64 = 48;

/// Shared access to market data and the analyst.
///
/// Remembers the latest news analysis per symbol so later questions about
/// the same stock can build on it.
pub struct Desk {
    market: Arc<dyn MarketData>,
    analyst: Arc<dyn Analyst>,
    catalog: Catalog,
    recent: Mutex<HashMap<String, NewsAnalysis>>,
}

impl Desk {
    pub fn new(market: Arc<dyn MarketData>, analyst: Arc<dyn Analyst>, catalog: Catalog) -> Self {
        Self {
            market,
            analyst,
            catalog,
            recent: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn entry(&self, symbol: &str) -> WatchlistEntry {
        self.catalog.entry(symbol)
    }

    pub async fn quote(&self, symbol: &str) -> Result<Quote, BotError> {
        self.market.quote(symbol).await.map_err(BotError::market)
    }

    pub async fn recent_news(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<NewsItem>, BotError> {
        self.market
            .news(symbol, since, limit)
            .await
            .map_err(BotError::market)
    }

    /// Score news for a symbol and remember the result.
    #[instrument(skip(self, quote, news), fields(articles = news.len()))]
    pub async fn analyze(
        &self,
        symbol: &str,
        quote: Option<&Quote>,
        news: &[NewsItem],
        language: Language,
    ) -> Result<NewsAnalysis, BotError> {
        let entry = self.entry(symbol);
        let analysis = research::analyze_news(self.analyst.as_ref(), &entry, quote, news, language)
            .await
            .map_err(BotError::llm)?;

        debug!(score = analysis.importance_score, "news analysed");
        self.recent
            .lock()
            .await
            .insert(entry.symbol, analysis.clone());
        Ok(analysis)
    }

    pub async fn last_analysis(&self, symbol: &str) -> Option<NewsAnalysis> {
        self.recent
            .lock()
            .await
            .get(&normalize_symbol(symbol))
            .cloned()
    }

    /// Answer a question, using whatever market context is available for
    /// `symbol`. Missing context only narrows the prompt.
    #[instrument(skip(self, question))]
    pub async fn answer(
        &self,
        question: &str,
        symbol: Option<&str>,
        language: Language,
    ) -> Result<Answer, BotError> {
        let Some(symbol) = symbol else {
            return research::answer_question(
                self.analyst.as_ref(),
                question,
                QuestionContext::default(),
                language,
            )
            .await
            .map_err(BotError::llm);
        };

        let entry = self.entry(symbol);
        let (quote, news) = self.context(&entry.symbol).await;
        let previous = self.last_analysis(&entry.symbol).await;

        let ctx = QuestionContext {
            entry: Some(&entry),
            quote: quote.as_ref(),
            news: &news,
            previous: previous.as_ref(),
        };

        research::answer_question(self.analyst.as_ref(), question, ctx, language)
            .await
            .map_err(BotError::llm)
    }

    #[instrument(skip(self))]
    pub async fn deep_dive(
        &self,
        symbol: &str,
        topic: &str,
        language: Language,
    ) -> Result<DeepDive, BotError> {
        let entry = self.entry(symbol);
        let (quote, news) = self.context(&entry.symbol).await;

        research::deep_dive(
            self.analyst.as_ref(),
            &entry,
            topic,
            quote.as_ref(),
            &news,
            language,
        )
        .await
        .map_err(BotError::llm)
    }

    async fn context(&self, symbol: &str) -> (Option<Quote>, Vec<NewsItem>) {
        let since = Utc::now() - Duration::hours(CONTEXT_NEWS_HOURS);
        let (quote, news) = tokio::join!(
            self.market.quote(symbol),
            self.market.news(symbol, since, CONTEXT_NEWS)
        );

        let quote = quote
            .inspect_err(|e| warn!(symbol, error = ?e, "quote unavailable for context"))
            .ok();
        let news = news
            .inspect_err(|e| warn!(symbol, error = ?e, "news unavailable for context"))
            .unwrap_or_default();
        (quote, news)
    }
}
