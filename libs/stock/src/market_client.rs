use std::time::Duration as StdDuration;

use anyhow::{Error, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue},
};
use serde::Deserialize;
use tracing::debug;

use crate::settings::normalize_symbol;

const NEWS_PATH: &str = "/v1beta1/news";
const DAILY_TIMEFRAME: &str = "1Day";
const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(15);

/// Price and news source for a ticker.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote>;

    /// Articles published after `since`, newest first.
    async fn news(&self, symbol: &str, since: DateTime<Utc>, limit: usize)
    -> Result<Vec<NewsItem>>;
}

#[derive(Clone)]
pub struct MarketClient {
    client: Client,
    base_api: String,
    feed: String,
}

impl MarketClient {
    pub fn new(base_api: String, key_id: String, secret: String, feed: String) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("APCA-API-KEY-ID", HeaderValue::from_str(&key_id)?);
        headers.insert("APCA-API-SECRET-KEY", HeaderValue::from_str(&secret)?);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_api: base_api.trim_end_matches('/').to_string(),
            feed,
        })
    }

    pub async fn fetch_daily_bars(
        &self,
        symbol: &str,
        duration: Duration,
        limit: usize,
    ) -> Result<Vec<Bar>, Error> {
        let end = Utc::now();
        let start = end - duration;

        let url = format!("{}/v2/stocks/{}/bars", self.base_api, symbol);

        let res: BarsResponse = self
            .client
            .get(url)
            .query(&[
                ("feed", self.feed.as_str()),
                ("timeframe", DAILY_TIMEFRAME),
                ("start", &start.to_rfc3339()),
                ("end", &end.to_rfc3339()),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(res.bars)
    }

    pub async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot, Error> {
        let url = format!("{}/v2/stocks/{}/snapshot", self.base_api, symbol);

        let snapshot: Snapshot = self
            .client
            .get(url)
            .query(&[("feed", self.feed.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(snapshot)
    }
}

#[async_trait]
impl MarketData for MarketClient {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let symbol = normalize_symbol(symbol);
        let snapshot = self.fetch_snapshot(&symbol).await?;

        // 52-week range is best effort; the snapshot alone is a usable quote.
        let year = match self
            .fetch_daily_bars(&symbol, Duration::days(365), 365)
            .await
        {
            Ok(bars) => bars,
            Err(e) => {
                debug!(symbol = %symbol, error = ?e, "yearly bars unavailable");
                Vec::new()
            }
        };

        Quote::from_snapshot(&symbol, &snapshot, &year)
    }

    async fn news(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<NewsItem>> {
        let url = format!("{}{}", self.base_api, NEWS_PATH);

        let res: NewsResponse = self
            .client
            .get(url)
            .query(&[
                ("symbols", normalize_symbol(symbol).as_str()),
                ("start", &since.to_rfc3339()),
                ("limit", &limit.to_string()),
                ("sort", "desc"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(res.news)
    }
}

//
// Match Alpaca API JSON
// https://docs.alpaca.markets/reference/stockbars
//
#[derive(Debug, Deserialize, Clone)]
pub struct BarsResponse {
    #[serde(default)]
    pub bars: Vec<Bar>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Bar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "o")]
    pub open: f64,

    #[serde(rename = "h")]
    pub high: f64,

    #[serde(rename = "l")]
    pub low: f64,

    #[serde(rename = "c")]
    pub close: f64,

    #[serde(rename = "v")]
    pub volume: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Trade {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "p")]
    pub price: f64,
}

// https://docs.alpaca.markets/reference/stocksnapshotsingle
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub latest_trade: Option<Trade>,
    pub daily_bar: Option<Bar>,
    pub prev_daily_bar: Option<Bar>,
}

// https://docs.alpaca.markets/reference/news-3
#[derive(Debug, Deserialize, Clone)]
pub struct NewsResponse {
    #[serde(default)]
    pub news: Vec<NewsItem>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NewsItem {
    pub id: u64,
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub symbols: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time price view of a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub volume: Option<i64>,
    pub year_high: Option<f64>,
    pub year_low: Option<f64>,
    pub as_of: DateTime<Utc>,
}

impl Quote {
    pub fn from_snapshot(symbol: &str, snapshot: &Snapshot, year: &[Bar]) -> Result<Self> {
        let daily = snapshot.daily_bar.as_ref();

        let (price, as_of) = match (&snapshot.latest_trade, daily) {
            (Some(trade), _) => (trade.price, trade.timestamp),
            (None, Some(bar)) => (bar.close, bar.timestamp),
            (None, None) => bail!("no trades reported for {symbol}"),
        };

        let year_high = year.iter().map(|b| b.high).reduce(f64::max);
        let year_low = year.iter().map(|b| b.low).reduce(f64::min);

        Ok(Self {
            symbol: symbol.to_string(),
            price,
            previous_close: snapshot.prev_daily_bar.as_ref().map(|b| b.close),
            open: daily.map(|b| b.open),
            day_high: daily.map(|b| b.high),
            day_low: daily.map(|b| b.low),
            volume: daily.map(|b| b.volume),
            year_high,
            year_low,
            as_of,
        })
    }

    pub fn change(&self) -> Option<f64> {
        self.previous_close.map(|prev| self.price - prev)
    }

    pub fn change_percent(&self) -> Option<f64> {
        match self.previous_close {
            Some(prev) if prev != 0.0 => Some((self.price - prev) / prev * 100.0),
            _ => None,
        }
    }

    /// True when the absolute daily move reaches `threshold` percent.
    pub fn moved_beyond(&self, threshold: f64) -> bool {
        self.change_percent()
            .is_some_and(|pct| pct.abs() >= threshold)
    }
}
