use anyhow::Result;
use stock::{Language, NewsItem, Quote, WatchlistEntry};

use crate::{
    client::Analyst,
    prompt::{self, QuestionContext},
    report::{Answer, DeepDive, NewsAnalysis},
};

/// Score recent news (and the price move, if any) for one stock.
pub async fn analyze_news(
    analyst: &dyn Analyst,
    entry: &WatchlistEntry,
    quote: Option<&Quote>,
    news: &[NewsItem],
    language: Language,
) -> Result<NewsAnalysis> {
    if news.is_empty() && quote.is_none() {
        return Ok(NewsAnalysis::quiet());
    }

    let reply = analyst
        .complete(&prompt::news_analysis(entry, quote, news, language))
        .await?;
    Ok(NewsAnalysis::from_reply(&reply))
}

pub async fn answer_question(
    analyst: &dyn Analyst,
    question: &str,
    ctx: QuestionContext<'_>,
    language: Language,
) -> Result<Answer> {
    let reply = analyst
        .complete(&prompt::question(question, ctx, language))
        .await?;
    Ok(Answer::from_reply(&reply))
}

pub async fn deep_dive(
    analyst: &dyn Analyst,
    entry: &WatchlistEntry,
    topic: &str,
    quote: Option<&Quote>,
    news: &[NewsItem],
    language: Language,
) -> Result<DeepDive> {
    let reply = analyst
        .complete(&prompt::deep_dive(entry, topic, quote, news, language))
        .await?;
    Ok(DeepDive::from_reply(topic, &reply))
}

/// True when the model answers the connectivity probe.
pub async fn probe(analyst: &dyn Analyst) -> Result<bool> {
    let reply = analyst.complete(prompt::CONNECTIVITY_PROBE).await?;
    Ok(reply.to_uppercase().contains("OK"))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct Scripted {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Analyst for Scripted {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn scripted(reply: &str) -> Scripted {
        Scripted {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn nothing_to_analyze_skips_the_model() {
        let analyst = scripted("{}");
        let entry = WatchlistEntry::bare("NVDA");
        let a = analyze_news(&analyst, &entry, None, &[], Language::En)
            .await
            .unwrap();

        assert_eq!(a, NewsAnalysis::quiet());
        assert!(analyst.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn probe_accepts_ok_in_any_case() {
        assert!(probe(&scripted("ok.")).await.unwrap());
        assert!(!probe(&scripted("nope")).await.unwrap());
    }

    #[tokio::test]
    async fn deep_dive_reads_reply() {
        let analyst = scripted(r#"{"overview": "Strong moat", "bull_case": "AI demand"}"#);
        let entry = WatchlistEntry::bare("NVDA");
        let dive = deep_dive(&analyst, &entry, "competition", None, &[], Language::En)
            .await
            .unwrap();

        assert_eq!(dive.topic, "competition");
        assert_eq!(dive.overview, "Strong moat");
        assert_eq!(dive.bull_case, "AI demand");
    }
}
