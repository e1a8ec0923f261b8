//! Prompt builders. Every prompt asks for a single JSON object so the
//! reply can be read back into the types in [`crate::report`].

use std::fmt::Write;

use stock::{Language, NewsItem, Quote, WatchlistEntry};

use crate::report::NewsAnalysis;

const NEWS_IN_ANALYSIS: usize = 6;
const NEWS_IN_CONTEXT: usize = 3;
const SUMMARY_CHARS: usize = 500;
const CONTEXT_SUMMARY_CHARS: usize = 200;

pub const CONNECTIVITY_PROBE: &str = "Respond with: OK";

fn language_rule(language: Language) -> &'static str {
    match language {
        Language::Zh => "Write every text value in Simplified Chinese; keep JSON keys in English.",
        Language::En => "Write every text value in English.",
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push('…');
        out
    }
}

fn opt(value: Option<f64>, digits: usize) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.digits$}"))
}

fn quote_block(quote: &Quote) -> String {
    format!(
        "Current Price: ${:.2}\nChange: {} ({}%)\nVolume: {}\nDay Range: {} - {}\n52W High: {}\n52W Low: {}\n",
        quote.price,
        opt(quote.change(), 2),
        opt(quote.change_percent(), 2),
        quote
            .volume
            .map_or_else(|| "N/A".to_string(), |v| v.to_string()),
        opt(quote.day_low, 2),
        opt(quote.day_high, 2),
        opt(quote.year_high, 2),
        opt(quote.year_low, 2),
    )
}

/// Scored analysis of recent news for a watched stock.
pub fn news_analysis(
    entry: &WatchlistEntry,
    quote: Option<&Quote>,
    news: &[NewsItem],
    language: Language,
) -> String {
    let mut stock_info = format!("Stock: {} ({})\n", entry.name, entry.symbol);
    if let Some(quote) = quote {
        stock_info.push_str(&quote_block(quote));
    }

    let mut news_text = String::new();
    for (i, item) in news.iter().take(NEWS_IN_ANALYSIS).enumerate() {
        let _ = writeln!(news_text, "\n{}", "=".repeat(50));
        let _ = writeln!(news_text, "NEWS {}:", i + 1);
        let _ = writeln!(news_text, "Title: {}", item.headline);
        if !item.summary.is_empty() {
            let _ = writeln!(news_text, "Content: {}", clip(&item.summary, SUMMARY_CHARS));
        }
        let _ = writeln!(news_text, "Source: {}", item.source);
        let _ = writeln!(news_text, "Published: {}", item.created_at.to_rfc3339());
    }
    if news_text.is_empty() {
        news_text.push_str("(no articles in the window; judge the price action alone)\n");
    }

    let keywords = if entry.keywords.is_empty() {
        "N/A".to_string()
    } else {
        entry.keywords.join(", ")
    };

    format!(
        r#"You are an expert financial analyst. Assess how the following news affects {symbol}.

{stock_info}
RECENT NEWS:
{news_text}
RELEVANT KEYWORDS: {keywords}

Reply with a JSON object:
{{
  "importance_score": <0-10 integer>,
  "sentiment": "<bullish|bearish|neutral>",
  "summary": "<3-4 sentences on what happened and why it matters>",
  "key_points": ["<point>", "<point>", "<point>"],
  "price_impact": {{"direction": "<positive|negative|neutral|volatile>", "magnitude": "<high|medium|low>", "reasoning": "<why>"}},
  "recommendation": {{"action": "<buy|hold|sell|watch>", "confidence": "<high|medium|low>", "reasoning": "<why>"}},
  "catalysts": ["<upcoming event>"]
}}

Scoring guide:
- 9-10: major event (M&A, blockbuster earnings, regulatory approval, major lawsuit)
- 7-8: important (rating change with target change, large contract, guidance update)
- 5-6: moderate (sector or peer news, minor announcements)
- 3-4: low (routine news, general commentary)
- 0-2: not relevant

{language}
Respond ONLY with valid JSON."#,
        symbol = entry.symbol,
        language = language_rule(language),
    )
}

/// Context available when answering a user question.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuestionContext<'a> {
    pub entry: Option<&'a WatchlistEntry>,
    pub quote: Option<&'a Quote>,
    pub news: &'a [NewsItem],
    pub previous: Option<&'a NewsAnalysis>,
}

pub fn question(question: &str, ctx: QuestionContext<'_>, language: Language) -> String {
    let subject = match ctx.entry {
        Some(entry) => format!("A user is asking about {} ({}).", entry.symbol, entry.name),
        None => "A user is asking a general market question.".to_string(),
    };

    let mut context = String::new();
    if let Some(quote) = ctx.quote {
        context.push_str("\nMarket Data:\n");
        context.push_str(&quote_block(quote));
    }
    if let Some(prev) = ctx.previous {
        let _ = write!(
            context,
            "\nPrevious Analysis:\n- Importance: {}/10\n- Sentiment: {}\n- Summary: {}\n",
            prev.importance_score,
            prev.sentiment,
            prev.summary
        );
        if let Some(action) = prev.action() {
            let _ = writeln!(context, "- Recommendation: {action}");
        }
    }
    if !ctx.news.is_empty() {
        context.push_str("\nRelevant News:\n");
        for (i, item) in ctx.news.iter().take(NEWS_IN_CONTEXT).enumerate() {
            let _ = writeln!(context, "{}. {}", i + 1, item.headline);
            if !item.summary.is_empty() {
                let _ = writeln!(context, "   {}", clip(&item.summary, CONTEXT_SUMMARY_CHARS));
            }
        }
    }

    format!(
        r#"You are a helpful financial analyst assistant. {subject}
{context}
User Question: {question}

Reply with a JSON object:
{{
  "answer": "<direct answer, 2-4 sentences>",
  "detailed_explanation": "<more detail if needed>",
  "key_takeaways": ["<takeaway>", "<takeaway>"],
  "related_risks": ["<risk>", "<risk>"],
  "suggested_follow_up": "<a question the user might ask next>",
  "confidence": "<high|medium|low>"
}}

If you lack the information to answer, say so and name what would help.
{language}
Respond ONLY with valid JSON."#,
        language = language_rule(language),
    )
}

pub fn deep_dive(
    entry: &WatchlistEntry,
    topic: &str,
    quote: Option<&Quote>,
    news: &[NewsItem],
    language: Language,
) -> String {
    let mut context = String::new();
    if let Some(quote) = quote {
        context.push_str("Current Stock Data:\n");
        context.push_str(&quote_block(quote));
    }
    if !news.is_empty() {
        context.push_str("\nRecent News for Context:\n");
        for item in news.iter().take(NEWS_IN_CONTEXT) {
            let _ = writeln!(context, "- {}", item.headline);
        }
    }

    format!(
        r#"You are an expert financial analyst. Provide a deep dive on "{topic}" for {symbol} ({name}).

{context}
Reply with a JSON object:
{{
  "topic": "{topic}",
  "overview": "<2-3 sentence overview>",
  "key_points": [{{"point": "<point>", "explanation": "<why it matters>"}}],
  "bull_case": "<upside scenario>",
  "bear_case": "<downside scenario>",
  "timeline": "<when this may play out>",
  "catalysts": ["<event>"],
  "metrics_to_watch": ["<metric>"],
  "investor_action": "<what an investor should do>",
  "confidence": "<high|medium|low>"
}}

Be thorough, balanced and actionable.
{language}
Respond ONLY with valid JSON."#,
        symbol = entry.symbol,
        name = entry.name,
        language = language_rule(language),
    )
}
