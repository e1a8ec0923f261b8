//! Chat replies. Plain text with Discord markdown.

use std::fmt::Write;

use analyst::{Answer, DeepDive, NewsAnalysis, Text};
use stock::{NewsItem, Quote, UserSettings, WatchlistEntry};

const ALERT_NEWS: usize = 3;

fn signed(value: f64) -> String {
    format!("{value:+.2}")
}

fn arrow(quote: &Quote) -> &'static str {
    match quote.change_percent() {
        Some(pct) if pct > 0.0 => "📈",
        Some(pct) if pct < 0.0 => "📉",
        _ => "➖",
    }
}

fn bullets(out: &mut String, title: &str, items: &[Text]) {
    let items: Vec<&str> = items
        .iter()
        .map(|t| t.0.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n**{title}**");
    for item in items {
        let _ = writeln!(out, "• {item}");
    }
}

fn section(out: &mut String, title: &str, body: &str) {
    let body = body.trim();
    if !body.is_empty() {
        let _ = writeln!(out, "\n**{title}**\n{body}");
    }
}

pub fn help(settings: &UserSettings) -> String {
    format!(
        "**Stock news bot**\n\
         /add <symbol>[,<symbol>...] - watch stocks\n\
         /remove <symbol>[,<symbol>...] - stop watching\n\
         /watchlist - your settings\n\
         /interval [minutes] - check interval\n\
         /lang [zh|en] - analysis language\n\
         /price <symbol> - latest quote\n\
         /news <symbol> - recent headlines\n\
         /stocks - quotes for your watchlist\n\
         /ask <symbol> <question> - ask about a stock\n\
         /deep <symbol> <topic> - deep dive on a topic\n\
         /now - news briefing for your watchlist\n\
         Any other text is answered as a question.\n\n{}",
        watchlist(settings)
    )
}

pub fn watchlist(settings: &UserSettings) -> String {
    let symbols = if settings.watchlist.is_empty() {
        "(empty)".to_string()
    } else {
        settings.watchlist.join(", ")
    };
    format!(
        "📋 Watchlist: {symbols}\n⏱️ Interval: {} min\n🌐 Language: {}",
        settings.interval_minutes,
        settings.language.display_name()
    )
}

pub fn quote(name: &str, quote: &Quote) -> String {
    let mut out = format!("{} **{}** ({})\n", arrow(quote), quote.symbol, name);
    let _ = write!(out, "Price: ${:.2}", quote.price);
    if let (Some(change), Some(pct)) = (quote.change(), quote.change_percent()) {
        let _ = write!(out, " ({} / {}%)", signed(change), signed(pct));
    }
    out.push('\n');

    if let (Some(low), Some(high)) = (quote.day_low, quote.day_high) {
        let _ = writeln!(out, "Day range: ${low:.2} - ${high:.2}");
    }
    if let Some(volume) = quote.volume {
        let _ = writeln!(out, "Volume: {volume}");
    }
    if let (Some(low), Some(high)) = (quote.year_low, quote.year_high) {
        let _ = writeln!(out, "52W range: ${low:.2} - ${high:.2}");
    }
    let _ = write!(out, "As of {}", quote.as_of.format("%Y-%m-%d %H:%M UTC"));
    out
}

/// One line per symbol for `/stocks`.
pub fn quote_line(quote: &Quote) -> String {
    match quote.change_percent() {
        Some(pct) => format!(
            "{} {}: ${:.2} ({}%)",
            arrow(quote),
            quote.symbol,
            quote.price,
            signed(pct)
        ),
        None => format!("➖ {}: ${:.2}", quote.symbol, quote.price),
    }
}

pub fn news_list(symbol: &str, name: &str, news: &[NewsItem]) -> String {
    if news.is_empty() {
        return format!("📰 No recent news for {symbol} ({name}).");
    }

    let mut out = format!("📰 **{symbol}** ({name}) recent news\n");
    for (i, item) in news.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. {}\n   {} · {}",
            i + 1,
            item.headline.trim(),
            item.source,
            item.created_at.format("%m-%d %H:%M")
        );
        if let Some(url) = &item.url {
            let _ = write!(out, "\n   <{url}>");
        }
        out.push('\n');
    }
    out
}

pub fn answer(symbol: Option<&str>, answer: &Answer) -> String {
    let mut out = match symbol {
        Some(symbol) => format!("💬 **{symbol}**\n"),
        None => "💬 ".to_string(),
    };
    out.push_str(answer.answer.trim());
    out.push('\n');

    section(&mut out, "Details", &answer.detailed_explanation);
    bullets(&mut out, "Key takeaways", &answer.key_takeaways);
    bullets(&mut out, "Risks", &answer.related_risks);
    section(&mut out, "Follow-up", &answer.suggested_follow_up);
    if !answer.confidence.trim().is_empty() {
        let _ = write!(out, "\nConfidence: {}", answer.confidence.trim());
    }
    out
}

pub fn deep_dive(symbol: &str, name: &str, dive: &DeepDive) -> String {
    let mut out = format!("🔍 **{symbol}** ({name}) - {}\n", dive.topic.trim());
    out.push_str(dive.overview.trim());
    out.push('\n');

    bullets(&mut out, "Key points", &dive.key_points);
    section(&mut out, "Bull case", &dive.bull_case);
    section(&mut out, "Bear case", &dive.bear_case);
    section(&mut out, "Timeline", &dive.timeline);
    bullets(&mut out, "Catalysts", &dive.catalysts);
    bullets(&mut out, "Metrics to watch", &dive.metrics_to_watch);
    section(&mut out, "What to do", &dive.investor_action);
    if !dive.confidence.trim().is_empty() {
        let _ = write!(out, "\nConfidence: {}", dive.confidence.trim());
    }
    out
}

pub fn news_alert(
    entry: &WatchlistEntry,
    quote: Option<&Quote>,
    analysis: &NewsAnalysis,
    news: &[NewsItem],
) -> String {
    let mut out = format!(
        "🔔 **{}** ({}) importance {}/10 · {}\n",
        entry.symbol,
        entry.name,
        analysis.importance_score,
        analysis.sentiment
    );
    if let Some(quote) = quote {
        let _ = writeln!(out, "{}", quote_line(quote));
    }
    out.push('\n');
    out.push_str(analysis.summary.trim());
    out.push('\n');

    bullets(&mut out, "Key points", &analysis.key_points);
    if let Some(impact) = &analysis.price_impact
        && !impact.direction.trim().is_empty()
    {
        let _ = write!(out, "\n**Price impact:** {}", impact.direction.trim());
        if !impact.magnitude.trim().is_empty() {
            let _ = write!(out, " ({})", impact.magnitude.trim());
        }
        out.push('\n');
    }
    if let Some(action) = analysis.action() {
        let _ = writeln!(out, "**Suggestion:** {action}");
    }

    let headlines: Vec<&NewsItem> = news.iter().take(ALERT_NEWS).collect();
    if !headlines.is_empty() {
        out.push_str("\n**Sources**\n");
        for item in headlines {
            match &item.url {
                Some(url) => {
                    let _ = writeln!(out, "• {} <{url}>", item.headline.trim());
                }
                None => {
                    let _ = writeln!(out, "• {}", item.headline.trim());
                }
            }
        }
    }
    out
}

pub fn price_alert(entry: &WatchlistEntry, quote: &Quote) -> String {
    format!(
        "🚨 **{}** ({}) moved sharply\n{}",
        entry.symbol,
        entry.name,
        quote_line(quote)
    )
}
