use stock::{Language, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES, parse_symbol};

use crate::error::BotError;

/// Every message the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Add { symbols: Vec<String> },
    Remove { symbols: Vec<String> },
    Watchlist,
    Interval(Option<u32>),
    Lang(Option<Language>),
    Stocks,
    Price { symbol: String },
    News { symbol: String },
    Ask { symbol: Option<String>, question: String },
    Deep { symbol: String, topic: String },
    Now,
}

impl Command {
    /// Decode a chat message. Text without a leading `/` is a question.
    pub fn parse(text: &str) -> Result<Command, BotError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(BotError::invalid("Empty message. Send /help for usage."));
        }

        let Some(body) = text.strip_prefix('/') else {
            return Ok(Command::Ask {
                symbol: None,
                question: text.to_string(),
            });
        };

        let (head, rest) = match body.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (body, ""),
        };
        // "/help@stock_bot" style addressing
        let name = head.split('@').next().unwrap_or(head).to_lowercase();

        match name.as_str() {
            "help" | "start" => Ok(Command::Help),
            "add" => Ok(Command::Add {
                symbols: symbol_list(rest, "Usage: /add <symbol>[,<symbol>...]")?,
            }),
            "remove" => Ok(Command::Remove {
                symbols: symbol_list(rest, "Usage: /remove <symbol>[,<symbol>...]")?,
            }),
            "watchlist" => Ok(Command::Watchlist),
            "interval" => parse_interval(rest).map(Command::Interval),
            "lang" => parse_language(rest).map(Command::Lang),
            "stocks" => Ok(Command::Stocks),
            "price" => Ok(Command::Price {
                symbol: single_symbol(rest, "Usage: /price <symbol>")?,
            }),
            "news" => Ok(Command::News {
                symbol: single_symbol(rest, "Usage: /news <symbol>")?,
            }),
            "ask" => {
                let (symbol, question) = symbol_and_text(rest, "Usage: /ask <symbol> <question>")?;
                Ok(Command::Ask {
                    symbol: Some(symbol),
                    question,
                })
            }
            "deep" => {
                let (symbol, topic) = symbol_and_text(rest, "Usage: /deep <symbol> <topic>")?;
                Ok(Command::Deep { symbol, topic })
            }
            "now" => Ok(Command::Now),
            _ => Err(BotError::invalid(format!(
                "Unknown command /{name}. Send /help for usage."
            ))),
        }
    }

    /// `/deep` with the symbol given as a separate argument.
    pub fn deep(symbol: &str, topic: &str) -> Result<Command, BotError> {
        let (symbol, topic) = symbol_with_text(symbol, topic, "Usage: /deep <symbol> <topic>")?;
        Ok(Command::Deep { symbol, topic })
    }

    /// `/ask` with the symbol given as a separate argument.
    pub fn ask_about(symbol: &str, question: &str) -> Result<Command, BotError> {
        let (symbol, question) =
            symbol_with_text(symbol, question, "Usage: /ask <symbol> <question>")?;
        Ok(Command::Ask {
            symbol: Some(symbol),
            question,
        })
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Add { .. } => "add",
            Command::Remove { .. } => "remove",
            Command::Watchlist => "watchlist",
            Command::Interval(_) => "interval",
            Command::Lang(_) => "lang",
            Command::Stocks => "stocks",
            Command::Price { .. } => "price",
            Command::News { .. } => "news",
            Command::Ask { .. } => "ask",
            Command::Deep { .. } => "deep",
            Command::Now => "now",
        }
    }
}

fn symbol_list(args: &str, usage: &str) -> Result<Vec<String>, BotError> {
    let raw: Vec<&str> = args
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    if raw.is_empty() {
        return Err(BotError::invalid(usage));
    }

    let mut symbols: Vec<String> = Vec::with_capacity(raw.len());
    for s in raw {
        let symbol = parse_symbol(s).map_err(|e| BotError::invalid(e.to_string()))?;
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    Ok(symbols)
}

fn single_symbol(args: &str, usage: &str) -> Result<String, BotError> {
    let mut parts = args.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(symbol), None) => parse_symbol(symbol).map_err(|e| BotError::invalid(e.to_string())),
        _ => Err(BotError::invalid(usage)),
    }
}

fn symbol_and_text(args: &str, usage: &str) -> Result<(String, String), BotError> {
    let Some((symbol, text)) = args.split_once(char::is_whitespace) else {
        return Err(BotError::invalid(usage));
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(BotError::invalid(usage));
    }
    let symbol = parse_symbol(symbol).map_err(|e| BotError::invalid(e.to_string()))?;
    Ok((symbol, text.to_string()))
}

fn symbol_with_text(symbol: &str, text: &str, usage: &str) -> Result<(String, String), BotError> {
    let symbol = single_symbol(symbol, usage)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(BotError::invalid(usage));
    }
    Ok((symbol, text.to_string()))
}

fn parse_interval(args: &str) -> Result<Option<u32>, BotError> {
    if args.is_empty() {
        return Ok(None);
    }

    let out_of_range = || {
        BotError::invalid(format!(
            "Interval must be a whole number of minutes between {MIN_INTERVAL_MINUTES} and {MAX_INTERVAL_MINUTES}."
        ))
    };
    let minutes: u32 = args.parse().map_err(|_| out_of_range())?;
    if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&minutes) {
        return Err(out_of_range());
    }
    Ok(Some(minutes))
}

fn parse_language(args: &str) -> Result<Option<Language>, BotError> {
    if args.is_empty() {
        return Ok(None);
    }
    args.parse()
        .map(Some)
        .map_err(|_| BotError::invalid(format!("Unsupported language `{args}`. Use zh or en.")))
}
