use crate::{Context, Error, command::Command};

use super::{run, run_command};

#[poise::command(slash_command)]
pub async fn ask(
    ctx: Context<'_>,
    #[description = "Your question"] question: String,
    #[description = "Ticker symbol to focus on"] symbol: Option<String>,
) -> Result<(), Error> {
    // a leading slash would be read as a command
    let question = question.trim().trim_start_matches('/').to_string();
    match symbol {
        Some(symbol) => run_command(ctx, Command::ask_about(&symbol, &question)).await,
        None => run(ctx, question).await,
    }
}

#[poise::command(slash_command)]
pub async fn deep(
    ctx: Context<'_>,
    #[description = "Ticker symbol (e.g., NVDA)"] symbol: String,
    #[description = "Topic to dig into (e.g., competition, margins)"] topic: String,
) -> Result<(), Error> {
    run_command(ctx, Command::deep(&symbol, &topic)).await
}

/// News briefing for the whole watchlist right now.
#[poise::command(slash_command)]
pub async fn now(ctx: Context<'_>) -> Result<(), Error> {
    run(ctx, "/now".to_string()).await
}
