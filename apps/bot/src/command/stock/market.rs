use crate::{Context, Error};

use super::run;

#[poise::command(slash_command)]
pub async fn price(
    ctx: Context<'_>,
    #[description = "Ticker symbol (e.g., NVDA)"] symbol: String,
) -> Result<(), Error> {
    run(ctx, format!("/price {symbol}")).await
}

#[poise::command(slash_command)]
pub async fn news(
    ctx: Context<'_>,
    #[description = "Ticker symbol (e.g., NVDA)"] symbol: String,
) -> Result<(), Error> {
    run(ctx, format!("/news {symbol}")).await
}

/// Quotes for every symbol in this chat's watchlist.
#[poise::command(slash_command)]
pub async fn stocks(ctx: Context<'_>) -> Result<(), Error> {
    run(ctx, "/stocks".to_string()).await
}
