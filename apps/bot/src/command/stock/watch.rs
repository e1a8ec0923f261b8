use tracing::info;

use super::run;
use crate::{Context, Error};

#[poise::command(slash_command)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Ticker symbol(s), comma-separated (e.g., TSLA,MSFT)"] symbol: String,
) -> Result<(), Error> {
    info!(
        chat_id = ctx.channel_id().get(),
        user_id = ctx.author().id.get(),
        raw_input = %symbol,
        "add invoked"
    );
    run(ctx, format!("/add {symbol}")).await
}

#[poise::command(slash_command)]
pub async fn watchlist(ctx: Context<'_>) -> Result<(), Error> {
    run(ctx, "/watchlist".to_string()).await
}
