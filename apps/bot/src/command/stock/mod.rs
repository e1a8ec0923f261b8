mod delete;
mod market;
mod research;
mod settings;
mod watch;

use crate::{
    Context, Error,
    chat::{MESSAGE_LIMIT, split_message},
    command::Command,
    error::BotError,
};
pub use delete::handle_component;
use delete::remove;
use market::{news, price, stocks};
use research::{ask, deep, now};
use settings::{help, interval, lang};
use watch::{add, watchlist};

#[poise::command(
    slash_command,
    rename = "stock",
    subcommands(
        "add", "remove", "watchlist", "interval", "lang", "price", "news", "stocks", "ask",
        "deep", "now", "help"
    )
)]
pub async fn stock_command(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Run the equivalent text command for the invoking channel and post the reply.
async fn run(ctx: Context<'_>, text: String) -> Result<(), Error> {
    run_command(ctx, Command::parse(&text)).await
}

async fn run_command(ctx: Context<'_>, parsed: Result<Command, BotError>) -> Result<(), Error> {
    ctx.defer().await?;

    let chat = ctx.channel_id().get();
    let reply = ctx.data().dispatcher.respond_to(chat, parsed).await;

    for chunk in split_message(&reply, MESSAGE_LIMIT) {
        ctx.say(chunk).await?;
    }
    Ok(())
}
