use ::serenity::all::{
    CreateActionRow, CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption,
};
use poise::serenity_prelude as serenity;
use tracing::{debug, info, warn};

use super::run;
use crate::{Context, Data, Error};

const SELECT_REMOVE_PREFIX: &str = "select_remove:";
const MENU_LIMIT: usize = 25;

/// Remove symbols; without an argument, pick them from a menu.
#[poise::command(slash_command)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Ticker symbol(s), comma-separated; leave empty to pick"] symbol: Option<
        String,
    >,
) -> Result<(), Error> {
    if let Some(symbol) = symbol {
        return run(ctx, format!("/remove {symbol}")).await;
    }

    ctx.defer().await?;

    let chat = ctx.channel_id().get();
    let user_id = ctx.author().id.get();
    let settings = ctx.data().dispatcher.store().get_or_create(chat).await;

    if settings.watchlist.is_empty() {
        info!(chat_id = chat, "remove: watchlist empty");
        ctx.say("📋 Your watchlist is empty.").await?;
        return Ok(());
    }

    let limit = settings.watchlist.len().min(MENU_LIMIT);
    let opts: Vec<CreateSelectMenuOption> = settings
        .watchlist
        .into_iter()
        .take(limit)
        .map(|sym| CreateSelectMenuOption::new(sym.clone(), sym))
        .collect();

    let menu = CreateSelectMenu::new(
        format!("{SELECT_REMOVE_PREFIX}{user_id}"),
        CreateSelectMenuKind::String { options: opts },
    )
    .placeholder("Choose symbols...")
    .min_values(1)
    .max_values(limit as u8);

    ctx.send(
        poise::CreateReply::default()
            .content("Select symbols to remove (you can pick multiple):")
            .components(vec![CreateActionRow::SelectMenu(menu)]),
    )
    .await?;

    debug!(chat_id = chat, user_id, options = limit, "remove: menu shown");
    Ok(())
}

/// Handles the selection made in the `/stock remove` menu.
pub async fn handle_component(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &serenity::ComponentInteraction,
) -> Result<(), Error> {
    let Some(owner) = interaction.data.custom_id.strip_prefix(SELECT_REMOVE_PREFIX) else {
        return Ok(());
    };
    let user_id = interaction.user.id.get();
    let chat = interaction.channel_id.get();

    if owner != user_id.to_string() {
        warn!(chat_id = chat, user_id, owner, "remove: selection by another user");
        interaction
            .create_response(
                ctx,
                serenity::CreateInteractionResponse::Message(
                    serenity::CreateInteractionResponseMessage::new()
                        .content("You can't edit someone else's selection.")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    }

    let values = match &interaction.data.kind {
        serenity::ComponentInteractionDataKind::StringSelect { values } => values.clone(),
        _ => Vec::new(),
    };
    if values.is_empty() {
        return Ok(());
    }

    let reply = data
        .dispatcher
        .respond(chat, &format!("/remove {}", values.join(",")))
        .await;
    info!(chat_id = chat, user_id, symbols = ?values, "remove: selection applied");

    interaction
        .create_response(
            ctx,
            serenity::CreateInteractionResponse::UpdateMessage(
                serenity::CreateInteractionResponseMessage::new()
                    .content(reply)
                    .components(vec![]),
            ),
        )
        .await?;
    Ok(())
}
