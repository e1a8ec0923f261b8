use crate::{Context, Error};

use super::run;

/// Show or change how often your watchlist is checked.
#[poise::command(slash_command)]
pub async fn interval(
    ctx: Context<'_>,
    #[description = "Minutes between checks (1-1440)"]
    #[min = 1]
    #[max = 1440]
    minutes: Option<u32>,
) -> Result<(), Error> {
    let text = match minutes {
        Some(minutes) => format!("/interval {minutes}"),
        None => "/interval".to_string(),
    };
    run(ctx, text).await
}

/// Show or change the analysis language.
#[poise::command(slash_command)]
pub async fn lang(
    ctx: Context<'_>,
    #[description = "zh or en"] code: Option<String>,
) -> Result<(), Error> {
    let text = match code {
        Some(code) => format!("/lang {code}"),
        None => "/lang".to_string(),
    };
    run(ctx, text).await
}

#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    run(ctx, "/help".to_string()).await
}
