use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use analyst::LlmClient;
use anyhow::{Context as _, Result};
use bot::{
    Data,
    chat::{ChatSink, DiscordChat, MESSAGE_LIMIT, split_message},
    command::{Dispatcher, stock::stock_command},
    config::{Config, StorageBackend},
    connectivity,
    desk::Desk,
    error::BotError,
    logging,
    monitor::Monitor,
    scheduler::{PeriodicTask, SystemClock, digest_job},
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use poise::{Framework, FrameworkOptions};
use serenity::all::{ActivityData, ClientBuilder, FullEvent, GatewayIntents, Http, Interaction};
use stock::{
    Catalog, FileBackend, MarketClient, RedisBackend, SettingsBackend, SettingsStore, parse_symbol,
};
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "stock-noti", version, about = "Stock news notifications over Discord")]
struct Cli {
    /// Path to the YAML config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Run the chat bot with periodic monitoring (default)
    Bot {
        /// Post the help text to the target channel on startup
        #[arg(long)]
        send_help: bool,
    },
    /// Check connectivity to the chat, LLM and market data APIs
    Test {
        #[arg(long)]
        quiet: bool,
    },
    /// Push one digest to the target channel and exit
    Once {
        #[arg(long)]
        symbol: Option<String>,
        /// Minimum importance score (0-10) for an alert
        #[arg(long)]
        min_score: Option<u8>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    let result = match cli.mode.unwrap_or(Mode::Bot { send_help: false }) {
        Mode::Bot { send_help } => run_bot(config, send_help).await,
        Mode::Test { quiet } => run_test(config, quiet).await,
        Mode::Once { symbol, min_score } => run_once(config, symbol, min_score).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = ?e, "fatal");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

struct Services {
    store: Arc<SettingsStore>,
    desk: Arc<Desk>,
}

fn market_client(config: &Config) -> Result<Arc<MarketClient>> {
    let market = &config.market_data;
    let client = MarketClient::new(
        market.base_url.clone(),
        market.key_id.clone(),
        market.secret.clone(),
        market.feed.clone(),
    )
    .context("init market client failed")?;
    Ok(Arc::new(client))
}

fn llm_client(config: &Config) -> Result<Arc<LlmClient>> {
    let client = LlmClient::new(config.ai.llm_config()).context("init llm client failed")?;
    info!(provider = %client.provider(), model = client.model(), "llm client ready");
    Ok(Arc::new(client))
}

async fn services(config: &Config) -> Result<Services> {
    let backend: Box<dyn SettingsBackend> = match config.storage.backend {
        StorageBackend::File => Box::new(FileBackend::new(&config.storage.path)),
        StorageBackend::Redis => {
            let url = config.storage.redis_url.as_deref().unwrap_or_default();
            let redis = RedisBackend::new(url, config.storage.key_prefix.clone())
                .await
                .map_err(BotError::persistence)?;
            Box::new(redis)
        }
    };

    let store = SettingsStore::open(backend, config.settings_defaults())
        .await
        .map_err(BotError::persistence)?;

    let desk = Desk::new(
        market_client(config)?,
        llm_client(config)?,
        Catalog::new(config.stocks.clone()),
    );

    Ok(Services {
        store: Arc::new(store),
        desk: Arc::new(desk),
    })
}

async fn run_bot(config: Config, send_help: bool) -> Result<ExitCode> {
    let Services { store, desk } = services(&config).await?;
    let target = config.target_chat();

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&desk),
        chrono::Duration::hours(i64::from(config.alerts.news_timeframe_hours)),
    ));

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
    let commands = vec![stock_command()];

    let framework = Framework::builder()
        .options(FrameworkOptions {
            event_handler: |serenity_ctx, event, _framework_ctx, data: &Data| {
                Box::pin(async move {
                    match event {
                        FullEvent::Message { new_message, .. } => {
                            let msg = new_message;
                            let listening = msg.guild_id.is_none()
                                || msg.channel_id.get() == data.listen_channel;
                            if msg.author.bot || !listening || msg.content.trim().is_empty() {
                                return Ok(());
                            }

                            let chat = msg.channel_id.get();
                            let reply = data.dispatcher.respond(chat, &msg.content).await;
                            for chunk in split_message(&reply, MESSAGE_LIMIT) {
                                if let Err(e) = msg.channel_id.say(serenity_ctx, chunk).await {
                                    warn!(chat_id = chat, error = ?e, "reply failed");
                                    break;
                                }
                            }
                        }
                        FullEvent::InteractionCreate {
                            interaction: Interaction::Component(component),
                            ..
                        } => {
                            if let Err(e) =
                                bot::command::stock::handle_component(serenity_ctx, data, component)
                                    .await
                            {
                                warn!(error = ?e, "component handling failed");
                            }
                        }
                        _ => {}
                    }
                    Ok(())
                })
            },
            commands,
            ..Default::default()
        })
        .setup({
            let dispatcher = Arc::clone(&dispatcher);

            move |ctx, ready, framework| {
                let dispatcher = Arc::clone(&dispatcher);

                Box::pin(async move {
                    info!(
                        user = %ready.user.name,
                        user_id = %ready.user.id,
                        "connected successfully"
                    );

                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                    ctx.set_activity(Some(ActivityData::watching("the markets")));

                    if send_help {
                        let text = dispatcher.respond(target, "/help").await;
                        DiscordChat::new(ctx.http.clone())
                            .send(target, &text)
                            .await?;
                    }

                    Ok(Data {
                        dispatcher,
                        listen_channel: target,
                    })
                })
            }
        })
        .build();

    let mut client = ClientBuilder::new(&config.discord.token, intents)
        .framework(framework)
        .await
        .context("creating discord client failed")?;

    let chat: Arc<dyn ChatSink> = Arc::new(DiscordChat::new(client.http.clone()));
    let monitor = Arc::new(
        Monitor::new(
            Arc::clone(&store),
            Arc::clone(&desk),
            chat,
            config.alerts.clone(),
        )
        .with_target(target),
    );

    let task = PeriodicTask::new(
        Duration::from_secs(config.schedule.tick_seconds),
        Arc::new(SystemClock),
    );
    let pass_monitor = Arc::clone(&monitor);
    let periodic = tokio::spawn(async move {
        task.run(move |now| {
            let monitor = Arc::clone(&pass_monitor);
            async move {
                monitor.run_pass(now).await;
            }
        })
        .await
    });

    let mut sched = JobScheduler::new()
        .await
        .context("failed to create job scheduler")?;
    if config.schedule.enabled {
        sched
            .add(digest_job(&config.schedule, Arc::clone(&monitor), target)?)
            .await?;
        sched.start().await?;
    }

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(why) = client.start().await {
            error!("Client error: {why:?}");
        }
    });

    shutdown_signal().await;
    info!("shutting down");

    periodic.abort();
    if let Err(e) = sched.shutdown().await {
        warn!(error = ?e, "scheduler shutdown failed");
    }
    shard_manager.shutdown_all().await;

    if let Err(e) = store.flush().await {
        error!(error = ?e, "final settings flush failed");
        return Ok(ExitCode::FAILURE);
    }

    info!("Shutdown complete.");
    Ok(ExitCode::SUCCESS)
}

async fn run_test(config: Config, quiet: bool) -> Result<ExitCode> {
    let chat = DiscordChat::new(Arc::new(Http::new(&config.discord.token)));
    let market = market_client(&config)?;
    let analyst = llm_client(&config)?;

    let checks =
        connectivity::check_all(chat.current_user(), analyst.as_ref(), market.as_ref()).await;

    if !quiet {
        for check in &checks {
            println!("{}", check.line());
        }
    }

    if connectivity::all_passed(&checks) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn run_once(
    config: Config,
    symbol: Option<String>,
    min_score: Option<u8>,
) -> Result<ExitCode> {
    if min_score.is_some_and(|s| s > 10) {
        return Err(BotError::invalid("--min-score must be within 0..=10").into());
    }
    let symbols = match symbol {
        Some(raw) => vec![parse_symbol(&raw)?],
        None => config.stocks.iter().map(|s| s.symbol.clone()).collect(),
    };

    let Services { store, desk } = services(&config).await?;
    let chat: Arc<dyn ChatSink> = Arc::new(DiscordChat::new(Arc::new(Http::new(
        &config.discord.token,
    ))));
    let monitor = Monitor::new(Arc::clone(&store), desk, chat, config.alerts.clone());

    let report = monitor
        .run_digest(config.target_chat(), Some(symbols), Utc::now(), min_score)
        .await;
    println!(
        "checked {} symbol(s), sent {} alert(s), {} failure(s)",
        report.checked, report.alerts, report.failures
    );

    store.flush().await.map_err(BotError::persistence)?;

    if report.failures > 0 && report.checked == 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv()  => {},
                }
            }
            _ => {
                warn!("unix signal handlers unavailable, waiting for ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
