mod common;

use std::{
    path::Path,
    sync::{Arc, atomic::Ordering},
};

use bot::command::{Command, Dispatcher};
use bot::error::BotError;
use chrono::Duration;
use common::{FakeAnalyst, FakeMarket, article, desk, quote, store};
use stock::{FileBackend, Language, SettingsDefaults, SettingsStore};

const CHAT: u64 = 42;

async fn dispatcher(market: FakeMarket, analyst: FakeAnalyst) -> (Dispatcher, Arc<FakeAnalyst>) {
    let analyst = Arc::new(analyst);
    let dispatcher = Dispatcher::new(
        store(&[]).await,
        desk(Arc::new(market), Arc::clone(&analyst)),
        Duration::hours(24),
    );
    (dispatcher, analyst)
}

#[tokio::test]
async fn repeated_add_keeps_one_entry() {
    let (d, _) = dispatcher(FakeMarket::default(), FakeAnalyst::failing()).await;

    let first = d.respond(CHAT, "/add nvda").await;
    assert!(first.contains("Now watching: NVDA"));

    let again = d.respond(CHAT, "/add NVDA").await;
    assert!(again.contains("NVDA already in your watchlist"));
    d.respond(CHAT, "/add Nvda,tsla").await;

    let settings = d.store().get(CHAT).await.unwrap();
    assert_eq!(settings.watchlist, vec!["NVDA".to_string(), "TSLA".to_string()]);

    let shown = d.respond(CHAT, "/watchlist").await;
    assert_eq!(shown.matches("NVDA").count(), 1);
}

#[tokio::test]
async fn removing_absent_symbol_reports_not_found() {
    let (d, _) = dispatcher(FakeMarket::default(), FakeAnalyst::failing()).await;
    d.respond(CHAT, "/add AMD").await;

    let reply = d.respond(CHAT, "/remove TSLA").await;
    assert!(reply.contains("TSLA not found"));
    assert_eq!(d.store().get(CHAT).await.unwrap().watchlist, vec!["AMD".to_string()]);

    let reply = d.respond(CHAT, "/remove amd").await;
    assert!(reply.contains("Removed: AMD"));
    assert!(d.store().get(CHAT).await.unwrap().watchlist.is_empty());
}

#[tokio::test]
async fn interval_is_validated() {
    let (d, _) = dispatcher(FakeMarket::default(), FakeAnalyst::failing()).await;

    for bad in ["/interval -5", "/interval abc", "/interval 0"] {
        let reply = d.respond(CHAT, bad).await;
        assert!(reply.starts_with("❌"), "{bad} -> {reply}");
    }

    assert!(d.respond(CHAT, "/interval 15").await.contains("15 min"));
    assert!(d.respond(CHAT, "/watchlist").await.contains("Interval: 15 min"));
    assert!(d.respond(CHAT, "/interval").await.contains("15 min"));
}

#[tokio::test]
async fn language_is_validated() {
    let (d, _) = dispatcher(FakeMarket::default(), FakeAnalyst::failing()).await;

    assert!(d.respond(CHAT, "/lang xx").await.starts_with("❌"));

    d.respond(CHAT, "/lang zh").await;
    assert_eq!(d.store().get(CHAT).await.unwrap().language, Language::Zh);

    d.respond(CHAT, "/lang en").await;
    assert_eq!(d.store().get(CHAT).await.unwrap().language, Language::En);
}

#[tokio::test]
async fn market_failure_is_reported_to_the_user() {
    let market = FakeMarket::default().with_quote(quote("NVDA", 110.0, 100.0));
    market.down.store(true, Ordering::SeqCst);
    let (d, _) = dispatcher(market, FakeAnalyst::failing()).await;

    let reply = d.respond(CHAT, "/price NVDA").await;
    assert!(reply.contains("Could not reach market data"), "{reply}");
    assert!(reply.contains("connection refused"));

    let err = d
        .dispatch(CHAT, Command::Price { symbol: "NVDA".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::Provider { service: "market data", .. }));
}

#[tokio::test]
async fn price_and_news_are_formatted() {
    let market = FakeMarket::default()
        .with_quote(quote("NVDA", 110.0, 100.0))
        .with_news("NVDA", vec![article(1, "NVDA", "NVIDIA beats estimates")]);
    let (d, _) = dispatcher(market, FakeAnalyst::failing()).await;

    let price = d.respond(CHAT, "/price nvda").await;
    assert!(price.contains("NVIDIA Corporation"));
    assert!(price.contains("$110.00"));

    let news = d.respond(CHAT, "/news NVDA").await;
    assert!(news.contains("1. NVIDIA beats estimates"));

    let empty = d.respond(CHAT, "/news AMD").await;
    assert!(empty.contains("No recent news for AMD"));
}

#[tokio::test]
async fn stocks_shows_failures_inline() {
    let market = FakeMarket::default().with_quote(quote("NVDA", 90.0, 100.0));
    let (d, _) = dispatcher(market, FakeAnalyst::failing()).await;
    d.respond(CHAT, "/add NVDA,ZZZZ").await;

    let reply = d.respond(CHAT, "/stocks").await;
    assert!(reply.contains("NVDA: $90.00 (-10.00%)"));
    assert!(reply.contains("ZZZZ: unavailable"));
}

#[tokio::test]
async fn unknown_command_is_rejected() {
    let (d, analyst) = dispatcher(FakeMarket::default(), FakeAnalyst::failing()).await;

    let reply = d.respond(CHAT, "/foo").await;
    assert!(reply.contains("Unknown command /foo"));
    assert_eq!(analyst.calls(), 0);
}

#[tokio::test]
async fn free_text_reaches_the_model_with_context() {
    let market = FakeMarket::default().with_quote(quote("NVDA", 110.0, 100.0));
    let (d, analyst) =
        dispatcher(market, FakeAnalyst::replying(r#"{"answer": "Looks strong."}"#)).await;

    let reply = d.respond(CHAT, "how is nvidia doing today?").await;
    assert!(reply.contains("**NVDA**"));
    assert!(reply.contains("Looks strong."));

    let prompts = analyst.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("how is nvidia doing today?"));
    assert!(prompts[0].contains("110.00"));
}

#[tokio::test]
async fn llm_failure_is_reported_to_the_user() {
    let (d, _) = dispatcher(FakeMarket::default(), FakeAnalyst::failing()).await;

    let reply = d.respond(CHAT, "/deep NVDA competition").await;
    assert!(reply.contains("Could not reach AI analysis"), "{reply}");
}

#[tokio::test]
async fn now_briefs_and_marks_checked() {
    let market = FakeMarket::default()
        .with_quote(quote("NVDA", 101.0, 100.0))
        .with_news("NVDA", vec![article(7, "NVDA", "New GPU launched")]);
    let analysis = r#"{"importance_score": 3, "sentiment": "neutral", "summary": "Minor launch"}"#;
    let (d, _) = dispatcher(market, FakeAnalyst::replying(analysis)).await;
    d.respond(CHAT, "/add NVDA").await;

    let reply = d.respond(CHAT, "/now").await;
    assert!(reply.contains("Minor launch"));
    assert!(reply.contains("New GPU launched"));

    let settings = d.store().get(CHAT).await.unwrap();
    assert!(settings.last_checked.contains_key("NVDA"));
}

async fn file_dispatcher(path: &Path) -> Dispatcher {
    let defaults = SettingsDefaults {
        watchlist: vec!["NVDA".into()],
        interval_minutes: 60,
        language: Language::Zh,
    };
    let store = SettingsStore::open(Box::new(FileBackend::new(path)), defaults)
        .await
        .unwrap();
    Dispatcher::new(
        Arc::new(store),
        desk(Arc::new(FakeMarket::default()), Arc::new(FakeAnalyst::failing())),
        Duration::hours(24),
    )
}

#[tokio::test]
async fn settings_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("user_settings.json");

    let d = file_dispatcher(&path).await;
    d.respond(CHAT, "/add TSLA").await;
    d.respond(CHAT, "/interval 30").await;
    d.respond(CHAT, "/lang en").await;
    drop(d);

    let d = file_dispatcher(&path).await;
    let reply = d.respond(CHAT, "/watchlist").await;
    assert!(reply.contains("NVDA, TSLA"), "{reply}");
    assert!(reply.contains("30 min"));
    assert!(reply.contains("English"));
}
