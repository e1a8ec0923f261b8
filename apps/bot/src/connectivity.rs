use std::future::Future;

use analyst::{Analyst, research};
use stock::MarketData;
use tracing::{info, warn};

const PROBE_SYMBOL: &str = "SPY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCheck {
    pub service: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl ServiceCheck {
    fn passed(service: &'static str, detail: String) -> Self {
        info!(service, %detail, "check passed");
        Self {
            service,
            ok: true,
            detail,
        }
    }

    fn failed(service: &'static str, detail: String) -> Self {
        warn!(service, %detail, "check failed");
        Self {
            service,
            ok: false,
            detail,
        }
    }

    pub fn line(&self) -> String {
        let mark = if self.ok { "✅" } else { "❌" };
        format!("{mark} {}: {}", self.service, self.detail)
    }
}

/// Probe the chat API, the LLM and the market data API.
///
/// `chat_user` resolves to the bot account name.
pub async fn check_all<F>(
    chat_user: F,
    analyst: &dyn Analyst,
    market: &dyn MarketData,
) -> Vec<ServiceCheck>
where
    F: Future<Output = anyhow::Result<String>>,
{
    let chat = match chat_user.await {
        Ok(name) => ServiceCheck::passed("chat", format!("logged in as {name}")),
        Err(e) => ServiceCheck::failed("chat", format!("{e:#}")),
    };

    let llm = match research::probe(analyst).await {
        Ok(true) => ServiceCheck::passed("llm", "model answered".to_string()),
        Ok(false) => ServiceCheck::failed("llm", "unexpected reply to probe".to_string()),
        Err(e) => ServiceCheck::failed("llm", format!("{e:#}")),
    };

    let market = match market.quote(PROBE_SYMBOL).await {
        Ok(q) => ServiceCheck::passed("market data", format!("{} ${:.2}", q.symbol, q.price)),
        Err(e) => ServiceCheck::failed("market data", format!("{e:#}")),
    };

    vec![chat, llm, market]
}

pub fn all_passed(checks: &[ServiceCheck]) -> bool {
    checks.iter().all(|c| c.ok)
}
