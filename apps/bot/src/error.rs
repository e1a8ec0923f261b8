use thiserror::Error;

/// Failure classes the bot distinguishes.
#[derive(Debug, Error)]
pub enum BotError {
    /// Missing or invalid configuration; fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Market data, LLM or chat API failure; reported to the user.
    #[error("{service} request failed: {message}")]
    Provider {
        service: &'static str,
        message: String,
    },

    /// Bad command syntax or value; answered with usage text.
    #[error("{0}")]
    InvalidArgument(String),

    /// Settings could not be loaded or written.
    #[error("settings persistence failed: {0}")]
    Persistence(String),
}

impl BotError {
    pub fn config(message: impl Into<String>) -> Self {
        BotError::Configuration(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        BotError::InvalidArgument(message.into())
    }

    pub fn market(err: anyhow::Error) -> Self {
        BotError::provider("market data", err)
    }

    pub fn llm(err: anyhow::Error) -> Self {
        BotError::provider("AI analysis", err)
    }

    pub fn chat(err: anyhow::Error) -> Self {
        BotError::provider("chat", err)
    }

    fn provider(service: &'static str, err: anyhow::Error) -> Self {
        // root cause is what the user can act on ("timed out", "401 Unauthorized")
        let message = err.root_cause().to_string();
        BotError::Provider { service, message }
    }

    pub fn persistence(err: anyhow::Error) -> Self {
        BotError::Persistence(format!("{err:#}"))
    }

    /// Text shown in the chat when a command fails.
    pub fn user_message(&self) -> String {
        match self {
            BotError::InvalidArgument(msg) => format!("❌ {msg}"),
            BotError::Provider { service, message } => {
                format!("⚠️ Could not reach {service}: {message}\nPlease try again later.")
            }
            BotError::Persistence(_) | BotError::Configuration(_) => {
                "⚠️ Internal error, please try again later.".to_string()
            }
        }
    }
}
