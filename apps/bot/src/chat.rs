use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serenity::all::{ChannelId, CreateMessage, Http};
use stock::ChatId;
use tracing::debug;

/// Discord rejects longer message bodies.
pub const MESSAGE_LIMIT: usize = 2000;

/// Outbound text to a chat.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, chat: ChatId, text: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct DiscordChat {
    http: Arc<Http>,
}

impl DiscordChat {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    /// Name of the bot account the token belongs to.
    pub async fn current_user(&self) -> Result<String> {
        let user = self
            .http
            .get_current_user()
            .await
            .context("discord current user lookup failed")?;
        Ok(user.name.clone())
    }
}

#[async_trait]
impl ChatSink for DiscordChat {
    async fn send(&self, chat: ChatId, text: &str) -> Result<()> {
        let channel = ChannelId::new(chat);
        for chunk in split_message(text, MESSAGE_LIMIT) {
            channel
                .send_message(&self.http, CreateMessage::new().content(chunk))
                .await
                .with_context(|| format!("send to channel {chat} failed"))?;
        }
        debug!(chat_id = chat, chars = text.chars().count(), "message sent");
        Ok(())
    }
}

/// Split text into chunks of at most `limit` characters, breaking on line
/// boundaries where possible.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            // a single line longer than the limit is cut hard
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                if piece.len() == limit {
                    chunks.push(piece.iter().collect());
                } else {
                    current = piece.iter().collect();
                    current_len = piece.len();
                }
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .map(|c| c.trim_end_matches('\n').to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
