//! Common messaging utilities for the Telegram side.
//!
//! Replies are monospace blocks; anything longer than the transport
//! limit is split at blank-line boundaries before sending, and every
//! outbound operation retries transient failures with backoff. Also
//! hosts the production [`RelaySink`] that posts web submissions into
//! the configured chat.

use crate::config::MESSAGE_LIMIT;
use crate::relay::{RelaySink, SinkError};
use crate::utils;
use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, ParseMode};

/// Sends `text` as one or more monospace (`<pre>`) messages, chunked
/// at blank-line boundaries to stay within the transport limit.
///
/// # Errors
///
/// Returns an error when a chunk cannot be sent after all retries.
pub async fn send_code_block(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    for part in utils::split_message(text, MESSAGE_LIMIT) {
        let escaped = html_escape::encode_text(&part);
        send_text_resilient(bot, chat_id, format!("<pre>{escaped}</pre>")).await?;
    }
    Ok(())
}

/// Sends an HTML-formatted message with automatic retry on transient
/// transport failures.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_text_resilient(bot: &Bot, chat_id: ChatId, text: String) -> Result<Message> {
    utils::retry_chat_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| anyhow::anyhow!("chat send error: {e}"))
    })
    .await
}

/// Sends a document with automatic retry on transient transport
/// failures.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_document_resilient(
    bot: &Bot,
    chat_id: ChatId,
    file: InputFile,
) -> Result<Message> {
    utils::retry_chat_operation(|| async {
        bot.send_document(chat_id, file.clone())
            .await
            .map_err(|e| anyhow::anyhow!("chat document error: {e}"))
    })
    .await
}

/// Relay sink that forwards queued web submissions into the configured
/// destination chat. With no destination configured every delivery
/// fails with a resolution error and the relay drops the message.
pub struct TelegramSink {
    bot: Bot,
    destination: Option<ChatId>,
}

impl TelegramSink {
    #[must_use]
    pub fn new(bot: Bot, chat_id: Option<i64>) -> Self {
        Self {
            bot,
            destination: chat_id.map(ChatId),
        }
    }
}

#[async_trait]
impl RelaySink for TelegramSink {
    async fn deliver(&self, text: &str) -> Result<(), SinkError> {
        let chat = self.destination.ok_or(SinkError::Resolution)?;
        send_code_block(&self.bot, chat, text)
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }
}
