//! Text utilities: chunking long replies, safe truncation, and the
//! retry wrapper for chat transport operations.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

/// Splits a long message into parts that fit within the transport
/// limit, breaking at blank-line (paragraph) boundaries.
///
/// A paragraph longer than `max_length` falls back to single-line
/// splits, and a single oversized line is split by grapheme clusters so
/// multi-byte characters are never torn apart.
#[must_use]
pub fn split_message(message: &str, max_length: usize) -> Vec<String> {
    if message.is_empty() {
        return Vec::new();
    }
    if message.len() <= max_length {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    for paragraph in message.split("\n\n") {
        if paragraph.len() > max_length {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            parts.extend(split_oversized_paragraph(paragraph, max_length));
            continue;
        }
        let separator = if current.is_empty() { 0 } else { 2 };
        if current.len() + separator + paragraph.len() > max_length && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn split_oversized_paragraph(paragraph: &str, max_length: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for line in paragraph.lines() {
        if line.len() > max_length {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            parts.extend(split_graphemes(line, max_length));
            continue;
        }
        let separator = usize::from(!current.is_empty());
        if current.len() + separator + line.len() > max_length && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn split_graphemes(line: &str, max_length: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut chunk = String::new();
    for grapheme in line.graphemes(true) {
        if chunk.len() + grapheme.len() > max_length && !chunk.is_empty() {
            parts.push(std::mem::take(&mut chunk));
        }
        chunk.push_str(grapheme);
    }
    if !chunk.is_empty() {
        parts.push(chunk);
    }
    parts
}

/// Safely truncates a string to a maximum character length (not bytes).
#[must_use]
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Retries a chat transport operation with exponential backoff and
/// jitter. Used for outbound sends, which fail transiently often
/// enough that a one-shot send would drop replies.
///
/// # Errors
///
/// Returns the last error after all attempts fail.
pub async fn retry_chat_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        CHAT_API_INITIAL_BACKOFF_MS, CHAT_API_MAX_BACKOFF_MS, CHAT_API_MAX_RETRIES,
    };

    let strategy = ExponentialBackoff::from_millis(CHAT_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(CHAT_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(CHAT_API_MAX_RETRIES);

    Retry::spawn(strategy, operation).await.map_err(|e| {
        warn!(
            "chat operation failed after {} attempts: {}",
            CHAT_API_MAX_RETRIES, e
        );
        e
    })
}
