//! Telegram bridge: Bot API client, bot command handling, and update polling.

pub mod client;
pub mod commands;
pub mod poller;

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::Result;

/// Longest text the Bot API accepts in one message, in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Split `text` into messages of at most `limit` UTF-16 code units.
///
/// Breaks fall after a newline where possible; a single line longer than
/// `limit` is cut between characters. Concatenating the pieces gives back
/// `text`.
#[must_use]
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len: usize = line.chars().map(char::len_utf16).sum();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len <= limit {
            current.push_str(line);
            current_len += line_len;
            continue;
        }
        for ch in line.chars() {
            let width = ch.len_utf16();
            if current_len + width > limit && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(ch);
            current_len += width;
        }
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Outbound chat message delivery.
///
/// Implementations own their transport timeout; retries belong to the
/// job queue, not to the messenger.
pub trait Messenger: Send + Sync {
    /// Deliver `text` to `chat_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Provider`](crate::AppError::Provider) if the
    /// provider rejects the message or cannot be reached.
    fn send_message(
        &self,
        chat_id: &str,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Messenger used when no bot token is configured: drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMessenger;

impl Messenger for DisabledMessenger {
    fn send_message(
        &self,
        chat_id: &str,
        _text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let chat_id = chat_id.to_owned();
        Box::pin(async move {
            warn!(chat_id, "telegram bot token not configured; message dropped");
            Ok(())
        })
    }
}
