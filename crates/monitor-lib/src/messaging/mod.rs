//! Chat messaging collaborator
//!
//! The core only needs two things from the chat service: a way to send text
//! to a chat, and a way to receive the next batch of inbound messages. Both
//! sit behind traits so the Telegram client can be swapped for fakes.

mod telegram;

pub use telegram::{TelegramClient, DEFAULT_API_URL};

use crate::error::MessagingError;

pub use async_trait::async_trait;

/// A text message delivered to the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub update_id: i64,
    pub chat_id: i64,
    pub sender_id: Option<i64>,
    pub text: String,
}

/// Outbound side of the chat service
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), MessagingError>;
}

/// Inbound side of the chat service
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Wait for the next batch of messages (long-poll)
    ///
    /// Each message is returned at most once across calls.
    async fn poll(&self) -> Result<Vec<IncomingMessage>, MessagingError>;
}
