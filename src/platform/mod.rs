pub mod discord;

use async_trait::async_trait;
use thiserror::Error;

/// A message received from the chat platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform user ID of the author
    pub user_id: u64,
    /// Channel the message arrived in
    pub channel_id: u64,
    /// Server the message was posted in; `None` for direct messages
    pub guild_id: Option<u64>,
    /// The message text
    pub text: String,
}

/// Where a handler sends its single notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTo {
    /// Direct message to a user
    Direct(u64),
    /// Message in a server channel
    Channel(u64),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NicknameError {
    #[error("missing permissions")]
    MissingPermissions,
    #[error("{0}")]
    Api(String),
}

/// Platform capabilities the bot consumes.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Display name of a server the bot is a member of, `None` if unknown.
    async fn guild_name(&self, guild_id: u64) -> Option<String>;

    /// Change the bot's own nickname in `guild_id`.
    async fn edit_own_nickname(&self, guild_id: u64, nickname: &str) -> Result<(), NicknameError>;

    async fn send_direct_message(&self, user_id: u64, text: &str) -> anyhow::Result<()>;

    async fn send_channel_message(&self, channel_id: u64, text: &str) -> anyhow::Result<()>;

    async fn reply(&self, to: ReplyTo, text: &str) -> anyhow::Result<()> {
        match to {
            ReplyTo::Direct(user_id) => self.send_direct_message(user_id, text).await,
            ReplyTo::Channel(channel_id) => self.send_channel_message(channel_id, text).await,
        }
    }
}
