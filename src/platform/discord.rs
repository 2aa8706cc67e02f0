use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::all::{
    ChannelId, Client, Context, CreateMessage, EventHandler, GatewayIntents, GuildId, Message,
    Ready, UserId,
};
use tracing::{debug, info};

use crate::bot::AppState;
use crate::platform::{ChatPlatform, IncomingMessage, NicknameError};

/// `ChatPlatform` backed by the serenity context of the current event.
pub struct DiscordPlatform {
    ctx: Context,
}

impl DiscordPlatform {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

fn guild(id: u64) -> Option<GuildId> {
    NonZeroU64::new(id).map(GuildId::from)
}

/// Map a serenity failure onto the nickname error kinds users see.
fn classify_error(err: serenity::Error) -> NicknameError {
    let status = match &err {
        serenity::Error::Http(http_err) => http_err.status_code().map(|s| s.as_u16()),
        _ => None,
    };
    classify_status(status, err.to_string())
}

/// HTTP 403 means the bot lacks Change Nickname; anything else keeps its text.
fn classify_status(status: Option<u16>, detail: String) -> NicknameError {
    match status {
        Some(403) => NicknameError::MissingPermissions,
        _ => NicknameError::Api(detail),
    }
}

/// Guild messages from other bots never reach the command router.
fn should_route(author_is_self: bool, author_is_bot: bool, in_guild: bool) -> bool {
    !author_is_self && !(author_is_bot && in_guild)
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn guild_name(&self, guild_id: u64) -> Option<String> {
        guild(guild_id)?.name(&self.ctx.cache)
    }

    async fn edit_own_nickname(&self, guild_id: u64, nickname: &str) -> Result<(), NicknameError> {
        let guild_id = guild(guild_id)
            .ok_or_else(|| NicknameError::Api(format!("invalid guild ID {}", guild_id)))?;
        guild_id
            .edit_nickname(&self.ctx.http, Some(nickname))
            .await
            .map_err(classify_error)
    }

    async fn send_direct_message(&self, user_id: u64, text: &str) -> Result<()> {
        let user = NonZeroU64::new(user_id)
            .map(UserId::from)
            .with_context(|| format!("Invalid user ID {}", user_id))?;
        user.direct_message(&self.ctx, CreateMessage::new().content(text))
            .await
            .with_context(|| format!("Failed to send direct message to {}", user_id))?;
        Ok(())
    }

    async fn send_channel_message(&self, channel_id: u64, text: &str) -> Result<()> {
        let channel = NonZeroU64::new(channel_id)
            .map(ChannelId::from)
            .with_context(|| format!("Invalid channel ID {}", channel_id))?;
        channel
            .say(&self.ctx.http, text)
            .await
            .with_context(|| format!("Failed to send message to channel {}", channel_id))?;
        Ok(())
    }
}

struct Handler {
    state: Arc<AppState>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Logged in as {} (ID: {})", ready.user.name, ready.user.id);
        info!("Member of {} guild(s)", ready.guilds.len());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let own_id = ctx.cache.current_user().id;
        if !should_route(msg.author.id == own_id, msg.author.bot, msg.guild_id.is_some()) {
            return;
        }

        debug!(
            "Discord message from {} ({}) in {:?}: {}",
            msg.author.name, msg.author.id, msg.guild_id, msg.content
        );

        let incoming = IncomingMessage {
            user_id: msg.author.id.get(),
            channel_id: msg.channel_id.get(),
            guild_id: msg.guild_id.map(|g| g.get()),
            text: msg.content.clone(),
        };

        let platform = DiscordPlatform::new(ctx);
        self.state.handle_message(&platform, &incoming).await;
    }
}

/// Run the Discord bot platform
pub async fn run(state: Arc<AppState>, token: &str) -> Result<()> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    info!("Starting Discord platform...");

    let mut client = Client::builder(token, intents)
        .event_handler(Handler { state })
        .await
        .context("Failed to create Discord client")?;

    client
        .start()
        .await
        .context("Discord client stopped with an error")?;

    Ok(())
}
