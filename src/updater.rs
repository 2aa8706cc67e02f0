use tracing::{error, info, warn};

use crate::platform::{ChatPlatform, NicknameError, ReplyTo};

/// Apply `nickname` in `guild_id` and send exactly one notification to
/// `reply_to` describing the outcome.
///
/// Direct-message requesters get the server name in every reply; channel
/// replies are phrased relative to the current server.
pub async fn apply_nickname(
    platform: &dyn ChatPlatform,
    guild_id: u64,
    nickname: &str,
    reply_to: ReplyTo,
) {
    let direct = matches!(reply_to, ReplyTo::Direct(_));

    let message = match platform.guild_name(guild_id).await {
        None => {
            warn!("Guild {} not found in bot membership", guild_id);
            if direct {
                "Could not find the guild with the provided ID or I'm not a member of it."
                    .to_string()
            } else {
                "Could not find the guild.".to_string()
            }
        }
        Some(guild_name) => match platform.edit_own_nickname(guild_id, nickname).await {
            Ok(()) => {
                info!(
                    "Updated nickname to '{}' in guild '{}' ({})",
                    nickname, guild_name, guild_id
                );
                if direct {
                    format!(
                        "Updated bot nickname to '{}' in guild '{}'",
                        nickname, guild_name
                    )
                } else {
                    format!("Updated bot nickname to '{}'", nickname)
                }
            }
            Err(NicknameError::MissingPermissions) => {
                warn!("Missing permission to change nickname in guild {}", guild_id);
                if direct {
                    format!(
                        "Failed to update nickname in guild '{}'. Missing permissions.",
                        guild_name
                    )
                } else {
                    "I don't have permission to change my nickname in this server.".to_string()
                }
            }
            Err(NicknameError::Api(detail)) => {
                warn!("Failed to update nickname in guild {}: {}", guild_id, detail);
                if direct {
                    format!(
                        "Failed to update nickname in guild '{}'. Error: {}",
                        guild_name, detail
                    )
                } else {
                    format!("Failed to update nickname. Error: {}", detail)
                }
            }
        },
    };

    if let Err(e) = platform.reply(reply_to, &message).await {
        error!("Failed to deliver notification to {:?}: {:#}", reply_to, e);
    }
}
