use std::num::NonZeroU64;

use tracing::{debug, error, info, warn};

use crate::auth::Operator;
use crate::config::Config;
use crate::forecast::{ForecastClient, ForecastSource, DEMOCRATIC_CANDIDATE, REPUBLICAN_CANDIDATE};
use crate::nickname::{format_nickname, random_split};
use crate::platform::{ChatPlatform, IncomingMessage, ReplyTo};
use crate::updater::apply_nickname;

/// What an operator direct message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmInstruction {
    Update(u64),
    InvalidId,
    Usage,
    Ignore,
}

/// Stand-in for integer ids outside the snowflake range (zero, negative, too large).
pub const UNRESOLVABLE_GUILD: u64 = 0;

/// In-channel commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Random,
}

pub fn parse_dm_instruction(text: &str) -> DmInstruction {
    let content = text.trim();
    let is_update = content
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("update"));
    if !is_update {
        return DmInstruction::Ignore;
    }

    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() != 2 {
        return DmInstruction::Usage;
    }

    let token = parts[1];
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return DmInstruction::InvalidId;
    }

    // Any integer is accepted; ids that cannot be a snowflake simply never resolve.
    match token.parse::<NonZeroU64>() {
        Ok(id) => DmInstruction::Update(id.get()),
        Err(_) => DmInstruction::Update(UNRESOLVABLE_GUILD),
    }
}

pub fn parse_command(text: &str, prefix: &str) -> Option<Command> {
    let rest = text.strip_prefix(prefix)?;
    match rest.split(char::is_whitespace).next()? {
        "random" => Some(Command::Random),
        _ => None,
    }
}

/// Process-wide session state, built once at startup.
pub struct AppState {
    operator: Operator,
    command_prefix: String,
    forecast: Box<dyn ForecastSource>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_forecast(
            Operator::new(config.credentials.authorized_user_id),
            config.discord.command_prefix.clone(),
            Box::new(ForecastClient::new(config.forecast.clone())),
        )
    }

    pub fn with_forecast(
        operator: Operator,
        command_prefix: String,
        forecast: Box<dyn ForecastSource>,
    ) -> Self {
        Self {
            operator,
            command_prefix,
            forecast,
        }
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Route one inbound message. Every handled path ends with at most one reply.
    pub async fn handle_message(&self, platform: &dyn ChatPlatform, msg: &IncomingMessage) {
        match msg.guild_id {
            None => self.handle_direct_message(platform, msg).await,
            Some(guild_id) => self.handle_guild_message(platform, msg, guild_id).await,
        }
    }

    async fn handle_direct_message(&self, platform: &dyn ChatPlatform, msg: &IncomingMessage) {
        // Unauthorized direct messages are dropped without a reply.
        if !self.operator.is_authorized(msg.user_id) {
            debug!("Ignoring direct message from user {}", msg.user_id);
            return;
        }

        let reply = match parse_dm_instruction(&msg.text) {
            DmInstruction::Ignore => return,
            DmInstruction::Update(guild_id) => {
                info!("Update requested for guild {} by {}", guild_id, msg.user_id);
                self.update_from_forecast(platform, msg.user_id, guild_id)
                    .await;
                return;
            }
            DmInstruction::InvalidId => {
                "Invalid guild ID. Please provide a valid guild (server) ID."
            }
            DmInstruction::Usage => "Please provide a guild ID. Usage: 'update <guild_id>'",
        };

        if let Err(e) = platform.send_direct_message(msg.user_id, reply).await {
            error!("Failed to send direct message to {}: {:#}", msg.user_id, e);
        }
    }

    async fn handle_guild_message(
        &self,
        platform: &dyn ChatPlatform,
        msg: &IncomingMessage,
        guild_id: u64,
    ) {
        let Some(command) = parse_command(&msg.text, &self.command_prefix) else {
            return;
        };

        let reply_to = ReplyTo::Channel(msg.channel_id);

        if !self.operator.is_authorized(msg.user_id) {
            warn!(
                "Rejected {:?} command from unauthorized user {}",
                command, msg.user_id
            );
            if let Err(e) = platform
                .reply(reply_to, "You are not authorized to use this command.")
                .await
            {
                error!("Failed to send rejection: {:#}", e);
            }
            return;
        }

        match command {
            Command::Random => {
                let (dem, rep) = random_split(&mut rand::rng());
                let nickname = format_nickname(dem, rep);
                info!("Random nickname '{}' for guild {}", nickname, guild_id);
                apply_nickname(platform, guild_id, &nickname, reply_to).await;
            }
        }
    }

    async fn update_from_forecast(&self, platform: &dyn ChatPlatform, user_id: u64, guild_id: u64) {
        let snapshot = match self.forecast.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Error fetching data: {:#}", e);
                if let Err(e) = platform
                    .send_direct_message(user_id, "Failed to fetch election data.")
                    .await
                {
                    error!("Failed to send direct message to {}: {:#}", user_id, e);
                }
                return;
            }
        };

        let nickname = format_nickname(
            snapshot.percentage(DEMOCRATIC_CANDIDATE),
            snapshot.percentage(REPUBLICAN_CANDIDATE),
        );
        apply_nickname(platform, guild_id, &nickname, ReplyTo::Direct(user_id)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::forecast::{parse_snapshot, Snapshot};
    use crate::updater::tests::RecordingPlatform;

    const OPERATOR: u64 = 1000;
    const STRANGER: u64 = 2000;
    const GUILD: u64 = 123456789012345678;

    struct StubForecast {
        html: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ForecastSource for StubForecast {
        async fn fetch(&self) -> anyhow::Result<Snapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.html {
                Some(html) => parse_snapshot(html, "https://example.test/"),
                None => anyhow::bail!("connection refused"),
            }
        }
    }

    struct Harness {
        state: AppState,
        calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new(html: Option<String>) -> Self {
            let calls = Arc::new(AtomicUsize::new(0));
            let state = AppState::with_forecast(
                Operator::new(NonZeroU64::new(OPERATOR).unwrap()),
                "$".to_string(),
                Box::new(StubForecast {
                    html,
                    calls: Arc::clone(&calls),
                }),
            );
            Self { state, calls }
        }

        fn with_odds(trump: &str, harris: &str) -> Self {
            Self::new(Some(format!(
                r#"<div id="odds-text">
<div class="rep"><span class="odds">{}</span></div>
<div class="dem"><span class="odds">{}</span></div>
</div>"#,
                trump, harris
            )))
        }

        fn fetches(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn dm(user_id: u64, text: &str) -> IncomingMessage {
        IncomingMessage {
            user_id,
            channel_id: 1,
            guild_id: None,
            text: text.to_string(),
        }
    }

    fn in_guild(user_id: u64, text: &str) -> IncomingMessage {
        IncomingMessage {
            user_id,
            channel_id: 77,
            guild_id: Some(GUILD),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_parse_dm_instruction() {
        assert_eq!(
            parse_dm_instruction("update 123456789012345678"),
            DmInstruction::Update(123456789012345678)
        );
        assert_eq!(parse_dm_instruction("  UPDATE 42  "), DmInstruction::Update(42));
        assert_eq!(parse_dm_instruction("update abc"), DmInstruction::InvalidId);
        assert_eq!(parse_dm_instruction("update 1a"), DmInstruction::InvalidId);
        assert_eq!(parse_dm_instruction("update -"), DmInstruction::InvalidId);
        assert_eq!(parse_dm_instruction("update +7"), DmInstruction::Update(7));
        assert_eq!(
            parse_dm_instruction("update 0"),
            DmInstruction::Update(UNRESOLVABLE_GUILD)
        );
        assert_eq!(
            parse_dm_instruction("update -1"),
            DmInstruction::Update(UNRESOLVABLE_GUILD)
        );
        assert_eq!(
            parse_dm_instruction("update 99999999999999999999999"),
            DmInstruction::Update(UNRESOLVABLE_GUILD)
        );
        assert_eq!(parse_dm_instruction("update"), DmInstruction::Usage);
        assert_eq!(parse_dm_instruction("update 1 2"), DmInstruction::Usage);
        assert_eq!(parse_dm_instruction("hello"), DmInstruction::Ignore);
        assert_eq!(parse_dm_instruction("upd"), DmInstruction::Ignore);
        assert_eq!(parse_dm_instruction(""), DmInstruction::Ignore);
        assert_eq!(parse_dm_instruction("ééé update"), DmInstruction::Ignore);
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("$random", "$"), Some(Command::Random));
        assert_eq!(parse_command("$random extra ", "$"), Some(Command::Random));
        assert_eq!(parse_command("$random\n", "$"), Some(Command::Random));
        assert_eq!(parse_command("!random", "!"), Some(Command::Random));
        assert_eq!(parse_command("random", "$"), None);
        assert_eq!(parse_command("$rand", "$"), None);
        assert_eq!(parse_command("$", "$"), None);
    }

    #[test]
    fn test_parse_command_requires_prefix_at_start() {
        assert_eq!(parse_command(" $random", "$"), None);
        assert_eq!(parse_command("$ random", "$"), None);
        assert_eq!(parse_command("$randomize", "$"), None);
    }

    #[tokio::test]
    async fn test_random_command_updates_current_guild() {
        let h = Harness::new(None);
        let platform = RecordingPlatform::with_guild(GUILD, "Politics");

        h.state
            .handle_message(&platform, &in_guild(OPERATOR, "$random"))
            .await;

        let edits = platform.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0, GUILD);

        let nick = &edits[0].1;
        let (dem, rep) = nick
            .strip_prefix("🔵")
            .and_then(|s| s.strip_suffix('%'))
            .and_then(|s| s.split_once("%/🔴"))
            .unwrap();
        let dem: u8 = dem.parse().unwrap();
        let rep: u8 = rep.parse().unwrap();
        assert_eq!(dem as u16 + rep as u16, 100);

        assert_eq!(
            platform.replies(),
            vec![(
                ReplyTo::Channel(77),
                format!("Updated bot nickname to '{}'", nick)
            )]
        );
        assert_eq!(h.fetches(), 0);
    }

    #[tokio::test]
    async fn test_random_command_rejects_stranger() {
        let h = Harness::new(None);
        let platform = RecordingPlatform::with_guild(GUILD, "Politics");

        h.state
            .handle_message(&platform, &in_guild(STRANGER, "$random"))
            .await;

        assert!(platform.edits().is_empty());
        assert_eq!(
            platform.replies(),
            vec![(
                ReplyTo::Channel(77),
                "You are not authorized to use this command.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_guild_chatter_ignored() {
        let h = Harness::new(None);
        let platform = RecordingPlatform::with_guild(GUILD, "Politics");

        h.state
            .handle_message(&platform, &in_guild(OPERATOR, "update 5"))
            .await;

        assert!(platform.edits().is_empty());
        assert!(platform.replies().is_empty());
    }

    #[tokio::test]
    async fn test_stranger_dm_silently_dropped() {
        let h = Harness::with_odds("45%", "55%");
        let platform = RecordingPlatform::with_guild(GUILD, "Politics");

        h.state
            .handle_message(&platform, &dm(STRANGER, "update 123456789012345678"))
            .await;

        assert!(platform.edits().is_empty());
        assert!(platform.replies().is_empty());
        assert_eq!(h.fetches(), 0);
    }

    #[tokio::test]
    async fn test_operator_dm_other_text_ignored() {
        let h = Harness::with_odds("45%", "55%");
        let platform = RecordingPlatform::with_guild(GUILD, "Politics");

        h.state
            .handle_message(&platform, &dm(OPERATOR, "$random"))
            .await;

        assert!(platform.edits().is_empty());
        assert!(platform.replies().is_empty());
    }

    #[tokio::test]
    async fn test_update_end_to_end() {
        let h = Harness::with_odds("45%", "55%");
        let platform = RecordingPlatform::with_guild(GUILD, "Politics");

        h.state
            .handle_message(&platform, &dm(OPERATOR, "update 123456789012345678"))
            .await;

        assert_eq!(h.fetches(), 1);
        assert_eq!(platform.edits(), vec![(GUILD, "🔵55%/🔴45%".to_string())]);
        assert_eq!(
            platform.replies(),
            vec![(
                ReplyTo::Direct(OPERATOR),
                "Updated bot nickname to '🔵55%/🔴45%' in guild 'Politics'".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_update_with_omitted_candidate_uses_zero() {
        let h = Harness::with_odds("garbage", "less than 1%");
        let platform = RecordingPlatform::with_guild(GUILD, "Politics");

        h.state
            .handle_message(&platform, &dm(OPERATOR, "update 123456789012345678"))
            .await;

        assert_eq!(platform.edits(), vec![(GUILD, "🔵0%/🔴0%".to_string())]);
    }

    #[tokio::test]
    async fn test_update_unknown_guild() {
        let h = Harness::with_odds("45%", "55%");
        let platform = RecordingPlatform::default();

        h.state
            .handle_message(&platform, &dm(OPERATOR, "update 123456789012345678"))
            .await;

        assert!(platform.edits().is_empty());
        assert_eq!(
            platform.replies(),
            vec![(
                ReplyTo::Direct(OPERATOR),
                "Could not find the guild with the provided ID or I'm not a member of it."
                    .to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_update_out_of_range_ids_fetch_then_miss() {
        for text in ["update 0", "update -1", "update 99999999999999999999999"] {
            let h = Harness::with_odds("45%", "55%");
            let platform = RecordingPlatform::with_guild(GUILD, "Politics");

            h.state.handle_message(&platform, &dm(OPERATOR, text)).await;

            assert_eq!(h.fetches(), 1, "{}", text);
            assert!(platform.edits().is_empty());
            assert_eq!(
                platform.replies(),
                vec![(
                    ReplyTo::Direct(OPERATOR),
                    "Could not find the guild with the provided ID or I'm not a member of it."
                        .to_string()
                )]
            );
        }
    }

    #[tokio::test]
    async fn test_update_fetch_failure() {
        let h = Harness::new(None);
        let platform = RecordingPlatform::with_guild(GUILD, "Politics");

        h.state
            .handle_message(&platform, &dm(OPERATOR, "update 123456789012345678"))
            .await;

        assert_eq!(h.fetches(), 1);
        assert!(platform.edits().is_empty());
        assert_eq!(
            platform.replies(),
            vec![(
                ReplyTo::Direct(OPERATOR),
                "Failed to fetch election data.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_update_invalid_id() {
        let h = Harness::with_odds("45%", "55%");
        let platform = RecordingPlatform::with_guild(GUILD, "Politics");

        h.state
            .handle_message(&platform, &dm(OPERATOR, "update abc"))
            .await;

        assert_eq!(h.fetches(), 0);
        assert_eq!(
            platform.replies(),
            vec![(
                ReplyTo::Direct(OPERATOR),
                "Invalid guild ID. Please provide a valid guild (server) ID.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_update_usage() {
        for text in ["update", "update 1 2"] {
            let h = Harness::with_odds("45%", "55%");
            let platform = RecordingPlatform::with_guild(GUILD, "Politics");

            h.state.handle_message(&platform, &dm(OPERATOR, text)).await;

            assert_eq!(h.fetches(), 0);
            assert!(platform.edits().is_empty());
            assert_eq!(
                platform.replies(),
                vec![(
                    ReplyTo::Direct(OPERATOR),
                    "Please provide a guild ID. Usage: 'update <guild_id>'".to_string()
                )]
            );
        }
    }
}
