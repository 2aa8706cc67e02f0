use anyhow::{Context, Result};
use serde::Deserialize;
use std::num::NonZeroU64;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct Config {
    pub discord: DiscordConfig,
    pub forecast: ForecastConfig,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_url")]
    pub url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Secrets and identity, only ever read from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
    pub authorized_user_id: NonZeroU64,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("authorized_user_id", &self.authorized_user_id)
            .finish()
    }
}

/// Optional on-disk tunables. Every section may be omitted.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    discord: Option<DiscordConfig>,
    #[serde(default)]
    forecast: Option<ForecastConfig>,
}

fn default_command_prefix() -> String {
    "$".to_string()
}

fn default_forecast_url() -> String {
    "https://projects.fivethirtyeight.com/2024-election-forecast/".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36"
        .to_string()
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            url: default_forecast_url(),
            user_agent: default_user_agent(),
        }
    }
}

impl Credentials {
    /// Read `TOKEN` and `AUTHORIZED_USER_ID` through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("TOKEN")
            .filter(|t| !t.trim().is_empty())
            .context("TOKEN environment variable is not set")?;

        let raw_id = lookup("AUTHORIZED_USER_ID")
            .context("AUTHORIZED_USER_ID environment variable is not set")?;
        let authorized_user_id = raw_id.trim().parse::<NonZeroU64>().with_context(|| {
            format!(
                "AUTHORIZED_USER_ID must be a non-zero integer user ID, got '{}'",
                raw_id
            )
        })?;

        Ok(Self {
            token,
            authorized_user_id,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl Config {
    /// Load tunables from `path` (or `config.toml` if it exists) and
    /// credentials from the process environment.
    ///
    /// An explicitly given path must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(p) => Some(
                std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {}", p.display()))?,
            ),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Some(std::fs::read_to_string(default).with_context(|| {
                        format!("Failed to read config file: {}", default.display())
                    })?)
                } else {
                    None
                }
            }
        };

        Self::from_parts(content.as_deref(), Credentials::from_env()?)
    }

    fn from_parts(content: Option<&str>, credentials: Credentials) -> Result<Self> {
        let file: FileConfig = match content {
            Some(c) => toml::from_str(c).context("Failed to parse config file")?,
            None => FileConfig::default(),
        };

        let discord = file.discord.unwrap_or_default();
        if discord.command_prefix.is_empty() {
            anyhow::bail!("discord.command_prefix must not be empty");
        }

        Ok(Config {
            discord,
            forecast: file.forecast.unwrap_or_default(),
            credentials,
        })
    }
}
