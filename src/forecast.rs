use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::header::USER_AGENT;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ForecastConfig;

pub const REPUBLICAN_CANDIDATE: &str = "Trump";
pub const DEMOCRATIC_CANDIDATE: &str = "Harris";

const TOTAL_SIMULATIONS: u32 = 100;

/// One fetched-and-parsed forecast. Never cached or persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Local>,
    pub candidates: BTreeMap<String, u8>,
    pub total_simulations: u32,
    pub no_winner_chance: u8,
    pub source_url: String,
}

impl Snapshot {
    /// Win chance for `candidate`, 0 when it was omitted from the page.
    pub fn percentage(&self, candidate: &str) -> u8 {
        self.candidates.get(candidate).copied().unwrap_or(0)
    }
}

/// Anything that can produce a fresh forecast snapshot.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot>;
}

/// Scrapes the public forecast page over HTTP.
pub struct ForecastClient {
    client: reqwest::Client,
    config: ForecastConfig,
}

impl ForecastClient {
    pub fn new(config: ForecastConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    #[cfg(test)]
    fn with_client(config: ForecastConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ForecastSource for ForecastClient {
    async fn fetch(&self) -> Result<Snapshot> {
        debug!("Fetching forecast page: {}", self.config.url);

        let response = self
            .client
            .get(&self.config.url)
            .header(USER_AGENT, &self.config.user_agent)
            .send()
            .await
            .context("Failed to send request to forecast page")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Forecast page returned HTTP {}", status);
        }

        let body = response
            .text()
            .await
            .context("Failed to read forecast page body")?;

        // Parsing a full page is CPU-bound; keep it off the event loop.
        let url = self.config.url.clone();
        let snapshot = tokio::task::spawn_blocking(move || parse_snapshot(&body, &url))
            .await
            .context("Forecast parser task failed")??;

        match serde_json::to_string(&snapshot) {
            Ok(json) => debug!("Fetched data at {}: {}", snapshot.timestamp, json),
            Err(e) => debug!("Fetched data at {} (unserializable: {})", snapshot.timestamp, e),
        }

        Ok(snapshot)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid selector '{}': {:?}", css, e))
}

/// Text of the `span.odds` inside `container > {party}`.
fn party_odds_text(container: ElementRef<'_>, party: &str) -> Result<String> {
    let party_sel = selector(&format!("div.{}", party))?;
    let odds_sel = selector("span.odds")?;

    let party_div = container
        .select(&party_sel)
        .next()
        .with_context(|| format!("Could not find '{}' odds block", party))?;
    let odds = party_div
        .select(&odds_sel)
        .next()
        .with_context(|| format!("Could not find odds value in '{}' block", party))?;

    Ok(odds.text().collect::<String>())
}

/// Parse the forecast page into a snapshot.
///
/// A missing container or party block fails the whole parse. Odds text that
/// cannot be read only drops that candidate.
pub fn parse_snapshot(html: &str, source_url: &str) -> Result<Snapshot> {
    let document = Html::parse_document(html);
    let container_sel = selector("div#odds-text")?;

    let container = document
        .select(&container_sel)
        .next()
        .context("Could not find odds container")?;

    let mut candidates = BTreeMap::new();
    for (party, candidate) in [("rep", REPUBLICAN_CANDIDATE), ("dem", DEMOCRATIC_CANDIDATE)] {
        let text = party_odds_text(container, party)?;
        if let Some(pct) = extract_odds(&text) {
            candidates.insert(candidate.to_string(), pct);
        }
    }

    Ok(Snapshot {
        timestamp: Local::now(),
        candidates,
        total_simulations: TOTAL_SIMULATIONS,
        no_winner_chance: 0,
        source_url: source_url.to_string(),
    })
}

/// Read an odds label such as `"62%"` or `"less than 1%"`.
pub fn extract_odds(text: &str) -> Option<u8> {
    let trimmed = text.trim().trim_matches('%').trim();

    match trimmed.parse::<u8>() {
        Ok(pct) if pct <= 100 => Some(pct),
        _ if text.to_lowercase().contains("less than 1") => Some(0),
        _ => {
            warn!("Could not parse odds value: {}", text);
            None
        }
    }
}
