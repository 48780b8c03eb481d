use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::Config;

pub mod models;

pub use self::models::{Checkin, sort_chronologically};

use self::models::Envelope;

const USER_AGENT: &str = concat!("untappd-irc-bridge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum UntappdError {
    #[error("untappd request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("untappd api error {code}: {detail}")]
    Api { code: u16, detail: String },
    #[error("invalid untappd response: {0}")]
    Decode(String),
}

/// The two upstream listings the bridge consumes. Every error is treated as
/// transient by callers.
#[async_trait]
pub trait CheckinSource: Send + Sync {
    /// Latest check-ins of a user, newest first, bounded by the upstream.
    async fn recent_checkins(&self, user_name: &str) -> Result<Vec<Checkin>, UntappdError>;

    /// Check-ins with `min_id < id <= max_id`, newest first, at most `limit`.
    async fn checkins_between(
        &self,
        user_name: &str,
        min_id: u64,
        max_id: u64,
        limit: u32,
    ) -> Result<Vec<Checkin>, UntappdError>;
}

pub struct UntappdClient {
    client: Client,
    base_url: Url,
    client_id: String,
    client_secret: SecretString,
}

impl UntappdClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.api_url)
            .with_context(|| format!("invalid api_url {}", config.api_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("api_url {} cannot be used as a base url", config.api_url);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.limits.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build untappd http client")?;

        Ok(Self {
            client,
            base_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    fn checkins_url(&self, user_name: &str, bounds: Option<(u64, u64, u32)>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["user", "checkins", user_name]);
        }

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("client_secret", self.client_secret.expose_secret());
            if let Some((min_id, max_id, limit)) = bounds {
                if min_id > 0 {
                    query.append_pair("min_id", &min_id.to_string());
                }
                query
                    .append_pair("max_id", &max_id.to_string())
                    .append_pair("limit", &limit.to_string());
            }
        }
        url
    }

    async fn fetch(&self, user_name: &str, url: Url) -> Result<Vec<Checkin>, UntappdError> {
        // The url carries the client secret; keep it out of error messages.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UntappdError::Http(e.without_url()))?;

        if let Some(remaining) = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
        {
            debug!(
                "untappd rate limit remaining={} user={}",
                remaining, user_name
            );
        }

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UntappdError::Http(e.without_url()))?;
        let envelope: Envelope = serde_json::from_slice(&body)
            .map_err(|e| UntappdError::Decode(format!("status {status}: {e}")))?;
        let checkins = envelope.into_checkins()?;

        debug!(
            "untappd returned {} checkins for {}",
            checkins.len(),
            user_name
        );
        Ok(checkins)
    }
}

#[async_trait]
impl CheckinSource for UntappdClient {
    async fn recent_checkins(&self, user_name: &str) -> Result<Vec<Checkin>, UntappdError> {
        let url = self.checkins_url(user_name, None);
        self.fetch(user_name, url).await
    }

    async fn checkins_between(
        &self,
        user_name: &str,
        min_id: u64,
        max_id: u64,
        limit: u32,
    ) -> Result<Vec<Checkin>, UntappdError> {
        let url = self.checkins_url(user_name, Some((min_id, max_id, limit)));
        self.fetch(user_name, url).await
    }
}
