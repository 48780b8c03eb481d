use super::ConfigError;
use crate::bridge::schedule::UNTAPPD_CALLS_PER_HOUR;
use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub client_id: String,
    pub client_secret: SecretString,
    #[serde(default)]
    pub users: Vec<UserConfig>,
    pub bot_name: String,
    pub server: String,
    pub channel: String,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(skip)]
    zone: Option<Tz>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_api_calls_per_hour")]
    pub api_calls_per_hour: u32,
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_backfill_cap")]
    pub backfill_cap: Option<usize>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_backoff_min_secs")]
    pub backoff_min_secs: u64,
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            api_calls_per_hour: default_api_calls_per_hour(),
            send_delay_ms: default_send_delay_ms(),
            queue_capacity: default_queue_capacity(),
            backfill_cap: default_backfill_cap(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            backoff_min_secs: default_backoff_min_secs(),
            backoff_max_secs: default_backoff_max_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_bind_address")]
    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            bind_address: default_metrics_bind_address(),
        }
    }
}

impl Config {
    /// Loads `path`, or `config.json` in the working directory.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from_file(config_path(path))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_json::from_str(content)?;
        config.apply_env_overrides();
        config.validate()?;
        config.zone = config.resolve_time_zone()?;
        config.limits.page_size = config.limits.page_size.clamp(1, default_page_size());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("bot_name", self.bot_name.as_str()),
            ("server", self.server.as_str()),
            ("channel", self.channel.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "{field} cannot be empty"
                )));
            }
        }

        if !self.channel.starts_with('#') && !self.channel.starts_with('&') {
            return Err(ConfigError::InvalidConfig(format!(
                "channel {} must start with '#' or '&'",
                self.channel
            )));
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            if user.name.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "users[].name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(user.name.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "user {} is listed more than once",
                    user.name
                )));
            }
        }

        if self.limits.api_calls_per_hour == 0 {
            return Err(ConfigError::InvalidConfig(
                "limits.api_calls_per_hour must be positive".to_string(),
            ));
        }

        if self.limits.queue_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "limits.queue_capacity must be positive".to_string(),
            ));
        }

        if self.limits.backoff_min_secs > self.limits.backoff_max_secs {
            return Err(ConfigError::InvalidConfig(
                "limits.backoff_min_secs cannot exceed limits.backoff_max_secs".to_string(),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "metrics.port must be between 1 and 65535".to_string(),
            ));
        }

        Ok(())
    }

    /// Zone used to render check-in timestamps, `None` meaning UTC.
    pub fn zone(&self) -> Option<Tz> {
        self.zone
    }

    pub fn user_names(&self) -> Vec<String> {
        self.users.iter().map(|user| user.name.clone()).collect()
    }

    fn resolve_time_zone(&self) -> Result<Option<Tz>, ConfigError> {
        match self.time_zone.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => name.parse::<Tz>().map(Some).map_err(|_| {
                ConfigError::InvalidConfig(format!("unknown time_zone {name}"))
            }),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("UNTAPPD_CLIENT_ID") {
            self.client_id = value;
        }
        if let Ok(value) = std::env::var("UNTAPPD_CLIENT_SECRET") {
            self.client_secret = SecretString::from(value);
        }
    }
}

fn config_path(path: Option<&Path>) -> &Path {
    path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH))
}

fn default_use_tls() -> bool {
    true
}

fn default_api_url() -> String {
    "https://api.untappd.com/v4".to_string()
}

fn default_api_calls_per_hour() -> u32 {
    UNTAPPD_CALLS_PER_HOUR
}

fn default_send_delay_ms() -> u64 {
    2000
}

fn default_queue_capacity() -> usize {
    30
}

// Untappd refuses deeper history for users other than the authenticated one.
fn default_backfill_cap() -> Option<usize> {
    Some(300)
}

fn default_page_size() -> u32 {
    50
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_backoff_min_secs() -> u64 {
    60
}

fn default_backoff_max_secs() -> u64 {
    30 * 60
}

fn default_metrics_port() -> u16 {
    9105
}

fn default_metrics_bind_address() -> String {
    "127.0.0.1".to_string()
}
