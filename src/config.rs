use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::dispatch::poll::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, ExponentialBackoff, FixedInterval, PollDelay,
};
use crate::error::MediaflowError;
use crate::registry::Provider;
use crate::store::DEFAULT_STORE_DIR;

/// Config file consulted when `MEDIAFLOW_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "mediaflow.toml";

/// Env var holding each provider's credential.
pub fn api_key_var(provider: Provider) -> &'static str {
    match provider {
        Provider::Replicate => "REPLICATE_API_TOKEN",
        Provider::Fal => "FAL_KEY",
        Provider::Runway => "RUNWAYML_API_SECRET",
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub max_attempts: u32,
    /// Exponential backoff from `interval_secs` instead of a fixed interval.
    pub backoff: bool,
    pub backoff_factor: f64,
    pub max_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: false,
            backoff_factor: 1.5,
            max_interval_secs: 60,
        }
    }
}

impl PollingConfig {
    pub fn delay(&self) -> Box<dyn PollDelay> {
        let base = Duration::from_secs(self.interval_secs.max(1));
        if self.backoff {
            Box::new(ExponentialBackoff {
                base,
                factor: self.backoff_factor.max(1.0),
                max: Duration::from_secs(self.max_interval_secs).max(base),
            })
        } else {
            Box::new(FixedInterval(base))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Public base URL of the webhook receiver. Unset: no callback URL is sent.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_STORE_DIR),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub polling: PollingConfig,
    pub webhook: WebhookConfig,
    pub store: StoreConfig,
    /// Credentials, from the environment only.
    #[serde(skip)]
    pub api_keys: HashMap<Provider, String>,
}

impl Config {
    /// The TOML file (if any), then environment overrides.
    pub fn load() -> Result<Self, MediaflowError> {
        let path = env::var("MEDIAFLOW_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = match std::fs::read_to_string(Path::new(&path)) {
            Ok(text) => Self::from_toml_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path, "no config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(MediaflowError::Other(format!("read {path}: {e}"))),
        };

        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, MediaflowError> {
        toml::from_str(text).map_err(|e| MediaflowError::Other(format!("invalid config: {e}")))
    }

    /// Overlay `MEDIAFLOW_*` overrides and provider credentials from `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), MediaflowError> {
        if let Some(v) = lookup("MEDIAFLOW_POLL_INTERVAL_SECS") {
            self.polling.interval_secs = parse_env("MEDIAFLOW_POLL_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("MEDIAFLOW_POLL_MAX_ATTEMPTS") {
            self.polling.max_attempts = parse_env("MEDIAFLOW_POLL_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("MEDIAFLOW_WEBHOOK_BASE_URL") {
            self.webhook.base_url = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Some(v) = lookup("MEDIAFLOW_STORE_DIR") {
            self.store.dir = PathBuf::from(v);
        }

        for provider in Provider::ALL {
            let var = api_key_var(provider);
            match lookup(var).filter(|k| !k.trim().is_empty()) {
                Some(key) => {
                    self.api_keys.insert(provider, key);
                }
                None => tracing::warn!("{var} not set, {provider} submissions will fail"),
            }
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, MediaflowError> {
    value
        .trim()
        .parse()
        .map_err(|_| MediaflowError::Other(format!("{key}: invalid value `{value}`")))
}
