//! Backend and session configuration
//!
//! Native builds read the environment (after loading `.env`); the browser
//! build talks to the page's own origin unless told otherwise.

use std::time::Duration;

use thiserror::Error;

use crate::provisioning::RetryPolicy;

pub const DEFAULT_STORAGE_KEY: &str = "marketplace.auth.user";
pub const LEGACY_STORAGE_KEY: &str = "user";
pub const DEFAULT_SESSION_KEY: &str = "marketplace.auth.session";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub api_url: String,
    pub api_key: String,
    /// Slot holding the cached user
    pub storage_key: String,
    /// Pre-migration slot, read once and removed
    pub legacy_storage_key: String,
    /// Slot where the identity provider keeps its session
    pub session_storage_key: String,
    /// Upper bound on the startup session lookup and profile reads
    pub session_timeout: Duration,
    pub request_timeout: Duration,
    pub provisioning: RetryPolicy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            legacy_storage_key: LEGACY_STORAGE_KEY.to_string(),
            session_storage_key: DEFAULT_SESSION_KEY.to_string(),
            session_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            provisioning: RetryPolicy::default(),
        }
    }
}

impl BackendConfig {
    /// Build from a variable lookup; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("MARKETPLACE_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = lookup("MARKETPLACE_API_KEY") {
            config.api_key = key;
        }
        if let Some(secs) = parse::<u64>(&lookup, "MARKETPLACE_SESSION_TIMEOUT_SECS")? {
            config.session_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse::<u32>(&lookup, "MARKETPLACE_PROFILE_MAX_RETRIES")? {
            if retries == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "MARKETPLACE_PROFILE_MAX_RETRIES",
                    value: "0".into(),
                });
            }
            config.provisioning.max_retries = retries;
        }
        if let Some(ms) = parse::<u64>(&lookup, "MARKETPLACE_PROFILE_RETRY_DELAY_MS")? {
            config.provisioning.base_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same-origin API, as served alongside the front end
    #[cfg(target_arch = "wasm32")]
    pub fn from_window(api_key: &str) -> Self {
        let api_url = web_sys::window()
            .and_then(|w| w.location().origin().ok())
            .unwrap_or_else(|| "http://localhost:54321".to_string());
        Self {
            api_url,
            api_key: api_key.to_string(),
            ..Self::default()
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}
