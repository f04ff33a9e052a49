//! Configuration for the comparison service
//!
//! The LLM endpoint and model identifiers are fixed at compile time. Only the
//! credential comes from the environment; pacing, timeouts and retry knobs can
//! be tuned from the environment or an optional TOML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::comparison::SlotPolicy;
use crate::error::{AgentsError, Result};

/// Environment variable holding the LLM credential.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// OpenAI-compatible endpoint of the completion backend.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Model used by the triage and online-search agents.
pub const CHAT_MODEL: &str = "gemini-2.0-flash";

/// Model used by the browser agent.
pub const BROWSER_MODEL: &str = "gemini-2.0-flash-exp";

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Credential for the completion backend
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Delay between streamed output lines
    pub stream_delay: Duration,

    /// Turn budget for a single agent run
    pub max_turns: usize,

    /// Timeout for a single completion call
    pub api_timeout: Duration,

    /// Timeout for one `online_search` lookup (a whole browser agent run)
    pub search_timeout: Duration,

    /// Turn budget for the browser agent
    pub browser_max_steps: usize,

    /// Maximum characters of page text handed to the browser model
    pub page_text_limit: usize,

    /// Retry configuration for external calls
    pub retry: RetryConfig,

    /// How search results are assigned to feature slots
    pub slot_policy: SlotPolicy,
}

impl AppConfig {
    /// Build a config around an explicit credential with default tunables.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            stream_delay: Duration::from_millis(100),
            max_turns: 12,
            api_timeout: Duration::from_secs(60),
            search_timeout: Duration::from_secs(300),
            browser_max_steps: 15,
            page_text_limit: 12_000,
            retry: RetryConfig::default(),
            slot_policy: SlotPolicy::default(),
        }
    }

    /// Load configuration from the process environment.
    ///
    /// A missing or empty `GEMINI_API_KEY` is fatal.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(AgentsError::ConfigError {
                message: format!(
                    "{} is not set. Please ensure it is defined in your .env file.",
                    API_KEY_ENV
                ),
            });
        }

        let mut config = Self::new(api_key);

        if let Some(ms) = env_u64("PHONE_COMPARE_STREAM_DELAY_MS") {
            config.stream_delay = Duration::from_millis(ms);
        }
        if let Some(turns) = env_u64("PHONE_COMPARE_MAX_TURNS") {
            config.max_turns = turns as usize;
        }
        if let Some(secs) = env_u64("PHONE_COMPARE_API_TIMEOUT") {
            config.api_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("PHONE_COMPARE_SEARCH_TIMEOUT") {
            config.search_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Overlay tunables from a TOML file on top of this config.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&contents)?;
        file.apply(&mut self);
        Ok(self)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries
    pub max_retries: usize,

    /// Initial retry delay
    pub initial_delay: Duration,

    /// Maximum retry delay
    pub max_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f32,

    /// Jitter to add randomness to retries
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// On-disk tunables. Every field is optional; the endpoint and models are
/// deliberately absent.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub stream_delay_ms: Option<u64>,
    pub max_turns: Option<usize>,
    pub api_timeout_secs: Option<u64>,
    pub search_timeout_secs: Option<u64>,
    pub browser_max_steps: Option<usize>,
    pub page_text_limit: Option<usize>,
    pub max_retries: Option<usize>,
    pub slot_policy: Option<SlotPolicy>,
}

impl ConfigFile {
    fn apply(self, config: &mut AppConfig) {
        if let Some(ms) = self.stream_delay_ms {
            config.stream_delay = Duration::from_millis(ms);
        }
        if let Some(turns) = self.max_turns {
            config.max_turns = turns;
        }
        if let Some(secs) = self.api_timeout_secs {
            config.api_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.search_timeout_secs {
            config.search_timeout = Duration::from_secs(secs);
        }
        if let Some(steps) = self.browser_max_steps {
            config.browser_max_steps = steps;
        }
        if let Some(limit) = self.page_text_limit {
            config.page_text_limit = limit;
        }
        if let Some(retries) = self.max_retries {
            config.retry.max_retries = retries;
        }
        if let Some(policy) = self.slot_policy {
            config.slot_policy = policy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::new("key");
        assert_eq!(config.api_key, "key");
        assert_eq!(config.stream_delay, Duration::from_millis(100));
        assert_eq!(config.slot_policy, SlotPolicy::Keyed);
    }

    #[test]
    fn test_retry_config() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_retries, 2);
        assert_eq!(retry.backoff_multiplier, 2.0);
        assert!(retry.jitter);
    }

    #[test]
    fn test_file_overlay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "stream_delay_ms = 5\nmax_turns = 4\nslot_policy = \"positional\""
        )
        .unwrap();

        let config = AppConfig::new("key").with_file(file.path()).unwrap();
        assert_eq!(config.stream_delay, Duration::from_millis(5));
        assert_eq!(config.max_turns, 4);
        assert_eq!(config.slot_policy, SlotPolicy::Positional);
        assert_eq!(config.api_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_file_rejects_endpoint_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"http://localhost\"").unwrap();

        let err = AppConfig::new("key").with_file(file.path()).unwrap_err();
        assert!(matches!(err, AgentsError::TomlError(_)));
    }

    #[test]
    fn test_serialized_config_omits_key() {
        let config = AppConfig::new("secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
