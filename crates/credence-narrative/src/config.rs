//! Narrative endpoint configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "mixtral-8x7b-32768";

/// Narrative endpoint, retry and cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    /// Chat-completions URL
    pub api_url: String,
    /// Bearer token; no token means template-only narratives
    pub api_key: Option<String>,
    /// Model name sent with each request
    pub model: String,
    /// Deadline for a single attempt
    pub timeout: Duration,
    /// Attempts before falling back to the template
    pub max_retries: u32,
    /// First backoff delay, doubled after each failed attempt
    pub backoff_base: Duration,
    /// Cache entry lifetime
    pub cache_ttl: Duration,
    /// Whether completed narratives are cached
    pub cache_enabled: bool,
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        NarrativeConfig {
            api_url: std::env::var("CREDENCE_NARRATIVE_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_key: std::env::var("CREDENCE_NARRATIVE_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            model: std::env::var("CREDENCE_NARRATIVE_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(
                env_u64("CREDENCE_NARRATIVE_TIMEOUT_SECS").unwrap_or(30),
            ),
            max_retries: env_u64("CREDENCE_NARRATIVE_MAX_RETRIES")
                .map(|n| n as u32)
                .unwrap_or(3),
            backoff_base: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(env_u64("CREDENCE_NARRATIVE_CACHE_TTL").unwrap_or(3600)),
            cache_enabled: env_flag("CREDENCE_NARRATIVE_CACHE").unwrap_or(false),
        }
    }
}

impl NarrativeConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint, ignoring the environment
    pub fn new(api_url: &str, model: &str) -> Self {
        NarrativeConfig {
            api_url: api_url.to_string(),
            api_key: None,
            model: model.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(3600),
            cache_enabled: false,
        }
    }

    /// Set authentication token
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_base: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff_base = backoff_base;
        self
    }

    pub fn with_cache(mut self, enabled: bool, ttl: Duration) -> Self {
        self.cache_enabled = enabled;
        self.cache_ttl = ttl;
        self
    }
}
