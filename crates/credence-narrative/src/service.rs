//! Narrative service: cache → endpoint with retries → template.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{MemoryNarrativeCache, NarrativeCache};
use crate::client::{ChatCompletionsClient, TextGenerator};
use crate::config::NarrativeConfig;
use crate::error::NarrativeError;
use crate::template::{build_prompt, cache_key, fallback_narrative, SYSTEM_PROMPT};
use crate::{NarrativeRequest, Result};

/// Produces the banker-facing explanation for one decision.
///
/// `explain` is infallible: the endpoint is optional enrichment, the template
/// is the terminal branch.
pub struct NarrativeService {
    generator: Option<Arc<dyn TextGenerator>>,
    cache: Option<Arc<dyn NarrativeCache>>,
    max_retries: u32,
    backoff_base: Duration,
    timeout: Duration,
    cache_ttl: Duration,
}

impl NarrativeService {
    /// Template-only service. Never performs I/O.
    pub fn offline() -> Self {
        Self {
            generator: None,
            cache: None,
            max_retries: 0,
            backoff_base: Duration::ZERO,
            timeout: Duration::ZERO,
            cache_ttl: Duration::ZERO,
        }
    }

    /// Service using an explicit generator and the retry settings of `config`.
    pub fn new(generator: Arc<dyn TextGenerator>, config: &NarrativeConfig) -> Self {
        Self {
            generator: Some(generator),
            cache: None,
            max_retries: config.max_retries.max(1),
            backoff_base: config.backoff_base,
            timeout: config.timeout,
            cache_ttl: config.cache_ttl,
        }
    }

    /// Build from config: an HTTP client when an API key is present, an
    /// in-memory cache when caching is enabled.
    pub fn from_config(config: &NarrativeConfig) -> Self {
        let mut service = match ChatCompletionsClient::new(config.clone()) {
            Ok(client) => Self::new(Arc::new(client), config),
            Err(NarrativeError::NotConfigured) => {
                info!("no narrative API key configured; using template narratives");
                Self::offline()
            }
            Err(e) => {
                warn!(error = %e, "narrative client unavailable; using template narratives");
                Self::offline()
            }
        };
        if config.cache_enabled {
            service = service.with_cache(Arc::new(MemoryNarrativeCache::new()));
        }
        service
    }

    pub fn with_cache(mut self, cache: Arc<dyn NarrativeCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Explanation for `request`; never fails.
    pub async fn explain(&self, request: &NarrativeRequest) -> String {
        let Some(generator) = &self.generator else {
            return fallback_narrative(request);
        };

        let key = cache_key(request);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&key).await {
                debug!("using cached narrative");
                return cached;
            }
        }

        match self.generate_with_retry(generator.as_ref(), request).await {
            Ok(text) => {
                if let Some(cache) = &self.cache {
                    cache.set(&key, text.clone(), self.cache_ttl).await;
                }
                text
            }
            Err(e) => {
                warn!(error = %e, "narrative generation failed; using template");
                fallback_narrative(request)
            }
        }
    }

    async fn generate_with_retry(
        &self,
        generator: &dyn TextGenerator,
        request: &NarrativeRequest,
    ) -> Result<String> {
        let prompt = build_prompt(request);
        let mut last_error = NarrativeError::NotConfigured;

        for attempt in 0..self.max_retries {
            let outcome =
                tokio::time::timeout(self.timeout, generator.generate(SYSTEM_PROMPT, &prompt))
                    .await
                    .unwrap_or(Err(NarrativeError::Timeout(self.timeout)));

            match outcome {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "narrative attempt failed");
                    last_error = e;
                }
            }

            if attempt + 1 < self.max_retries {
                tokio::time::sleep(self.backoff_base * 2u32.saturating_pow(attempt)).await;
            }
        }

        Err(last_error)
    }
}
