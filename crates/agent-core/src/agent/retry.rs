//! Rate-limit aware querying of the model backend.
//!
//! Only [`RateLimited`] failures are retried, with capped exponential backoff. Every other
//! backend error is returned to the caller on first sight.

use std::time::Duration;

use super::harness::LlmClient;

/// Returned by an [`LlmClient`] when the backend refused the call for rate limiting (HTTP 429).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("llm backend rate limited")]
pub struct RateLimited;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError {
    #[error("llm backend still rate limited after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `0` gives up on the first rate limit.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 8,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Sends `prompt` and returns the trimmed reply, sleeping and retrying while rate limited.
pub async fn query_llm(
    llm: &dyn LlmClient,
    prompt: &str,
    policy: &RetryPolicy,
) -> anyhow::Result<String> {
    let mut rate_limited = 0u32;
    loop {
        match llm.complete(prompt.to_string()).await {
            Ok(text) => {
                if rate_limited > 0 {
                    tracing::info!(attempts = rate_limited + 1, "llm.recovered");
                }
                return Ok(text.trim().to_string());
            }
            Err(err) if err.is::<RateLimited>() => {
                rate_limited += 1;
                if rate_limited > policy.max_retries {
                    tracing::error!(attempts = rate_limited, "llm.rate_limit_exhausted");
                    return Err(RetryError::RateLimitExhausted {
                        attempts: rate_limited,
                    }
                    .into());
                }
                let delay = policy.delay_for(rate_limited);
                tracing::warn!(
                    attempt = rate_limited,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "llm.rate_limited"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
