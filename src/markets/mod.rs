//! Venue integrations.
//!
//! Two read-only market-data clients feed the raw tables:
//! - Deribit — vanilla option chains, the USD spot index and the
//!   USDC spot-pair trade tape (no auth required for public endpoints)
//! - Polymarket — crypto threshold markets via the Gamma API, with
//!   midpoint pricing from the public CLOB endpoint
//!
//! Both share the retry schedule and JSON GET helper defined here.

pub mod deribit;
pub mod polymarket;

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Retry schedule for venue HTTP calls: exponential doubling from
/// `base_backoff`, capped at `max_backoff`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_millis(1500),
            max_backoff: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_backoff)
    }

    /// A shorter schedule for best-effort lookups where a missing
    /// value has a fallback.
    pub fn best_effort(&self) -> Self {
        RetryPolicy {
            max_attempts: self.max_attempts.min(3),
            ..*self
        }
    }
}

// ---------------------------------------------------------------------------
// JSON GET with retries
// ---------------------------------------------------------------------------

/// GET a JSON document, retrying transport errors, rate limits,
/// server errors and undecodable bodies. Other HTTP errors fail
/// immediately.
pub async fn get_json(
    http: &Client,
    url: &str,
    query: &[(&str, String)],
    policy: RetryPolicy,
) -> Result<serde_json::Value> {
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        if attempt > 0 {
            let delay = policy.backoff(attempt - 1);
            debug!(url, attempt, delay_ms = delay.as_millis() as u64, "Retrying venue request");
            tokio::time::sleep(delay).await;
        }

        let resp = match http.get(url).query(query).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url, attempt, error = %e, "Venue request failed");
                last_error = Some(format!("request error: {e}"));
                continue;
            }
        };

        let status = resp.status();
        if status.is_success() {
            match resp.json::<serde_json::Value>().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(url, attempt, error = %e, "Venue response not decodable as JSON");
                    last_error = Some(format!("decode error: {e}"));
                    continue;
                }
            }
        }

        // Retryable: 429 (rate limit) and server errors.
        if status.as_u16() == 429 || status.as_u16() >= 500 {
            let body = resp.text().await.unwrap_or_default();
            warn!(url, attempt, status = %status, "Retryable venue error");
            last_error = Some(format!("HTTP {status}: {body}"));
            continue;
        }

        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("GET {url} failed: {status}: {body}");
    }

    anyhow::bail!(
        "GET {url} failed after {} attempts: {}",
        policy.max_attempts,
        last_error.unwrap_or_default()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
