//! Shared HTTP client for the OpenAI REST API.
//!
//! Both the embedder and the completer post JSON through [`OpenAiClient`],
//! which owns the retry policy:
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - other 4xx → fail immediately
//! - network errors and timeouts → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::API_KEY_ENV;

pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiClient {
    /// Build a client using the key from `OPENAI_API_KEY`.
    pub fn from_env(api_base: &str, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("{} environment variable not set", API_KEY_ENV))?;
        Self::new(api_base, api_key, timeout_secs, max_retries)
    }

    pub fn new(
        api_base: &str,
        api_key: impl Into<String>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_retries,
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// POST a JSON body and return the parsed JSON response, retrying transient failures.
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = self.endpoint(path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                debug!(attempt, delay_secs = delay.as_secs(), %url, "retrying OpenAI request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if is_retryable(status) {
                        warn!(%status, attempt, "transient OpenAI API error");
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "OpenAI request failed");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("OpenAI request failed after retries")))
    }
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
