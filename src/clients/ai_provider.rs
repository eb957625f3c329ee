//! C2 AI Provider Adapter. `AiProvider` is the seam every content-generation call goes
//! through; `HttpAiProvider` is the only implementation, modelled on the unified-request
//! shape used by pack LLM clients (model, messages, system, max_tokens, temperature)
//! rather than any one vendor's bespoke schema, so swapping providers later only means
//! swapping the request/response mapping inside this one file. A `governor` rate limiter
//! bounds calls per second independently of whatever concurrency cap a caller (e.g. the
//! analyser's per-article semaphore) applies on top.
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::headers::build_idempotent_headers;
use crate::observability::metrics::Metrics;
use crate::util::error::{ErrorKind, classify_error};
use crate::util::retry::RetryConfig;

const MIN_TIMEOUT: Duration = Duration::from_secs(120);

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system_message: Option<String>,
    pub temperature: f64,
    pub max_output_tokens: i32,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub text: String,
    pub tokens_in: i32,
    pub tokens_out: i32,
    pub stop_reason: String,
    pub safety_ratings: Option<Value>,
    pub duration_ms: i64,
}

/// Mirrors the taxonomy in the error handling design: retriable transport/5xx failures
/// vs a `Fatal` outcome the caller must never silently retry (safety-blocked responses,
/// auth failures, malformed requests).
#[derive(Debug, thiserror::Error)]
pub enum AiProviderError {
    #[error("AI provider call timed out")]
    Timeout,
    #[error("AI provider call failed, retriable: {0}")]
    Retriable(#[source] anyhow::Error),
    #[error("AI provider call failed fatally: {message}")]
    Fatal { message: String },
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, AiProviderError>;
}

#[derive(Debug, Serialize)]
struct UnifiedRequest<'a> {
    model: &'a str,
    messages: Vec<UnifiedMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    max_tokens: i32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct UnifiedMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct UnifiedResponse {
    text: String,
    #[serde(default)]
    tokens_in: i32,
    #[serde(default)]
    tokens_out: i32,
    #[serde(default = "default_stop_reason")]
    stop_reason: String,
    #[serde(default)]
    safety_ratings: Option<Value>,
}

fn default_stop_reason() -> String {
    "STOP".to_string()
}

pub struct HttpAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
    limiter: Arc<DirectRateLimiter>,
    metrics: Arc<Metrics>,
}

impl HttpAiProvider {
    pub fn new(
        base_url: String,
        api_key: String,
        retry: RetryConfig,
        rate_limit_rps: NonZeroU32,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(MIN_TIMEOUT)
            .build()?;
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rate_limit_rps)));
        Ok(Self {
            client,
            base_url,
            api_key,
            retry,
            limiter,
            metrics,
        })
    }

    async fn generate_inner(&self, request: GenerateRequest) -> Result<GenerateResponse, AiProviderError> {
        let unified = UnifiedRequest {
            model: &request.model,
            messages: vec![UnifiedMessage {
                role: "user",
                content: &request.prompt,
            }],
            system: request.system_message.as_deref(),
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
        };

        let idempotency_key = Uuid::now_v7();
        let mut attempt = 0usize;

        loop {
            self.limiter.until_ready().await;

            let started = Instant::now();
            let headers = build_idempotent_headers(idempotency_key, &request.model);
            let result = self
                .client
                .post(format!("{}/v1/generate", self.base_url))
                .bearer_auth(&self.api_key)
                .headers(headers)
                .json(&unified)
                .send()
                .await;

            let outcome = match result {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: UnifiedResponse = resp
                        .json()
                        .await
                        .map_err(|e| AiProviderError::Fatal {
                            message: format!("malformed AI provider response: {e}"),
                        })?;
                    return Ok(GenerateResponse {
                        text: parsed.text,
                        tokens_in: parsed.tokens_in,
                        tokens_out: parsed.tokens_out,
                        stop_reason: parsed.stop_reason,
                        safety_ratings: parsed.safety_ratings,
                        duration_ms: started.elapsed().as_millis() as i64,
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    if status.as_u16() == 401 || status.as_u16() == 403 {
                        return Err(AiProviderError::Fatal {
                            message: format!("AI provider rejected credentials: {status}"),
                        });
                    }
                    anyhow::anyhow!("AI provider returned {status}")
                }
                Err(e) if e.is_timeout() => return Err(AiProviderError::Timeout),
                Err(e) => anyhow::Error::from(e),
            };

            if !matches!(classify_error(&outcome), ErrorKind::Retryable)
                || !self.retry.can_retry(attempt)
            {
                return Err(AiProviderError::Retriable(outcome));
            }

            attempt += 1;
            tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
        }
    }
}

#[async_trait]
impl AiProvider for HttpAiProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, AiProviderError> {
        let started = Instant::now();
        let result = self.generate_inner(request).await;

        self.metrics.ai_provider_calls.inc();
        self.metrics
            .ai_provider_call_duration
            .observe(started.elapsed().as_secs_f64());

        match &result {
            Ok(response) => {
                self.metrics
                    .ai_provider_tokens_total
                    .inc_by(f64::from(response.tokens_in + response.tokens_out));
            }
            Err(_) => self.metrics.ai_provider_call_failures.inc(),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_reason_defaults_to_stop() {
        let json = serde_json::json!({"text": "hi"});
        let parsed: UnifiedResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.stop_reason, "STOP");
    }
}
