
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{AnswerGenerator, GeneratedAnswer, GenerationError, TokenUsage};
use crate::config::{ConfigError, GenerationConfig};
use crate::retrieval::Prompt;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_BACKOFF_MILLIS: u64 = 1000;
const MAX_BACKOFF_SECONDS: u64 = 60;

/// Client for the Anthropic Messages API
pub struct AnthropicClient {
    agent: ureq::Agent,
    messages_url: Url,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    rate_limit_retries: u32,
    base_backoff: Duration,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: Option<String>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl AnthropicClient {
    /// Resolve the API key from the configured environment variable, failing fast when absent
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self, ConfigError> {
        let api_key = config.api_key()?;
        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(
        config: &GenerationConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            messages_url: config.messages_url()?,
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            rate_limit_retries: config.rate_limit_retries,
            base_backoff: Duration::from_millis(DEFAULT_BACKOFF_MILLIS),
        })
    }

    /// Base delay for rate-limit backoff when the API sends no `retry-after`
    #[inline]
    pub fn with_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = retry_after.unwrap_or_else(|| {
            let factor = 2u32
                .checked_pow(attempt.saturating_sub(1))
                .unwrap_or(u32::MAX);
            self.base_backoff.saturating_mul(factor)
        });
        delay.min(Duration::from_secs(MAX_BACKOFF_SECONDS))
    }

    /// One HTTP round trip; `Ok` carries the raw success body
    fn send_once(&self, body: &str) -> Result<String, GenerationError> {
        let mut response = self
            .agent
            .post(self.messages_url.as_str())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .send(body)
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        match status {
            200..=299 => Ok(text),
            429 => Err(GenerationError::RateLimited { retry_after }),
            _ => {
                let message = serde_json::from_str::<ErrorResponse>(&text)
                    .map(|e| e.error.message)
                    .unwrap_or(text);
                Err(GenerationError::Api { status, message })
            }
        }
    }
}

impl AnswerGenerator for AnthropicClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn generate(&self, prompt: &Prompt) -> Result<GeneratedAnswer, GenerationError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: &prompt.system,
            messages: vec![Message {
                role: "user",
                content: prompt.user_message(),
            }],
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| GenerationError::MalformedResponse(format!("request encoding: {}", e)))?;

        let mut attempt = 1;
        let response_text = loop {
            debug!("Messages API request attempt {}", attempt);

            match self.send_once(&body) {
                Ok(text) => break text,
                Err(GenerationError::RateLimited { retry_after })
                    if attempt <= self.rate_limit_retries =>
                {
                    let delay = self.backoff(attempt, retry_after);
                    warn!(
                        "Rate limited by the model API, retry {}/{} in {:?}",
                        attempt, self.rate_limit_retries, delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let response: MessagesResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        let text: String = response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err(GenerationError::MalformedResponse(
                "response contained no text".to_string(),
            ));
        }

        info!(
            "Generated answer with {} after {} attempt(s)",
            self.model, attempt
        );

        Ok(GeneratedAnswer {
            text,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            attempts: attempt,
            stop_reason: response.stop_reason,
            usage: response.usage.map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }
}
