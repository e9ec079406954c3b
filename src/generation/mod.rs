// Generation module
// Turns an assembled prompt into an answer from a hosted language model

pub mod anthropic;

use std::time::Duration;

use thiserror::Error;

use crate::retrieval::Prompt;

pub use anthropic::AnthropicClient;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Could not reach the model API: {0}")]
    Transport(String),

    #[error("Rate limited by the model API")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Model API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

/// Token accounting reported by the model API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    /// Model output, unmodified
    pub text: String,
    pub model: String,
    /// Requests made, including rate-limited ones
    pub attempts: u32,
    pub stop_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Produces an answer for a rendered prompt
pub trait AnswerGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    fn generate(&self, prompt: &Prompt) -> Result<GeneratedAnswer, GenerationError>;
}
