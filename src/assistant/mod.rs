// Assistant module
// Question answering over the policy index: retrieve, then generate

#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::generation::AnswerGenerator;
use crate::index::MetadataFilter;
use crate::retrieval::{Retriever, SourceCitation};
use crate::{PolicyError, Result};

/// Answer given when no passage is relevant to the question
pub const NOT_FOUND_ANSWER: &str =
    "I could not find this information in the available policy documents.";

/// Everything the caller learns from one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub passages_retrieved: usize,
    /// Whether the language model was asked at all
    pub model_consulted: bool,
    /// Model requests made, counting rate-limited retries
    pub generation_attempts: u32,
}

pub struct PolicyAssistant {
    retriever: Retriever,
    generator: Arc<dyn AnswerGenerator>,
    consult_model_without_context: bool,
}

impl PolicyAssistant {
    #[inline]
    pub fn new(retriever: Retriever, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            retriever,
            generator,
            consult_model_without_context: false,
        }
    }

    /// Ask the model even when retrieval found nothing
    #[inline]
    pub fn with_consult_without_context(mut self, consult: bool) -> Self {
        self.consult_model_without_context = consult;
        self
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `question` from passages matching `filter`; `k` overrides the retriever default
    #[inline]
    pub async fn ask(
        &self,
        question: &str,
        filter: &MetadataFilter,
        k: Option<usize>,
    ) -> Result<QueryResponse> {
        if question.trim().is_empty() {
            return Err(PolicyError::InvalidQuestion(
                "question must not be empty".to_string(),
            ));
        }

        let prompt = self.retriever.retrieve(question, filter, k).await?;
        let passages_retrieved = prompt.sources.len();

        if !prompt.has_context() && !self.consult_model_without_context {
            info!("No relevant passages for question, answering without the model");
            return Ok(QueryResponse {
                answer: NOT_FOUND_ANSWER.to_string(),
                sources: Vec::new(),
                passages_retrieved: 0,
                model_consulted: false,
                generation_attempts: 0,
            });
        }

        debug!(
            "Asking {} with {} passages",
            self.generator.model_name(),
            passages_retrieved
        );

        let generator = Arc::clone(&self.generator);
        let generation_prompt = prompt.clone();
        let generated = tokio::task::spawn_blocking(move || generator.generate(&generation_prompt))
            .await
            .map_err(|e| PolicyError::Other(anyhow::anyhow!("generation task failed: {}", e)))??;

        Ok(QueryResponse {
            answer: generated.text,
            sources: prompt.sources,
            passages_retrieved,
            model_consulted: true,
            generation_attempts: generated.attempts,
        })
    }
}
