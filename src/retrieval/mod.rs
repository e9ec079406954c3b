// Retrieval module
// Fetches the passages relevant to a question and assembles the prompt


pub mod prompt;

use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::index::{MetadataFilter, PassageIndex, RetrievedPassage};

pub use prompt::{NO_CONTEXT, Prompt, PromptBuilder, SourceCitation};

/// Number of passages retrieved when the caller does not say
pub const DEFAULT_TOP_K: usize = 5;

pub struct Retriever {
    index: Arc<dyn PassageIndex>,
    default_k: usize,
    prompt_builder: PromptBuilder,
}

impl Retriever {
    #[inline]
    pub fn new(index: Arc<dyn PassageIndex>, default_k: usize) -> Self {
        Self {
            index,
            default_k,
            prompt_builder: PromptBuilder::new(),
        }
    }

    #[inline]
    pub fn with_prompt_builder(mut self, prompt_builder: PromptBuilder) -> Self {
        self.prompt_builder = prompt_builder;
        self
    }

    #[inline]
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Nearest passages for `question`, `k` falling back to the configured default
    #[inline]
    pub async fn passages(
        &self,
        question: &str,
        filter: &MetadataFilter,
        k: Option<usize>,
    ) -> Result<Vec<RetrievedPassage>> {
        let k = k.unwrap_or(self.default_k);
        let passages = self.index.query(question, k, filter).await?;
        debug!("Retrieved {} passages (k={}, filter: {})", passages.len(), k, filter);
        Ok(passages)
    }

    /// Retrieve passages and render them into a prompt
    #[inline]
    pub async fn retrieve(
        &self,
        question: &str,
        filter: &MetadataFilter,
        k: Option<usize>,
    ) -> Result<Prompt> {
        let passages = self.passages(question, filter, k).await?;
        Ok(self.prompt_builder.build(question, &passages))
    }
}
