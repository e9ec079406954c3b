// Session module
// In-memory history of one interactive conversation

use chrono::{DateTime, Utc};

use crate::assistant::QueryResponse;
use crate::retrieval::SourceCitation;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub asked_at: DateTime<Utc>,
}

/// Ordered, append-only record of answered questions
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    turns: Vec<ConversationTurn>,
}

impl ConversationSession {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a successful exchange
    #[inline]
    pub fn record(&mut self, question: &str, response: &QueryResponse) -> &ConversationTurn {
        self.turns.push(ConversationTurn {
            question: question.to_string(),
            answer: response.answer.clone(),
            sources: response.sources.clone(),
            asked_at: Utc::now(),
        });
        &self.turns[self.turns.len() - 1]
    }

    #[inline]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    #[inline]
    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
