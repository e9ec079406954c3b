#[cfg(test)]
mod tests;

use serde::Serialize;

use crate::index::RetrievedPassage;

/// Context text used when retrieval found nothing
pub const NO_CONTEXT: &str = "No relevant policy documents were found for this question.";

const EXCERPT_CHARS: usize = 240;

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a policy assistant. Your role is to help employees find and understand \
organizational policies and procedures.

INSTRUCTIONS:
1. Answer using ONLY the policy passages in the context. Never rely on outside knowledge.
2. If the context does not contain the answer, say plainly that the available policy documents do not cover it.
3. Cite the passages you use by their marker, for example [1] or [2][3].
4. If several policies are relevant, mention each of them.
5. If a policy is unclear or ambiguous, say so and suggest consulting the owning department or HR.
6. Use a professional but friendly tone.";

/// A passage the answer may cite
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    /// Marker number as rendered in the context, `[marker]`
    pub marker: usize,
    pub filename: String,
    pub department: String,
    pub region: String,
    pub policy_type: String,
    pub effective_date: String,
    pub excerpt: String,
    pub distance: f32,
}

/// A fully rendered generation request
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub context: String,
    pub question: String,
    pub sources: Vec<SourceCitation>,
}

impl Prompt {
    /// The single user turn sent to the model
    #[inline]
    pub fn user_message(&self) -> String {
        format!(
            "CONTEXT FROM POLICY DOCUMENTS:\n{}\n\nQUESTION:\n{}",
            self.context, self.question
        )
    }

    #[inline]
    pub fn has_context(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// Renders retrieved passages into a `Prompt`
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
}

impl Default for PromptBuilder {
    #[inline]
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl PromptBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    #[inline]
    pub fn build(&self, question: &str, passages: &[RetrievedPassage]) -> Prompt {
        let context = if passages.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            passages
                .iter()
                .enumerate()
                .map(|(i, passage)| format_passage(i + 1, passage))
                .collect::<Vec<_>>()
                .join("\n---\n")
        };

        let sources = passages
            .iter()
            .enumerate()
            .map(|(i, passage)| SourceCitation {
                marker: i + 1,
                filename: passage.filename.clone(),
                department: passage.metadata.department.clone(),
                region: passage.metadata.region.clone(),
                policy_type: passage.metadata.policy_type.clone(),
                effective_date: passage.metadata.effective_date.clone(),
                excerpt: excerpt(&passage.text),
                distance: passage.distance,
            })
            .collect();

        Prompt {
            system: self.system.clone(),
            context,
            question: question.to_string(),
            sources,
        }
    }
}

fn format_passage(marker: usize, passage: &RetrievedPassage) -> String {
    let metadata = &passage.metadata;
    format!(
        "[{}] Source: {}\nDepartment: {} | Region: {} | Type: {} | Effective: {}\nContent:\n{}\n",
        marker,
        passage.filename,
        metadata.department,
        metadata.region,
        metadata.policy_type,
        metadata.effective_date,
        passage.text
    )
}

/// Single-line preview of a passage
fn excerpt(text: &str) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= EXCERPT_CHARS {
        return flattened;
    }

    let cut: String = flattened.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}
