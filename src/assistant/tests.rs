use super::*;
use crate::documents::PolicyMetadata;
use crate::embeddings::Chunk;
use crate::generation::{GeneratedAnswer, GenerationError};
use crate::index::{PassageIndex, RetrievedPassage};
use crate::retrieval::{DEFAULT_TOP_K, NO_CONTEXT, Prompt};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

struct FixedIndex(Vec<RetrievedPassage>);

#[async_trait]
impl PassageIndex for FixedIndex {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
        Ok(chunks.len())
    }

    async fn query(
        &self,
        _text: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievedPassage>> {
        Ok(self
            .0
            .iter()
            .filter(|p| filter.matches(&p.filename, &p.metadata))
            .take(k)
            .cloned()
            .collect())
    }

    async fn prune_document(&self, _filename: &str, _keep: usize) -> Result<usize> {
        Ok(0)
    }
}

/// Echoes the markers it saw and remembers the prompts
#[derive(Default)]
struct RecordingGenerator {
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
    fail: bool,
}

impl AnswerGenerator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }

    fn generate(&self, prompt: &Prompt) -> std::result::Result<GeneratedAnswer, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        if self.fail {
            return Err(GenerationError::Transport("connection refused".to_string()));
        }

        let markers: Vec<String> = prompt
            .sources
            .iter()
            .map(|s| format!("[{}]", s.marker))
            .collect();
        Ok(GeneratedAnswer {
            text: format!("Answer citing {}", markers.join("")),
            model: "recording".to_string(),
            attempts: 2,
            stop_reason: Some("end_turn".to_string()),
            usage: None,
        })
    }
}

fn expense_passage() -> RetrievedPassage {
    RetrievedPassage {
        text: "Reports over $1000 require additional approval from the finance department."
            .to_string(),
        filename: "expense_policy.pdf".to_string(),
        chunk_index: 3,
        metadata: PolicyMetadata {
            department: "Finance".to_string(),
            ..PolicyMetadata::default()
        },
        distance: 0.2,
    }
}

fn assistant(
    passages: Vec<RetrievedPassage>,
    generator: Arc<RecordingGenerator>,
) -> PolicyAssistant {
    PolicyAssistant::new(
        Retriever::new(Arc::new(FixedIndex(passages)), DEFAULT_TOP_K),
        generator,
    )
}

#[tokio::test]
async fn answers_with_sources_from_retrieval() {
    let generator = Arc::new(RecordingGenerator::default());
    let assistant = assistant(vec![expense_passage()], generator.clone());

    let response = assistant
        .ask("Who approves large expense reports?", &MetadataFilter::new(), None)
        .await
        .expect("answer");

    assert_eq!(response.answer, "Answer citing [1]");
    assert_eq!(response.passages_retrieved, 1);
    assert!(response.model_consulted);
    assert_eq!(response.generation_attempts, 2);
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].filename, "expense_policy.pdf");
    assert_eq!(response.sources[0].department, "Finance");

    let prompts = generator.prompts.lock().expect("lock");
    assert_eq!(prompts[0].question, "Who approves large expense reports?");
    assert!(prompts[0].context.contains("Reports over $1000"));
}

#[tokio::test]
async fn no_passages_skips_the_model() {
    let generator = Arc::new(RecordingGenerator::default());
    let assistant = assistant(Vec::new(), generator.clone());

    let response = assistant
        .ask("What is the policy on interstellar travel?", &MetadataFilter::new(), None)
        .await
        .expect("answer");

    assert_eq!(response.answer, NOT_FOUND_ANSWER);
    assert!(response.sources.is_empty());
    assert_eq!(response.passages_retrieved, 0);
    assert!(!response.model_consulted);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn filter_excluding_everything_behaves_like_no_passages() {
    let generator = Arc::new(RecordingGenerator::default());
    let assistant = assistant(vec![expense_passage()], generator.clone());
    let filter = MetadataFilter::new()
        .with(crate::documents::MetadataField::Department, "HR")
        .expect("valid filter");

    let response = assistant
        .ask("Who approves large expense reports?", &filter, None)
        .await
        .expect("answer");

    assert_eq!(response.answer, NOT_FOUND_ANSWER);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn can_consult_model_without_context() {
    let generator = Arc::new(RecordingGenerator::default());
    let assistant =
        assistant(Vec::new(), generator.clone()).with_consult_without_context(true);

    let response = assistant
        .ask("Anything about sabbaticals?", &MetadataFilter::new(), None)
        .await
        .expect("answer");

    assert!(response.model_consulted);
    assert!(response.sources.is_empty());
    let prompts = generator.prompts.lock().expect("lock");
    assert_eq!(prompts[0].context, NO_CONTEXT);
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let generator = Arc::new(RecordingGenerator::default());
    let assistant = assistant(vec![expense_passage()], generator.clone());

    let result = assistant.ask("   \n", &MetadataFilter::new(), None).await;

    assert!(matches!(result, Err(PolicyError::InvalidQuestion(_))));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);

    let empty = assistant.ask("", &MetadataFilter::new(), None).await;
    match empty {
        Err(err @ PolicyError::InvalidQuestion(_)) => {
            assert_eq!(err.to_string(), "Invalid question: question must not be empty");
        }
        other => panic!("expected an invalid question error, got {other:?}"),
    }
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generation_failures_surface_to_the_caller() {
    let generator = Arc::new(RecordingGenerator {
        fail: true,
        ..RecordingGenerator::default()
    });
    let assistant = assistant(vec![expense_passage()], generator);

    let result = assistant
        .ask("Who approves large expense reports?", &MetadataFilter::new(), None)
        .await;

    assert!(matches!(
        result,
        Err(PolicyError::Generation(GenerationError::Transport(_)))
    ));
}
