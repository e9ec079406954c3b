// Shared fakes for the integration tests: a deterministic embedder, a plain
// text extractor and a small policy corpus written to disk
#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use policy_rag::documents::TextExtractor;
use policy_rag::embeddings::Embedder;
use policy_rag::generation::{AnswerGenerator, GeneratedAnswer, GenerationError};
use policy_rag::retrieval::Prompt;
use policy_rag::{PolicyError, Result};

const VOCABULARY: [&str; 16] = [
    "submit",
    "expense",
    "receipt",
    "report",
    "day",
    "remote",
    "work",
    "home",
    "manager",
    "password",
    "security",
    "laptop",
    "data",
    "retention",
    "vacation",
    "leave",
];

/// Bag of words over a fixed vocabulary, plus a constant bias dimension
pub struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| keyword_vector(text)).collect())
    }
}

fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; VOCABULARY.len() + 1];
    vector[0] = 0.1;
    for word in text.split_whitespace() {
        let word = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        let word = word.strip_suffix('s').unwrap_or(&word);
        if let Some(position) = VOCABULARY.iter().position(|v| *v == word) {
            vector[position + 1] += 1.0;
        }
    }
    vector
}

/// Reads `.pdf` fixtures as UTF-8 text; files starting with `%CORRUPT` fail
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let text =
            std::fs::read_to_string(path).map_err(|e| PolicyError::Extraction(e.to_string()))?;
        if text.starts_with("%CORRUPT") {
            return Err(PolicyError::Extraction(format!(
                "{} is not a readable PDF",
                path.display()
            )));
        }
        Ok(text)
    }
}

/// Answers with a fixed citation and counts how often it was asked
#[derive(Default)]
pub struct ScriptedGenerator {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedGenerator {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

impl AnswerGenerator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, prompt: &Prompt) -> std::result::Result<GeneratedAnswer, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        let first = prompt
            .sources
            .first()
            .map(|s| format!("See {} [{}].", s.filename, s.marker))
            .unwrap_or_else(|| "No context was provided.".to_string());

        Ok(GeneratedAnswer {
            text: first,
            model: "scripted".to_string(),
            attempts: 1,
            stop_reason: Some("end_turn".to_string()),
            usage: None,
        })
    }
}

pub const EXPENSE_POLICY: &str = "Employees must submit expense reports within 30 days, \
counted from the date of purchase. A receipt is required for every expense over $25. \
Late expense reports need written sign-off from the employee's manager before the \
finance team will process them.";

pub const REMOTE_WORK_POLICY: &str = "Remote work from home is permitted for up to three \
days each week with manager approval. Employees working remotely must be reachable during \
core hours and must use the company VPN when they work from home.";

pub const SECURITY_POLICY: &str = "Every password must be at least fourteen characters \
long and rotated every ninety days. Lost or stolen laptops must be reported to the \
security team within one hour. Security updates are installed automatically.";

/// Three readable policies and one corrupt file
pub fn write_corpus(dir: &Path) -> std::io::Result<()> {
    std::fs::write(dir.join("expense_policy.pdf"), EXPENSE_POLICY)?;
    std::fs::write(dir.join("remote_work.pdf"), REMOTE_WORK_POLICY)?;
    std::fs::write(dir.join("security.pdf"), SECURITY_POLICY)?;
    std::fs::write(dir.join("scanned_handbook.pdf"), "%CORRUPT binary scan")?;
    std::fs::write(
        dir.join("metadata.csv"),
        "filename,department,region,policy_type,effective_date,description\n\
         expense_policy.pdf,Finance,Global,Procedure,2024-01-01,Expense reporting\n\
         remote_work.pdf,HR,North America,Policy,2023-06-15,Working from home\n\
         security.pdf,IT,Global,Standard,,Account and device security\n\
         retired_policy.pdf,Legal,EU,Policy,2019-01-01,No longer published\n",
    )?;
    Ok(())
}

pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}
