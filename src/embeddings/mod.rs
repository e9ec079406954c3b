// Embeddings module
// Ollama integration and document chunking

pub mod chunking;
pub mod ollama;

use anyhow::Result;

pub use chunking::{Chunk, Chunker, ChunkingConfig, chunk_id};
pub use ollama::OllamaClient;

/// Turns text into fixed-dimension vectors with a single pretrained model
pub trait Embedder: Send + Sync {
    /// Name of the model producing the vectors
    fn model_name(&self) -> &str;

    /// Embed each text, preserving order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding model returned no vector"))
    }
}
