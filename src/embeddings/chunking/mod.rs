#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::documents::{Document, PolicyMetadata};

/// Represents a chunk of a policy document ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Deterministic identifier derived from filename and index
    pub id: String,
    /// Filename of the document this chunk belongs to
    pub filename: String,
    /// Path the document was read from
    pub source_path: String,
    /// Position of this chunk within the document
    pub chunk_index: usize,
    /// The chunk text, an exact substring of the document text
    pub text: String,
    /// Length of `text` in characters
    pub char_count: usize,
    /// Character offset where the chunk starts
    pub start_char: usize,
    /// Character offset one past the chunk end
    pub end_char: usize,
    /// Copy of the document metadata
    pub metadata: PolicyMetadata,
}

/// Configuration for content chunking, in characters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target (and maximum) chunk length
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        // An overlap as large as the chunk would never advance
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }

        Ok(())
    }
}

/// Identifier for the `chunk_index`-th chunk of `filename`
#[inline]
pub fn chunk_id(filename: &str, chunk_index: usize) -> String {
    let name = format!("{}:{}", filename, chunk_index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Splits document text into overlapping chunks
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Rejects configurations where the overlap is not smaller than the chunk size
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk a document, copying its metadata onto every chunk
    #[inline]
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        let source_path = document.source_path.to_string_lossy().to_string();

        let chunks: Vec<Chunk> = self
            .split_spans(&chars)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start, end))| Chunk {
                id: chunk_id(&document.filename, chunk_index),
                filename: document.filename.clone(),
                source_path: source_path.clone(),
                chunk_index,
                text: chars[start..end].iter().collect(),
                char_count: end - start,
                start_char: start,
                end_char: end,
                metadata: document.metadata.clone(),
            })
            .collect();

        debug!(
            "Chunked '{}' ({} chars) into {} chunks",
            document.filename,
            chars.len(),
            chunks.len()
        );

        chunks
    }

    /// Split raw text into chunk strings
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        self.split_spans(&chars)
            .into_iter()
            .map(|(start, end)| chars[start..end].iter().collect())
            .collect()
    }

    /// Character spans `[start, end)` of each chunk
    fn split_spans(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();

        if chars.iter().all(|c| c.is_whitespace()) {
            return spans;
        }

        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let len = chars.len();
        let mut start = 0;

        loop {
            if len - start <= size {
                spans.push((start, len));
                break;
            }

            let end = find_break(chars, start, size, overlap);
            spans.push((start, end));
            start = end - overlap;
        }

        spans
    }
}

/// Pick the end of a chunk starting at `start`.
///
/// The end always lies in `(start + overlap, start + size]` so the next chunk
/// starts strictly later. Within that window a paragraph break is preferred,
/// then a sentence end, then any whitespace, and finally a hard cut.
fn find_break(chars: &[char], start: usize, size: usize, overlap: usize) -> usize {
    let hard_end = start + size;
    let min_end = start + overlap + 1;
    let preferred_min = (start + size / 2).max(min_end);

    let paragraph_end = (preferred_min..=hard_end)
        .rev()
        .find(|&end| end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n');
    if let Some(end) = paragraph_end {
        return end;
    }

    let sentence_end = (preferred_min..=hard_end).rev().find(|&end| {
        end >= 2 && chars[end - 1].is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?')
    });
    if let Some(end) = sentence_end {
        return end;
    }

    (min_end..=hard_end)
        .rev()
        .find(|&end| chars[end - 1].is_whitespace())
        .unwrap_or(hard_end)
}
