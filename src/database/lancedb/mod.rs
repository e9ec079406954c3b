// LanceDB vector database module
// Handles vector storage and similarity search for policy chunks

#[cfg(test)]
mod tests;

pub mod vector_store;

use crate::documents::PolicyMetadata;
use crate::embeddings::Chunk;

/// One row of the chunk table
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// Deterministic chunk id, the merge key
    pub id: String,
    pub vector: Vec<f32>,
    pub filename: String,
    pub chunk_index: u32,
    pub char_count: u32,
    pub start_char: u32,
    pub end_char: u32,
    pub text: String,
    pub metadata: PolicyMetadata,
    pub source_path: String,
    /// RFC 3339 timestamp of the ingest that wrote this row
    pub ingested_at: String,
}

impl ChunkRecord {
    #[inline]
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>, ingested_at: &str) -> Self {
        Self {
            id: chunk.id.clone(),
            vector,
            filename: chunk.filename.clone(),
            chunk_index: to_u32(chunk.chunk_index),
            char_count: to_u32(chunk.char_count),
            start_char: to_u32(chunk.start_char),
            end_char: to_u32(chunk.end_char),
            text: chunk.text.clone(),
            metadata: chunk.metadata.clone(),
            source_path: chunk.source_path.clone(),
            ingested_at: ingested_at.to_string(),
        }
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Quote a value as a SQL string literal for LanceDB predicates
#[inline]
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
