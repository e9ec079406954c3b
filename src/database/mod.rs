// Database module
// LanceDB storage for chunk vectors and their metadata

pub mod lancedb;

pub use lancedb::vector_store::{SearchResult, VectorStore};
pub use lancedb::{ChunkRecord, sql_literal};
