// Index module
// Embeds chunks into the vector store and answers filtered similarity queries


use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::{ChunkRecord, VectorStore, sql_literal};
use crate::documents::{MetadataField, PolicyMetadata};
use crate::embeddings::{Chunk, Embedder};
use crate::{PolicyError, Result};

/// Exact-match metadata restrictions; every entry must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter(BTreeMap<MetadataField, String>);

impl MetadataFilter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from `(key, value)` pairs, rejecting unknown or unfilterable keys
    #[inline]
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filter = Self::new();
        for (key, value) in pairs {
            let field = key.parse::<MetadataField>().map_err(PolicyError::InvalidFilter)?;
            filter.insert(field, value)?;
        }
        Ok(filter)
    }

    /// Parse `key=value`
    #[inline]
    pub fn parse_assignment(assignment: &str) -> Result<(MetadataField, String)> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            PolicyError::InvalidFilter(format!("expected key=value, got '{}'", assignment))
        })?;
        let field = key.parse::<MetadataField>().map_err(PolicyError::InvalidFilter)?;
        Ok((field, value.trim().to_string()))
    }

    #[inline]
    pub fn with(mut self, field: MetadataField, value: impl Into<String>) -> Result<Self> {
        self.insert(field, value)?;
        Ok(self)
    }

    /// Set one restriction, replacing any previous value for the field
    #[inline]
    pub fn insert(&mut self, field: MetadataField, value: impl Into<String>) -> Result<()> {
        if !field.is_filterable() {
            return Err(PolicyError::InvalidFilter(format!(
                "'{}' cannot be used as a filter",
                field
            )));
        }

        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(PolicyError::InvalidFilter(format!(
                "empty value for '{}'",
                field
            )));
        }

        self.0.insert(field, value);
        Ok(())
    }

    #[inline]
    pub fn remove(&mut self, field: MetadataField) -> Option<String> {
        self.0.remove(&field)
    }

    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (MetadataField, &str)> {
        self.0.iter().map(|(field, value)| (*field, value.as_str()))
    }

    /// SQL predicate for the store, `None` when unrestricted
    #[inline]
    pub fn to_predicate(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }

        Some(
            self.0
                .iter()
                .map(|(field, value)| format!("{} = {}", field.column_name(), sql_literal(value)))
                .collect::<Vec<_>>()
                .join(" AND "),
        )
    }

    /// Whether a passage with this filename and metadata satisfies every restriction
    #[inline]
    pub fn matches(&self, filename: &str, metadata: &PolicyMetadata) -> bool {
        self.0.iter().all(|(field, value)| match field {
            MetadataField::Filename => filename == value,
            other => metadata.get(*other) == Some(value.as_str()),
        })
    }
}

impl fmt::Display for MetadataFilter {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }

        let rendered = self
            .0
            .iter()
            .map(|(field, value)| format!("{}={}", field, value))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&rendered)
    }
}

/// A stored chunk returned for a query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedPassage {
    pub text: String,
    pub filename: String,
    pub chunk_index: usize,
    pub metadata: PolicyMetadata,
    /// Cosine distance to the query, lower is closer
    pub distance: f32,
}

/// Storage of embedded chunks
#[async_trait]
pub trait PassageIndex: Send + Sync {
    /// Embed and store chunks, replacing entries with the same id
    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize>;

    /// Up to `k` passages nearest to `text` that satisfy `filter`, nearest first
    async fn query(
        &self,
        text: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievedPassage>>;

    /// Remove chunks of `filename` with an index of `keep` or more
    async fn prune_document(&self, filename: &str, keep: usize) -> Result<usize>;
}

/// LanceDB-backed passage index
pub struct PolicyIndex {
    embedder: Arc<dyn Embedder>,
    index_path: PathBuf,
    max_distance: f32,
    store: OnceCell<VectorStore>,
}

impl PolicyIndex {
    /// The store is opened on first use
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, index_path: impl Into<PathBuf>, max_distance: f32) -> Self {
        Self {
            embedder,
            index_path: index_path.into(),
            max_distance,
            store: OnceCell::new(),
        }
    }

    #[inline]
    pub fn from_config(config: &Config, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(embedder, config.index_path(), config.retrieval.max_distance)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.index_path
    }

    #[inline]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    async fn store(&self) -> Result<&VectorStore> {
        self.store
            .get_or_try_init(|| VectorStore::open(&self.index_path))
            .await
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        let count = texts.len();

        let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| PolicyError::Embedding(format!("embedding task failed: {}", e)))?
            .map_err(|e| PolicyError::Embedding(format!("{:#}", e)))?;

        if vectors.len() != count {
            return Err(PolicyError::Embedding(format!(
                "expected {} vectors, got {}",
                count,
                vectors.len()
            )));
        }

        Ok(vectors)
    }

    /// Delete every chunk of a document
    #[inline]
    pub async fn remove_document(&self, filename: &str) -> Result<usize> {
        let store = self.store().await?;
        let predicate = format!("filename = {}", sql_literal(filename));

        let removed = store.count_rows(Some(predicate.clone())).await?;
        if removed > 0 {
            store.delete(&predicate).await?;
            info!("Removed {} chunks of {}", removed, filename);
        }

        Ok(removed)
    }

    /// Stored chunk ids of a document, in chunk order
    #[inline]
    pub async fn chunk_ids(&self, filename: &str) -> Result<Vec<String>> {
        let ids = self.store().await?.chunk_ids(filename).await?;
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    /// Total number of stored chunks
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.store().await?.count_rows(None).await
    }

    /// Chunk count per indexed document
    #[inline]
    pub async fn document_counts(&self) -> Result<BTreeMap<String, usize>> {
        self.store()
            .await?
            .value_counts(MetadataField::Filename.column_name())
            .await
    }

    /// Sorted distinct values of a metadata field across the index
    #[inline]
    pub async fn distinct_values(&self, field: MetadataField) -> Result<Vec<String>> {
        let counts = self.store().await?.value_counts(field.column_name()).await?;
        Ok(counts.into_keys().collect())
    }

    /// Drop all indexed content
    #[inline]
    pub async fn reset(&self) -> Result<()> {
        self.store().await?.drop_table().await?;
        info!("Index at {} reset", self.index_path.display());
        Ok(())
    }
}

#[async_trait]
impl PassageIndex for PolicyIndex {
    #[inline]
    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed(texts).await?;

        let ingested_at = chrono::Utc::now().to_rfc3339();
        let records: Vec<ChunkRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| ChunkRecord::from_chunk(chunk, vector, &ingested_at))
            .collect();

        let stored = self.store().await?.upsert(&records).await?;
        debug!(
            "Indexed {} chunks with {}",
            stored,
            self.embedder.model_name()
        );
        Ok(stored)
    }

    #[inline]
    async fn query(
        &self,
        text: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievedPassage>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut vectors = self.embed(vec![text.to_string()]).await?;
        let query_vector = vectors
            .pop()
            .ok_or_else(|| PolicyError::Embedding("no vector for query".to_string()))?;

        let predicate = filter.to_predicate();
        let results = self
            .store()
            .await?
            .search(&query_vector, k, predicate.as_deref())
            .await?;

        let found = results.len();
        let passages: Vec<RetrievedPassage> = results
            .into_iter()
            .filter(|r| r.distance <= self.max_distance)
            .map(|r| RetrievedPassage {
                text: r.text,
                filename: r.filename,
                chunk_index: r.chunk_index as usize,
                metadata: r.metadata,
                distance: r.distance,
            })
            .collect();

        debug!(
            "Query matched {} passages, {} within distance {} (filter: {})",
            found,
            passages.len(),
            self.max_distance,
            filter
        );
        Ok(passages)
    }

    #[inline]
    async fn prune_document(&self, filename: &str, keep: usize) -> Result<usize> {
        let store = self.store().await?;
        let predicate = format!(
            "filename = {} AND chunk_index >= {}",
            sql_literal(filename),
            keep
        );

        let stale = store.count_rows(Some(predicate.clone())).await?;
        if stale > 0 {
            store.delete(&predicate).await?;
            debug!("Pruned {} stale chunks of {}", stale, filename);
        }

        Ok(stale)
    }
}
