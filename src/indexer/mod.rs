// Indexer module
// Ingests a directory of policy PDFs into the passage index


use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::documents::{Document, MetadataCatalog, PolicyMetadata, TextExtractor, clean_text};
use crate::embeddings::Chunker;
use crate::index::PassageIndex;
use crate::{PolicyError, Result};

/// What happened to one file during ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Indexed {
        chunks: usize,
        /// Chunks left over from a longer previous version, now removed
        pruned: usize,
        /// Set when the new chunks were stored but stale ones could not be removed
        warning: Option<String>,
    },
    Failed {
        error: String,
    },
}

/// Counts for one successfully stored file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub chunks: usize,
    pub pruned: usize,
    pub prune_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub filename: String,
    pub status: FileStatus,
}

/// Summary of a directory ingest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files: Vec<FileOutcome>,
    /// Metadata rows that named no PDF in the directory
    pub unmatched_metadata: Vec<String>,
}

impl IngestReport {
    #[inline]
    pub fn total_chunks(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.status {
                FileStatus::Indexed { chunks, .. } => chunks,
                FileStatus::Failed { .. } => 0,
            })
            .sum()
    }

    #[inline]
    pub fn indexed_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Indexed { .. }))
            .count()
    }

    #[inline]
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().filter_map(|f| match &f.status {
            FileStatus::Failed { error } => Some((f.filename.as_str(), error.as_str())),
            FileStatus::Indexed { .. } => None,
        })
    }

    #[inline]
    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// At least one file made it into the index
    #[inline]
    pub fn is_success(&self) -> bool {
        self.indexed_count() > 0
    }
}

/// Extracts, chunks and indexes policy documents one file at a time
pub struct Indexer {
    index: Arc<dyn PassageIndex>,
    chunker: Chunker,
    extractor: Arc<dyn TextExtractor>,
    show_progress: bool,
}

impl Indexer {
    #[inline]
    pub fn new(
        index: Arc<dyn PassageIndex>,
        chunker: Chunker,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            index,
            chunker,
            extractor,
            show_progress: false,
        }
    }

    /// Draw a progress bar on an interactive terminal
    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// PDF files directly inside `dir`, sorted by name
    #[inline]
    pub fn find_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(PolicyError::Config(format!(
                "document directory {} does not exist",
                dir.display()
            )));
        }

        let mut pdfs = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_pdf = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if is_pdf && path.is_file() {
                pdfs.push(path);
            }
        }

        pdfs.sort();
        Ok(pdfs)
    }

    /// Ingest every PDF in `dir`; a failing file is recorded and skipped
    #[inline]
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        catalog: &MetadataCatalog,
    ) -> Result<IngestReport> {
        let pdfs = Self::find_pdfs(dir)?;
        if pdfs.is_empty() {
            return Err(PolicyError::Config(format!(
                "no PDF files found in {}",
                dir.display()
            )));
        }

        info!("Ingesting {} PDF files from {}", pdfs.len(), dir.display());

        let filenames: Vec<String> = pdfs.iter().map(|p| file_name(p)).collect();
        let mut report = IngestReport {
            files: Vec::with_capacity(pdfs.len()),
            unmatched_metadata: catalog
                .unmatched(&filenames)
                .into_iter()
                .map(str::to_string)
                .collect(),
        };

        let bar = if self.show_progress && console::user_attended_stderr() {
            ProgressBar::new(pdfs.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        for (path, filename) in pdfs.iter().zip(filenames) {
            bar.set_message(filename.clone());

            let status = match self.ingest_file(path, catalog.lookup(&filename)).await {
                Ok(indexed) => {
                    info!("Indexed {} ({} chunks)", filename, indexed.chunks);
                    FileStatus::Indexed {
                        chunks: indexed.chunks,
                        pruned: indexed.pruned,
                        warning: indexed.prune_error,
                    }
                }
                Err(e) => {
                    warn!("Skipping {}: {}", filename, e);
                    FileStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };

            report.files.push(FileOutcome { filename, status });
            bar.inc(1);
        }

        bar.finish_and_clear();

        info!(
            "Ingest finished: {} indexed, {} failed, {} chunks",
            report.indexed_count(),
            report.failed_count(),
            report.total_chunks()
        );
        Ok(report)
    }

    /// Index one file, then remove chunks left over from a longer earlier version.
    ///
    /// Once the upsert succeeded the file counts as indexed; a failed prune is
    /// reported in [`IndexedFile::prune_error`] rather than as an error.
    #[inline]
    pub async fn ingest_file(&self, path: &Path, metadata: PolicyMetadata) -> Result<IndexedFile> {
        let filename = file_name(path);

        let extractor = Arc::clone(&self.extractor);
        let source = path.to_path_buf();
        let raw = tokio::task::spawn_blocking(move || extractor.extract(&source))
            .await
            .map_err(|e| PolicyError::Extraction(format!("extraction task failed: {}", e)))??;

        let text = clean_text(&raw);
        if text.is_empty() {
            return Err(PolicyError::Extraction(format!(
                "{} contains no extractable text",
                filename
            )));
        }

        let document = Document::new(filename.as_str(), path, text, metadata);
        let chunks = self.chunker.chunk(&document);
        drop(document);

        debug!("{} produced {} chunks", filename, chunks.len());

        let stored = self.index.upsert(&chunks).await?;
        let (pruned, prune_error) = match self.index.prune_document(&filename, chunks.len()).await {
            Ok(pruned) => {
                if pruned > 0 {
                    info!("Removed {} stale chunks of {}", pruned, filename);
                }
                (pruned, None)
            }
            Err(e) => {
                warn!("Stored {} but could not remove its stale chunks: {}", filename, e);
                (0, Some(format!("stale chunks not removed: {}", e)))
            }
        };

        Ok(IndexedFile {
            chunks: stored,
            pruned,
            prune_error,
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
