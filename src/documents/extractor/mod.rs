
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::{PolicyError, Result};

const DEFAULT_EXTRACTION_TIMEOUT_SECONDS: u64 = 60;

/// Pulls the plain text out of a source document
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Text extraction for PDF files, run on a worker thread with a deadline
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    timeout: Duration,
}

impl Default for PdfExtractor {
    #[inline]
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_EXTRACTION_TIMEOUT_SECONDS),
        }
    }
}

impl PdfExtractor {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn extract_from_bytes(&self, name: &str, data: Vec<u8>) -> Result<String> {
        let (tx, rx) = mpsc::channel();

        // A panicking parser drops the sender, which surfaces as Disconnected
        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(text)) => {
                let _ = handle.join();
                Ok(text)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                warn!("PDF parsing failed for {}: {}", name, e);
                Err(PolicyError::Extraction(format!(
                    "{} is not a readable PDF: {}",
                    name, e
                )))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                error!(
                    "PDF extraction for {} timed out after {:?}",
                    name, self.timeout
                );
                Err(PolicyError::Extraction(format!(
                    "{} timed out after {:?}",
                    name, self.timeout
                )))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                error!("PDF extraction thread crashed on {}", name);
                Err(PolicyError::Extraction(format!(
                    "{} could not be parsed",
                    name
                )))
            }
        }
    }
}

impl TextExtractor for PdfExtractor {
    #[inline]
    fn extract(&self, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let data = std::fs::read(path).map_err(|e| {
            PolicyError::Extraction(format!("failed to read {}: {}", path.display(), e))
        })?;

        debug!("Extracting text from {} ({} bytes)", name, data.len());

        let text = self.extract_from_bytes(&name, data)?;

        if text.trim().is_empty() {
            return Err(PolicyError::Extraction(format!(
                "{} contains no extractable text",
                name
            )));
        }

        Ok(text)
    }
}

/// Normalize extracted text: runs of whitespace containing a blank line become a
/// paragraph break, any other run becomes one space, and control characters go away.
#[inline]
pub fn clean_text(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut pending_space = false;
    let mut pending_newlines = 0usize;

    for c in raw.chars() {
        if c.is_whitespace() {
            pending_space = true;
            if c == '\n' {
                pending_newlines += 1;
            }
            continue;
        }

        if c.is_control() {
            continue;
        }

        if pending_space && !cleaned.is_empty() {
            if pending_newlines >= 2 {
                cleaned.push_str("\n\n");
            } else {
                cleaned.push(' ');
            }
        }
        pending_space = false;
        pending_newlines = 0;
        cleaned.push(c);
    }

    cleaned
}
