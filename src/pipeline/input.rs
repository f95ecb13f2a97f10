//! Input validation and scratch files.
//!
//! ## Why validate before anything else?
//!
//! Extraction engines fail late and cryptically on truncated or non-PDF
//! input. Checking the header and loading the object graph up front turns
//! that into a single [`TranslateError::Validation`] before any file is
//! written or any request is sent.
//!
//! ## Why scratch files?
//!
//! The structure extractor and the reconstructor work on file-system paths.
//! [`ScratchFile`] wraps a `tempfile::NamedTempFile`, so the file is removed
//! when the guard drops, on success, on error and on panic alike.

use crate::error::TranslateError;
use lopdf::Document;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// The PDF header may be preceded by up to this many bytes of junk.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Facts gathered while validating an input PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPdf {
    pub page_count: usize,
}

/// Check that `bytes` is a readable PDF with at least one page.
pub fn validate_pdf(bytes: &[u8]) -> Result<ValidatedPdf, TranslateError> {
    if bytes.is_empty() {
        return Err(TranslateError::Validation {
            reason: "The uploaded file is empty.".into(),
        });
    }

    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if !window.windows(5).any(|w| w == b"%PDF-") {
        return Err(TranslateError::Validation {
            reason: "The file is not a PDF document.".into(),
        });
    }

    let doc = Document::load_mem(bytes).map_err(|e| TranslateError::Validation {
        reason: format!("Invalid PDF file: {e}"),
    })?;

    let page_count = doc.get_pages().len();
    if page_count == 0 {
        return Err(TranslateError::Validation {
            reason: "The PDF document is empty.".into(),
        });
    }

    info!("Validated PDF: {} pages, {} bytes", page_count, bytes.len());
    Ok(ValidatedPdf { page_count })
}

/// A temporary `.pdf` file deleted when dropped.
pub struct ScratchFile {
    file: NamedTempFile,
    label: &'static str,
}

impl ScratchFile {
    /// Create an empty scratch file; `label` only appears in logs.
    pub fn new(label: &'static str) -> Result<Self, TranslateError> {
        let file = tempfile::Builder::new()
            .prefix("pdf-translate-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| TranslateError::Io {
                path: std::env::temp_dir().display().to_string(),
                source: e,
            })?;
        debug!("Created temporary {} file {}", label, file.path().display());
        Ok(Self { file, label })
    }

    /// Create a scratch file holding `bytes`.
    pub fn with_contents(label: &'static str, bytes: &[u8]) -> Result<Self, TranslateError> {
        let scratch = Self::new(label)?;
        scratch.write(bytes)?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Replace the file contents with `bytes`.
    pub fn write(&self, bytes: &[u8]) -> Result<(), TranslateError> {
        let mut f = std::fs::File::create(self.path()).map_err(|e| self.io_error(e))?;
        f.write_all(bytes).map_err(|e| self.io_error(e))?;
        f.flush().map_err(|e| self.io_error(e))
    }

    pub fn read(&self) -> Result<Vec<u8>, TranslateError> {
        std::fs::read(self.path()).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> TranslateError {
        TranslateError::Io {
            path: self.path().display().to_string(),
            source,
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        debug!(
            "Removing temporary {} file {}",
            self.label,
            self.file.path().display()
        );
    }
}
