//! Error types for the edgequake-pdf-translate library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`TranslateError`] — **Fatal**: the run cannot proceed at all (corrupt
//!   input, missing endpoint credential, extraction engine crash, unsavable
//!   output). Returned as `Err(TranslateError)` from the top-level
//!   `translate_pdf*` functions.
//!
//! * [`ApiError`] — **Transport**: one HTTP call to the language model failed.
//!   The API client returns it per call; the translation orchestrator turns it
//!   into an inline error string for that single text.
//!
//! * [`ElementError`] — **Non-fatal**: a single text, element or compression
//!   batch failed but the document is still produced. Collected into
//!   [`crate::output::TranslationOutput::warnings`] so callers can inspect
//!   partial success rather than losing the whole document to one bad span.

use crate::document::TextKind;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf-translate library.
///
/// Element-level failures use [`ElementError`] and are stored in
/// [`crate::output::TranslationOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum TranslateError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input is empty, corrupt, not a PDF, or has no pages.
    #[error("Invalid input PDF: {reason}")]
    Validation { reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Endpoint URL / credential missing, or builder validation failed.
    /// Raised before any network call is made.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    // ── Stage errors ──────────────────────────────────────────────────────
    /// The structure-extraction engine failed or returned malformed output.
    #[error("Structure extraction failed: {detail}")]
    Extraction { detail: String },

    /// Geometry or save failure after the fallback save was attempted.
    #[error("PDF reconstruction failed: {detail}")]
    Reconstruction { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create, write or read a temporary or output file.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (panicked blocking task, runtime failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TranslateError {
    /// Short name of the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            TranslateError::Validation { .. } => "validate",
            TranslateError::Configuration(_) => "configure",
            TranslateError::Extraction { .. } => "extract",
            TranslateError::Reconstruction { .. } => "reconstruct",
            TranslateError::Io { .. } => "io",
            TranslateError::Internal(_) => "internal",
        }
    }
}

/// A failed call to the language-model endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request did not complete within the configured timeout.
    #[error("Request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The endpoint answered with a non-2xx status code.
    #[error("Request to '{url}' failed with status code {status}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body was not valid JSON.
    #[error("Malformed JSON from '{url}': {detail}")]
    MalformedJson { url: String, detail: String },

    /// The JSON was valid but `choices[0].message.content` was absent.
    #[error("Response has no message content: {detail}")]
    MissingContent { detail: String },

    /// Connection refused, DNS failure, TLS error and other network faults.
    #[error("Network error for '{url}': {detail}")]
    Transport { url: String, detail: String },
}

impl ApiError {
    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A non-fatal error for a single text, element or compression batch.
///
/// The run continues; the error is reported in
/// [`crate::output::TranslationOutput::warnings`].
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ElementError {
    /// A text could not be translated; the output shows an error placeholder.
    #[error("Translation failed for {text:?}: {detail}")]
    Translation { text: String, detail: String },

    /// A text or table-cell element could not be redacted or overlaid.
    #[error("Page {page}: {kind} element skipped: {detail}")]
    Element {
        page: u32,
        kind: TextKind,
        detail: String,
    },

    /// A table cell came without a bounding box and was dropped.
    #[error("Page {page}: cell of table {table} has no bbox, dropped")]
    MissingCellBbox { page: u32, table: usize },

    /// The overlay font has no glyph for some translated characters. The text
    /// is still extractable but those characters render as the font's
    /// missing-glyph box.
    #[error("Font {font} has no glyphs for {chars:?}; set a font path covering the target script")]
    MissingGlyphs { font: String, chars: String },

    /// One batch of the image-compression pass failed.
    #[error("Image compression batch {batch} failed: {detail}")]
    Compression { batch: usize, detail: String },

    /// The whole compression pass failed; the uncompressed PDF was returned.
    #[error("Image compression skipped: {detail}")]
    CompressionSkipped { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let e = TranslateError::Validation {
            reason: "The PDF document is empty.".into(),
        };
        assert!(e.to_string().contains("empty"));
        assert_eq!(e.stage(), "validate");
    }

    #[test]
    fn status_error_carries_code() {
        let e = ApiError::Status {
            url: "http://localhost/v1/chat/completions".into(),
            status: 503,
            body: String::new(),
        };
        assert_eq!(e.status(), Some(503));
        assert!(e.to_string().contains("503"), "got: {e}");
    }

    #[test]
    fn timeout_display() {
        let e = ApiError::Timeout {
            url: "http://x".into(),
            secs: 600,
        };
        assert!(e.to_string().contains("600s"));
        assert_eq!(e.status(), None);
    }

    #[test]
    fn element_error_display() {
        let e = ElementError::Element {
            page: 3,
            kind: TextKind::TableCell,
            detail: "degenerate bbox".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 3"), "got: {msg}");
        assert!(msg.contains("table cell"), "got: {msg}");
    }

    #[test]
    fn missing_glyphs_names_font() {
        let e = ElementError::MissingGlyphs {
            font: "DejaVuSans".into(),
            chars: "你好".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("DejaVuSans"), "got: {msg}");
        assert!(msg.contains("你好"), "got: {msg}");
    }

    #[test]
    fn element_error_serialises() {
        let e = ElementError::MissingCellBbox { page: 1, table: 0 };
        let json = serde_json::to_string(&e).unwrap();
        let back: ElementError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
