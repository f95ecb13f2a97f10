//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn TranslationProgressCallback>`] via
//! [`crate::config::TranslationConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages. The pipeline keeps no
//! process-wide state; the observer is the only channel out of a run.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf_translate::{PipelineStage, TranslationConfig, TranslationProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl TranslationProgressCallback for Printer {
//!     fn on_stage(&self, stage: PipelineStage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = TranslationConfig::builder()
//!     .target_lang("French")
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ElementError;
use std::fmt;
use std::sync::Arc;

/// States of the pipeline state machine, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Validate,
    Extract,
    Translate,
    Reconstruct,
    Compress,
    Cleanup,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Validate => "validate",
            PipelineStage::Extract => "extract",
            PipelineStage::Translate => "translate",
            PipelineStage::Reconstruct => "reconstruct",
            PipelineStage::Compress => "compress",
            PipelineStage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as it processes a document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`: translation
/// windows run concurrently on the Tokio runtime.
pub trait TranslationProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage(&self, stage: PipelineStage) {
        let _ = stage;
    }

    /// Called after the document model is built.
    ///
    /// # Arguments
    /// * `total_pages`  — pages in the document model
    /// * `unique_texts` — distinct strings that will be translated
    fn on_document_ready(&self, total_pages: usize, unique_texts: usize) {
        let _ = (total_pages, unique_texts);
    }

    /// Called after each translation window completes.
    ///
    /// # Arguments
    /// * `window`        — 1-indexed window number
    /// * `total_windows` — number of windows in this run
    /// * `failed`        — items in this window that degraded to an error string
    fn on_window_complete(&self, window: usize, total_windows: usize, failed: usize) {
        let _ = (window, total_windows, failed);
    }

    /// Called after a page has been redacted and overlaid.
    fn on_page_complete(&self, page_no: u32, total_pages: usize) {
        let _ = (page_no, total_pages);
    }

    /// Called for each non-fatal problem absorbed by the pipeline.
    fn on_warning(&self, warning: &ElementError) {
        let _ = warning;
    }

    /// Called once when the run produced output bytes.
    fn on_complete(&self, output_bytes: usize, warnings: usize) {
        let _ = (output_bytes, warnings);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TranslationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TranslationConfig`].
pub type ProgressCallback = Arc<dyn TranslationProgressCallback>;
