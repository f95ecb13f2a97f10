//! Result types returned by the translation entry points.

use crate::error::ElementError;
use serde::{Deserialize, Serialize};

/// The translated PDF plus everything the pipeline absorbed on the way.
#[derive(Debug, Clone)]
pub struct TranslationOutput {
    /// Finalised (and, when possible, image-compressed) PDF bytes.
    pub pdf: Vec<u8>,

    /// Non-fatal problems: failed translations, skipped elements,
    /// failed compression batches. Empty on a clean run.
    pub warnings: Vec<ElementError>,

    pub stats: TranslationStats,
}

impl TranslationOutput {
    /// Whether any non-fatal problem was recorded.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationStats {
    /// Pages in the document model.
    pub total_pages: usize,
    /// Body-text elements across all pages.
    pub text_elements: usize,
    /// Table cells across all pages (counted even when tables are not translated).
    pub table_cells: usize,
    /// Distinct strings sent for translation.
    pub unique_texts: usize,
    /// Distinct strings whose translation degraded to an error placeholder.
    pub failed_translations: usize,
    /// Elements redacted and overlaid.
    pub replaced_elements: usize,
    /// Elements skipped because of a per-element failure.
    pub skipped_elements: usize,
    /// Embedded images re-encoded by the compression pass.
    pub compressed_images: usize,
    /// Whether the finalisation had to use the plain fallback save.
    pub used_fallback_save: bool,
    pub extract_duration_ms: u64,
    pub translate_duration_ms: u64,
    pub reconstruct_duration_ms: u64,
    pub compress_duration_ms: u64,
    pub total_duration_ms: u64,
}
