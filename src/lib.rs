//! # edgequake-pdf-translate
//!
//! Translate PDF documents while keeping their layout.
//!
//! ## Why this crate?
//!
//! Copying text out of a PDF, translating it and typesetting it again loses
//! the original page design: columns, figures, tables and fonts. This crate
//! instead locates every text block with a layout-extraction engine, asks a
//! chat-completion model to translate each distinct string once, removes the
//! source text from the page and draws the translation in the same box. The
//! translation lives on its own optional content layer, so readers can toggle
//! between the original and the translated view.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Validate     non-empty, well-formed, at least one page
//!  ├─ 2. Extract      layout engine → top-down DocumentModel (spawn_blocking)
//!  ├─ 3. Translate    distinct strings, windows of concurrent chat calls
//!  ├─ 4. Reconstruct  redact source text, overlay on "<lang> Translation" layer
//!  │                  in an embedded TrueType font
//!  ├─ 5. Compress     re-encode embedded JPEGs in page batches
//!  └─ 6. Cleanup      scratch files removed on every exit path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf_translate::{
//!     translate_pdf, CommandExtractor, EndpointConfig, TranslationConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // TRANSLATION_API_URL / TRANSLATION_API_TOKEN / TRANSLATION_MODEL
//!     let endpoint = EndpointConfig::from_env();
//!     let config = TranslationConfig::builder()
//!         .source_lang("English")
//!         .target_lang("Thai")
//!         .include_tables(true)
//!         // The bundled DejaVu Sans has no Thai glyphs.
//!         .font_path("/usr/share/fonts/noto/NotoSansThai-Regular.ttf")
//!         .build()?;
//!     let extractor = Arc::new(CommandExtractor::new("docling-export"));
//!
//!     let bytes = std::fs::read("paper.pdf")?;
//!     let output = translate_pdf(&bytes, &config, &endpoint, extractor).await?;
//!     std::fs::write("paper.th.pdf", &output.pdf)?;
//!     for w in &output.warnings {
//!         eprintln!("warning: {w}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! A run either returns PDF bytes or one [`TranslateError`]. Problems with a
//! single text, element or image batch are recorded as [`ElementError`]s in
//! [`TranslationOutput::warnings`]; failed translations also show up in the
//! document as `"Translation error: …"` text.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod translate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EndpointConfig, TranslationConfig, TranslationConfigBuilder};
pub use document::{BBox, DocumentModel, TextKind, TranslationMap};
pub use error::{ApiError, ElementError, TranslateError};
pub use output::{TranslationOutput, TranslationStats};
pub use pipeline::extract::{CommandExtractor, JsonExtractor, RawDocument, StructureExtractor};
pub use pipeline::font::OverlayFont;
pub use pipeline::llm::{translate_batch, translate_text, Translator};
pub use progress::{
    NoopProgressCallback, PipelineStage, ProgressCallback, TranslationProgressCallback,
};
pub use translate::{translate_pdf, translate_pdf_file, translate_pdf_sync};
