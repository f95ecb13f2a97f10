//! Full-document translation entry points.
//!
//! [`translate_pdf`] drives one run through the stage machine
//!
//! ```text
//! Validate → Extract → Translate → Reconstruct → Compress → Cleanup
//! ```
//!
//! and ends in either `Ok(TranslationOutput)` or a single typed
//! [`TranslateError`] naming the fatal stage. Per-item problems never end a
//! run; they are collected as warnings on the output.
//!
//! ## Why scratch files?
//!
//! The extractor and reconstructor read the input from disk and compression
//! re-opens the finalised output. Both files are [`ScratchFile`] guards,
//! removed when the run returns, whichever way it returns.

use crate::config::{EndpointConfig, TranslationConfig};
use crate::error::{ElementError, TranslateError};
use crate::output::{TranslationOutput, TranslationStats};
use crate::pipeline::compress::{compress_pdf, Compression};
use crate::pipeline::extract::{extract_document, StructureExtractor};
use crate::pipeline::font::OverlayFont;
use crate::pipeline::input::{validate_pdf, ScratchFile};
use crate::pipeline::llm::Translator;
use crate::pipeline::reconstruct::{reconstruct_document, ReconstructJob};
use crate::progress::{PipelineStage, ProgressCallback};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Translate a PDF held in memory.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `bytes`     — the uploaded PDF
/// * `config`    — languages, table handling, batching, compression
/// * `endpoint`  — chat-completions endpoint and credential
/// * `extractor` — structure-extraction engine producing the layout model
///
/// # Errors
/// Returns `Err(TranslateError)` only for fatal errors:
/// - `Validation`: empty, corrupt or non-PDF input, or zero pages
/// - `Configuration`: missing endpoint URL or credential (before any request),
///   or an unreadable `font_path`
/// - `Extraction`: the engine failed or returned malformed output
/// - `Reconstruction`: the document could not be saved even with the fallback
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf_translate::{
///     translate_pdf, CommandExtractor, EndpointConfig, TranslationConfig,
/// };
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("report.pdf")?;
/// let config = TranslationConfig::builder()
///     .source_lang("English")
///     .target_lang("French")
///     .build()?;
/// let endpoint = EndpointConfig::from_env();
/// let extractor = Arc::new(CommandExtractor::new("docling-export"));
/// let output = translate_pdf(&bytes, &config, &endpoint, extractor).await?;
/// std::fs::write("report.fr.pdf", &output.pdf)?;
/// # Ok(())
/// # }
/// ```
pub async fn translate_pdf(
    bytes: &[u8],
    config: &TranslationConfig,
    endpoint: &EndpointConfig,
    extractor: Arc<dyn StructureExtractor>,
) -> Result<TranslationOutput, TranslateError> {
    run(bytes, config, endpoint, extractor, compress_pdf).await
}

/// [`translate_pdf`] with the image-compression pass supplied by the caller.
async fn run<C>(
    bytes: &[u8],
    config: &TranslationConfig,
    endpoint: &EndpointConfig,
    extractor: Arc<dyn StructureExtractor>,
    compress: C,
) -> Result<TranslationOutput, TranslateError>
where
    C: FnOnce(&[u8], usize, u8) -> Compression + Send + 'static,
{
    let total_start = Instant::now();
    let observer = Observer(config.progress_callback.clone());
    info!(
        "Starting translation: {} → {}, {} bytes",
        config.source_lang,
        config.target_lang,
        bytes.len()
    );

    // ── Validate ─────────────────────────────────────────────────────────
    observer.stage(PipelineStage::Validate);
    let validated = validate_pdf(bytes)?;
    let translator = Translator::new(endpoint, &config.source_lang, &config.target_lang)?
        .with_batch_size(config.batch_size)
        .with_progress(config.progress_callback.clone());
    let font = Arc::new(OverlayFont::load(config.font_path.as_deref())?);

    let input_file = ScratchFile::with_contents("input", bytes)?;
    let output_file = ScratchFile::new("output")?;
    let mut warnings: Vec<ElementError> = Vec::new();

    // ── Extract ──────────────────────────────────────────────────────────
    observer.stage(PipelineStage::Extract);
    let extract_start = Instant::now();
    let extracted = extract_document(extractor, input_file.path()).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    observer.absorb(&mut warnings, extracted.warnings);

    let model = Arc::new(extracted.model);
    if model.page_count() != validated.page_count {
        debug!(
            "Engine reported {} pages, PDF has {}",
            model.page_count(),
            validated.page_count
        );
    }
    let texts = model.unique_texts(config.include_tables);
    observer.document_ready(model.page_count(), texts.len());

    // ── Translate ────────────────────────────────────────────────────────
    observer.stage(PipelineStage::Translate);
    let translate_start = Instant::now();
    let (translations, failures) = translator.build_translation_map(&texts).await;
    let translate_duration_ms = translate_start.elapsed().as_millis() as u64;
    let failed_translations = failures.len();
    observer.absorb(&mut warnings, failures);
    info!(
        "Translated {} distinct texts ({} failed) in {}ms",
        texts.len(),
        failed_translations,
        translate_duration_ms
    );

    // ── Reconstruct ──────────────────────────────────────────────────────
    observer.stage(PipelineStage::Reconstruct);
    let reconstruct_start = Instant::now();
    let job = ReconstructJob {
        model: Arc::clone(&model),
        translations: Arc::new(translations),
        layer_name: config.layer_name(),
        include_tables: config.include_tables,
        font,
        progress: config.progress_callback.clone(),
    };
    let reconstruction = reconstruct_document(input_file.path(), job).await?;
    let reconstruct_duration_ms = reconstruct_start.elapsed().as_millis() as u64;
    output_file.write(&reconstruction.pdf)?;
    observer.absorb(&mut warnings, reconstruction.warnings);

    // ── Compress ─────────────────────────────────────────────────────────
    let compress_start = Instant::now();
    let compression = if config.compress_images {
        observer.stage(PipelineStage::Compress);
        compress_output(&output_file, config, compress).await?
    } else {
        Compression {
            pdf: reconstruction.pdf,
            images: 0,
            warnings: Vec::new(),
        }
    };
    let compress_duration_ms = compress_start.elapsed().as_millis() as u64;
    observer.absorb(&mut warnings, compression.warnings);

    // ── Cleanup ──────────────────────────────────────────────────────────
    observer.stage(PipelineStage::Cleanup);
    drop(input_file);
    drop(output_file);

    let (text_elements, table_cells) = model.element_counts();
    let stats = TranslationStats {
        total_pages: model.page_count(),
        text_elements,
        table_cells,
        unique_texts: texts.len(),
        failed_translations,
        replaced_elements: reconstruction.replaced,
        skipped_elements: reconstruction.skipped,
        compressed_images: compression.images,
        used_fallback_save: reconstruction.used_fallback,
        extract_duration_ms,
        translate_duration_ms,
        reconstruct_duration_ms,
        compress_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Translation complete: {} pages, {} elements replaced, {} warnings, {}ms total",
        stats.total_pages,
        stats.replaced_elements,
        warnings.len(),
        stats.total_duration_ms
    );
    observer.complete(compression.pdf.len(), warnings.len());

    Ok(TranslationOutput {
        pdf: compression.pdf,
        warnings,
        stats,
    })
}

/// Translate `input_path` and write the result to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn translate_pdf_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &TranslationConfig,
    endpoint: &EndpointConfig,
    extractor: Arc<dyn StructureExtractor>,
) -> Result<TranslationOutput, TranslateError> {
    let input = input_path.as_ref();
    let bytes = tokio::fs::read(input)
        .await
        .map_err(|e| TranslateError::Io {
            path: input.display().to_string(),
            source: e,
        })?;

    let output = translate_pdf(&bytes, config, endpoint, extractor).await?;

    let path = output_path.as_ref();
    let io_err = |e: std::io::Error| TranslateError::Io {
        path: path.display().to_string(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &output.pdf)
        .await
        .map_err(io_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(io_err)?;

    Ok(output)
}

/// Synchronous wrapper around [`translate_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn translate_pdf_sync(
    bytes: &[u8],
    config: &TranslationConfig,
    endpoint: &EndpointConfig,
    extractor: Arc<dyn StructureExtractor>,
) -> Result<TranslationOutput, TranslateError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TranslateError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(translate_pdf(bytes, config, endpoint, extractor))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Re-open the finalised output and compress its images.
///
/// A panicked compression task is absorbed like any other compression
/// failure: the finalised file is read back and returned as is.
async fn compress_output<C>(
    output_file: &ScratchFile,
    config: &TranslationConfig,
    compress: C,
) -> Result<Compression, TranslateError>
where
    C: FnOnce(&[u8], usize, u8) -> Compression + Send + 'static,
{
    let finalized = output_file.read()?;
    let batch = config.compression_batch_size;
    let quality = config.image_quality;

    match tokio::task::spawn_blocking(move || compress(&finalized, batch, quality)).await {
        Ok(compression) => Ok(compression),
        Err(e) => {
            warn!("Image compression task failed: {}", e);
            Ok(Compression {
                pdf: output_file.read()?,
                images: 0,
                warnings: vec![ElementError::CompressionSkipped {
                    detail: e.to_string(),
                }],
            })
        }
    }
}

/// Optional progress observer for one run.
struct Observer(Option<ProgressCallback>);

impl Observer {
    fn stage(&self, stage: PipelineStage) {
        debug!("Entering stage {}", stage);
        if let Some(ref cb) = self.0 {
            cb.on_stage(stage);
        }
    }

    fn document_ready(&self, total_pages: usize, unique_texts: usize) {
        if let Some(ref cb) = self.0 {
            cb.on_document_ready(total_pages, unique_texts);
        }
    }

    /// Move `new` into `warnings`, notifying the observer of each.
    fn absorb(&self, warnings: &mut Vec<ElementError>, new: Vec<ElementError>) {
        if let Some(ref cb) = self.0 {
            for w in &new {
                cb.on_warning(w);
            }
        }
        warnings.extend(new);
    }

    fn complete(&self, output_bytes: usize, warnings: usize) {
        if let Some(ref cb) = self.0 {
            cb.on_complete(output_bytes, warnings);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::compress::compress_pdf_with;
    use crate::pipeline::extract::RawDocument;
    use lopdf::{dictionary, Document, Object, Stream};
    use std::path::PathBuf;

    fn config() -> TranslationConfig {
        TranslationConfig::builder()
            .target_lang("French")
            .build()
            .unwrap()
    }

    fn never_called() -> Arc<dyn StructureExtractor> {
        Arc::new(|_: &Path| -> Result<RawDocument, TranslateError> {
            panic!("extractor must not run")
        })
    }

    /// A one-page PDF with no text, saved to bytes.
    fn blank_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 m 10 10 l S".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 600.into(), 800.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    /// An engine reporting one page and no text, so no request is sent.
    fn empty_layout() -> Arc<dyn StructureExtractor> {
        Arc::new(|_: &Path| {
            RawDocument::from_json(r#"{"pages": {"1": {"size": {"width": 600, "height": 800}}}}"#)
        })
    }

    fn unreachable_endpoint() -> EndpointConfig {
        EndpointConfig::new("http://127.0.0.1:9", "k", "m")
    }

    #[tokio::test]
    async fn failing_compression_batches_still_return_the_document() {
        let output = run(
            &blank_pdf(),
            &config(),
            &unreachable_endpoint(),
            empty_layout(),
            |pdf: &[u8], batch: usize, _quality: u8| {
                compress_pdf_with(pdf, batch, |_, _| Err("encoder unavailable".to_string()))
            },
        )
        .await
        .unwrap();

        let doc = Document::load_mem(&output.pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(output.stats.compressed_images, 0);
        assert_eq!(
            output.warnings,
            vec![ElementError::Compression {
                batch: 1,
                detail: "encoder unavailable".into(),
            }]
        );
    }

    #[tokio::test]
    async fn panicking_compression_is_skipped() {
        let output = run(
            &blank_pdf(),
            &config(),
            &unreachable_endpoint(),
            empty_layout(),
            |_: &[u8], _: usize, _: u8| -> Compression { panic!("encoder crashed") },
        )
        .await
        .unwrap();

        assert!(Document::load_mem(&output.pdf).is_ok());
        assert!(matches!(
            output.warnings.as_slice(),
            [ElementError::CompressionSkipped { .. }]
        ));
    }

    #[tokio::test]
    async fn unreadable_font_path_is_a_configuration_error() {
        let config = TranslationConfig::builder()
            .target_lang("Thai")
            .font_path("/nonexistent/NotoSansThai-Regular.ttf")
            .build()
            .unwrap();
        let err = translate_pdf(&blank_pdf(), &config, &unreachable_endpoint(), never_called())
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::Configuration(_)), "got: {err}");
    }

    #[tokio::test]
    async fn invalid_bytes_fail_validation_first() {
        let endpoint = EndpointConfig::new("", "", "m");
        let err = translate_pdf(b"not a pdf", &config(), &endpoint, never_called())
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::Validation { .. }));
    }

    #[tokio::test]
    async fn missing_input_file_is_io_error() {
        let endpoint = EndpointConfig::new("http://127.0.0.1:9", "k", "m");
        let err = translate_pdf_file(
            PathBuf::from("/nonexistent/input.pdf"),
            PathBuf::from("/tmp/out.pdf"),
            &config(),
            &endpoint,
            never_called(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TranslateError::Io { .. }));
    }
}
