//! PDF reconstruction: redact source text and overlay translations.
//!
//! For every page of the [`DocumentModel`], each translated element is
//! located by its bounding box, its source text is removed from the page
//! content and its translation is drawn in the same box on a single
//! toggleable layer named after the target language. The overlay font is
//! embedded once, after all pages are drawn, covering exactly the characters
//! used. The document is then finalised with an optimised save, falling back
//! to a plain save.
//!
//! ## Why spawn_blocking?
//!
//! Parsing, rewriting and serialising a PDF is synchronous CPU work. Running
//! it on the blocking pool keeps the Tokio workers free for other runs.
//!
//! ## Failure model
//!
//! A problem with one element (degenerate box, unreadable page content,
//! page missing from the PDF) is recorded as an [`ElementError`] and the
//! element is skipped. Characters the overlay font cannot draw are reported
//! once as [`ElementError::MissingGlyphs`]. Only a document that cannot be
//! opened or saved at all fails the stage.

use crate::document::{DocumentModel, TextKind, TranslationMap};
use crate::error::{ElementError, TranslateError};
use crate::pipeline::font::{GlyphEncoder, OverlayFont};
use crate::pipeline::overlay::{
    create_layer, overlay_operations, register_resources, OverlayText,
};
use crate::pipeline::pdf::{
    media_box, page_resources, read_page_content, set_page_resources, write_page_content,
    PdfRect,
};
use crate::pipeline::redact::{cover_operations, page_fonts, redact_text};
use crate::progress::ProgressCallback;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of reconstructing one document.
#[derive(Debug, Default)]
pub struct Reconstruction {
    pub pdf: Vec<u8>,
    pub warnings: Vec<ElementError>,
    pub replaced: usize,
    pub skipped: usize,
    pub used_fallback: bool,
}

/// Inputs of one reconstruction run.
#[derive(Clone)]
pub struct ReconstructJob {
    pub model: Arc<DocumentModel>,
    pub translations: Arc<TranslationMap>,
    pub layer_name: String,
    pub include_tables: bool,
    pub font: Arc<OverlayFont>,
    pub progress: Option<ProgressCallback>,
}

/// Rebuild the PDF at `source` with translations overlaid.
pub async fn reconstruct_document(
    source: &Path,
    job: ReconstructJob,
) -> Result<Reconstruction, TranslateError> {
    let path = source.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let doc = Document::load(&path).map_err(|e| TranslateError::Reconstruction {
            detail: format!("could not open {}: {e}", path.display()),
        })?;
        reconstruct(doc, &job)
    })
    .await
    .map_err(|e| TranslateError::Internal(format!("Reconstruction task panicked: {e}")))?
}

/// A translated element placed on a page.
struct Target<'a> {
    kind: TextKind,
    rect: PdfRect,
    text: &'a str,
}

/// Blocking implementation of reconstruction over a loaded document.
pub fn reconstruct(
    mut doc: Document,
    job: &ReconstructJob,
) -> Result<Reconstruction, TranslateError> {
    let mut out = Reconstruction::default();
    let page_ids = doc.get_pages();
    let total_pages = job.model.page_count();

    let mut glyphs = job.font.encoder()?;
    let mut font_id: Option<ObjectId> = None;
    let layer_id = create_layer(&mut doc, &job.layer_name).map_err(|e| {
        TranslateError::Reconstruction {
            detail: format!("could not create layer {:?}: {e}", job.layer_name),
        }
    })?;

    for (&page_no, page) in &job.model.pages {
        let Some(&page_id) = page_ids.get(&page_no) else {
            warn!("Page {} of the document model is not in the PDF", page_no);
            for (kind, source, _) in page.spans(job.include_tables) {
                if job.translations.get(source).is_some() {
                    out.skipped += 1;
                    out.warnings.push(ElementError::Element {
                        page: page_no,
                        kind,
                        detail: "page not present in the PDF".into(),
                    });
                }
            }
            continue;
        };
        let mb = media_box(&doc, page_id);

        let mut targets = Vec::new();
        for (kind, source, bbox) in page.spans(job.include_tables) {
            let Some(text) = job.translations.get(source) else {
                continue;
            };
            let b = bbox.clamped().normalized();
            if b.is_degenerate() {
                out.skipped += 1;
                out.warnings.push(ElementError::Element {
                    page: page_no,
                    kind,
                    detail: format!(
                        "degenerate bounding box ({}, {}, {}, {})",
                        b.left, b.top, b.right, b.bottom
                    ),
                });
                continue;
            }
            targets.push(Target {
                kind,
                rect: PdfRect::from_top_down(&b, mb),
                text,
            });
        }

        if targets.is_empty() {
            continue;
        }

        let font_id = *font_id.get_or_insert_with(|| doc.new_object_id());
        match apply_page(&mut doc, page_id, &targets, &mut glyphs, font_id, layer_id) {
            Ok(removed) => {
                debug!(
                    "Page {}: {} elements overlaid, {} text operators removed",
                    page_no,
                    targets.len(),
                    removed
                );
                out.replaced += targets.len();
            }
            Err(e) => {
                warn!("Page {}: skipping {} elements: {}", page_no, targets.len(), e);
                out.skipped += targets.len();
                out.warnings.extend(targets.iter().map(|t| ElementError::Element {
                    page: page_no,
                    kind: t.kind,
                    detail: e.to_string(),
                }));
            }
        }

        if let Some(ref cb) = job.progress {
            cb.on_page_complete(page_no, total_pages);
        }
    }

    if let Some(font_id) = font_id {
        glyphs.write_font(&mut doc, font_id);
        let missing: String = glyphs.missing_glyphs().into_iter().collect();
        if !missing.is_empty() {
            warn!("Font {} has no glyphs for {:?}", glyphs.font_name(), missing);
            out.warnings.push(ElementError::MissingGlyphs {
                font: glyphs.font_name().to_string(),
                chars: missing,
            });
        }
    }

    let (pdf, used_fallback) = finalize(doc)?;
    info!(
        "Reconstructed {} elements ({} skipped), {} bytes{}",
        out.replaced,
        out.skipped,
        pdf.len(),
        if used_fallback { " via fallback save" } else { "" }
    );
    out.pdf = pdf;
    out.used_fallback = used_fallback;
    Ok(out)
}

/// Redact and overlay one page. Returns the number of removed text operators.
fn apply_page(
    doc: &mut Document,
    page_id: ObjectId,
    targets: &[Target<'_>],
    glyphs: &mut GlyphEncoder<'_>,
    font_id: ObjectId,
    layer_id: ObjectId,
) -> Result<usize, lopdf::Error> {
    let raw = read_page_content(doc, page_id)?;
    let content = Content::decode(&raw)?;
    let mut resources = page_resources(
        doc,
        page_id,
        &[b"Font".as_slice(), b"Properties".as_slice()],
    );
    let fonts = page_fonts(doc, &resources);
    let rects: Vec<PdfRect> = targets.iter().map(|t| t.rect).collect();
    let redaction = redact_text(content.operations, &rects, &fonts);

    let mut ops = Vec::with_capacity(redaction.operations.len() + 4 * targets.len() + 4);
    if !redaction.operations.is_empty() {
        ops.push(Operation::new("q", vec![]));
        ops.extend(redaction.operations);
        ops.push(Operation::new("Q", vec![]));
    }
    ops.extend(cover_operations(&rects));
    let runs: Vec<OverlayText<'_>> = targets
        .iter()
        .map(|t| OverlayText {
            rect: t.rect,
            text: t.text,
        })
        .collect();
    ops.extend(overlay_operations(&runs, glyphs));

    let encoded = Content { operations: ops }.encode()?;
    write_page_content(doc, page_id, encoded)?;

    register_resources(&mut resources, font_id, layer_id);
    set_page_resources(doc, page_id, resources)?;
    Ok(redaction.removed)
}

// ── Finalisation ─────────────────────────────────────────────────────────────

/// Serialise `doc` with the optimised save, or the plain save if that fails.
///
/// Returns the bytes and whether the fallback was used.
pub fn finalize(doc: Document) -> Result<(Vec<u8>, bool), TranslateError> {
    finalize_with(doc, optimized_save)
}

/// [`finalize`] with a caller-supplied optimised save.
pub fn finalize_with<F>(doc: Document, optimize: F) -> Result<(Vec<u8>, bool), TranslateError>
where
    F: FnOnce(&mut Document) -> Result<Vec<u8>, lopdf::Error>,
{
    let mut optimized = doc.clone();
    match optimize(&mut optimized) {
        Ok(bytes) => return Ok((bytes, false)),
        Err(e) => warn!("Optimised save failed ({}); retrying with a plain save", e),
    }

    let mut plain = doc;
    let mut bytes = Vec::new();
    plain
        .save_to(&mut bytes)
        .map_err(|e| TranslateError::Reconstruction {
            detail: format!("could not save document: {e}"),
        })?;
    Ok((bytes, true))
}

/// Compact page content, drop unused fonts and unreachable objects, compress
/// streams and save. The result is parsed back before it is accepted.
pub fn optimized_save(doc: &mut Document) -> Result<Vec<u8>, lopdf::Error> {
    let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    let mut dropped_fonts = 0;
    for page_id in pages {
        dropped_fonts += clean_page(doc, page_id)?;
    }

    let pruned = doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.compress();
    doc.renumber_objects();
    debug!(
        "Optimised save: {} unused font references, {} unreachable objects dropped",
        dropped_fonts,
        pruned.len()
    );

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Document::load_mem(&bytes)?;
    Ok(bytes)
}

/// Compact one page's content into a single stream and drop font resources
/// the content no longer selects. Returns the number of fonts dropped.
fn clean_page(doc: &mut Document, page_id: ObjectId) -> Result<usize, lopdf::Error> {
    let raw = read_page_content(doc, page_id)?;
    let content = Content::decode(&raw)?;
    let ops = compact_operations(content.operations);

    let used: HashSet<Vec<u8>> = ops
        .iter()
        .filter(|op| op.operator == "Tf")
        .filter_map(|op| match op.operands.first() {
            Some(Object::Name(name)) => Some(name.clone()),
            _ => None,
        })
        .collect();

    let encoded = Content { operations: ops }.encode()?;
    write_page_content(doc, page_id, encoded)?;

    let mut resources = page_resources(doc, page_id, &[b"Font".as_slice()]);
    let unused: Vec<Vec<u8>> = match resources.get(b"Font") {
        Ok(Object::Dictionary(fonts)) => fonts
            .iter()
            .map(|(name, _)| name.clone())
            .filter(|name| !used.contains(name))
            .collect(),
        _ => Vec::new(),
    };
    if unused.is_empty() {
        return Ok(0);
    }
    if let Ok(Object::Dictionary(fonts)) = resources.get_mut(b"Font") {
        for name in &unused {
            fonts.remove(name);
        }
    }
    set_page_resources(doc, page_id, resources)?;
    Ok(unused.len())
}

/// Drop empty `q`/`Q`, `BT`/`ET` and marked-content pairs, innermost first.
pub fn compact_operations(operations: Vec<Operation>) -> Vec<Operation> {
    let mut out: Vec<Operation> = Vec::with_capacity(operations.len());
    for op in operations {
        let closes_empty = match (out.last().map(|o| o.operator.as_str()), op.operator.as_str()) {
            (Some("q"), "Q") | (Some("BT"), "ET") => true,
            (Some("BDC") | Some("BMC"), "EMC") => true,
            _ => false,
        };
        if closes_empty {
            out.pop();
        } else {
            out.push(op);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, PageContent, PageSize, TextElement, TextLabel};
    use crate::pipeline::font::shown_text;
    use crate::pipeline::overlay::FONT_RESOURCE;
    use lopdf::{dictionary, Stream};
    use std::collections::BTreeMap;

    fn ops(src: &str) -> Vec<Operation> {
        Content::decode(src.as_bytes()).unwrap().operations
    }

    fn names(ops: &[Operation]) -> Vec<&str> {
        ops.iter().map(|o| o.operator.as_str()).collect()
    }

    /// One-page PDF (600 × 800) showing "Hello" at (72, 700) in /F1.
    fn hello_pdf() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let unused_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
        });
        let content = b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET".to_vec();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id, "F9" => unused_font },
            },
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
        doc
    }

    fn model(bbox: BBox) -> DocumentModel {
        let mut page = PageContent::new(PageSize {
            width: 600.0,
            height: 800.0,
        });
        page.texts.push(TextElement {
            label: TextLabel::Text,
            text: "Hello".into(),
            bbox,
        });
        let mut pages = BTreeMap::new();
        pages.insert(1, page);
        DocumentModel { pages }
    }

    fn job_with(model: DocumentModel, translation: &str) -> ReconstructJob {
        ReconstructJob {
            model: Arc::new(model),
            translations: Arc::new(TranslationMap::from_pairs([(
                "Hello".to_string(),
                translation.to_string(),
            )])),
            layer_name: "French Translation".into(),
            include_tables: false,
            font: Arc::new(OverlayFont::bundled()),
            progress: None,
        }
    }

    fn job(model: DocumentModel) -> ReconstructJob {
        job_with(model, "Bonjour")
    }

    /// Decoded text of every show operator on page 1, empty strings skipped.
    fn shown_strings(doc: &Document) -> Vec<String> {
        let page_id = *doc.get_pages().get(&1).unwrap();
        shown_text(doc, page_id)
            .unwrap()
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect()
    }

    #[test]
    fn compaction_drops_empty_pairs() {
        let out = compact_operations(ops("q Q BT ET q BT ET Q /OC /L BDC EMC q 0 g Q"));
        assert_eq!(names(&out), vec!["q", "g", "Q"]);
    }

    #[test]
    fn replaces_text_and_adds_layer() {
        let result = reconstruct(hello_pdf(), &job(model(BBox::new(60.0, 90.0, 300.0, 110.0))))
            .unwrap();
        assert_eq!(result.replaced, 1);
        assert!(result.warnings.is_empty());
        assert!(!result.used_fallback);

        let doc = Document::load_mem(&result.pdf).unwrap();
        assert_eq!(shown_strings(&doc), vec!["Bonjour"]);

        let root_id = crate::pipeline::pdf::catalog_id(&doc).unwrap();
        let root = doc.get_object(root_id).unwrap().as_dict().unwrap();
        assert!(root.has(b"OCProperties"));
    }

    #[test]
    fn unused_fonts_are_dropped() {
        let result = reconstruct(hello_pdf(), &job(model(BBox::new(60.0, 90.0, 300.0, 110.0))))
            .unwrap();
        let doc = Document::load_mem(&result.pdf).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(FONT_RESOURCE.as_bytes()));
        // F1 is still selected by the surviving Tf operator.
        assert!(fonts.has(b"F1"));
        assert!(!fonts.has(b"F9"));
    }

    #[test]
    fn degenerate_box_is_skipped_with_warning() {
        let result = reconstruct(hello_pdf(), &job(model(BBox::new(60.0, 90.0, 60.0, 110.0))))
            .unwrap();
        assert_eq!(result.replaced, 0);
        assert_eq!(result.skipped, 1);
        assert!(matches!(
            result.warnings[0],
            ElementError::Element { page: 1, kind: TextKind::Body, .. }
        ));
        let doc = Document::load_mem(&result.pdf).unwrap();
        assert_eq!(shown_strings(&doc), vec!["Hello"]);
    }

    #[test]
    fn non_latin_translations_survive_the_overlay() {
        for translation in ["สวัสดี", "你好", "Привет"] {
            let result = reconstruct(
                hello_pdf(),
                &job_with(model(BBox::new(60.0, 90.0, 300.0, 110.0)), translation),
            )
            .unwrap();
            let doc = Document::load_mem(&result.pdf).unwrap();
            assert_eq!(shown_strings(&doc), vec![translation]);
        }
    }

    #[test]
    fn glyphs_missing_from_the_font_are_reported() {
        let result = reconstruct(
            hello_pdf(),
            &job_with(model(BBox::new(60.0, 90.0, 300.0, 110.0)), "你好 ok"),
        )
        .unwrap();
        assert_eq!(result.replaced, 1);
        assert_eq!(
            result.warnings,
            vec![ElementError::MissingGlyphs {
                font: "DejaVuSans".into(),
                chars: "你好".into(),
            }]
        );

        let cyrillic = reconstruct(
            hello_pdf(),
            &job_with(model(BBox::new(60.0, 90.0, 300.0, 110.0)), "Привет"),
        )
        .unwrap();
        assert!(cyrillic.warnings.is_empty());
    }

    #[test]
    fn page_missing_from_pdf_is_a_warning() {
        let mut m = model(BBox::new(60.0, 90.0, 300.0, 110.0));
        let extra = m.pages.get(&1).unwrap().clone();
        m.pages.insert(7, extra);
        let result = reconstruct(hello_pdf(), &job(m)).unwrap();
        assert_eq!(result.replaced, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(
            result.warnings,
            vec![ElementError::Element {
                page: 7,
                kind: TextKind::Body,
                detail: "page not present in the PDF".into(),
            }]
        );
    }

    #[test]
    fn text_after_a_replaced_run_is_kept() {
        let mut doc = hello_pdf();
        let page_id = *doc.get_pages().get(&1).unwrap();
        write_page_content(
            &mut doc,
            page_id,
            b"BT /F1 12 Tf 72 700 Td (Hello ) Tj (Total) Tj ET".to_vec(),
        )
        .unwrap();
        // Box around "Hello " only; "Total" starts 36 pt further right.
        let result = reconstruct(doc, &job(model(BBox::new(60.0, 85.0, 100.0, 110.0)))).unwrap();
        let doc = Document::load_mem(&result.pdf).unwrap();
        let shown = shown_strings(&doc);
        assert_eq!(shown[0], "Total");
        assert_eq!(shown[1..].concat(), "Bonjour");
    }

    #[test]
    fn out_of_range_box_is_clamped_not_rejected() {
        let result = reconstruct(
            hello_pdf(),
            &job(model(BBox::new(60.0, 90.0, 1.0e9, 110.0))),
        )
        .unwrap();
        assert_eq!(result.replaced, 1);
    }

    #[test]
    fn failing_optimised_save_falls_back() {
        let (bytes, fallback) = finalize_with(hello_pdf(), |_| {
            Err(lopdf::Error::IO(std::io::Error::other("disk full")))
        })
        .unwrap();
        assert!(fallback);
        assert!(Document::load_mem(&bytes).is_ok());
    }
}
