//! Structure adapter: external extraction output → [`DocumentModel`].
//!
//! The layout/OCR engine is an external collaborator. It is reached through
//! the [`StructureExtractor`] trait and must return a [`RawDocument`], the
//! serde mirror of the engine's dictionary export:
//!
//! ```text
//! { pages:  { "1": { size: { width, height } } },
//!   texts:  [ { label, text, prov: [ { page_no, bbox: { l, t, r, b } } ] } ],
//!   tables: [ { prov: [ … ], data: { table_cells: [ { text, bbox? } ] } } ] }
//! ```
//!
//! The engine reports bottom-up boxes. [`adapt`] flips `t` and `b` with
//! `pageHeight - value` exactly once per box; every later stage sees top-down
//! coordinates only. Element order is kept as emitted. There is no retry:
//! an extraction failure is fatal to the run.

use crate::document::{
    BBox, DocumentModel, PageContent, PageSize, TableCell, TableElement, TextElement, TextLabel,
};
use crate::error::{ElementError, TranslateError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ── Raw engine output ────────────────────────────────────────────────────

/// Document as exported by the extraction engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub pages: BTreeMap<u32, RawPage>,
    #[serde(default)]
    pub texts: Vec<RawText>,
    #[serde(default)]
    pub tables: Vec<RawTable>,
}

impl RawDocument {
    /// Parse an exported JSON document.
    pub fn from_json(json: &str) -> Result<Self, TranslateError> {
        serde_json::from_str(json).map_err(|e| TranslateError::Extraction {
            detail: format!("malformed engine output: {e}"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    pub size: RawSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSize {
    pub width: f64,
    pub height: f64,
}

/// Bottom-up box as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBBox {
    pub l: f64,
    pub t: f64,
    pub r: f64,
    pub b: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProv {
    pub page_no: u32,
    pub bbox: RawBBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawText {
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub prov: Vec<RawProv>,
}

fn default_label() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCell {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub bbox: Option<RawBBox>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTableData {
    #[serde(default)]
    pub table_cells: Vec<RawCell>,
}

/// A table; cells may come flat (`cells`) or nested (`data.table_cells`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    #[serde(default)]
    pub prov: Vec<RawProv>,
    #[serde(default)]
    pub cells: Vec<RawCell>,
    #[serde(default)]
    pub data: RawTableData,
}

impl RawTable {
    fn all_cells(&self) -> &[RawCell] {
        if self.cells.is_empty() {
            &self.data.table_cells
        } else {
            &self.cells
        }
    }
}

// ── Engine seam ──────────────────────────────────────────────────────────

/// The external structure-extraction engine.
///
/// Called exactly once per document, from a blocking thread.
pub trait StructureExtractor: Send + Sync {
    fn extract(&self, pdf_path: &Path) -> Result<RawDocument, TranslateError>;
}

impl<F> StructureExtractor for F
where
    F: Fn(&Path) -> Result<RawDocument, TranslateError> + Send + Sync,
{
    fn extract(&self, pdf_path: &Path) -> Result<RawDocument, TranslateError> {
        self(pdf_path)
    }
}

/// Returns a document exported ahead of time, whatever the path.
#[derive(Debug, Clone)]
pub struct JsonExtractor {
    document: RawDocument,
}

impl JsonExtractor {
    pub fn new(document: RawDocument) -> Self {
        Self { document }
    }

    pub fn from_json(json: &str) -> Result<Self, TranslateError> {
        RawDocument::from_json(json).map(Self::new)
    }
}

impl StructureExtractor for JsonExtractor {
    fn extract(&self, _pdf_path: &Path) -> Result<RawDocument, TranslateError> {
        Ok(self.document.clone())
    }
}

/// Runs an external program that prints the engine's JSON export to stdout.
///
/// The PDF path is appended as the last argument.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl StructureExtractor for CommandExtractor {
    fn extract(&self, pdf_path: &Path) -> Result<RawDocument, TranslateError> {
        debug!("Running extractor {}", self.program.display());
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(pdf_path)
            .output()
            .map_err(|e| TranslateError::Extraction {
                detail: format!("cannot run '{}': {e}", self.program.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranslateError::Extraction {
                detail: format!(
                    "'{}' exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr.trim()
                ),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| TranslateError::Extraction {
            detail: format!("malformed engine output: {e}"),
        })
    }
}

// ── Adapter ──────────────────────────────────────────────────────────────

/// The adapted document plus cells dropped on the way.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub model: DocumentModel,
    pub warnings: Vec<ElementError>,
}

/// Invoke the engine once and adapt its output.
///
/// Runs inside `spawn_blocking` since extraction is synchronous and CPU-bound.
pub async fn extract_document(
    extractor: Arc<dyn StructureExtractor>,
    pdf_path: &Path,
) -> Result<ExtractedDocument, TranslateError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let raw = extractor.extract(&path)?;
        adapt(raw)
    })
    .await
    .map_err(|e| TranslateError::Internal(format!("Extraction task panicked: {e}")))?
}

/// Flip `t`/`b` of an engine box into page-top-down coordinates.
pub fn flip_bbox(raw: &RawBBox, page_height: f64) -> BBox {
    BBox::new(raw.l, page_height - raw.t, raw.r, page_height - raw.b)
}

/// Convert engine output into the canonical [`DocumentModel`].
pub fn adapt(raw: RawDocument) -> Result<ExtractedDocument, TranslateError> {
    let mut pages: BTreeMap<u32, PageContent> = BTreeMap::new();
    for (page_no, page) in &raw.pages {
        let RawSize { width, height } = page.size;
        if !(height.is_finite() && width.is_finite()) || height <= 0.0 || width <= 0.0 {
            return Err(TranslateError::Extraction {
                detail: format!("page {page_no} has invalid size {width}x{height}"),
            });
        }
        pages.insert(*page_no, PageContent::new(PageSize { width, height }));
    }

    for (i, item) in raw.texts.into_iter().enumerate() {
        let prov = item.prov.first().ok_or_else(|| TranslateError::Extraction {
            detail: format!("text item {i} has no provenance"),
        })?;
        let page = page_mut(&mut pages, prov.page_no, "text item", i)?;
        let bbox = flip_bbox(&prov.bbox, page.size.height);
        page.texts.push(TextElement {
            label: TextLabel::from(item.label),
            text: item.text,
            bbox,
        });
    }

    let mut warnings = Vec::new();
    for (i, table) in raw.tables.iter().enumerate() {
        let prov = table.prov.first().ok_or_else(|| TranslateError::Extraction {
            detail: format!("table {i} has no provenance"),
        })?;
        let page_no = prov.page_no;
        let page = page_mut(&mut pages, page_no, "table", i)?;
        let height = page.size.height;

        let mut cells = Vec::with_capacity(table.all_cells().len());
        for cell in table.all_cells() {
            match &cell.bbox {
                Some(b) => cells.push(TableCell {
                    text: cell.text.clone(),
                    bbox: flip_bbox(b, height),
                }),
                None => {
                    warn!("Page {page_no}: table {i} cell {:?} has no bbox", cell.text);
                    warnings.push(ElementError::MissingCellBbox {
                        page: page_no,
                        table: page.tables.len(),
                    });
                }
            }
        }

        page.tables.push(TableElement {
            bbox: flip_bbox(&prov.bbox, height),
            cells,
        });
    }

    let model = DocumentModel { pages };
    let (texts, cells) = model.element_counts();
    info!(
        "Extracted {} pages, {} text elements, {} table cells",
        model.page_count(),
        texts,
        cells
    );
    Ok(ExtractedDocument { model, warnings })
}

fn page_mut<'a>(
    pages: &'a mut BTreeMap<u32, PageContent>,
    page_no: u32,
    what: &str,
    index: usize,
) -> Result<&'a mut PageContent, TranslateError> {
    pages
        .get_mut(&page_no)
        .ok_or_else(|| TranslateError::Extraction {
            detail: format!("{what} {index} refers to unknown page {page_no}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextKind;

    fn one_page_doc() -> RawDocument {
        RawDocument::from_json(
            r#"{
                "pages": { "1": { "size": { "width": 600, "height": 800 } } },
                "texts": [
                    { "label": "section_header", "text": "Title",
                      "prov": [ { "page_no": 1, "bbox": { "l": 10, "t": 700, "r": 200, "b": 680 } } ] },
                    { "label": "text", "text": "Body",
                      "prov": [ { "page_no": 1, "bbox": { "l": 10, "t": 600, "r": 300, "b": 550 } } ] }
                ],
                "tables": [
                    { "prov": [ { "page_no": 1, "bbox": { "l": 0, "t": 400, "r": 500, "b": 100 } } ],
                      "data": { "table_cells": [
                          { "text": "A1", "bbox": { "l": 0, "t": 400, "r": 250, "b": 300 } },
                          { "text": "no box" },
                          { "text": "B1", "bbox": { "l": 250, "t": 400, "r": 500, "b": 300 } }
                      ] } }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn flips_text_bbox_once() {
        let doc = adapt(one_page_doc()).unwrap().model;
        let page = doc.page(1).unwrap();
        assert_eq!(page.texts[0].bbox, BBox::new(10.0, 100.0, 200.0, 120.0));
        assert_eq!(page.texts[0].label, TextLabel::SectionHeader);
    }

    #[test]
    fn keeps_engine_order() {
        let doc = adapt(one_page_doc()).unwrap().model;
        let texts: Vec<_> = doc.page(1).unwrap().texts.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Title", "Body"]);
    }

    #[test]
    fn drops_cells_without_bbox_with_warning() {
        let extracted = adapt(one_page_doc()).unwrap();
        let table = &extracted.model.page(1).unwrap().tables[0];
        assert_eq!(table.cells.len(), 2);
        assert_eq!(table.cells[0].bbox, BBox::new(0.0, 400.0, 250.0, 500.0));
        assert_eq!(table.bbox, BBox::new(0.0, 400.0, 500.0, 700.0));
        assert_eq!(
            extracted.warnings,
            vec![ElementError::MissingCellBbox { page: 1, table: 0 }]
        );
    }

    #[test]
    fn flat_cells_are_accepted() {
        let raw = RawDocument::from_json(
            r#"{
                "pages": { "2": { "size": { "width": 100, "height": 100 } } },
                "tables": [ { "prov": [ { "page_no": 2, "bbox": { "l": 0, "t": 90, "r": 50, "b": 10 } } ],
                              "cells": [ { "text": "x", "bbox": { "l": 0, "t": 90, "r": 10, "b": 80 } } ] } ]
            }"#,
        )
        .unwrap();
        let doc = adapt(raw).unwrap().model;
        let spans: Vec<_> = doc.page(2).unwrap().spans(true).collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].0, TextKind::TableCell);
    }

    #[test]
    fn unknown_page_is_malformed() {
        let mut raw = one_page_doc();
        raw.texts[0].prov[0].page_no = 9;
        let err = adapt(raw).unwrap_err();
        assert!(matches!(err, TranslateError::Extraction { .. }));
        assert!(err.to_string().contains("unknown page 9"));
    }

    #[test]
    fn missing_provenance_is_malformed() {
        let mut raw = one_page_doc();
        raw.texts[1].prov.clear();
        assert!(matches!(
            adapt(raw),
            Err(TranslateError::Extraction { .. })
        ));
    }

    #[test]
    fn malformed_json_is_extraction_error() {
        let err = RawDocument::from_json("{ not json").unwrap_err();
        assert!(matches!(err, TranslateError::Extraction { .. }));
    }

    #[tokio::test]
    async fn extractor_runs_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let extractor = move |_: &Path| -> Result<RawDocument, TranslateError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(one_page_doc())
        };
        let doc = extract_document(Arc::new(extractor), Path::new("in.pdf"))
            .await
            .unwrap();
        assert_eq!(doc.model.page_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn engine_failure_is_fatal() {
        let extractor = |_: &Path| -> Result<RawDocument, TranslateError> {
            Err(TranslateError::Extraction {
                detail: "model weights missing".into(),
            })
        };
        let err = extract_document(Arc::new(extractor), Path::new("in.pdf"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model weights missing"));
    }

    #[test]
    fn command_extractor_reports_missing_program() {
        let ex = CommandExtractor::new("/definitely/not/an/extractor");
        let err = ex.extract(Path::new("in.pdf")).unwrap_err();
        assert!(matches!(err, TranslateError::Extraction { .. }));
    }
}
