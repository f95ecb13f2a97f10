//! Canonical page/element model shared by every pipeline stage.
//!
//! The [`DocumentModel`] is produced once per run by
//! [`crate::pipeline::extract`], read by the translation stage to collect
//! distinct strings, and read again by the reconstructor to place the
//! translations. It is never mutated after the adapter returns it.
//!
//! ## Coordinates
//!
//! Every [`BBox`] in this module is **top-down**: `top < bottom` for a
//! non-degenerate box and the origin is the top-left corner of the page.
//! The extraction engine reports bottom-up boxes; the adapter flips them
//! exactly once (`pageHeight - value`) before an element exists here.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Largest coordinate magnitude accepted by geometry operations.
pub const MAX_COORD: f64 = 99_999.0;

/// Axis-aligned bounding rectangle `{left, top, right, bottom}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BBox {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Clamp every component to `±MAX_COORD`. NaN becomes 0.
    ///
    /// Total and idempotent: out-of-range values are clamped, never rejected.
    pub fn clamped(&self) -> Self {
        Self {
            left: clamp_coord(self.left),
            top: clamp_coord(self.top),
            right: clamp_coord(self.right),
            bottom: clamp_coord(self.bottom),
        }
    }

    /// Reorder edges so that `left <= right` and `top <= bottom`.
    pub fn normalized(&self) -> Self {
        Self {
            left: self.left.min(self.right),
            top: self.top.min(self.bottom),
            right: self.left.max(self.right),
            bottom: self.top.max(self.bottom),
        }
    }

    pub fn width(&self) -> f64 {
        (self.right - self.left).abs()
    }

    pub fn height(&self) -> f64 {
        (self.bottom - self.top).abs()
    }

    /// True when the box has no drawable area.
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Whether the top-down point `(x, y)` lies inside the box (edges included).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let b = self.normalized();
        x >= b.left && x <= b.right && y >= b.top && y <= b.bottom
    }
}

fn clamp_coord(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(-MAX_COORD, MAX_COORD)
    }
}

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Which kind of element a text span came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextKind {
    Body,
    TableCell,
}

impl fmt::Display for TextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextKind::Body => f.write_str("text"),
            TextKind::TableCell => f.write_str("table cell"),
        }
    }
}

/// Layout label assigned to a text item by the extraction engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TextLabel {
    Title,
    SectionHeader,
    Text,
    ListItem,
    Caption,
    Footnote,
    PageHeader,
    PageFooter,
    Formula,
    Code,
    Other(String),
}

impl From<String> for TextLabel {
    fn from(s: String) -> Self {
        match s.as_str() {
            "title" => TextLabel::Title,
            "section_header" => TextLabel::SectionHeader,
            "text" | "paragraph" => TextLabel::Text,
            "list_item" => TextLabel::ListItem,
            "caption" => TextLabel::Caption,
            "footnote" => TextLabel::Footnote,
            "page_header" => TextLabel::PageHeader,
            "page_footer" => TextLabel::PageFooter,
            "formula" => TextLabel::Formula,
            "code" => TextLabel::Code,
            _ => TextLabel::Other(s),
        }
    }
}

impl From<TextLabel> for String {
    fn from(label: TextLabel) -> Self {
        match label {
            TextLabel::Title => "title".into(),
            TextLabel::SectionHeader => "section_header".into(),
            TextLabel::Text => "text".into(),
            TextLabel::ListItem => "list_item".into(),
            TextLabel::Caption => "caption".into(),
            TextLabel::Footnote => "footnote".into(),
            TextLabel::PageHeader => "page_header".into(),
            TextLabel::PageFooter => "page_footer".into(),
            TextLabel::Formula => "formula".into(),
            TextLabel::Code => "code".into(),
            TextLabel::Other(s) => s,
        }
    }
}

/// A positioned run of body text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub label: TextLabel,
    pub text: String,
    pub bbox: BBox,
}

/// One cell of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub text: String,
    pub bbox: BBox,
}

/// A table and its cells, in engine order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableElement {
    pub bbox: BBox,
    pub cells: Vec<TableCell>,
}

/// Everything extracted from one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub size: PageSize,
    pub texts: Vec<TextElement>,
    pub tables: Vec<TableElement>,
}

impl PageContent {
    pub fn new(size: PageSize) -> Self {
        Self {
            size,
            texts: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Every positioned span on the page, body text first, then table cells
    /// in table order when `include_tables` is set.
    pub fn spans(
        &self,
        include_tables: bool,
    ) -> impl Iterator<Item = (TextKind, &str, BBox)> + '_ {
        let texts = self
            .texts
            .iter()
            .map(|t| (TextKind::Body, t.text.as_str(), t.bbox));
        let cells = self
            .tables
            .iter()
            .filter(move |_| include_tables)
            .flat_map(|t| t.cells.iter())
            .map(|c| (TextKind::TableCell, c.text.as_str(), c.bbox));
        texts.chain(cells)
    }
}

/// Page number (1-based) → page content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentModel {
    pub pages: BTreeMap<u32, PageContent>,
}

impl DocumentModel {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, page_no: u32) -> Option<&PageContent> {
        self.pages.get(&page_no)
    }

    /// Distinct non-blank strings across all pages, in first-seen order.
    ///
    /// Table cells are only collected when `include_tables` is set, since
    /// they are only drawn in that case.
    pub fn unique_texts(&self, include_tables: bool) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for page in self.pages.values() {
            for (_, text, _) in page.spans(include_tables) {
                if !is_blank(text) && seen.insert(text) {
                    out.push(text.to_string());
                }
            }
        }
        out
    }

    /// Number of (body, table-cell) elements across all pages.
    pub fn element_counts(&self) -> (usize, usize) {
        self.pages.values().fold((0, 0), |(t, c), p| {
            (
                t + p.texts.len(),
                c + p.tables.iter().map(|tb| tb.cells.len()).sum::<usize>(),
            )
        })
    }
}

/// True for empty or whitespace-only text, which is never translated.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Exact source string → translated string, for one run.
///
/// Keys are compared byte for byte; no trimming or normalisation happens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationMap {
    entries: HashMap<String, String>,
}

impl TranslationMap {
    /// Zip sources with translations. Blank sources are skipped.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let entries = pairs
            .into_iter()
            .filter(|(k, _)| !is_blank(k))
            .collect();
        Self { entries }
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries.get(source).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
