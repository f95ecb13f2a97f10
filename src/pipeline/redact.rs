//! Text redaction on decoded page content.
//!
//! Walks the operation list while tracking the graphics state (`q`/`Q`/`cm`
//! plus the text parameters `Tf`, `Tc`, `Tw`, `Tz`, `TL`) and the text state
//! (`BT`, `Tm`, `Td`, `TD`, `T*`). A text-showing operator is removed when
//! its starting point in user space falls inside one of the redaction
//! rectangles. Everything else is kept untouched, so graphics, images and
//! unrelated text survive.
//!
//! Every show operator advances the text matrix by the width of its string,
//! read from the font's `/Widths` (simple fonts) or `/W` (composite fonts).
//! Fonts without widths are measured at [`ESTIMATED_WIDTH`]. A removed
//! operator is replaced by an empty `TJ` of the same advance, so runs that
//! follow on the same line keep their position.

use crate::pipeline::pdf::{object_to_f64, real, resolve, PdfRect};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

/// Slack in points around a rectangle when testing text origins.
pub const ORIGIN_TOLERANCE: f64 = 1.0;

/// Glyph width in 1/1000 em assumed for fonts that carry no widths.
pub const ESTIMATED_WIDTH: f64 = 500.0;

/// Font size assumed for text shown before any `Tf`.
const DEFAULT_FONT_SIZE: f64 = 12.0;

/// Upper bound on a `/W` range, so a corrupt array cannot balloon the table.
const MAX_WIDTH_RANGE: u32 = 0xFFFF;

/// A 2-D affine matrix `[a b c d e f]` as used by PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix([f64; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn translate(tx: f64, ty: f64) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other` (apply `self` first, then `other`).
    pub fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    /// Translation component.
    pub fn origin(&self) -> (f64, f64) {
        (self.0[4], self.0[5])
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() != 6 {
            return None;
        }
        let mut m = [0.0; 6];
        for (slot, obj) in m.iter_mut().zip(operands) {
            *slot = object_to_f64(obj)?;
        }
        Some(Matrix(m))
    }
}

/// Outcome of one redaction pass.
#[derive(Debug, Default)]
pub struct Redaction {
    pub operations: Vec<Operation>,
    pub removed: usize,
}

// ── Font metrics ─────────────────────────────────────────────────────────────

/// Glyph widths of one font, keyed by character code.
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    /// Composite (`Type0`) fonts use 2-byte codes.
    pub two_byte: bool,
    widths: HashMap<u32, f64>,
    default_width: f64,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            two_byte: false,
            widths: HashMap::new(),
            default_width: ESTIMATED_WIDTH,
        }
    }
}

impl FontMetrics {
    /// Read the metrics of a font dictionary.
    pub fn from_font(doc: &Document, font: &Dictionary) -> Self {
        let is_type0 = matches!(
            lookup(doc, font, b"Subtype"),
            Some(Object::Name(n)) if n == b"Type0"
        );
        if is_type0 {
            Self::composite(doc, font)
        } else {
            Self::simple(doc, font)
        }
    }

    fn simple(doc: &Document, font: &Dictionary) -> Self {
        let Some(Object::Array(list)) = lookup(doc, font, b"Widths") else {
            return Self::default();
        };
        let first = lookup(doc, font, b"FirstChar")
            .and_then(object_to_f64)
            .unwrap_or(0.0)
            .max(0.0) as u32;
        let widths = list
            .iter()
            .enumerate()
            .filter_map(|(i, w)| Some((first + i as u32, resolve(doc, w).and_then(object_to_f64)?)))
            .collect();
        let missing = match lookup(doc, font, b"FontDescriptor") {
            Some(Object::Dictionary(fd)) => lookup(doc, fd, b"MissingWidth").and_then(object_to_f64),
            _ => None,
        };
        Self {
            two_byte: false,
            widths,
            default_width: missing.unwrap_or(0.0),
        }
    }

    fn composite(doc: &Document, font: &Dictionary) -> Self {
        let descendant = match lookup(doc, font, b"DescendantFonts") {
            Some(Object::Array(list)) => list.first().and_then(|o| resolve(doc, o)),
            _ => None,
        };
        let Some(Object::Dictionary(cid_font)) = descendant else {
            return Self {
                two_byte: true,
                ..Self::default()
            };
        };
        let default_width = lookup(doc, cid_font, b"DW")
            .and_then(object_to_f64)
            .unwrap_or(1000.0);
        let widths = match lookup(doc, cid_font, b"W") {
            Some(Object::Array(w)) => cid_widths(doc, w),
            _ => HashMap::new(),
        };
        Self {
            two_byte: true,
            widths,
            default_width,
        }
    }

    /// Width of `code` in 1/1000 em.
    pub fn width(&self, code: u32) -> f64 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    fn codes<'b>(&self, bytes: &'b [u8]) -> impl Iterator<Item = u32> + 'b {
        let step = if self.two_byte { 2 } else { 1 };
        bytes
            .chunks(step)
            .map(|c| c.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
    }
}

/// Parse a CIDFont `/W` array: `c [w1 w2 …]` and `c_first c_last w` entries.
fn cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while let Some(first) = w.get(i).and_then(|o| resolve(doc, o)).and_then(object_to_f64) {
        let first = first.max(0.0) as u32;
        match w.get(i + 1).and_then(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (k, v) in list.iter().enumerate() {
                    if let Some(v) = resolve(doc, v).and_then(object_to_f64) {
                        widths.insert(first + k as u32, v);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) = (
                    object_to_f64(last),
                    w.get(i + 2).and_then(|o| resolve(doc, o)).and_then(object_to_f64),
                ) else {
                    break;
                };
                let last = (last.max(0.0) as u32).min(first.saturating_add(MAX_WIDTH_RANGE));
                for code in first..=last {
                    widths.insert(code, width);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn lookup<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|o| resolve(doc, o))
}

/// Metrics of the fonts in a page's resources, keyed by resource name.
pub type PageFonts = HashMap<Vec<u8>, FontMetrics>;

/// Collect [`FontMetrics`] for every font under `resources`.
pub fn page_fonts(doc: &Document, resources: &Dictionary) -> PageFonts {
    let Some(Object::Dictionary(fonts)) = lookup(doc, resources, b"Font") else {
        return PageFonts::new();
    };
    fonts
        .iter()
        .filter_map(|(name, obj)| match resolve(doc, obj) {
            Some(Object::Dictionary(font)) => {
                Some((name.clone(), FontMetrics::from_font(doc, font)))
            }
            _ => None,
        })
        .collect()
}

// ── State ────────────────────────────────────────────────────────────────────

/// The parts of the graphics state that `q`/`Q` save and restore.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    scale: f64,
    leading: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: None,
            size: DEFAULT_FONT_SIZE,
            char_spacing: 0.0,
            word_spacing: 0.0,
            scale: 1.0,
            leading: 0.0,
        }
    }
}

impl GraphicsState {
    /// Horizontal advance in text space of one show operand.
    fn advance(&self, fonts: &PageFonts, operand: &Object) -> f64 {
        let fallback = FontMetrics::default();
        let metrics = self
            .font
            .as_ref()
            .and_then(|name| fonts.get(name))
            .unwrap_or(&fallback);
        match operand {
            Object::String(bytes, _) => self.string_advance(metrics, bytes),
            Object::Array(items) => items
                .iter()
                .map(|item| match item {
                    Object::String(bytes, _) => self.string_advance(metrics, bytes),
                    other => {
                        object_to_f64(other).map_or(0.0, |n| -n / 1000.0 * self.size * self.scale)
                    }
                })
                .sum(),
            _ => 0.0,
        }
    }

    fn string_advance(&self, metrics: &FontMetrics, bytes: &[u8]) -> f64 {
        metrics
            .codes(bytes)
            .map(|code| {
                let word = if !metrics.two_byte && code == 32 {
                    self.word_spacing
                } else {
                    0.0
                };
                metrics.width(code) / 1000.0 * self.size + self.char_spacing + word
            })
            .sum::<f64>()
            * self.scale
    }

    /// An empty `TJ` moving the pen by `tx`, standing in for a removed run.
    fn spacer(&self, tx: f64) -> Option<Operation> {
        let unit = self.size * self.scale;
        if unit.abs() < f64::EPSILON || tx.abs() < f64::EPSILON {
            return None;
        }
        Some(Operation::new(
            "TJ",
            vec![Object::Array(vec![real(-tx * 1000.0 / unit)])],
        ))
    }
}

#[derive(Debug, Clone, Copy)]
struct TextState {
    matrix: Matrix,
    line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
        self.matrix = self.line_matrix;
    }

    fn advance(&mut self, tx: f64) {
        self.matrix = Matrix::translate(tx, 0.0).then(&self.matrix);
    }
}

fn number(op: &Operation, i: usize) -> Option<f64> {
    op.operands.get(i).and_then(object_to_f64)
}

/// Drop every text-showing operator whose origin lies inside any of `rects`.
///
/// A removed `Tj`/`TJ` leaves an empty `TJ` carrying its advance. `'` and
/// `"` also move to the next line, so they are replaced by their positioning
/// effect (`T*`, plus `Tw`/`Tc` for `"`) followed by that `TJ`.
pub fn redact_text(operations: Vec<Operation>, rects: &[PdfRect], fonts: &PageFonts) -> Redaction {
    let mut out = Redaction {
        operations: Vec::with_capacity(operations.len()),
        removed: 0,
    };
    if rects.is_empty() {
        out.operations = operations;
        return out;
    }

    let mut gs = GraphicsState::default();
    let mut stack: Vec<GraphicsState> = Vec::new();
    let mut text = TextState::default();

    for op in operations {
        match op.operator.as_str() {
            "q" => stack.push(gs.clone()),
            "Q" => gs = stack.pop().unwrap_or_default(),
            "cm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    gs.ctm = m.then(&gs.ctm);
                }
            }
            "BT" => text = TextState::default(),
            "Tm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    text.matrix = m;
                    text.line_matrix = m;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (number(&op, 0), number(&op, 1)) {
                    text.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (number(&op, 0), number(&op, 1)) {
                    gs.leading = -ty;
                    text.move_line(tx, ty);
                }
            }
            "TL" => {
                if let Some(l) = number(&op, 0) {
                    gs.leading = l;
                }
            }
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    gs.font = Some(name.clone());
                }
                if let Some(size) = number(&op, 1) {
                    gs.size = size;
                }
            }
            "Tc" => gs.char_spacing = number(&op, 0).unwrap_or(gs.char_spacing),
            "Tw" => gs.word_spacing = number(&op, 0).unwrap_or(gs.word_spacing),
            "Tz" => gs.scale = number(&op, 0).map_or(gs.scale, |z| z / 100.0),
            "T*" => text.move_line(0.0, -gs.leading),
            "Tj" | "TJ" => {
                let hit = hits(&text, &gs.ctm, rects);
                let tx = op.operands.first().map_or(0.0, |s| gs.advance(fonts, s));
                text.advance(tx);
                if hit {
                    out.removed += 1;
                    out.operations.extend(gs.spacer(tx));
                    continue;
                }
            }
            "'" => {
                text.move_line(0.0, -gs.leading);
                let hit = hits(&text, &gs.ctm, rects);
                let tx = op.operands.first().map_or(0.0, |s| gs.advance(fonts, s));
                text.advance(tx);
                if hit {
                    out.removed += 1;
                    out.operations.push(Operation::new("T*", vec![]));
                    out.operations.extend(gs.spacer(tx));
                    continue;
                }
            }
            "\"" => {
                let (aw, ac) = (number(&op, 0), number(&op, 1));
                if let (Some(aw), Some(ac)) = (aw, ac) {
                    gs.word_spacing = aw;
                    gs.char_spacing = ac;
                }
                text.move_line(0.0, -gs.leading);
                let hit = hits(&text, &gs.ctm, rects);
                let tx = op.operands.get(2).map_or(0.0, |s| gs.advance(fonts, s));
                text.advance(tx);
                if hit {
                    out.removed += 1;
                    if let (Some(aw), Some(ac)) = (aw, ac) {
                        out.operations.push(Operation::new("Tw", vec![real(aw)]));
                        out.operations.push(Operation::new("Tc", vec![real(ac)]));
                    }
                    out.operations.push(Operation::new("T*", vec![]));
                    out.operations.extend(gs.spacer(tx));
                    continue;
                }
            }
            _ => {}
        }
        out.operations.push(op);
    }
    out
}

fn hits(text: &TextState, ctm: &Matrix, rects: &[PdfRect]) -> bool {
    let (x, y) = text.matrix.then(ctm).origin();
    rects.iter().any(|r| r.contains(x, y, ORIGIN_TOLERANCE))
}

/// Operations painting `rects` opaque white, isolated in their own `q`/`Q`.
pub fn cover_operations(rects: &[PdfRect]) -> Vec<Operation> {
    if rects.is_empty() {
        return Vec::new();
    }
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![real(1.0), real(1.0), real(1.0)]),
    ];
    for r in rects {
        ops.push(Operation::new(
            "re",
            vec![real(r.x0), real(r.y0), real(r.width()), real(r.height())],
        ));
    }
    ops.push(Operation::new("f", vec![]));
    ops.push(Operation::new("Q", vec![]));
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Content;
    use lopdf::dictionary;

    fn decode(src: &str) -> Vec<Operation> {
        Content::decode(src.as_bytes()).unwrap().operations
    }

    fn shown(ops: &[Operation]) -> Vec<String> {
        ops.iter()
            .filter(|o| o.operator == "Tj")
            .filter_map(|o| match o.operands.first() {
                Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            })
            .collect()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> PdfRect {
        PdfRect { x0, y0, x1, y1 }
    }

    #[test]
    fn matrix_composition() {
        let m = Matrix::translate(10.0, 20.0).then(&Matrix([2.0, 0.0, 0.0, 2.0, 5.0, 5.0]));
        assert_eq!(m.origin(), (25.0, 45.0));
    }

    #[test]
    fn removes_only_text_inside_rect() {
        let ops = decode(
            "BT /F1 12 Tf 72 700 Td (Inside) Tj ET BT /F1 12 Tf 72 100 Td (Outside) Tj ET",
        );
        let r = redact_text(ops, &[rect(60.0, 690.0, 300.0, 720.0)], &PageFonts::new());
        assert_eq!(r.removed, 1);
        assert_eq!(shown(&r.operations), vec!["Outside"]);
    }

    #[test]
    fn honours_cm_and_q_stack() {
        let ops = decode(
            "q 1 0 0 1 0 600 cm BT 72 100 Td (Moved) Tj ET Q BT 72 100 Td (Plain) Tj ET",
        );
        let r = redact_text(ops, &[rect(60.0, 690.0, 300.0, 720.0)], &PageFonts::new());
        assert_eq!(shown(&r.operations), vec!["Plain"]);
    }

    #[test]
    fn tracks_leading_across_lines() {
        let ops = decode("BT 14 TL 72 720 Td (First) Tj T* (Second) Tj T* (Third) Tj ET");
        // Second line sits at y = 706.
        let r = redact_text(ops, &[rect(60.0, 700.0, 300.0, 710.0)], &PageFonts::new());
        assert_eq!(shown(&r.operations), vec!["First", "Third"]);
    }

    #[test]
    fn quote_operator_keeps_line_advance() {
        let ops = decode("BT 12 TL 72 720 Td (A) Tj (B) ' (C) ' ET");
        let r = redact_text(ops, &[rect(60.0, 705.0, 300.0, 710.0)], &PageFonts::new());
        assert_eq!(r.removed, 1);
        assert!(r.operations.iter().any(|o| o.operator == "T*"));
        assert_eq!(r.operations.iter().filter(|o| o.operator == "'").count(), 1);
    }

    #[test]
    fn show_operators_advance_the_pen() {
        let ops = decode("BT /F1 12 Tf 72 700 Td (Intro ) Tj (Total) Tj ET");
        // No widths for /F1: six glyphs at 500/1000 em put "Total" at x = 108.
        let r = redact_text(ops, &[rect(60.0, 690.0, 100.0, 715.0)], &PageFonts::new());
        assert_eq!(r.removed, 1);
        assert_eq!(shown(&r.operations), vec!["Total"]);

        let spacer = r.operations.iter().find(|o| o.operator == "TJ").unwrap();
        match spacer.operands.first() {
            Some(Object::Array(items)) => {
                assert_eq!(items.len(), 1);
                assert_eq!(object_to_f64(&items[0]), Some(-3000.0));
            }
            other => panic!("unexpected TJ operand {other:?}"),
        }

        // The spacer keeps "Total" where it was.
        let again = redact_text(
            r.operations,
            &[rect(104.0, 690.0, 140.0, 715.0)],
            &PageFonts::new(),
        );
        assert_eq!(again.removed, 1);
        assert!(shown(&again.operations).is_empty());
    }

    #[test]
    fn widths_come_from_the_font() {
        let mut doc = Document::with_version("1.5");
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "FirstChar" => 65,
            "Widths" => vec![600.into(), 700.into()],
        });
        let resources = dictionary! { "Font" => dictionary! { "F1" => font } };
        let fonts = page_fonts(&doc, &resources);
        assert_eq!(fonts[b"F1".as_slice()].width(66), 700.0);

        // "AB" at 10 pt is 13 pt wide, so "C" starts at x = 113.
        let ops = decode("BT /F1 10 Tf 100 700 Td (AB) Tj (C) Tj ET");
        let r = redact_text(ops, &[rect(112.0, 690.0, 130.0, 710.0)], &fonts);
        assert_eq!(shown(&r.operations), vec!["AB"]);
    }

    #[test]
    fn kerning_and_spacing_move_the_pen() {
        // 2 × 500/1000 × 10 + 2 × Tc 1 = 12, then -1000 kerning adds 10: "B" at 22.
        let ops = decode("BT /F1 10 Tf 1 Tc 0 700 Td [(AA) -1000] TJ (B) Tj ET");
        let r = redact_text(ops, &[rect(21.5, 690.0, 22.5, 710.0)], &PageFonts::new());
        assert_eq!(r.removed, 1);
        assert!(shown(&r.operations).is_empty());
    }

    #[test]
    fn composite_font_widths() {
        let mut doc = Document::with_version("1.5");
        let cid_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "W" => vec![
                1.into(),
                Object::Array(vec![500.into(), 600.into()]),
                3.into(),
                5.into(),
                700.into(),
            ],
        });
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![cid_font.into()],
        });
        let resources = dictionary! { "Font" => dictionary! { "F0" => font } };
        let fonts = page_fonts(&doc, &resources);
        let metrics = &fonts[b"F0".as_slice()];
        assert!(metrics.two_byte);
        assert_eq!(metrics.width(1), 500.0);
        assert_eq!(metrics.width(2), 600.0);
        assert_eq!(metrics.width(3), 700.0);
        assert_eq!(metrics.width(5), 700.0);
        assert_eq!(metrics.width(9), 1000.0);
        assert_eq!(metrics.codes(&[0, 1, 0, 3]).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn font_state_is_restored_by_q() {
        // Inside q/Q the font is 20 pt; after Q it is back to 10 pt.
        let ops = decode("/F1 10 Tf q /F1 20 Tf Q BT 0 700 Td (AA) Tj (B) Tj ET");
        let r = redact_text(ops, &[rect(9.5, 690.0, 10.5, 710.0)], &PageFonts::new());
        assert_eq!(r.removed, 1);
    }

    #[test]
    fn tm_sets_absolute_position() {
        let ops = decode("BT 1 0 0 1 400 50 Tm (Footer) Tj ET");
        let r = redact_text(ops, &[rect(390.0, 40.0, 500.0, 60.0)], &PageFonts::new());
        assert_eq!(r.removed, 1);
    }

    #[test]
    fn no_rects_is_identity() {
        let ops = decode("BT 72 700 Td (Keep) Tj ET");
        let n = ops.len();
        let r = redact_text(ops, &[], &PageFonts::new());
        assert_eq!(r.operations.len(), n);
        assert_eq!(r.removed, 0);
    }

    #[test]
    fn cover_paints_white_rects() {
        let ops = cover_operations(&[rect(0.0, 0.0, 10.0, 5.0)]);
        let names: Vec<&str> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(names, vec!["q", "rg", "re", "f", "Q"]);
        assert!(cover_operations(&[]).is_empty());
    }
}
