//! Translated-text overlay on an optional content layer.
//!
//! Every translated run is drawn in the embedded overlay font inside its
//! source bounding box, wrapped at word boundaries and shrunk until it fits,
//! then clipped to the box. All runs on a page sit inside one
//! `/OC … BDC … EMC` section bound to a single optional content group, so
//! viewers can switch the translation on and off as one layer.
//!
//! Glyph metrics and string encoding come from [`GlyphEncoder`]; see
//! [`crate::pipeline::font`].

use crate::pipeline::font::GlyphEncoder;
use crate::pipeline::pdf::{catalog_id, real, subdict_mut, PdfRect};
use lopdf::content::Operation;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use tracing::debug;

/// Resource name of the overlay font on every touched page.
pub const FONT_RESOURCE: &str = "TrFont";
/// Resource name of the layer's property list on every touched page.
pub const LAYER_RESOURCE: &str = "TrLayer";

/// Largest font size tried when fitting a run.
pub const MAX_FONT_SIZE: f64 = 12.0;
/// Smallest font size; text that still overflows is clipped.
pub const MIN_FONT_SIZE: f64 = 2.0;
const FONT_STEP: f64 = 0.5;
const LINE_HEIGHT: f64 = 1.2;
const PADDING: f64 = 0.5;

// ── Layer ────────────────────────────────────────────────────────────────────

/// Register an optional content group named `name`, visible by default.
///
/// Adds it to the catalog's `/OCProperties` (creating that dictionary when
/// the document has none) and returns the group's object id.
pub fn create_layer(doc: &mut Document, name: &str) -> Result<ObjectId, lopdf::Error> {
    let ocg_id = doc.add_object(dictionary! {
        "Type" => "OCG",
        "Name" => Object::string_literal(name),
    });

    let root_id = catalog_id(doc)?;
    let existing = doc
        .get_object(root_id)?
        .as_dict()?
        .get(b"OCProperties")
        .ok()
        .and_then(|o| match o {
            Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok().cloned(),
            Object::Dictionary(d) => Some(d.clone()),
            _ => None,
        });

    let mut props = existing.unwrap_or_else(Dictionary::new);
    push_to_array(&mut props, b"OCGs", ocg_id);
    let default_config = subdict_mut(&mut props, b"D");
    push_to_array(default_config, b"ON", ocg_id);
    push_to_array(default_config, b"Order", ocg_id);

    let catalog = doc.get_object_mut(root_id)?.as_dict_mut()?;
    catalog.set("OCProperties", Object::Dictionary(props));
    debug!("Created optional content layer {:?} as {:?}", name, ocg_id);
    Ok(ocg_id)
}

fn push_to_array(dict: &mut Dictionary, key: &[u8], id: ObjectId) {
    let mut items = match dict.get(key) {
        Ok(Object::Array(a)) => a.clone(),
        _ => Vec::new(),
    };
    items.push(Object::Reference(id));
    dict.set(key.to_vec(), Object::Array(items));
}

/// Make the overlay font and layer available under the page's resources.
pub fn register_resources(resources: &mut Dictionary, font_id: ObjectId, layer_id: ObjectId) {
    subdict_mut(resources, b"Font").set(FONT_RESOURCE, Object::Reference(font_id));
    subdict_mut(resources, b"Properties").set(LAYER_RESOURCE, Object::Reference(layer_id));
}

// ── Text layout ──────────────────────────────────────────────────────────────

/// One translated run to draw.
#[derive(Debug, Clone)]
pub struct OverlayText<'a> {
    pub rect: PdfRect,
    pub text: &'a str,
}

/// A run laid out for a given box.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub font_size: f64,
    pub lines: Vec<String>,
}

/// Choose the largest font size at which `text` wraps inside `width × height`.
pub fn layout(text: &str, width: f64, height: f64, glyphs: &GlyphEncoder<'_>) -> Layout {
    let avail_w = (width - 2.0 * PADDING).max(1.0);
    let avail_h = (height - 2.0 * PADDING).max(1.0);
    let start = MAX_FONT_SIZE.min(avail_h / LINE_HEIGHT).max(MIN_FONT_SIZE);

    let mut size = start;
    loop {
        let lines = wrap(text, avail_w, size, glyphs);
        let needed = lines.len() as f64 * size * LINE_HEIGHT;
        if needed <= avail_h || size <= MIN_FONT_SIZE {
            return Layout { font_size: size, lines };
        }
        size = (size - FONT_STEP).max(MIN_FONT_SIZE);
    }
}

/// Greedy word wrap; words wider than the line are broken by character.
///
/// Scripts written without spaces (Thai, CJK) are one long word and so
/// break wherever the line is full.
pub fn wrap(text: &str, width: f64, size: f64, glyphs: &GlyphEncoder<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if glyphs.text_width(&candidate, size) <= width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            for ch in word.chars() {
                line.push(ch);
                if glyphs.text_width(&line, size) > width && line.chars().count() > 1 {
                    line.pop();
                    lines.push(std::mem::take(&mut line));
                    line.push(ch);
                }
            }
        }
        lines.push(line);
    }
    while lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

// ── Content ──────────────────────────────────────────────────────────────────

/// Operations drawing `runs` inside one marked-content section on the layer.
pub fn overlay_operations(runs: &[OverlayText<'_>], glyphs: &mut GlyphEncoder<'_>) -> Vec<Operation> {
    if runs.is_empty() {
        return Vec::new();
    }
    let mut ops = vec![Operation::new(
        "BDC",
        vec![Object::Name(b"OC".to_vec()), Object::Name(LAYER_RESOURCE.as_bytes().to_vec())],
    )];
    for run in runs {
        ops.extend(run_operations(run, glyphs));
    }
    ops.push(Operation::new("EMC", vec![]));
    ops
}

fn run_operations(run: &OverlayText<'_>, glyphs: &mut GlyphEncoder<'_>) -> Vec<Operation> {
    let r = run.rect;
    let Layout { font_size, lines } = layout(run.text, r.width(), r.height(), glyphs);
    let leading = font_size * LINE_HEIGHT;
    let first_baseline = r.y1 - PADDING - font_size * glyphs.ascent() / 1000.0;

    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "re",
            vec![real(r.x0), real(r.y0), real(r.width()), real(r.height())],
        ),
        Operation::new("W", vec![]),
        Operation::new("n", vec![]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), real(font_size)],
        ),
        Operation::new("TL", vec![real(leading)]),
        Operation::new("g", vec![real(0.0)]),
        Operation::new("Td", vec![real(r.x0 + PADDING), real(first_baseline)]),
    ];
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            ops.push(Operation::new("T*", vec![]));
        }
        if line.is_empty() {
            continue;
        }
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(glyphs.encode(line), StringFormat::Hexadecimal)],
        ));
    }
    ops.push(Operation::new("ET", vec![]));
    ops.push(Operation::new("Q", vec![]));
    ops
}
