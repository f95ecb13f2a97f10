//! Low-level helpers over the lopdf object graph.
//!
//! Page attributes such as `/Resources` and `/MediaBox` may be inherited from
//! ancestor `/Pages` nodes and any value may be an indirect reference. The
//! helpers here resolve both so stage code can work with plain values.

use crate::document::BBox;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Maximum depth followed through `/Parent` links or reference chains.
const MAX_DEPTH: usize = 32;

/// Follow indirect references until a direct object is reached.
///
/// `None` on a dangling reference or a chain deeper than [`MAX_DEPTH`].
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Numeric value of an `Integer` or `Real` object.
pub fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// A `Real` object from an `f64`.
pub fn real(v: f64) -> Object {
    Object::Real(v as _)
}

/// Look up a page attribute, walking up `/Parent` for inheritable keys.
pub fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node_id = page_id;
    for _ in 0..MAX_DEPTH {
        let dict = doc.get_object(node_id).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value).cloned();
        }
        node_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// The page media box as `[x0, y0, x1, y1]` in PDF user space.
///
/// Falls back to US Letter when the box is absent or malformed.
pub fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let fallback = [0.0, 0.0, 612.0, 792.0];
    let Some(Object::Array(values)) = inherited_attribute(doc, page_id, b"MediaBox") else {
        return fallback;
    };
    let nums: Vec<f64> = values
        .iter()
        .filter_map(|o| resolve(doc, o).and_then(object_to_f64))
        .collect();
    if nums.len() != 4 {
        return fallback;
    }
    [
        nums[0].min(nums[2]),
        nums[1].min(nums[3]),
        nums[0].max(nums[2]),
        nums[1].max(nums[3]),
    ]
}

/// An axis-aligned rectangle in PDF user space (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PdfRect {
    /// Map a top-down page box onto the media box of a page.
    pub fn from_top_down(bbox: &BBox, media_box: [f64; 4]) -> Self {
        let b = bbox.normalized();
        Self {
            x0: media_box[0] + b.left,
            y0: media_box[3] - b.bottom,
            x1: media_box[0] + b.right,
            y1: media_box[3] - b.top,
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Whether `(x, y)` lies inside the rectangle grown by `tolerance`.
    pub fn contains(&self, x: f64, y: f64, tolerance: f64) -> bool {
        x >= self.x0 - tolerance
            && x <= self.x1 + tolerance
            && y >= self.y0 - tolerance
            && y <= self.y1 + tolerance
    }
}

/// An owned copy of the page's effective `/Resources`, with the given
/// sub-dictionaries inlined so they can be edited without touching objects
/// shared with other pages.
pub fn page_resources(doc: &Document, page_id: ObjectId, inline_keys: &[&[u8]]) -> Dictionary {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(d)) => d,
        _ => Dictionary::new(),
    };
    for key in inline_keys {
        let inlined = match resources.get(key) {
            Ok(obj) => match resolve(doc, obj) {
                Some(Object::Dictionary(d)) => Some(d.clone()),
                _ => None,
            },
            Err(_) => None,
        };
        if let Some(d) = inlined {
            resources.set(key.to_vec(), Object::Dictionary(d));
        }
    }
    resources
}

/// Store `resources` inline on the page.
pub fn set_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    resources: Dictionary,
) -> Result<(), lopdf::Error> {
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Mutable access to a sub-dictionary of `dict`, creating it when absent.
pub fn subdict_mut<'a>(dict: &'a mut Dictionary, key: &[u8]) -> &'a mut Dictionary {
    let missing = !matches!(dict.get(key), Ok(Object::Dictionary(_)));
    if missing {
        dict.set(key.to_vec(), Object::Dictionary(Dictionary::new()));
    }
    match dict.get_mut(key) {
        Ok(Object::Dictionary(d)) => d,
        _ => unreachable!("sub-dictionary was just inserted"),
    }
}

/// Decoded bytes of a stream, whether or not it carries a filter.
pub fn stream_bytes(stream: &Stream) -> Result<Vec<u8>, lopdf::Error> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content()
    } else {
        Ok(stream.content.clone())
    }
}

/// Concatenated, decoded page content.
pub fn read_page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>, lopdf::Error> {
    let page = doc.get_object(page_id)?.as_dict()?;
    let refs: Vec<&Object> = match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.iter().collect(),
        Ok(other) => vec![other],
        Err(_) => return Ok(Vec::new()),
    };

    let mut out = Vec::new();
    for r in refs {
        if let Some(Object::Stream(stream)) = resolve(doc, r) {
            out.extend(stream_bytes(stream)?);
            out.push(b'\n');
        }
    }
    Ok(out)
}

/// Replace the page content with a single new stream.
///
/// The old streams become unreachable and are dropped by the next prune.
pub fn write_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> Result<(), lopdf::Error> {
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), content));
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", Object::Reference(stream_id));
    Ok(())
}

/// Object id of the document catalog.
pub fn catalog_id(doc: &Document) -> Result<ObjectId, lopdf::Error> {
    doc.trailer.get(b"Root")?.as_reference()
}
