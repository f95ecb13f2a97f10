//! Embedded Unicode font for the translation overlay.
//!
//! Translations are drawn with a TrueType font embedded as a composite
//! (`Type0`) font with `Identity-H` encoding. Every distinct character drawn
//! in a run gets its own two-byte CID, numbered from 1 in order of first
//! use. The descendant font maps CIDs to glyph ids through a `/CIDToGIDMap`
//! stream and a `/ToUnicode` CMap maps each CID back to its character, so the
//! translated text can be extracted from the output even where the font has
//! no glyph for it.
//!
//! ## Why a bundled default?
//!
//! A run must work on a host with no fonts installed. DejaVu Sans ships with
//! the crate and covers Latin, Greek, Cyrillic, Hebrew and Arabic letters.
//! Scripts it does not cover (Thai, CJK) need a font passed through
//! [`TranslationConfig::font_path`](crate::TranslationConfig::font_path);
//! characters without a glyph are reported as
//! [`ElementError::MissingGlyphs`](crate::ElementError::MissingGlyphs).

use crate::error::TranslateError;
use crate::pipeline::pdf::{page_resources, read_page_content, resolve, stream_bytes};
use lopdf::content::Content;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{self, Write};
use std::path::Path;
use ttf_parser::{Face, GlyphId};

static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
const BUNDLED_NAME: &str = "DejaVuSans";
const FALLBACK_NAME: &str = "TranslationFont";

/// Entries per `beginbfchar` block; the CMap format allows at most 100.
const BFCHAR_CHUNK: usize = 100;

// ── Font source ──────────────────────────────────────────────────────────────

/// TrueType font data used to draw translations.
#[derive(Clone)]
pub struct OverlayFont {
    data: Cow<'static, [u8]>,
    name: String,
}

impl fmt::Debug for OverlayFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayFont")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl OverlayFont {
    /// The font shipped with the crate (DejaVu Sans).
    pub fn bundled() -> Self {
        Self {
            data: Cow::Borrowed(BUNDLED_FONT),
            name: BUNDLED_NAME.to_string(),
        }
    }

    /// The font at `path`, or the bundled one when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, TranslateError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::bundled()),
        }
    }

    /// Read a TrueType font file.
    ///
    /// Fails with [`TranslateError::Configuration`] when the file cannot be
    /// read or is not a single TrueType (`glyf`) font.
    pub fn from_file(path: &Path) -> Result<Self, TranslateError> {
        let data = std::fs::read(path).map_err(|e| {
            TranslateError::Configuration(format!("cannot read font {}: {e}", path.display()))
        })?;
        let name = check_truetype(&data).map_err(|reason| {
            TranslateError::Configuration(format!("font {}: {reason}", path.display()))
        })?;
        Ok(Self {
            data: Cow::Owned(data),
            name,
        })
    }

    /// Use in-memory TrueType data.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, TranslateError> {
        let name = check_truetype(&data)
            .map_err(|reason| TranslateError::Configuration(format!("font: {reason}")))?;
        Ok(Self {
            data: Cow::Owned(data),
            name,
        })
    }

    /// PostScript name, used as `/BaseFont`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A fresh encoder for one document.
    pub fn encoder(&self) -> Result<GlyphEncoder<'_>, TranslateError> {
        let face = Face::parse(&self.data, 0).map_err(|e| TranslateError::Reconstruction {
            detail: format!("font {}: {e}", self.name),
        })?;
        Ok(GlyphEncoder::new(&self.data, face, &self.name))
    }
}

/// Accept a single TrueType font and return its sanitised PostScript name.
fn check_truetype(data: &[u8]) -> Result<String, String> {
    match data.get(..4) {
        Some([0, 1, 0, 0]) | Some(b"true") => {}
        Some(b"OTTO") => {
            return Err("CFF-flavoured OpenType is not supported, use a TrueType font".into())
        }
        Some(b"ttcf") => {
            return Err("font collections are not supported, use a single TrueType font".into())
        }
        _ => return Err("not a TrueType font".into()),
    }
    let face = Face::parse(data, 0).map_err(|e| format!("cannot parse: {e}"))?;
    Ok(postscript_name(&face))
}

fn postscript_name(face: &Face<'_>) -> String {
    let raw = face
        .names()
        .into_iter()
        .filter(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .find_map(|n| n.to_string())
        .unwrap_or_default();
    let name: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Glyph {
    ch: char,
    gid: u16,
    width: f64,
}

/// Assigns CIDs to characters and measures text for one document.
pub struct GlyphEncoder<'a> {
    data: &'a [u8],
    face: Face<'a>,
    name: &'a str,
    /// Font units to thousandths of an em.
    scale: f64,
    cids: HashMap<char, u16>,
    used: Vec<Glyph>,
}

impl<'a> GlyphEncoder<'a> {
    fn new(data: &'a [u8], face: Face<'a>, name: &'a str) -> Self {
        let scale = 1000.0 / f64::from(face.units_per_em().max(1));
        Self {
            data,
            face,
            name,
            scale,
            cids: HashMap::new(),
            used: Vec::new(),
        }
    }

    /// Advance width of `ch` in thousandths of an em.
    pub fn advance(&self, ch: char) -> f64 {
        let gid = self.face.glyph_index(ch).unwrap_or(GlyphId(0));
        self.glyph_advance(gid)
    }

    fn glyph_advance(&self, gid: GlyphId) -> f64 {
        self.face
            .glyph_hor_advance(gid)
            .map_or(0.0, |w| f64::from(w) * self.scale)
    }

    /// Advance width of `text` in points at `size`.
    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        text.chars().map(|c| self.advance(c)).sum::<f64>() * size / 1000.0
    }

    /// Ascender height in thousandths of an em.
    pub fn ascent(&self) -> f64 {
        f64::from(self.face.ascender()) * self.scale
    }

    pub fn has_glyph(&self, ch: char) -> bool {
        self.face.glyph_index(ch).is_some()
    }

    /// Two-byte big-endian CIDs for `text`, assigning new CIDs as needed.
    pub fn encode(&mut self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() * 2);
        for ch in text.chars() {
            out.extend_from_slice(&self.cid(ch).to_be_bytes());
        }
        out
    }

    fn cid(&mut self, ch: char) -> u16 {
        if let Some(&cid) = self.cids.get(&ch) {
            return cid;
        }
        let Ok(cid) = u16::try_from(self.used.len() + 1) else {
            return 0;
        };
        let gid = self.face.glyph_index(ch).map_or(0, |g| g.0);
        self.used.push(Glyph {
            ch,
            gid,
            width: self.advance(ch),
        });
        self.cids.insert(ch, cid);
        cid
    }

    /// Whether nothing has been encoded yet.
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// Encoded characters the font has no glyph for, in order of first use.
    pub fn missing_glyphs(&self) -> Vec<char> {
        self.used
            .iter()
            .filter(|g| g.gid == 0 && !g.ch.is_whitespace())
            .map(|g| g.ch)
            .collect()
    }

    pub fn font_name(&self) -> &str {
        self.name
    }

    /// Store the composite font under the reserved `font_id`.
    pub fn write_font(&self, doc: &mut Document, font_id: ObjectId) {
        let scaled = |v: i16| Object::Integer((f64::from(v) * self.scale).round() as i64);
        let bbox = self.face.global_bounding_box();
        let base_font = Object::Name(self.name.as_bytes().to_vec());

        let file_id = doc.add_object(Stream::new(
            dictionary! { "Length1" => self.data.len() as i64 },
            self.data.to_vec(),
        ));
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => base_font.clone(),
            "Flags" => 32,
            "FontBBox" => vec![
                scaled(bbox.x_min),
                scaled(bbox.y_min),
                scaled(bbox.x_max),
                scaled(bbox.y_max),
            ],
            "ItalicAngle" => 0,
            "Ascent" => scaled(self.face.ascender()),
            "Descent" => scaled(self.face.descender()),
            "CapHeight" => scaled(self.face.capital_height().unwrap_or(self.face.ascender())),
            "StemV" => 80,
            "FontFile2" => file_id,
        });

        let mut cid_to_gid = Vec::with_capacity(2 * (self.used.len() + 1));
        cid_to_gid.extend_from_slice(&0u16.to_be_bytes());
        for g in &self.used {
            cid_to_gid.extend_from_slice(&g.gid.to_be_bytes());
        }
        let map_id = doc.add_object(Stream::new(Dictionary::new(), cid_to_gid));

        let widths: Vec<Object> = self
            .used
            .iter()
            .map(|g| Object::Integer(g.width.round() as i64))
            .collect();
        let descendant_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => base_font.clone(),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => Object::Integer(self.glyph_advance(GlyphId(0)).round() as i64),
            "W" => vec![Object::Integer(1), Object::Array(widths)],
            "CIDToGIDMap" => map_id,
        });

        let cmap = to_unicode_cmap(
            self.used
                .iter()
                .enumerate()
                .map(|(i, g)| ((i + 1) as u16, g.ch)),
        );
        let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), cmap));

        doc.objects.insert(
            font_id,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => base_font,
                "Encoding" => "Identity-H",
                "DescendantFonts" => vec![Object::Reference(descendant_id)],
                "ToUnicode" => to_unicode_id,
            }),
        );
    }
}

// ── ToUnicode ────────────────────────────────────────────────────────────────

/// A `/ToUnicode` CMap mapping two-byte codes to single characters.
pub fn to_unicode_cmap(entries: impl IntoIterator<Item = (u16, char)>) -> Vec<u8> {
    let entries: Vec<(u16, char)> = entries.into_iter().collect();
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );
    for chunk in entries.chunks(BFCHAR_CHUNK) {
        let _ = writeln!(out, "{} beginbfchar", chunk.len());
        for (code, ch) in chunk {
            let mut units = [0u16; 2];
            let hex: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{u:04X}"))
                .collect();
            let _ = writeln!(out, "<{code:04X}> <{hex}>");
        }
        out.push_str("endbfchar\n");
    }
    out.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    out.into_bytes()
}

static RE_BFCHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap());
static RE_BFRANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap());
static RE_CHAR_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap());
static RE_RANGE_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(<[0-9A-Fa-f]*>|\[[^\]]*\])").unwrap()
});
static RE_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([0-9A-Fa-f]*)>").unwrap());

/// Code → text mapping read from a `/ToUnicode` CMap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicode {
    map: HashMap<u32, String>,
}

impl ToUnicode {
    /// Parse the `bfchar` and `bfrange` sections of a CMap.
    pub fn parse(cmap: &[u8]) -> Self {
        let text = String::from_utf8_lossy(cmap);
        let mut map = HashMap::new();

        for section in RE_BFCHAR.captures_iter(&text) {
            for entry in RE_CHAR_ENTRY.captures_iter(&section[1]) {
                if let Ok(code) = u32::from_str_radix(&entry[1], 16) {
                    map.insert(code, utf16_hex(&entry[2]));
                }
            }
        }

        for section in RE_BFRANGE.captures_iter(&text) {
            for entry in RE_RANGE_ENTRY.captures_iter(&section[1]) {
                let (Ok(lo), Ok(hi)) = (
                    u32::from_str_radix(&entry[1], 16),
                    u32::from_str_radix(&entry[2], 16),
                ) else {
                    continue;
                };
                let target = &entry[3];
                if target.starts_with('[') {
                    for (code, dst) in (lo..=hi).zip(RE_HEX.captures_iter(target)) {
                        map.insert(code, utf16_hex(&dst[1]));
                    }
                } else {
                    let mut units = utf16_units(target.trim_matches(|c| c == '<' || c == '>'));
                    for code in lo..=hi.min(lo.saturating_add(0xFFFF)) {
                        map.insert(code, String::from_utf16_lossy(&units));
                        if let Some(last) = units.last_mut() {
                            *last = last.wrapping_add(1);
                        }
                    }
                }
            }
        }
        Self { map }
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }
}

fn utf16_units(hex: &str) -> Vec<u16> {
    hex.as_bytes()
        .chunks(4)
        .filter_map(|c| std::str::from_utf8(c).ok())
        .filter_map(|c| u16::from_str_radix(c, 16).ok())
        .collect()
}

fn utf16_hex(hex: &str) -> String {
    String::from_utf16_lossy(&utf16_units(hex))
}

// ── Text readback ────────────────────────────────────────────────────────────

/// How the strings of one font map back to text.
#[derive(Debug, Clone, Default)]
struct TextDecoder {
    two_byte: bool,
    to_unicode: Option<ToUnicode>,
}

impl TextDecoder {
    fn for_font(doc: &Document, fonts: &Dictionary, name: &[u8]) -> Self {
        let Some(Object::Dictionary(font)) = fonts.get(name).ok().and_then(|o| resolve(doc, o))
        else {
            return Self::default();
        };
        let two_byte = matches!(
            font.get(b"Subtype").ok().and_then(|o| resolve(doc, o)),
            Some(Object::Name(n)) if n == b"Type0"
        );
        let to_unicode = match font.get(b"ToUnicode").ok().and_then(|o| resolve(doc, o)) {
            Some(Object::Stream(s)) => stream_bytes(s).ok().map(|b| ToUnicode::parse(&b)),
            _ => None,
        };
        Self {
            two_byte,
            to_unicode,
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let width = if self.two_byte { 2 } else { 1 };
        bytes
            .chunks(width)
            .map(|code| {
                let code = code.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
                match &self.to_unicode {
                    Some(map) => map.get(code).unwrap_or("\u{FFFD}").to_string(),
                    None => char::from_u32(code).unwrap_or('\u{FFFD}').to_string(),
                }
            })
            .collect()
    }
}

/// Text shown by each text-showing operator on a page, in content order.
///
/// Strings are decoded through their font's `/ToUnicode` map when it has
/// one and read as Latin-1 otherwise.
pub fn shown_text(doc: &Document, page_id: ObjectId) -> Result<Vec<String>, lopdf::Error> {
    let resources = page_resources(doc, page_id, &[b"Font".as_slice()]);
    let fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(d)) => d.clone(),
        _ => Dictionary::new(),
    };
    let content = Content::decode(&read_page_content(doc, page_id)?)?;

    let mut decoders: HashMap<Vec<u8>, TextDecoder> = HashMap::new();
    let mut current: Option<Vec<u8>> = None;
    let mut out = Vec::new();
    for op in &content.operations {
        match op.operator.as_str() {
            "Tf" => {
                current = match op.operands.first() {
                    Some(Object::Name(n)) => Some(n.clone()),
                    _ => None,
                };
            }
            "Tj" | "TJ" | "'" | "\"" => {
                let decoder = match &current {
                    Some(name) => decoders
                        .entry(name.clone())
                        .or_insert_with(|| TextDecoder::for_font(doc, &fonts, name))
                        .clone(),
                    None => TextDecoder::default(),
                };
                let mut text = String::new();
                for operand in &op.operands {
                    match operand {
                        Object::String(bytes, _) => text.push_str(&decoder.decode(bytes)),
                        Object::Array(items) => {
                            for item in items {
                                if let Object::String(bytes, _) = item {
                                    text.push_str(&decoder.decode(bytes));
                                }
                            }
                        }
                        _ => {}
                    }
                }
                out.push(text);
            }
            _ => {}
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_page_doc() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
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
        (doc, page_id)
    }

    #[test]
    fn bundled_font_parses() {
        let font = OverlayFont::bundled();
        assert_eq!(font.name(), "DejaVuSans");
        let glyphs = font.encoder().unwrap();
        assert!(glyphs.has_glyph('A'));
        assert!(glyphs.has_glyph('П'));
        assert!(glyphs.ascent() > 500.0);
    }

    #[test]
    fn rejects_non_truetype_data() {
        assert!(matches!(
            OverlayFont::from_bytes(b"OTTO\0\0\0\0".to_vec()),
            Err(TranslateError::Configuration(_))
        ));
        assert!(matches!(
            OverlayFont::from_bytes(b"not a font".to_vec()),
            Err(TranslateError::Configuration(_))
        ));
        assert!(OverlayFont::from_bytes(BUNDLED_FONT.to_vec()).is_ok());
    }

    #[test]
    fn missing_font_file_is_configuration_error() {
        let err = OverlayFont::load(Some(Path::new("/nonexistent/font.ttf"))).unwrap_err();
        assert!(matches!(err, TranslateError::Configuration(_)));
    }

    #[test]
    fn cids_are_sequential_and_reused() {
        let font = OverlayFont::bundled();
        let mut glyphs = font.encoder().unwrap();
        assert_eq!(glyphs.encode("aba"), vec![0, 1, 0, 2, 0, 1]);
        assert_eq!(glyphs.encode("c"), vec![0, 3]);
    }

    #[test]
    fn widths_come_from_the_font() {
        let font = OverlayFont::bundled();
        let glyphs = font.encoder().unwrap();
        assert_eq!(glyphs.text_width("", 12.0), 0.0);
        assert!(glyphs.text_width("Hello", 10.0) > glyphs.text_width("Hell", 10.0));
        assert!(glyphs.text_width("W", 10.0) > glyphs.text_width("i", 10.0));
    }

    #[test]
    fn characters_without_glyph_are_reported() {
        let font = OverlayFont::bundled();
        let mut glyphs = font.encoder().unwrap();
        glyphs.encode("ok \u{10FFFD}");
        assert_eq!(glyphs.missing_glyphs(), vec!['\u{10FFFD}']);
    }

    #[test]
    fn cmap_parses_ranges_and_arrays() {
        let cmap = b"2 beginbfrange\n<0010> <0012> <0041>\n<0020> <0021> [<0078> <D83DDE00>]\nendbfrange";
        let map = ToUnicode::parse(cmap);
        assert_eq!(map.get(0x11), Some("B"));
        assert_eq!(map.get(0x20), Some("x"));
        assert_eq!(map.get(0x21), Some("😀"));
        assert_eq!(map.get(0x13), None);
    }

    #[test]
    fn unicode_text_round_trips_through_page_content() {
        let font = OverlayFont::bundled();
        let mut glyphs = font.encoder().unwrap();
        let samples = ["สวัสดี", "你好", "Привет", "😀 ok"];
        let mut content = String::from("BT /TrFont 12 Tf 10 10 Td\n");
        for s in samples {
            let hex: String = glyphs.encode(s).iter().map(|b| format!("{b:02X}")).collect();
            content.push_str(&format!("<{hex}> Tj\n"));
        }
        content.push_str("ET");

        let (mut doc, page_id) = one_page_doc();
        let font_id = doc.new_object_id();
        glyphs.write_font(&mut doc, font_id);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page = doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap();
        page.set("Contents", content_id);
        page.set(
            "Resources",
            dictionary! { "Font" => dictionary! { "TrFont" => font_id } },
        );

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        let page_id = *reloaded.get_pages().get(&1).unwrap();
        assert_eq!(shown_text(&reloaded, page_id).unwrap(), samples.to_vec());
    }

    #[test]
    fn type0_font_is_embedded() {
        let font = OverlayFont::bundled();
        let mut glyphs = font.encoder().unwrap();
        glyphs.encode("Привет");
        let (mut doc, _) = one_page_doc();
        let font_id = doc.new_object_id();
        glyphs.write_font(&mut doc, font_id);

        let type0 = doc.get_object(font_id).unwrap().as_dict().unwrap();
        assert_eq!(type0.get(b"Encoding").unwrap(), &Object::Name(b"Identity-H".to_vec()));
        let descendant_id = type0.get(b"DescendantFonts").unwrap().as_array().unwrap()[0]
            .as_reference()
            .unwrap();
        let descendant = doc.get_object(descendant_id).unwrap().as_dict().unwrap();
        let descriptor_id = descendant.get(b"FontDescriptor").unwrap().as_reference().unwrap();
        let descriptor = doc.get_object(descriptor_id).unwrap().as_dict().unwrap();
        assert!(descriptor.has(b"FontFile2"));

        // CID 1 ('П') maps to a real glyph.
        let map_id = descendant.get(b"CIDToGIDMap").unwrap().as_reference().unwrap();
        let map = doc.get_object(map_id).unwrap().as_stream().unwrap();
        assert_eq!(map.content.len(), 2 * 7);
        assert_ne!(&map.content[2..4], &[0, 0]);
    }
}
