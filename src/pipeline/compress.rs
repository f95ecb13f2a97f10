//! Image compression: re-encode embedded JPEG images at a lower quality.
//!
//! Runs after finalisation on the saved bytes. Pages are processed in
//! batches; a batch that fails is recorded and skipped, the rest still run.
//! If the document cannot be reopened or re-saved the finalised bytes are
//! returned unchanged: compression never fails a run.
//!
//! Only `DCTDecode` images with 8-bit gray or RGB samples are touched, and a
//! re-encoded image replaces the original only when it is smaller.

use crate::error::ElementError;
use crate::pipeline::pdf::{page_resources, resolve};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Default JPEG quality for re-encoded images.
pub const DEFAULT_QUALITY: u8 = 80;
/// Default number of pages per batch.
pub const DEFAULT_BATCH_PAGES: usize = 50;

/// Outcome of the compression pass.
#[derive(Debug, Clone, Default)]
pub struct Compression {
    /// Compressed bytes, or the input bytes when nothing changed.
    pub pdf: Vec<u8>,
    /// Images replaced by a smaller re-encoding.
    pub images: usize,
    pub warnings: Vec<ElementError>,
}

/// Re-encodes images reachable from a set of pages.
#[derive(Debug)]
pub struct ImageRecompressor {
    quality: u8,
    seen: HashSet<ObjectId>,
}

impl ImageRecompressor {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            seen: HashSet::new(),
        }
    }

    /// Re-encode every eligible image on `pages`. Returns the number replaced.
    ///
    /// Images shared between pages are handled once per pass.
    pub fn compress_pages(
        &mut self,
        doc: &mut Document,
        pages: &[ObjectId],
    ) -> Result<usize, String> {
        let mut replaced = 0;
        for &page_id in pages {
            doc.get_object(page_id)
                .map_err(|e| format!("page {page_id:?}: {e}"))?;
            let resources = page_resources(doc, page_id, &[b"XObject".as_slice()]);
            let image_ids: Vec<ObjectId> = match resources.get(b"XObject") {
                Ok(Object::Dictionary(xobjects)) => xobjects
                    .iter()
                    .filter_map(|(_, obj)| obj.as_reference().ok())
                    .collect(),
                _ => continue,
            };
            for id in image_ids {
                if !self.seen.insert(id) {
                    continue;
                }
                if self.recompress(doc, id) {
                    replaced += 1;
                }
            }
        }
        Ok(replaced)
    }

    fn recompress(&self, doc: &mut Document, id: ObjectId) -> bool {
        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            return false;
        };
        if !is_plain_jpeg(doc, &stream.dict) {
            return false;
        }
        let original_len = stream.content.len();
        let encoded = match reencode_jpeg(&stream.content, self.quality) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Skipping image {:?}: {}", id, e);
                return false;
            }
        };
        if encoded.len() >= original_len {
            return false;
        }
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(id) {
            debug!(
                "Image {:?}: {} → {} bytes",
                id,
                original_len,
                encoded.len()
            );
            stream.set_content(encoded);
            return true;
        }
        false
    }
}

/// An image XObject stored as a single-filter, 8-bit gray or RGB JPEG.
fn is_plain_jpeg(doc: &Document, dict: &lopdf::Dictionary) -> bool {
    let name_is = |key: &[u8], expected: &[u8]| match dict.get(key) {
        Ok(obj) => match resolve(doc, obj) {
            Some(Object::Name(n)) => n == expected,
            Some(Object::Array(items)) if items.len() == 1 => {
                matches!(&items[0], Object::Name(n) if n == expected)
            }
            _ => false,
        },
        Err(_) => false,
    };
    let bits_ok = matches!(dict.get(b"BitsPerComponent"), Ok(Object::Integer(8)));
    let color_ok = name_is(b"ColorSpace", b"DeviceRGB") || name_is(b"ColorSpace", b"DeviceGray");
    name_is(b"Subtype", b"Image")
        && name_is(b"Filter", b"DCTDecode")
        && bits_ok
        && color_ok
        && !dict.has(b"Decode")
        && !dict.has(b"SMask")
}

/// Decode a JPEG and encode it again at `quality`, keeping its color model.
pub fn reencode_jpeg(data: &[u8], quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
    let img = match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&img)?;
    Ok(out)
}

/// Compress images in `pdf` in batches of `batch_pages` pages.
pub fn compress_pdf(pdf: &[u8], batch_pages: usize, quality: u8) -> Compression {
    let mut recompressor = ImageRecompressor::new(quality);
    compress_pdf_with(pdf, batch_pages, |doc, pages| {
        recompressor.compress_pages(doc, pages)
    })
}

/// [`compress_pdf`] with a caller-supplied batch step.
pub fn compress_pdf_with<F>(pdf: &[u8], batch_pages: usize, mut step: F) -> Compression
where
    F: FnMut(&mut Document, &[ObjectId]) -> Result<usize, String>,
{
    let unchanged = |warnings: Vec<ElementError>| Compression {
        pdf: pdf.to_vec(),
        images: 0,
        warnings,
    };

    let mut doc = match Document::load_mem(pdf) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Image compression skipped: {}", e);
            return unchanged(vec![ElementError::CompressionSkipped {
                detail: e.to_string(),
            }]);
        }
    };

    let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    let mut warnings = Vec::new();
    let mut images = 0;
    for (i, batch) in pages.chunks(batch_pages.max(1)).enumerate() {
        match step(&mut doc, batch) {
            Ok(n) => images += n,
            Err(detail) => {
                warn!("Image compression batch {} failed: {}", i + 1, detail);
                warnings.push(ElementError::Compression {
                    batch: i + 1,
                    detail,
                });
            }
        }
    }

    if images == 0 {
        debug!("No images re-encoded; keeping finalised bytes");
        return unchanged(warnings);
    }

    let mut out = Vec::new();
    if let Err(e) = doc.save_to(&mut out) {
        warn!("Saving compressed document failed: {}", e);
        warnings.push(ElementError::CompressionSkipped {
            detail: e.to_string(),
        });
        return unchanged(warnings);
    }

    info!(
        "Re-encoded {} images: {} → {} bytes",
        images,
        pdf.len(),
        out.len()
    );
    Compression {
        pdf: out,
        images,
        warnings,
    }
}
