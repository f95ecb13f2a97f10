//! Pipeline stages for PDF translation.
//!
//! Each submodule implements one transformation step, so each can be tested
//! on its own and swapped (e.g. a different structure extractor) without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm ──────────▶ reconstruct ──▶ compress
//! (bytes)   (engine)    (chat API)      (lopdf)         (image)
//!                        ├ client
//!                        └ postprocess   ├ redact
//!                                        ├ overlay
//!                                        └ font
//! ```
//!
//! 1. [`input`]   — validate the uploaded bytes and manage scratch files
//! 2. [`extract`] — run the structure extractor and adapt its output into
//!    the top-down [`crate::document::DocumentModel`]
//! 3. [`llm`]     — translate each distinct string once, in windows of
//!    concurrent requests over the pooled [`client`]; answers are tidied by
//!    [`postprocess`]
//! 4. [`reconstruct`] — remove source text ([`redact`]), draw translations on
//!    one toggleable layer ([`overlay`]) in an embedded TrueType font
//!    ([`font`]) and finalise the document
//! 5. [`compress`] — re-encode embedded JPEG images in page batches
//!
//! [`pdf`] holds the lopdf helpers shared by stages 1, 4 and 5.

pub mod client;
pub mod compress;
pub mod extract;
pub mod font;
pub mod input;
pub mod llm;
pub mod overlay;
pub mod pdf;
pub mod postprocess;
pub mod reconstruct;
pub mod redact;
