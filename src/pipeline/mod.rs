//! Pipeline stages for PDF-to-text extraction.
//!
//! Each submodule implements one step and knows nothing about the others;
//! [`crate::extract::Extractor`] strings them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ normalize ──▶ encode ──▶ llm
//! (checks)  (pdfium)   (≤ 2000 px)   (JPEG/b64)  (model + retry)
//! ```
//!
//! 1. [`input`]: size cap, `%PDF` check, staging uploaded bytes to a
//!    temp file pdfium can open
//! 2. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is blocking
//! 3. [`normalize`]: cap the longest edge, aspect ratio preserved
//! 4. [`encode`]: JPEG-encode and base64-wrap for a `data:` URI, plus the
//!    per-page payload limit
//! 5. [`llm`]: the model call with retry/backoff; the only stage with
//!    network I/O

pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod render;
