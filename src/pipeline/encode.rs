//! Image encoding: `DynamicImage` → base64 JPEG ready for a `data:` URI.
//!
//! OpenAI-compatible vision endpoints take images inline as
//! `data:image/jpeg;base64,<payload>` inside the JSON request body. JPEG keeps
//! the request small; the quality knob trades payload size against the
//! crispness of small print.

use crate::error::PageError;
use crate::pipeline::normalize::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// MIME type of every encoded page.
pub const JPEG_MIME: &str = "image/jpeg";

/// A page image as base64 text plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub base64: String,
    pub mime_type: String,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>`.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }

    /// Length of the base64 payload in bytes.
    pub fn len(&self) -> usize {
        self.base64.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base64.is_empty()
    }
}

/// Encode a page as base64 JPEG at `quality`.
pub fn encode_page<I: PageImage>(img: &I, quality: u8) -> Result<EncodedImage, image::ImageError> {
    let jpeg = img.to_jpeg(quality)?;
    let b64 = STANDARD.encode(&jpeg);
    debug!(
        "Encoded image → {} bytes JPEG, {} bytes base64",
        jpeg.len(),
        b64.len()
    );

    Ok(EncodedImage {
        base64: b64,
        mime_type: JPEG_MIME.to_string(),
    })
}

/// Reject payloads above `limit`; `None` means unlimited.
pub fn check_payload(
    page_num: usize,
    encoded: &EncodedImage,
    limit: Option<usize>,
) -> Result<(), PageError> {
    match limit {
        Some(limit) if encoded.len() > limit => Err(PageError::PayloadTooLarge {
            page: page_num,
            len: encoded.len(),
            limit,
        }),
        _ => Ok(()),
    }
}
