//! Error types for the pdf2txt library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`PdfTextError`]: **Fatal**: the run cannot proceed at all (file too
//!   large, missing input, pdfium unavailable, bad credentials). Returned as
//!   `Err(PdfTextError)` from the [`crate::extract::Extractor`] entry points.
//!
//! * [`PageError`]: **Non-fatal**: a single page failed (oversized payload,
//!   remote call exhausted its retries) but the other pages are fine. Stored
//!   inside [`crate::output::PageResult`] and rendered as an inline marker in
//!   the final text.
//!
//! * [`ClientError`]: what an [`crate::client::ExtractionClient`] reports for
//!   one remote call. The retry loop decides from its kind whether to retry,
//!   isolate the page, or abort the run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2txt library.
#[derive(Debug, Error)]
pub enum PdfTextError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Upload exceeds the configured size cap; nothing was processed.
    #[error("File size {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    NotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// A value handed to a pipeline stage is unusable (e.g. a 0×0 image).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ── Rasterisation errors ──────────────────────────────────────────────
    /// The PDF engine is unavailable or failed to render the document.
    #[error("PDF conversion failed for '{path}': {detail}")]
    ConversionFailed { path: PathBuf, detail: String },

    /// The document rendered to zero pages.
    #[error("No pages found in '{path}'")]
    NoPagesFound { path: PathBuf },

    // ── Remote endpoint errors ────────────────────────────────────────────
    /// The endpoint rejected our credentials; retrying cannot help.
    #[error("Authentication failed against the extraction endpoint: {detail}\nCheck DEEPINFRA_API_KEY.")]
    AuthenticationFailed { detail: String },

    /// The connection check against the endpoint failed for a reason other
    /// than credentials.
    #[error("Extraction endpoint check failed: {detail}\nCheck API_BASE_URL and MODEL_NAME.")]
    EndpointUnavailable { detail: String },

    /// Some pages succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::Extraction::into_result`] when the caller
    /// wants to treat any page failure as an error.
    #[error("{failed}/{total} pages failed during extraction (pages {pages:?})")]
    PartialFailure {
        failed: usize,
        total: usize,
        pages: Vec<usize>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// The run continues; the page's slot in the final text carries
/// [`PageError::marker`] instead of extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The encoded image is larger than the endpoint accepts.
    #[error("Page {page}: encoded image is {len} bytes, limit is {limit}")]
    PayloadTooLarge { page: usize, len: usize, limit: usize },

    /// The remote call failed on every attempt.
    #[error("Page {page}: extraction failed after {attempts} attempts: {detail}")]
    ExtractionFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },

    /// JPEG encoding of the page image failed.
    #[error("Page {page}: image encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::PayloadTooLarge { page, .. }
            | PageError::ExtractionFailed { page, .. }
            | PageError::EncodeFailed { page, .. } => *page,
        }
    }

    /// The inline text written into the page's block of the final output.
    pub fn marker(&self) -> String {
        match self {
            PageError::PayloadTooLarge { page, .. } => {
                format!("[ERROR] Image on page {page} exceeds the maximum input size limit.")
            }
            other => format!("[ERROR] {other}"),
        }
    }
}

/// Failure of one call to the extraction endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// 401/403: the credentials are wrong.
    #[error("authentication rejected (HTTP {status}): {detail}")]
    Auth { status: u16, detail: String },

    /// Rate limiting, 5xx, dropped connections: worth another attempt.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The call did not finish within the configured timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The endpoint refused the request for a reason retrying won't fix.
    #[error("request rejected (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// A 2xx response we could not make sense of.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Is another attempt likely to succeed?
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Transient(_) | ClientError::Timeout { .. } | ClientError::InvalidResponse(_)
        )
    }

    /// Map an HTTP status (non-2xx) and body to an error kind.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            401 | 403 => ClientError::Auth { status, detail },
            408 | 429 | 500 | 502 | 503 | 504 => {
                ClientError::Transient(format!("HTTP {status}: {detail}"))
            }
            _ => ClientError::Rejected { status, detail },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_too_large_display() {
        let e = PdfTextError::FileTooLarge {
            size: 11 * 1024 * 1024,
            limit: 10 * 1024 * 1024,
        };
        let msg = e.to_string();
        assert!(msg.contains("11534336"), "got: {msg}");
        assert!(msg.contains("10485760"), "got: {msg}");
    }

    #[test]
    fn payload_marker_is_verbatim() {
        let e = PageError::PayloadTooLarge {
            page: 4,
            len: 30,
            limit: 20,
        };
        assert_eq!(
            e.marker(),
            "[ERROR] Image on page 4 exceeds the maximum input size limit."
        );
        assert_eq!(e.page(), 4);
    }

    #[test]
    fn extraction_failed_marker_names_page() {
        let e = PageError::ExtractionFailed {
            page: 2,
            attempts: 3,
            detail: "HTTP 503".into(),
        };
        let m = e.marker();
        assert!(m.starts_with("[ERROR] Page 2:"), "got: {m}");
        assert!(m.contains("3 attempts"), "got: {m}");
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            ClientError::from_status(401, "bad key"),
            ClientError::Auth { status: 401, .. }
        ));
        assert!(matches!(
            ClientError::from_status(403, "forbidden"),
            ClientError::Auth { status: 403, .. }
        ));
        assert!(ClientError::from_status(429, "slow down").is_transient());
        assert!(ClientError::from_status(503, "busy").is_transient());
        assert!(!ClientError::from_status(400, "bad request").is_transient());
        assert!(!ClientError::from_status(401, "bad key").is_transient());
    }

    #[test]
    fn timeout_is_transient() {
        assert!(ClientError::Timeout { secs: 60 }.is_transient());
    }

    #[test]
    fn partial_failure_display() {
        let e = PdfTextError::PartialFailure {
            failed: 1,
            total: 10,
            pages: vec![7],
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
        assert!(msg.contains("[7]"), "got: {msg}");
    }
}
