//! # pdf2txt
//!
//! Extract plain text from PDF documents with a remote vision language model.
//!
//! ## Why this crate?
//!
//! Scanned pages, tables and multi-column layouts defeat text-layer tools
//! such as pdftotext. This crate rasterises every page and has a vision model
//! read it, asking for the text exactly as printed, tables and headers
//! included.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Validate   size cap (10 MiB), %PDF magic
//!  ├─ 2. Render     rasterise pages via pdfium (spawn_blocking)
//!  ├─ 3. Normalise  longest edge ≤ 2000 px
//!  ├─ 4. Encode     JPEG → base64 data URI
//!  ├─ 5. Extract    one chat completion per page, with retry
//!  └─ 6. Assemble   "=== Page N ===" blocks in page order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2txt::{ApiConfig, ExtractionConfig, Extractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // DEEPINFRA_API_KEY, plus optional MODEL_NAME / API_BASE_URL
//!     let api = ApiConfig::from_env()?;
//!     let extractor = Extractor::with_defaults(ExtractionConfig::default(), api)?;
//!     let extraction = extractor.extract_file("document.pdf").await?;
//!     println!("{}", extraction.text);
//!     eprintln!("failed pages: {:?}", extraction.failed_pages());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2txt` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2txt = { version = "0.1", default-features = false }
//! ```
//!
//! ## Native pdfium
//!
//! Rendering needs the pdfium shared library at runtime. It is located by the
//! `pdfium-probe` workspace crate; set `PDFIUM_LIB_PATH` to point at it
//! explicitly, or run `pdf2txt --probe-pdfium` to see where it was looked for.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{Completion, ExtractionClient, OpenAiCompatClient, PageRequest};
pub use config::{ApiConfig, ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ClientError, PageError, PdfTextError};
pub use extract::{write_output, Extractor};
pub use output::{Extraction, ExtractionStats, PageResult};
pub use pipeline::encode::EncodedImage;
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use progress::{ExtractionProgress, NoopProgress, ProgressCallback, RunState};
