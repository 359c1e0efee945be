//! The extraction pipeline: document in, `=== Page N ===` text out.
//!
//! [`Extractor`] owns the run configuration and the two collaborators that
//! touch the outside world, a [`Rasterizer`] and an [`ExtractionClient`].
//! Both are trait objects so callers (and tests) can swap them.
//!
//! ## Failure policy
//!
//! Validation and rasterisation errors end the run with nothing produced.
//! Once pages exist, a page that cannot be encoded, is too large, or keeps
//! failing remotely is isolated: its block carries an `[ERROR] …` marker and
//! the other pages go on. The one remote error that ends the run is an
//! authentication failure, since no later page would get past it.

use crate::client::{ExtractionClient, OpenAiCompatClient};
use crate::config::{ApiConfig, ExtractionConfig};
use crate::error::{ClientError, PageError, PdfTextError};
use crate::output::{assemble, output_file_name, Extraction, ExtractionStats, PageResult};
use crate::pipeline::render::{self, PdfiumRasterizer, Rasterizer};
use crate::pipeline::{encode, input, llm};
use crate::progress::{ExtractionProgress, RunState};
use futures::stream::{self, StreamExt, TryStreamExt};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs documents through rasterise → encode → extract → assemble.
///
/// # Example
/// ```rust,no_run
/// use pdf2txt::{ApiConfig, ExtractionConfig, Extractor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let extractor = Extractor::with_defaults(ExtractionConfig::default(), ApiConfig::from_env()?)?;
/// let bytes = std::fs::read("report.pdf")?;
/// let extraction = extractor.extract_from_bytes(&bytes, "report.pdf").await?;
/// println!("{}", extraction.text);
/// # Ok(())
/// # }
/// ```
pub struct Extractor {
    config: ExtractionConfig,
    rasterizer: Arc<dyn Rasterizer>,
    client: Arc<dyn ExtractionClient>,
}

impl Extractor {
    pub fn new(
        config: ExtractionConfig,
        rasterizer: Arc<dyn Rasterizer>,
        client: Arc<dyn ExtractionClient>,
    ) -> Self {
        let extractor = Self {
            config,
            rasterizer,
            client,
        };
        extractor.emit(RunState::Idle);
        extractor
    }

    /// pdfium for rendering, an OpenAI-compatible endpoint for extraction.
    pub fn with_defaults(config: ExtractionConfig, api: ApiConfig) -> Result<Self, PdfTextError> {
        let rasterizer = Arc::new(PdfiumRasterizer::from_config(&config));
        let client = Arc::new(OpenAiCompatClient::new(api)?);
        Ok(Self::new(config, rasterizer, client))
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// One tiny request to prove the endpoint answers and accepts our key.
    pub async fn verify(&self) -> Result<(), PdfTextError> {
        self.client.verify().await.map_err(|e| match e {
            ClientError::Auth { .. } => PdfTextError::AuthenticationFailed {
                detail: e.to_string(),
            },
            other => PdfTextError::EndpointUnavailable {
                detail: other.to_string(),
            },
        })
    }

    /// Extract text from an in-memory PDF.
    ///
    /// `source_name` is the original file name; it only feeds the suggested
    /// output name and error messages. Buffers above
    /// [`ExtractionConfig::max_upload_bytes`] are refused before anything is
    /// written or rendered. The staged temp file is removed on return.
    pub async fn extract_from_bytes(
        &self,
        bytes: &[u8],
        source_name: &str,
    ) -> Result<Extraction, PdfTextError> {
        info!(
            "Starting extraction: {} ({} bytes, prompt {})",
            source_name,
            bytes.len(),
            self.config.prompt_version()
        );
        self.emit(RunState::Validating);

        let result = self.stage_and_run(bytes, Path::new(source_name)).await;
        self.finish(result)
    }

    /// Extract text from a PDF on disk.
    pub async fn extract_file(&self, path: impl AsRef<Path>) -> Result<Extraction, PdfTextError> {
        let path = path.as_ref();
        info!(
            "Starting extraction: {} (prompt {})",
            path.display(),
            self.config.prompt_version()
        );
        self.emit(RunState::Validating);

        let result = match input::validate_local(path, self.config.max_upload_bytes) {
            Ok(pdf_path) => self.run(&pdf_path, &pdf_path).await,
            Err(e) => Err(e),
        };
        self.finish(result)
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn emit(&self, state: RunState) {
        debug!("Run state → {}", state);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_state(&state);
        }
    }

    fn progress(&self) -> Option<&dyn ExtractionProgress> {
        self.config.progress_callback.as_deref()
    }

    fn finish(&self, result: Result<Extraction, PdfTextError>) -> Result<Extraction, PdfTextError> {
        match &result {
            Ok(_) => self.emit(RunState::Done),
            Err(e) => {
                warn!("Extraction failed: {}", e);
                self.emit(RunState::Failed {
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    /// Size and magic checks, then a temp copy that lives until `run` returns.
    async fn stage_and_run(&self, bytes: &[u8], source: &Path) -> Result<Extraction, PdfTextError> {
        input::check_upload_size(bytes.len() as u64, self.config.max_upload_bytes)?;
        input::check_magic(source, bytes)?;
        let staged = input::stage_bytes(bytes)?;
        self.run(staged.path(), source).await
    }

    async fn run(&self, pdf_path: &Path, source: &Path) -> Result<Extraction, PdfTextError> {
        let total_start = Instant::now();

        // ── Step 1: Rasterise ────────────────────────────────────────────
        self.emit(RunState::Rasterizing);
        let render_start = Instant::now();
        let images = render::render_document(&self.rasterizer, pdf_path).await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;

        if images.is_empty() {
            return Err(PdfTextError::NoPagesFound {
                path: source.to_path_buf(),
            });
        }
        let total_pages = images.len();
        info!("Rendered {} pages in {}ms", total_pages, render_duration_ms);

        if let Some(cb) = self.progress() {
            cb.on_extraction_start(total_pages);
        }

        // ── Step 2: Encode + extract each page ───────────────────────────
        let extract_start = Instant::now();
        let pages = if self.config.concurrency <= 1 {
            self.process_sequential(images).await?
        } else {
            self.process_concurrent(images).await?
        };
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

        // ── Step 3: Assemble ─────────────────────────────────────────────
        self.emit(RunState::Assembling);
        let text = assemble(&pages);

        let succeeded = pages.iter().filter(|p| p.error.is_none()).count();
        let stats = ExtractionStats {
            total_pages,
            succeeded_pages: succeeded,
            failed_pages: total_pages - succeeded,
            total_input_tokens: pages.iter().map(|p| p.input_tokens).sum(),
            total_output_tokens: pages.iter().map(|p| p.output_tokens).sum(),
            render_duration_ms,
            extract_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Extraction complete: {}/{} pages, {}ms total",
            succeeded, total_pages, stats.total_duration_ms
        );
        if let Some(cb) = self.progress() {
            cb.on_extraction_complete(total_pages, succeeded);
        }

        Ok(Extraction {
            text,
            pages,
            stats,
            file_name: output_file_name(source),
            prompt_version: self.config.prompt_version().to_string(),
        })
    }

    async fn process_sequential(
        &self,
        images: Vec<DynamicImage>,
    ) -> Result<Vec<PageResult>, PdfTextError> {
        let total_pages = images.len();
        let mut results = Vec::with_capacity(total_pages);
        for (idx, image) in images.into_iter().enumerate() {
            results.push(self.process_one(idx + 1, total_pages, image).await?);
        }
        Ok(results)
    }

    /// Up to `concurrency` pages in flight; results come back in page order.
    async fn process_concurrent(
        &self,
        images: Vec<DynamicImage>,
    ) -> Result<Vec<PageResult>, PdfTextError> {
        let total_pages = images.len();
        let mut results: Vec<PageResult> = stream::iter(
            images
                .into_iter()
                .enumerate()
                .map(|(idx, image)| self.process_one(idx + 1, total_pages, image)),
        )
        .buffer_unordered(self.config.concurrency)
        .try_collect()
        .await?;

        results.sort_by_key(|p| p.page_num);
        Ok(results)
    }

    /// Encode, size-check and extract one page.
    ///
    /// Only an authentication failure escapes as `Err`.
    async fn process_one(
        &self,
        page_num: usize,
        total_pages: usize,
        image: DynamicImage,
    ) -> Result<PageResult, PdfTextError> {
        self.emit(RunState::Extracting {
            page: page_num,
            total: total_pages,
        });
        if let Some(cb) = self.progress() {
            cb.on_page_start(page_num, total_pages);
        }
        let start = Instant::now();

        let encoded = match encode::encode_page(&image, self.config.jpeg_quality) {
            Ok(encoded) => encoded,
            Err(e) => {
                let err = PageError::EncodeFailed {
                    page: page_num,
                    detail: e.to_string(),
                };
                return Ok(self.page_failed(total_pages, start, err));
            }
        };
        drop(image);

        if let Err(err) = encode::check_payload(page_num, &encoded, self.config.max_payload_len) {
            return Ok(self.page_failed(total_pages, start, err));
        }

        let request = llm::build_request(page_num, encoded, &self.config);
        let result = llm::process_page(self.client.as_ref(), &request, &self.config)
            .await
            .map_err(|e| PdfTextError::AuthenticationFailed {
                detail: e.to_string(),
            })?;

        if let Some(cb) = self.progress() {
            match &result.error {
                None => cb.on_page_complete(page_num, total_pages, result.text.len()),
                Some(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
            }
        }
        Ok(result)
    }

    /// A page that failed before its remote call.
    fn page_failed(&self, total_pages: usize, start: Instant, err: PageError) -> PageResult {
        let page_num = err.page();
        warn!("{}", err);
        if let Some(cb) = self.progress() {
            cb.on_page_error(page_num, total_pages, &err.to_string());
        }
        PageResult::failed(page_num, 0, start.elapsed().as_millis() as u64, err)
    }
}

/// Write `text` to `path` atomically (temp file + rename).
///
/// Parent directories are created as needed. A crash mid-write leaves the
/// previous file, if any, untouched.
pub async fn write_output(path: impl AsRef<Path>, text: &str) -> Result<(), PdfTextError> {
    let path = path.as_ref();
    let write_err = |e: std::io::Error| PdfTextError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp_path = PathBuf::from(tmp);

    tokio::fs::write(&tmp_path, text).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }

    debug!("Wrote {} bytes to {}", text.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_output_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/report.pdf_extracted.txt");

        write_output(&path, "=== Page 1 ===\nhi\n\n").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "=== Page 1 ===\nhi\n\n"
        );

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn write_output_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_output(&path, "old").await.unwrap();
        write_output(&path, "new").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[tokio::test]
    async fn write_output_into_a_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let err = write_output(blocker.join("out.txt"), "text").await.unwrap_err();
        assert!(matches!(err, PdfTextError::OutputWriteFailed { .. }));
    }
}
