//! PDF rasterisation: render every page to a normalised `DynamicImage`.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which is blocking
//! and CPU-bound. [`render_document`] moves the work onto tokio's blocking
//! pool so the runtime's worker threads keep serving network I/O.
//!
//! ## Sizing
//!
//! Each page is rendered at `dpi`, with its width capped at `max_width`, then
//! passed through [`crate::pipeline::normalize::normalize`] so the longest
//! edge never exceeds `max_dimension`.

use crate::config::ExtractionConfig;
use crate::error::PdfTextError;
use crate::pipeline::normalize::normalize;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a PDF on disk into one image per page, in page order.
///
/// Implementations are blocking; the pipeline calls them from
/// `spawn_blocking`. An empty vector means the document has no pages.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, PdfTextError>;
}

/// [`Rasterizer`] backed by pdfium, located through `pdfium-probe`.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    pub dpi: u32,
    pub max_width: Option<u32>,
    pub max_dimension: u32,
    pub password: Option<String>,
}

impl PdfiumRasterizer {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_width: config.max_width,
            max_dimension: config.max_dimension,
            password: config.password.clone(),
        }
    }
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

/// Target pixel width for a page `width_pts` points wide.
///
/// PDF user space is 72 points per inch.
pub fn page_width_px(width_pts: f32, dpi: u32, max_width: Option<u32>) -> i32 {
    let at_dpi = (width_pts * dpi as f32 / 72.0).round().max(1.0) as u32;
    let capped = match max_width {
        Some(cap) => at_dpi.min(cap),
        None => at_dpi,
    };
    capped.min(i32::MAX as u32) as i32
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, PdfTextError> {
        if !pdf_path.exists() {
            return Err(PdfTextError::NotFound {
                path: pdf_path.to_path_buf(),
            });
        }

        let pdfium = pdfium_probe::bind().map_err(|e| PdfTextError::ConversionFailed {
            path: pdf_path.to_path_buf(),
            detail: e.to_string(),
        })?;

        let password = self.password.as_deref();
        let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            let detail = if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    "wrong password".to_string()
                } else {
                    "document is encrypted; supply a password".to_string()
                }
            } else {
                err_str
            };
            PdfTextError::ConversionFailed {
                path: pdf_path.to_path_buf(),
                detail,
            }
        })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let mut images = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            let width_px = page_width_px(page.width().value, self.dpi, self.max_width);
            let render_config = PdfRenderConfig::new().set_target_width(width_px);

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                PdfTextError::ConversionFailed {
                    path: pdf_path.to_path_buf(),
                    detail: format!("page {}: {:?}", idx + 1, e),
                }
            })?;

            let image = normalize(bitmap.as_image(), self.max_dimension)?;
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }

        Ok(images)
    }
}

/// Run `rasterizer` on the blocking pool.
pub async fn render_document(
    rasterizer: &Arc<dyn Rasterizer>,
    pdf_path: &Path,
) -> Result<Vec<DynamicImage>, PdfTextError> {
    let rasterizer = Arc::clone(rasterizer);
    let path: PathBuf = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || rasterizer.rasterize(&path))
        .await
        .map_err(|e| PdfTextError::Internal(format!("Render task panicked: {}", e)))?
}
