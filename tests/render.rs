//! Rasterisation tests against the real pdfium library.
//!
//! PDFs are generated on the fly with pdfium itself. Every test returns early
//! with a SKIP line when the native library cannot be found, so the suite
//! stays green on machines without pdfium.
//!
//! Run with a specific library:
//!   PDFIUM_LIB_PATH=/opt/pdfium/lib cargo test --test render -- --nocapture

use pdf2txt::{ExtractionConfig, PdfTextError, PdfiumRasterizer, Rasterizer};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// pdfium is initialised per binding; keep these tests off each other's toes.
static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Skip this test when pdfium is not loadable.
macro_rules! skip_without_pdfium {
    () => {{
        match pdfium_probe::bind() {
            Ok(pdfium) => pdfium,
            Err(e) => {
                println!("SKIP: pdfium not available\n{e}");
                return;
            }
        }
    }};
}

/// Write an `n`-page A4 PDF to `dir` and return its path.
fn make_pdf(pdfium: &Pdfium, dir: &Path, n: usize) -> PathBuf {
    let mut document = pdfium.create_new_pdf().expect("create pdf");
    for _ in 0..n {
        document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .expect("add page");
    }
    let path = dir.join(format!("{n}-pages.pdf"));
    document.save_to_file(&path).expect("save pdf");
    path
}

#[test]
fn renders_one_image_per_page() {
    let _guard = serial();
    let pdfium = skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let path = make_pdf(&pdfium, dir.path(), 3);
    drop(pdfium);

    let images = PdfiumRasterizer::default().rasterize(&path).unwrap();
    assert_eq!(images.len(), 3);
}

#[test]
fn pages_come_back_in_document_order() {
    let _guard = serial();
    let pdfium = skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();

    // A4 portrait, then US Letter landscape, then A4 portrait again.
    let letter_landscape = PdfPagePaperSize::Custom(PdfPoints::new(792.0), PdfPoints::new(612.0));
    let mut document = pdfium.create_new_pdf().expect("create pdf");
    for size in [PdfPagePaperSize::a4(), letter_landscape, PdfPagePaperSize::a4()] {
        document
            .pages_mut()
            .create_page_at_end(size)
            .expect("add page");
    }
    let path = dir.path().join("mixed.pdf");
    document.save_to_file(&path).expect("save pdf");
    drop(document);
    drop(pdfium);

    let config = ExtractionConfig::builder()
        .dpi(72)
        .max_width(None)
        .build()
        .unwrap();
    let images = PdfiumRasterizer::from_config(&config).rasterize(&path).unwrap();
    let sizes: Vec<(u32, u32)> = images.iter().map(|i| (i.width(), i.height())).collect();

    assert_eq!(sizes.len(), 3);
    // At 72 DPI one point is one pixel.
    assert!(sizes[0].0.abs_diff(595) <= 1 && sizes[0].1.abs_diff(842) <= 1, "{sizes:?}");
    assert!(sizes[1].0.abs_diff(792) <= 1 && sizes[1].1.abs_diff(612) <= 1, "{sizes:?}");
    assert_eq!(sizes[2], sizes[0]);
}

#[test]
fn rendered_pages_respect_width_cap_and_max_dimension() {
    let _guard = serial();
    let pdfium = skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let path = make_pdf(&pdfium, dir.path(), 1);
    drop(pdfium);

    // A4 at 200 DPI is ~1654 px wide, under the 1700 cap; its height
    // (~2339 px) exceeds 2000, so normalisation brings it down.
    let images = PdfiumRasterizer::default().rasterize(&path).unwrap();
    let (w, h) = (images[0].width(), images[0].height());
    assert!(w.max(h) <= 2000, "{w}x{h}");
    assert!(h > w, "portrait page rendered as {w}x{h}");

    let config = ExtractionConfig::builder()
        .dpi(72)
        .max_width(Some(300))
        .build()
        .unwrap();
    let images = PdfiumRasterizer::from_config(&config).rasterize(&path).unwrap();
    assert_eq!(images[0].width(), 300);
}

#[test]
fn garbage_file_is_a_conversion_failure() {
    let _guard = serial();
    let pdfium = skip_without_pdfium!();
    drop(pdfium);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"%PDF-1.4\nthis is not really a pdf").unwrap();

    let err = PdfiumRasterizer::default().rasterize(&path).unwrap_err();
    assert!(
        matches!(err, PdfTextError::ConversionFailed { .. }),
        "got {err:?}"
    );
}

#[test]
fn missing_file_is_not_found_without_pdfium() {
    let err = PdfiumRasterizer::default()
        .rasterize(Path::new("/does/not/exist.pdf"))
        .unwrap_err();
    assert!(matches!(err, PdfTextError::NotFound { .. }));
}
