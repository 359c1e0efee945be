//! Result types produced by an extraction run.

use crate::error::{PageError, PdfTextError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Extracted text, trimmed. Empty when `error` is set.
    pub text: String,
    /// Remote calls made for this page.
    pub attempts: u32,
    pub duration_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Set when the page failed; the run still continued.
    pub error: Option<PageError>,
}

impl PageResult {
    /// A page that failed before or during its remote call.
    pub fn failed(page_num: usize, attempts: u32, duration_ms: u64, error: PageError) -> Self {
        Self {
            page_num,
            text: String::new(),
            attempts,
            duration_ms,
            input_tokens: 0,
            output_tokens: 0,
            error: Some(error),
        }
    }

    /// What goes under this page's header in the final text.
    pub fn body(&self) -> String {
        match &self.error {
            Some(e) => e.marker(),
            None => self.text.clone(),
        }
    }
}

/// Aggregate numbers for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub succeeded_pages: usize,
    pub failed_pages: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub render_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a finished run hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    /// The assembled `=== Page N ===` document.
    pub text: String,
    /// Per-page results in page order.
    pub pages: Vec<PageResult>,
    pub stats: ExtractionStats,
    /// Suggested file name for saving `text`.
    pub file_name: String,
    /// [`crate::prompts::PROMPT_VERSION`] of the prompt used, or `"custom"`.
    pub prompt_version: String,
}

impl Extraction {
    /// 1-indexed numbers of the pages that failed.
    pub fn failed_pages(&self) -> Vec<usize> {
        self.pages
            .iter()
            .filter(|p| p.error.is_some())
            .map(|p| p.page_num)
            .collect()
    }

    /// Turn any page failure into [`PdfTextError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, PdfTextError> {
        let failed = self.failed_pages();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(PdfTextError::PartialFailure {
                failed: failed.len(),
                total: self.pages.len(),
                pages: failed,
            })
        }
    }
}

/// Header line that opens each page block.
pub fn page_header(page_num: usize) -> String {
    format!("=== Page {page_num} ===")
}

/// Join page results into the final text.
///
/// Each page becomes `=== Page N ===\n{body}\n\n`. Pages are emitted in
/// ascending page order whatever order `pages` arrives in.
pub fn assemble(pages: &[PageResult]) -> String {
    let mut ordered: Vec<&PageResult> = pages.iter().collect();
    ordered.sort_by_key(|p| p.page_num);

    let mut out = String::new();
    for page in ordered {
        out.push_str(&page_header(page.page_num));
        out.push('\n');
        out.push_str(&page.body());
        out.push_str("\n\n");
    }
    out
}

/// Download name for the text extracted from `source`: `<name>_extracted.txt`.
pub fn output_file_name(source: &Path) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "document.pdf".to_string());
    format!("{name}_extracted.txt")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(page_num: usize, text: &str) -> PageResult {
        PageResult {
            page_num,
            text: text.into(),
            attempts: 1,
            duration_ms: 0,
            input_tokens: 0,
            output_tokens: 0,
            error: None,
        }
    }

    #[test]
    fn assemble_formats_blocks() {
        let text = assemble(&[ok(1, "alpha"), ok(2, "beta")]);
        assert_eq!(text, "=== Page 1 ===\nalpha\n\n=== Page 2 ===\nbeta\n\n");
    }

    #[test]
    fn assemble_sorts_out_of_order_pages() {
        let text = assemble(&[ok(3, "c"), ok(1, "a"), ok(2, "b")]);
        let p1 = text.find("=== Page 1 ===").unwrap();
        let p2 = text.find("=== Page 2 ===").unwrap();
        let p3 = text.find("=== Page 3 ===").unwrap();
        assert!(p1 < p2 && p2 < p3);
    }

    #[test]
    fn failed_page_gets_marker() {
        let failed = PageResult::failed(
            2,
            0,
            0,
            PageError::PayloadTooLarge {
                page: 2,
                len: 10,
                limit: 5,
            },
        );
        let text = assemble(&[ok(1, "a"), failed]);
        assert!(text.contains(
            "=== Page 2 ===\n[ERROR] Image on page 2 exceeds the maximum input size limit.\n\n"
        ));
    }

    #[test]
    fn into_result_reports_failed_pages() {
        let extraction = Extraction {
            text: String::new(),
            pages: vec![
                ok(1, "a"),
                PageResult::failed(
                    2,
                    3,
                    0,
                    PageError::ExtractionFailed {
                        page: 2,
                        attempts: 3,
                        detail: "503".into(),
                    },
                ),
            ],
            stats: ExtractionStats::default(),
            file_name: "x_extracted.txt".into(),
            prompt_version: crate::prompts::PROMPT_VERSION.into(),
        };
        assert_eq!(extraction.failed_pages(), vec![2]);
        match extraction.into_result() {
            Err(PdfTextError::PartialFailure { failed, total, pages }) => {
                assert_eq!((failed, total), (1, 2));
                assert_eq!(pages, vec![2]);
            }
            other => panic!("expected PartialFailure, got {other:?}"),
        }
    }

    #[test]
    fn file_name_follows_source() {
        assert_eq!(
            output_file_name(Path::new("/tmp/report.pdf")),
            "report.pdf_extracted.txt"
        );
        assert_eq!(output_file_name(Path::new("")), "document.pdf_extracted.txt");
    }
}
