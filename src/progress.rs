//! Progress observer for extraction runs.
//!
//! Inject an [`Arc<dyn ExtractionProgress>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! state transitions and per-page events. The observer never influences the
//! result; it only reports.
//!
//! # Example
//!
//! ```rust
//! use pdf2txt::{ExtractionConfig, ExtractionProgress};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExtractionProgress for Printer {
//!     fn on_page_start(&self, page_num: usize, total_pages: usize) {
//!         eprintln!("Processing page {page_num} of {total_pages}...");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Where a run currently is.
///
/// ```text
/// Idle → Validating → Rasterizing → Extracting(1..N) → Assembling → Done
///                 ╲          ╲              ╲              ╲
///                  ╰──────────┴──────────────┴──────────────┴──▶ Failed
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// Reported once, when the `Extractor` is built; runs start at `Validating`.
    Idle,
    Validating,
    Rasterizing,
    /// Working on page `page` (1-indexed) of `total`.
    Extracting { page: usize, total: usize },
    Assembling,
    Done,
    Failed { reason: String },
}

impl RunState {
    /// `Done` and `Failed` end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed { .. })
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Validating => write!(f, "validating"),
            RunState::Rasterizing => write!(f, "rasterizing"),
            RunState::Extracting { page, total } => write!(f, "extracting page {page}/{total}"),
            RunState::Assembling => write!(f, "assembling"),
            RunState::Done => write!(f, "done"),
            RunState::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Called by the pipeline as a run advances.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` page events
/// arrive from concurrently polled futures. All methods default to no-ops.
pub trait ExtractionProgress: Send + Sync {
    /// Every state transition, including the terminal one.
    fn on_state(&self, state: &RunState) {
        let _ = state;
    }

    /// Called once the page count is known, before the first page.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's remote call.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page produced text.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page failed; the run continues.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has been attempted.
    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// Observer that ignores everything.
pub struct NoopProgress;

impl ExtractionProgress for NoopProgress {}

/// The type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StateLog(Mutex<Vec<RunState>>);

    impl ExtractionProgress for StateLog {
        fn on_state(&self, state: &RunState) {
            self.0.lock().unwrap().push(state.clone());
        }
    }

    #[test]
    fn noop_does_not_panic() {
        let cb = NoopProgress;
        cb.on_state(&RunState::Validating);
        cb.on_extraction_start(3);
        cb.on_page_start(1, 3);
        cb.on_page_complete(1, 3, 10);
        cb.on_page_error(2, 3, "boom");
        cb.on_extraction_complete(3, 2);
    }

    #[test]
    fn states_are_forwarded() {
        let log = StateLog::default();
        log.on_state(&RunState::Validating);
        log.on_state(&RunState::Extracting { page: 1, total: 2 });
        log.on_state(&RunState::Done);
        let seen = log.0.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[2].is_terminal());
        assert!(!seen[1].is_terminal());
    }

    #[test]
    fn state_display() {
        assert_eq!(
            RunState::Extracting { page: 2, total: 5 }.to_string(),
            "extracting page 2/5"
        );
        assert_eq!(
            RunState::Failed {
                reason: "x".into()
            }
            .to_string(),
            "failed: x"
        );
    }
}
