//! # pdfium-probe
//!
//! Locate and bind a [PDFium](https://pdfium.googlesource.com/pdfium/) shared
//! library for `pdfium-render`, remembering every location that was tried.
//!
//! A missing `libpdfium` is almost always a deployment problem rather than a
//! data problem, so the error returned by [`bind`] lists each candidate and
//! why it was rejected. That list is what the user needs to fix their setup.
//!
//! ## Search order
//!
//! 1. `PDFIUM_LIB_PATH`: a library file or a directory containing one.
//! 2. `PDFIUM_DYNAMIC_LIB_PATH`: a directory containing the library.
//! 3. The per-user cache directory (see [`library_cache_dir`]).
//! 4. The directory of the running executable.
//! 5. The current working directory.
//! 6. Well-known system library directories for the platform.
//! 7. The platform loader's default search (`Pdfium::bind_to_system_library`).
//!
//! ## Usage
//!
//! ```rust,no_run
//! let pdfium = pdfium_probe::bind().unwrap_or_else(|e| panic!("{e}"));
//! # drop(pdfium);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;

/// Environment variable naming a pdfium library file or its directory.
pub const LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Environment variable naming a directory that holds the pdfium library.
pub const DYNAMIC_LIB_DIR_ENV: &str = "PDFIUM_DYNAMIC_LIB_PATH";

/// Environment variable overriding [`library_cache_dir`].
pub const CACHE_DIR_ENV: &str = "PDFIUM_PROBE_CACHE_DIR";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by pdfium-probe.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// No candidate location produced a usable library.
    #[error("PDFium library could not be loaded. Locations tried:\n{}", render_attempts(.attempts))]
    NotFound { attempts: Vec<Attempt> },
}

impl ProbeError {
    /// Every location tried before giving up.
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            ProbeError::NotFound { attempts } => attempts,
        }
    }
}

fn render_attempts(attempts: &[Attempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("  - {a}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Candidates ───────────────────────────────────────────────────────────────

/// One place the library might live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// An explicit library file.
    File(PathBuf),
    /// A directory expected to hold the platform library name.
    Directory(PathBuf),
    /// The platform loader's default search path.
    System,
}

impl Candidate {
    /// The library file this candidate resolves to, if it names one.
    pub fn library_file(&self) -> Option<PathBuf> {
        match self {
            Candidate::File(p) => Some(p.clone()),
            Candidate::Directory(dir) => {
                let dir = dir.to_str()?;
                Some(PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(dir)))
            }
            Candidate::System => None,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::File(p) => write!(f, "file {}", p.display()),
            Candidate::Directory(p) => write!(f, "directory {}", p.display()),
            Candidate::System => write!(f, "system library search path"),
        }
    }
}

/// The outcome of trying one [`Candidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub candidate: Candidate,
    pub outcome: String,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.candidate, self.outcome)
    }
}

/// Result of a full [`probe`]: everything tried, and what worked.
#[derive(Debug, Clone)]
pub struct Probe {
    pub attempts: Vec<Attempt>,
    pub resolved: Option<Candidate>,
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the per-user directory where a pdfium library may be dropped.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/pdf2txt/`
/// - **Linux**: `~/.cache/pdf2txt/`
/// - **Windows**: `%LOCALAPPDATA%\pdf2txt\`
///
/// Override by setting `PDFIUM_PROBE_CACHE_DIR`.
pub fn library_cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("pdf2txt")
}

fn system_dirs() -> &'static [&'static str] {
    match std::env::consts::OS {
        "linux" => &[
            "/usr/local/lib",
            "/usr/lib",
            "/usr/lib64",
            "/usr/lib/x86_64-linux-gnu",
            "/usr/lib/aarch64-linux-gnu",
        ],
        "macos" => &["/opt/homebrew/lib", "/usr/local/lib"],
        _ => &[],
    }
}

/// Every candidate location, in search order.
pub fn candidates() -> Vec<Candidate> {
    let mut out = Vec::new();

    if let Ok(p) = std::env::var(LIB_PATH_ENV) {
        if !p.is_empty() {
            let p = PathBuf::from(p);
            if p.is_dir() {
                out.push(Candidate::Directory(p));
            } else {
                out.push(Candidate::File(p));
            }
        }
    }

    if let Ok(p) = std::env::var(DYNAMIC_LIB_DIR_ENV) {
        if !p.is_empty() {
            out.push(Candidate::Directory(PathBuf::from(p)));
        }
    }

    out.push(Candidate::Directory(library_cache_dir()));

    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        out.push(Candidate::Directory(dir));
    }

    out.push(Candidate::Directory(PathBuf::from("./")));

    out.extend(
        system_dirs()
            .iter()
            .map(|d| Candidate::Directory(PathBuf::from(d))),
    );

    out.push(Candidate::System);

    // Keep the first occurrence of each location.
    let mut seen = Vec::with_capacity(out.len());
    out.retain(|c| {
        if seen.contains(c) {
            false
        } else {
            seen.push(c.clone());
            true
        }
    });
    out
}

// ── Binding ──────────────────────────────────────────────────────────────────

static RESOLVED: OnceLock<Candidate> = OnceLock::new();

fn try_bind(candidate: &Candidate) -> Result<Pdfium, String> {
    let bindings = match candidate.library_file() {
        Some(path) => {
            if !path.exists() {
                return Err(format!("{} does not exist", path.display()));
            }
            Pdfium::bind_to_library(&path).map_err(|e| format!("{e:?}"))?
        }
        None if *candidate == Candidate::System => {
            Pdfium::bind_to_system_library().map_err(|e| format!("{e:?}"))?
        }
        None => return Err("path is not valid UTF-8".to_string()),
    };
    Ok(Pdfium::new(bindings))
}

/// Binds to PDFium, trying every [`candidates`] entry in order.
///
/// The first candidate that binds is remembered for the rest of the process
/// and tried first on later calls.
pub fn bind() -> Result<Pdfium, ProbeError> {
    if let Some(known) = RESOLVED.get() {
        if let Ok(pdfium) = try_bind(known) {
            return Ok(pdfium);
        }
    }

    let mut attempts = Vec::new();
    for candidate in candidates() {
        match try_bind(&candidate) {
            Ok(pdfium) => {
                let _ = RESOLVED.set(candidate);
                return Ok(pdfium);
            }
            Err(outcome) => attempts.push(Attempt { candidate, outcome }),
        }
    }

    Err(ProbeError::NotFound { attempts })
}

/// Runs the full search and reports each step, for diagnostics.
///
/// Stops at the first candidate that binds; the bound library is released
/// before returning.
pub fn probe() -> Probe {
    let mut attempts = Vec::new();
    for candidate in candidates() {
        match try_bind(&candidate) {
            Ok(_pdfium) => {
                attempts.push(Attempt {
                    candidate: candidate.clone(),
                    outcome: "loaded".to_string(),
                });
                return Probe {
                    attempts,
                    resolved: Some(candidate),
                };
            }
            Err(outcome) => attempts.push(Attempt { candidate, outcome }),
        }
    }
    Probe {
        attempts,
        resolved: None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
