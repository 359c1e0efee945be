//! Input validation and staging.
//!
//! ## Why stage to a temp file?
//!
//! pdfium opens documents by file-system path. Uploaded bytes are written to
//! a `NamedTempFile` so pdfium has something to open, and the file is removed
//! when [`StagedPdf`] is dropped, whether the run succeeded or not. The size
//! cap is checked before anything touches the disk.

use crate::error::PdfTextError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// The first four bytes of every PDF.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Reject uploads larger than `limit` bytes.
pub fn check_upload_size(len: u64, limit: u64) -> Result<(), PdfTextError> {
    if len > limit {
        return Err(PdfTextError::FileTooLarge { size: len, limit });
    }
    Ok(())
}

/// `Err(NotAPdf)` unless `bytes` starts with `%PDF`.
///
/// Inputs shorter than four bytes are passed through and left for the
/// renderer to reject.
pub fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), PdfTextError> {
    if bytes.len() >= 4 && &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(PdfTextError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// Validate a local PDF: exists, readable, within `limit`, `%PDF` header.
pub fn validate_local(path: &Path, limit: u64) -> Result<PathBuf, PdfTextError> {
    let path = path.to_path_buf();

    let metadata = match std::fs::metadata(&path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfTextError::PermissionDenied { path });
        }
        Err(_) => return Err(PdfTextError::NotFound { path }),
    };
    if !metadata.is_file() {
        return Err(PdfTextError::NotFound { path });
    }
    check_upload_size(metadata.len(), limit)?;

    match std::fs::File::open(&path) {
        Ok(f) => {
            let mut head = Vec::with_capacity(4);
            f.take(4)
                .read_to_end(&mut head)
                .map_err(|e| PdfTextError::Internal(format!("Failed to read header: {}", e)))?;
            check_magic(&path, &head)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfTextError::PermissionDenied { path });
        }
        Err(_) => return Err(PdfTextError::NotFound { path }),
    }

    debug!("Validated local PDF: {}", path.display());
    Ok(path)
}

/// Uploaded bytes written to a temporary `.pdf` file.
///
/// The file lives as long as this value does.
pub struct StagedPdf {
    file: NamedTempFile,
}

impl StagedPdf {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Write `bytes` to a fresh temp file with a `.pdf` suffix.
pub fn stage_bytes(bytes: &[u8]) -> Result<StagedPdf, PdfTextError> {
    let mut file = tempfile::Builder::new()
        .prefix("pdf2txt-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| PdfTextError::Internal(format!("Failed to create temp file: {}", e)))?;

    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| PdfTextError::Internal(format!("Failed to write temp file: {}", e)))?;

    debug!(
        "Staged {} bytes at {}",
        bytes.len(),
        file.path().display()
    );
    Ok(StagedPdf { file })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_at_limit_is_accepted() {
        assert!(check_upload_size(10, 10).is_ok());
        assert!(matches!(
            check_upload_size(11, 10),
            Err(PdfTextError::FileTooLarge { size: 11, limit: 10 })
        ));
    }

    #[test]
    fn magic_mismatch_is_not_a_pdf() {
        let err = check_magic(Path::new("x.pdf"), b"PK\x03\x04rest").unwrap_err();
        match err {
            PdfTextError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(check_magic(Path::new("x.pdf"), b"%PDF-1.7").is_ok());
    }

    #[test]
    fn missing_local_file() {
        let err = validate_local(Path::new("/no/such/dir/file.pdf"), 1024).unwrap_err();
        assert!(matches!(err, PdfTextError::NotFound { .. }));
    }

    #[test]
    fn local_file_checks_size_then_magic() {
        let dir = tempfile::tempdir().unwrap();

        let big = dir.path().join("big.pdf");
        std::fs::write(&big, vec![b'%'; 64]).unwrap();
        assert!(matches!(
            validate_local(&big, 32),
            Err(PdfTextError::FileTooLarge { .. })
        ));

        let txt = dir.path().join("notes.pdf");
        std::fs::write(&txt, b"hello world").unwrap();
        assert!(matches!(
            validate_local(&txt, 1024),
            Err(PdfTextError::NotAPdf { .. })
        ));

        let good = dir.path().join("good.pdf");
        std::fs::write(&good, b"%PDF-1.4\n").unwrap();
        assert_eq!(validate_local(&good, 1024).unwrap(), good);
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_local(dir.path(), 1024),
            Err(PdfTextError::NotFound { .. })
        ));
    }

    #[test]
    fn staged_file_is_removed_on_drop() {
        let staged = stage_bytes(b"%PDF-1.4\n").unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4\n");
        drop(staged);
        assert!(!path.exists());
    }
}
