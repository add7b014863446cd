//! Input resolution: validate the user-supplied path before any work starts.
//!
//! We check the `%PDF` magic bytes up front so a wrong file (a `.docx`
//! renamed to `.pdf`, an HTML error page saved by a browser) fails with a
//! clear message instead of an opaque lopdf parse error, and before the
//! output directory tree is created.

use crate::error::PdfChunkError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve a local file path, validating existence, readability, and PDF
/// magic bytes. Returns the path unchanged on success.
pub fn resolve_input(input: impl AsRef<Path>) -> Result<PathBuf, PdfChunkError> {
    let path = input.as_ref().to_path_buf();

    if !path.exists() {
        return Err(PdfChunkError::FileNotFound { path });
    }
    if !path.is_file() {
        return Err(PdfChunkError::NotAFile { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            // Files shorter than four bytes are left for lopdf to reject.
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(PdfChunkError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfChunkError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PdfChunkError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/a/real/file.pdf").unwrap_err();
        assert!(matches!(err, PdfChunkError::FileNotFound { .. }));
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path()).unwrap_err();
        assert!(matches!(err, PdfChunkError::NotAFile { .. }), "got: {err}");
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"PK\x03\x04 zip archive").unwrap();

        match resolve_input(&path).unwrap_err() {
            PdfChunkError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_input(&path).unwrap(), path);
    }
}
