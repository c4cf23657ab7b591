//! Input handling: own the uploaded PDF and check that it really is one.
//!
//! ## Why sniff the bytes?
//!
//! Clients send whatever filename and content type they like. The only check
//! that means anything is the file signature: every PDF starts with `%PDF`.
//! [`sniff_pdf`] reads those four bytes before Ghostscript ever sees the
//! file, so garbage is rejected with a 400 instead of a Ghostscript crash.
//!
//! Uploads live in a [`NamedTempFile`], so the file is deleted as soon as
//! its [`PdfSource`] is dropped, whatever path the request takes.

use crate::error::Pdf2JpgError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// The four bytes every PDF starts with.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Prefix of uploaded temp files.
pub const UPLOAD_PREFIX: &str = "upload_";

/// Where the PDF for a conversion comes from.
#[derive(Debug)]
pub enum PdfSource {
    /// A file owned by someone else; never deleted.
    Local(PathBuf),
    /// An uploaded file, deleted when this value is dropped.
    Uploaded(NamedTempFile),
}

impl PdfSource {
    /// Path to the PDF regardless of ownership.
    pub fn path(&self) -> &Path {
        match self {
            PdfSource::Local(p) => p,
            PdfSource::Uploaded(f) => f.path(),
        }
    }

    /// Store `bytes` as an owned upload inside `dir`.
    pub fn from_bytes(dir: &Path, bytes: &[u8]) -> Result<Self, Pdf2JpgError> {
        let mut file = new_upload_file(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(PdfSource::Uploaded(file))
    }
}

/// Create an empty upload temp file inside `dir` (created if missing).
pub fn new_upload_file(dir: &Path) -> Result<NamedTempFile, Pdf2JpgError> {
    std::fs::create_dir_all(dir)?;
    let file = tempfile::Builder::new()
        .prefix(UPLOAD_PREFIX)
        .suffix(".pdf")
        .tempfile_in(dir)?;
    Ok(file)
}

/// Verify the file at `path` starts with `%PDF`.
pub fn sniff_pdf(path: &Path) -> Result<(), Pdf2JpgError> {
    let mut file = std::fs::File::open(path).map_err(|e| Pdf2JpgError::InvalidDocument {
        reason: format!("cannot read upload: {e}"),
    })?;

    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) if &magic == PDF_MAGIC => {
            debug!("PDF signature ok: {}", path.display());
            Ok(())
        }
        Ok(()) => Err(Pdf2JpgError::InvalidDocument {
            reason: format!(
                "Invalid PDF content (file does not start with %PDF, got {:?})",
                String::from_utf8_lossy(&magic)
            ),
        }),
        Err(_) => Err(Pdf2JpgError::InvalidDocument {
            reason: "Invalid PDF content (file is shorter than 4 bytes)".to_string(),
        }),
    }
}

static EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[^/.]+$").unwrap());
static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s.-]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Longest base name kept for download filenames.
pub const MAX_BASE_NAME: usize = 80;

/// Turn a client-supplied filename into a safe download base name.
///
/// Drops the extension and anything outside `[A-Za-z0-9_ .-]`, collapses
/// whitespace into `-`, keeps at most 80 characters, and falls back to
/// `"pdf"` when nothing is left. The result is safe in a
/// `Content-Disposition` header and on every file system.
pub fn sanitize_base_name(name: Option<&str>) -> String {
    let name = name.unwrap_or("");
    let base = EXTENSION.replace(name, "");
    let cleaned = UNSAFE_CHARS.replace_all(&base, "");
    let dashed = WHITESPACE.replace_all(cleaned.trim(), "-");
    let truncated: String = dashed.chars().take(MAX_BASE_NAME).collect();
    if truncated.is_empty() {
        "pdf".to_string()
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_signature() {
        let dir = tempfile::tempdir().unwrap();
        let src = PdfSource::from_bytes(dir.path(), b"%PDF-1.7\n%\xe2\xe3\n").unwrap();
        sniff_pdf(src.path()).expect("valid signature");
    }

    #[test]
    fn rejects_wrong_signature() {
        let dir = tempfile::tempdir().unwrap();
        let src = PdfSource::from_bytes(dir.path(), b"PK\x03\x04 not a pdf").unwrap();
        let err = sniff_pdf(src.path()).unwrap_err();
        assert_eq!(err.kind(), "InvalidDocument");
        assert!(err.to_string().contains("%PDF"), "got: {err}");
    }

    #[test]
    fn rejects_short_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = PdfSource::from_bytes(dir.path(), b"%PD").unwrap();
        assert_eq!(sniff_pdf(src.path()).unwrap_err().kind(), "InvalidDocument");

        let missing = dir.path().join("gone.pdf");
        assert_eq!(sniff_pdf(&missing).unwrap_err().kind(), "InvalidDocument");
    }

    #[test]
    fn uploaded_source_is_deleted_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let src = PdfSource::from_bytes(dir.path(), b"%PDF-1.4").unwrap();
        let path = src.path().to_path_buf();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(UPLOAD_PREFIX));

        drop(src);
        assert!(!path.exists());
    }

    #[test]
    fn local_source_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mine.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        drop(PdfSource::Local(path.clone()));
        assert!(path.exists());
    }

    #[test]
    fn sanitize_base_name_cases() {
        assert_eq!(sanitize_base_name(Some("Annual Report 2024.pdf")), "Annual-Report-2024");
        assert_eq!(sanitize_base_name(Some("inv<o>ice?.PDF")), "invoice");
        assert_eq!(sanitize_base_name(Some("  spaced   out  .pdf")), "spaced-out");
        assert_eq!(sanitize_base_name(Some("archive.tar.gz")), "archive.tar");
        assert_eq!(sanitize_base_name(Some("???.pdf")), "pdf");
        assert_eq!(sanitize_base_name(Some("")), "pdf");
        assert_eq!(sanitize_base_name(None), "pdf");

        let long = format!("{}.pdf", "a".repeat(200));
        assert_eq!(sanitize_base_name(Some(&long)).len(), MAX_BASE_NAME);
    }
}
