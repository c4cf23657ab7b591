//! Error types for the pdf2jpg library.
//!
//! A single enum, [`Pdf2JpgError`], covers every failure of a conversion.
//! Variants are grouped by the stage that raises them, and each one maps to a
//! fixed HTTP status via [`Pdf2JpgError::status_code`]:
//!
//! | Class | Status |
//! |-------|--------|
//! | bad upload, malformed form | 400 |
//! | upload over the size limit | 413 |
//! | Ghostscript ran but produced nothing, merge too tall | 422 |
//! | tool, archive, image, I/O failures | 500 |
//!
//! Errors raised before the first body byte is sent become a JSON error
//! response (see `server::response`). Errors raised while a body is streaming
//! can only be logged; the client sees a dropped connection.

use axum::http::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf2jpg library.
#[derive(Debug, Error)]
pub enum Pdf2JpgError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// Missing upload, unreadable upload, or wrong file signature.
    #[error("Invalid PDF: {reason}")]
    InvalidDocument { reason: String },

    /// The multipart body could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The uploaded file exceeds the configured limit.
    #[error("File too large. Max {max_mb}MB")]
    UploadTooLarge { max_mb: u64 },

    // ── Rasterizer errors ─────────────────────────────────────────────────
    /// No Ghostscript executable could be resolved.
    #[error("Ghostscript not found: {0}")]
    ToolNotFound(String),

    /// The executable was resolved but the process could not be started.
    #[error("Failed to start Ghostscript '{program}': {source}")]
    SpawnError {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ghostscript exited with a nonzero status.
    #[error("Ghostscript failed (code {}): {stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    RasterFailed { code: Option<i32>, stderr: String },

    /// Ghostscript did not finish within the configured limit.
    #[error("Ghostscript timed out after {secs}s")]
    RasterTimeout { secs: u64 },

    /// Ghostscript exited cleanly but wrote no page images.
    #[error("No JPG generated. Invalid PDF?")]
    NoPagesProduced,

    // ── Merge errors ──────────────────────────────────────────────────────
    /// The merger was handed no pages.
    #[error("Cannot merge an empty page list")]
    EmptyInput,

    /// A page image has no usable width/height.
    #[error("Page image '{page}' has no readable dimensions")]
    InvalidPageMetadata { page: String },

    /// The stacked pages would exceed what a JPEG can hold.
    #[error("Merged image would be {width}x{height}px; JPEG allows at most {max}px per side. Use output=zip")]
    MergeTooLarge { width: u32, height: u64, max: u32 },

    /// Decoding or encoding a JPEG failed.
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    // ── Archive errors ────────────────────────────────────────────────────
    /// After filtering, nothing was left to put in the archive.
    #[error("No valid files to zip")]
    NoValidFiles,

    /// The ZIP encoder reported an error.
    #[error("Archive write failed: {0}")]
    Archive(#[from] zip::result::ZipError),

    // ── I/O & catch-all ───────────────────────────────────────────────────
    /// File-system or sink failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal error (task panics, closed channels).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2JpgError {
    /// HTTP status that represents this failure class.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Pdf2JpgError::InvalidDocument { .. } | Pdf2JpgError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Pdf2JpgError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Pdf2JpgError::NoPagesProduced | Pdf2JpgError::MergeTooLarge { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable, machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Pdf2JpgError::InvalidDocument { .. } => "InvalidDocument",
            Pdf2JpgError::BadRequest(_) => "BadRequest",
            Pdf2JpgError::UploadTooLarge { .. } => "UploadTooLarge",
            Pdf2JpgError::ToolNotFound(_) => "ToolNotFound",
            Pdf2JpgError::SpawnError { .. } => "SpawnError",
            Pdf2JpgError::RasterFailed { .. } => "RasterFailed",
            Pdf2JpgError::RasterTimeout { .. } => "RasterTimeout",
            Pdf2JpgError::NoPagesProduced => "NoPagesProduced",
            Pdf2JpgError::EmptyInput => "EmptyInput",
            Pdf2JpgError::InvalidPageMetadata { .. } => "InvalidPageMetadata",
            Pdf2JpgError::MergeTooLarge { .. } => "MergeTooLarge",
            Pdf2JpgError::Image(_) => "Image",
            Pdf2JpgError::NoValidFiles => "NoValidFiles",
            Pdf2JpgError::Archive(_) => "Archive",
            Pdf2JpgError::Io(_) => "Io",
            Pdf2JpgError::Internal(_) => "Internal",
        }
    }
}

impl From<gs_locate::LocateError> for Pdf2JpgError {
    fn from(e: gs_locate::LocateError) -> Self {
        Pdf2JpgError::ToolNotFound(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_failure_class() {
        let invalid = Pdf2JpgError::InvalidDocument {
            reason: "file does not start with %PDF".into(),
        };
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Pdf2JpgError::UploadTooLarge { max_mb: 50 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            Pdf2JpgError::NoPagesProduced.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Pdf2JpgError::NoValidFiles.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Pdf2JpgError::EmptyInput.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn raster_failed_display_carries_stderr() {
        let e = Pdf2JpgError::RasterFailed {
            code: Some(1),
            stderr: "Unrecoverable error, exit code 1".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("code 1"), "got: {msg}");
        assert!(msg.contains("Unrecoverable error"), "got: {msg}");
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn raster_failed_by_signal_display() {
        let e = Pdf2JpgError::RasterFailed {
            code: None,
            stderr: String::new(),
        };
        assert!(e.to_string().contains("code signal"));
    }

    #[test]
    fn upload_too_large_mentions_limit() {
        let e = Pdf2JpgError::UploadTooLarge { max_mb: 50 };
        assert_eq!(e.to_string(), "File too large. Max 50MB");
        assert_eq!(e.kind(), "UploadTooLarge");
    }

    #[test]
    fn locate_error_maps_to_tool_not_found() {
        let e: Pdf2JpgError = gs_locate::LocateError::NotFound {
            dir: PathBuf::from("C:\\gs\\bin"),
            candidates: vec!["gswin64c.exe".into()],
        }
        .into();
        assert_eq!(e.kind(), "ToolNotFound");
        assert!(e.to_string().contains("gswin64c.exe"));
    }
}
