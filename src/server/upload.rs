//! Multipart upload intake.
//!
//! The file part is streamed chunk by chunk into a temp file under the upload
//! directory, counting bytes as it goes, so an oversized upload is cut off at
//! the limit instead of being buffered first. Other parts are read as text
//! and returned as form fields.

use crate::error::Pdf2JpgError;
use crate::pipeline::input;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use std::collections::HashMap;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Name of the multipart field carrying the PDF.
pub const FILE_FIELD: &str = "file";

/// The uploaded file, already on disk.
#[derive(Debug)]
pub struct UploadedFile {
    pub temp: NamedTempFile,
    /// File name as sent by the client.
    pub file_name: Option<String>,
    pub size: u64,
}

/// Everything read from one multipart body.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

/// Read the whole multipart body.
///
/// # Errors
/// - [`Pdf2JpgError::UploadTooLarge`] — file exceeds `max_bytes`, or the body
///   limit layer gave up first
/// - [`Pdf2JpgError::BadRequest`] — malformed body or a second file part
pub async fn read_upload(
    mut multipart: Multipart,
    upload_dir: &Path,
    max_bytes: u64,
    max_mb: u64,
) -> Result<UploadForm, Pdf2JpgError> {
    let mut form = UploadForm::default();
    let multipart_err = |e: MultipartError| map_multipart_error(e, max_mb);

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_err)? {
        let name = field.name().unwrap_or_default().to_string();

        if name != FILE_FIELD {
            let value = field.text().await.map_err(multipart_err)?;
            form.fields.insert(name, value);
            continue;
        }
        if form.file.is_some() {
            return Err(Pdf2JpgError::BadRequest(format!(
                "only one '{FILE_FIELD}' part is allowed"
            )));
        }

        let file_name = field.file_name().map(str::to_string);
        let temp = input::new_upload_file(upload_dir)?;
        let mut out = tokio::fs::File::from_std(temp.reopen()?);
        let mut size: u64 = 0;

        while let Some(chunk) = field.chunk().await.map_err(multipart_err)? {
            size += chunk.len() as u64;
            if size > max_bytes {
                return Err(Pdf2JpgError::UploadTooLarge { max_mb });
            }
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        debug!(
            "Stored upload {:?} ({} bytes) at {}",
            file_name,
            size,
            temp.path().display()
        );
        form.file = Some(UploadedFile {
            temp,
            file_name,
            size,
        });
    }

    Ok(form)
}

fn map_multipart_error(e: MultipartError, max_mb: u64) -> Pdf2JpgError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Pdf2JpgError::UploadTooLarge { max_mb }
    } else {
        Pdf2JpgError::BadRequest(e.body_text())
    }
}
