//! HTTP request handlers.

use super::response::{stream_conversion, with_request_span};
use super::upload::{read_upload, FILE_FIELD};
use super::AppState;
use crate::config::ConversionParameters;
use crate::convert::ConversionRequest;
use crate::error::Pdf2JpgError;
use crate::pipeline::input::PdfSource;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Plain-text help served on `GET /`.
pub const USAGE: &str = "PDF→JPG API

POST /convert  (alias: POST /v1/convert/pdf-to-jpg)
Content-Type: multipart/form-data
Field: file (PDF)

Optional fields (form or query string):
- dpi (72..600, default 150)
- quality (1..100, default 85)
- jpegQuality (1..100, default 85; merged image only)
- firstPage (>=1)
- lastPage (>=firstPage)
- memoryMB (64..2048, default 300)
- output: zip | single | merge | auto (default auto)

Response: application/zip or image/jpeg
";

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub version: String,
}

/// Usage text
pub async fn usage() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], USAGE)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Convert an uploaded PDF.
///
/// Form fields override query parameters of the same name. Every error up to
/// the point the body starts streaming is answered with a JSON error.
pub async fn convert_pdf(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, Pdf2JpgError> {
    let request_id = Uuid::new_v4().to_string();
    with_request_span(&request_id, handle_convert(state, query, multipart)).await
}

async fn handle_convert(
    state: AppState,
    query: HashMap<String, String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, Pdf2JpgError> {
    let multipart = multipart.map_err(|e| Pdf2JpgError::BadRequest(e.body_text()))?;
    let config = &state.config;

    let form = read_upload(
        multipart,
        &config.upload_dir(),
        config.max_upload_bytes(),
        config.max_upload_mb,
    )
    .await?;

    let Some(file) = form.file else {
        return Err(Pdf2JpgError::InvalidDocument {
            reason: format!("file is required (multipart field name: {FILE_FIELD})"),
        });
    };

    let mut fields = query;
    fields.extend(form.fields);
    let params = ConversionParameters::from_fields(&fields);

    info!(
        "Upload {:?}: {} bytes, dpi={}, pages {}-{}, mode={:?}",
        file.file_name.as_deref().unwrap_or("(unnamed)"),
        file.size,
        params.dpi,
        params.first_page,
        params.last_page,
        params.output_mode
    );

    let request = ConversionRequest::new(PdfSource::Uploaded(file.temp), file.file_name, params);
    let output = state.converter.convert(request).await?;
    Ok(stream_conversion(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok_and_version() {
        let resp = health_check().await.into_response();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(health.ok);
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn usage_lists_every_field() {
        for field in [
            "dpi",
            "quality",
            "jpegQuality",
            "firstPage",
            "lastPage",
            "memoryMB",
            "output",
        ] {
            assert!(USAGE.contains(field), "usage misses {field}");
        }
    }
}
