//! Turning results into HTTP responses.
//!
//! ## Why a channel?
//!
//! The ZIP writer and the file readers are blocking `std::io` code, while the
//! response body is an async stream. [`stream_conversion`] bridges the two
//! with a bounded `mpsc` channel: a `spawn_blocking` task writes the payload
//! into a [`ChannelSink`], and the receiving end becomes the body. The bound
//! gives backpressure, so a slow client slows the writer instead of growing
//! memory.
//!
//! When the client disconnects the receiver is dropped, the next send fails
//! with `BrokenPipe`, the writer stops, and the conversion (with its scratch
//! workspace) is dropped on the blocking thread.

use crate::error::Pdf2JpgError;
use crate::output::ConversionOutput;
use axum::body::{Body, Bytes};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::io::{self, BufWriter, Write};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn, Instrument as _};

/// Header carrying the number of rasterised pages.
pub const PAGE_COUNT_HEADER: &str = "x-page-count";

/// Chunks in flight between the writer task and the body.
const CHANNEL_CAPACITY: usize = 8;

/// Writes are coalesced into chunks of this size before hitting the channel.
const CHUNK_SIZE: usize = 64 * 1024;

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

impl IntoResponse for Pdf2JpgError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self);
        }
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// [`Write`] adapter that forwards every buffer into a channel.
///
/// Must only be used from a blocking thread.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Result<Bytes, io::Error>>) -> Self {
        Self { tx }
    }
}

impl Write for ChannelSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Start streaming `output` and return the response that carries it.
///
/// Headers are final at this point; anything that goes wrong later is only
/// logged and ends the body with an error, which drops the connection.
pub fn stream_conversion(output: ConversionOutput) -> Response {
    let ConversionOutput { conversion, stats } = output;
    let content_type = conversion.content_type();
    let disposition = format!("attachment; filename=\"{}\"", conversion.file_name());

    let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(CHANNEL_CAPACITY);
    let span = tracing::Span::current();

    tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        let start = Instant::now();
        let sink = BufWriter::with_capacity(CHUNK_SIZE, ChannelSink::new(tx.clone()));

        match conversion.write_to(sink) {
            Ok(entries) => info!(
                "Streamed {} ({} entries) in {}ms",
                conversion.file_name(),
                entries,
                start.elapsed().as_millis()
            ),
            Err(e) => {
                warn!("Streaming aborted after {}ms: {}", start.elapsed().as_millis(), e);
                let _ = tx.blocking_send(Err(io::Error::other(e.to_string())));
            }
        }
        // Removes the scratch workspace, if the payload had one.
        drop(conversion);
    });

    let body = Body::from_stream(ReceiverStream::new(rx));
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_DISPOSITION, disposition)
        .header(CACHE_CONTROL, "no-store")
        .header(PAGE_COUNT_HEADER, stats.page_count)
        .body(body)
        .unwrap_or_else(|e| Pdf2JpgError::Internal(format!("response: {e}")).into_response())
}

/// Run `fut` inside a `convert` span tagged with a fresh request id.
pub(crate) async fn with_request_span<F, T>(request_id: &str, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    fut.instrument(tracing::info_span!("convert", request_id))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn errors_render_as_json_with_status() {
        let resp = Pdf2JpgError::NoPagesProduced.into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.kind, "NoPagesProduced");
        assert_eq!(body.error, "No JPG generated. Invalid PDF?");
    }

    #[tokio::test]
    async fn channel_sink_forwards_bytes() {
        let (tx, mut rx) = mpsc::channel(4);
        let writer = tokio::task::spawn_blocking(move || {
            let mut sink = ChannelSink::new(tx);
            sink.write_all(b"hello ").unwrap();
            sink.write_all(b"world").unwrap();
            assert_eq!(sink.write(b"").unwrap(), 0);
        });

        let mut got = Vec::new();
        while let Some(chunk) = rx.recv().await {
            got.extend_from_slice(&chunk.unwrap());
        }
        writer.await.unwrap();
        assert_eq!(got, b"hello world");
    }

    #[tokio::test]
    async fn channel_sink_reports_disconnect_as_broken_pipe() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = tokio::task::spawn_blocking(move || ChannelSink::new(tx).write(b"x").unwrap_err())
            .await
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
