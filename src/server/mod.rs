//! HTTP front end.
//!
//! ```text
//! GET  /                         usage text
//! GET  /health                   liveness probe
//! POST /convert                  multipart upload, field `file`
//! POST /v1/convert/pdf-to-jpg    same handler, versioned route
//! ```
//!
//! The router carries a body limit slightly above the upload limit so the
//! multipart framing itself never trips it; the file size is enforced
//! exactly while the upload is written to disk.

mod handlers;
mod response;
mod upload;

pub use handlers::{convert_pdf, health_check, usage, HealthResponse, USAGE};
pub use response::{stream_conversion, ChannelSink, ErrorBody, PAGE_COUNT_HEADER};
pub use upload::{read_upload, UploadForm, UploadedFile, FILE_FIELD};

use crate::config::ServerConfig;
use crate::convert::Converter;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and small form fields on top of the file.
const MULTIPART_SLACK: u64 = 1024 * 1024;

/// State shared by every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub converter: Converter,
}

impl AppState {
    /// State backed by the real Ghostscript installation.
    pub fn new(config: ServerConfig) -> Self {
        let converter = Converter::from_config(&config);
        Self::with_converter(config, converter)
    }

    /// State with a caller-supplied converter (tests use a stub rasterizer).
    pub fn with_converter(config: ServerConfig, converter: Converter) -> Self {
        Self {
            config: Arc::new(config),
            converter,
        }
    }
}

/// Build the router with all endpoints.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes()
        .saturating_add(MULTIPART_SLACK);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(usage))
        .route("/health", get(health_check))
        .route("/convert", post(convert_pdf))
        .route("/v1/convert/pdf-to-jpg", post(convert_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.bind_addr()` and serve until `shutdown` resolves.
pub async fn start_server(
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let addr = state.config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
