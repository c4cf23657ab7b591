//! # pdf2jpg
//!
//! Rasterise uploaded PDF documents into JPEG pages over HTTP.
//!
//! ## Why this crate?
//!
//! Turning a PDF into images sounds trivial until it runs as a shared
//! service: uploads must be checked, Ghostscript must be run without a shell
//! and without leaking scratch files, multi-hundred-page results must not sit
//! in memory, and a burst of requests must not start fifty Ghostscript
//! processes at once. This crate wraps all of that behind one POST endpoint.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF upload
//!  │
//!  ├─ 1. Input      stream to a temp file, sniff the %PDF signature
//!  ├─ 2. Workspace  unique scratch dir with out/, removed on drop
//!  ├─ 3. Rasterize  Ghostscript child process (kill-on-drop, optional timeout)
//!  ├─ 4. Collect    page-NNN.jpg files in page order
//!  ├─ 5. Shape      zip | single image | merged image (spawn_blocking)
//!  └─ 6. Stream     blocking writer → bounded channel → HTTP body
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2jpg::server::{start_server, AppState};
//! use pdf2jpg::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = ServerConfig { port: 8080, ..ServerConfig::default() };
//!     start_server(AppState::new(config), async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! Library use without HTTP:
//!
//! ```rust,no_run
//! use pdf2jpg::{ConversionParameters, Converter, OutputMode, ServerConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let converter = Converter::from_config(&ServerConfig::default());
//! let params = ConversionParameters::builder()
//!     .dpi(200)
//!     .output_mode(OutputMode::MergedImage)
//!     .build();
//!
//! let bytes = std::fs::read("report.pdf")?;
//! let output = converter.convert_bytes(&bytes, Some("report.pdf".into()), params).await?;
//! let file = std::fs::File::create(output.conversion.file_name())?;
//! output.conversion.write_to(file)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2jpg-server` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## Requirements
//!
//! Ghostscript must be installed. Elsewhere than Windows it is run as `gs`
//! from `PATH`; on Windows `gswin64c.exe` or `gswin32c.exe` is looked up in
//! `GS_BIN_DIR`. `GS_BIN` overrides both.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionParameters, ConversionParametersBuilder, OutputMode, ResolvedMode, ServerConfig,
};
pub use convert::{ConversionRequest, Converter};
pub use error::Pdf2JpgError;
pub use gs_locate::GhostscriptBinary;
pub use output::{Conversion, ConversionOutput, ConversionStats};
pub use pipeline::archive::ArchiveOptions;
pub use pipeline::input::PdfSource;
pub use pipeline::rasterize::{FixedLocator, RasterizerLocator, SystemLocator};
