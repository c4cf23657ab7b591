//! HTTP server binary for pdf2jpg.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServerConfig` and runs the router until Ctrl-C / SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use pdf2jpg::server::{start_server, AppState};
use pdf2jpg::ServerConfig;
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Defaults: 0.0.0.0:3000, 50 MB uploads, Ghostscript from PATH
  pdf2jpg-server

  # Portable Ghostscript on Windows
  pdf2jpg-server --gs-bin-dir C:\tools\gs\bin

  # Convert a document (every page in a ZIP)
  curl -OJ -F file=@report.pdf http://localhost:3000/convert

  # One tall JPEG at 200 DPI
  curl -OJ -F file=@report.pdf -F output=merge -F dpi=200 \
       http://localhost:3000/convert

ENVIRONMENT VARIABLES:
  PORT                     Listen port
  HOST                     Listen interface
  MAX_UPLOAD_MB            Upload size limit in megabytes
  GS_BIN                   Explicit Ghostscript executable
  GS_BIN_DIR               Directory holding gswin64c.exe / gswin32c.exe (Windows)
  PDF2JPG_WORK_DIR         Root for uploads and scratch directories
  PDF2JPG_MAX_JOBS         Maximum simultaneous Ghostscript processes
  PDF2JPG_RASTER_TIMEOUT   Seconds before a Ghostscript run is killed
  RUST_LOG                 Log filter (overrides --verbose)
"#;

/// Rasterise uploaded PDFs into JPEG pages over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2jpg-server",
    version,
    about = "HTTP service that converts uploaded PDFs into JPEG pages",
    long_about = "HTTP service that converts uploaded PDFs into JPEG pages with Ghostscript. \
Responds with a ZIP of every page, the first page alone, or all pages merged into one image.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// TCP port.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Largest accepted upload in megabytes.
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 50,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_upload_mb: u64,

    /// Explicit Ghostscript executable; skips the platform lookup.
    #[arg(long, env = "GS_BIN")]
    gs_bin: Option<PathBuf>,

    /// Portable Ghostscript directory (Windows). Default: `<exe dir>/bin`.
    #[arg(long, env = "GS_BIN_DIR")]
    gs_bin_dir: Option<PathBuf>,

    /// Root for uploads and scratch directories. Default: system temp dir.
    #[arg(long, env = "PDF2JPG_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Maximum simultaneous Ghostscript processes. Default: CPU count.
    #[arg(long, env = "PDF2JPG_MAX_JOBS",
          value_parser = clap::value_parser!(u64).range(1..))]
    max_concurrent_jobs: Option<u64>,

    /// Kill a Ghostscript run after this many seconds.
    #[arg(long, env = "PDF2JPG_RASTER_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    raster_timeout: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2JPG_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            host: self.host,
            port: self.port,
            max_upload_mb: self.max_upload_mb,
            gs_bin: self
                .gs_bin
                .filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty()),
            gs_bin_dir: self.gs_bin_dir.unwrap_or(defaults.gs_bin_dir),
            work_dir: self.work_dir.unwrap_or(defaults.work_dir),
            max_concurrent_jobs: self
                .max_concurrent_jobs
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.max_concurrent_jobs),
            raster_timeout_secs: self.raster_timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.into_config();

    std::fs::create_dir_all(config.upload_dir()).with_context(|| {
        format!(
            "Failed to create upload directory {}",
            config.upload_dir().display()
        )
    })?;

    info!("PDF→JPG API running: http://localhost:{}", config.port);
    info!("Platform: {}", std::env::consts::OS);
    info!("MAX_UPLOAD_MB: {}", config.max_upload_mb);
    info!(
        "GS_BIN (override): {}",
        config
            .gs_bin
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    );
    info!("GS_BIN_DIR (windows portable): {}", config.gs_bin_dir.display());
    info!(
        "Work dir: {}, max jobs: {}, raster timeout: {}",
        config.work_dir.display(),
        config.max_concurrent_jobs,
        config
            .raster_timeout_secs
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "none".to_string())
    );

    let addr = config.bind_addr();
    start_server(AppState::new(config), shutdown_signal())
        .await
        .with_context(|| format!("Server on {addr} failed"))?;

    info!("Shut down cleanly");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Ctrl-C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
