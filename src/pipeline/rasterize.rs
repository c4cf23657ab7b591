//! PDF rasterisation: run Ghostscript as a child process.
//!
//! ## Why a child process?
//!
//! Ghostscript is the most forgiving PDF interpreter around: it repairs broken
//! xref tables, copes with odd fonts, and renders straight to JPEG. Running it
//! out of process also means a crash or runaway render can never take the
//! server down with it.
//!
//! Arguments are always passed as a discrete list, never through a shell, so
//! spaces or metacharacters in paths are harmless. The executable comes from
//! a [`RasterizerLocator`], which tests replace with a stub script.

use crate::config::ConversionParameters;
use crate::error::Pdf2JpgError;
use gs_locate::GhostscriptBinary;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// File name pattern handed to `-sOutputFile`; `%03d` is the page counter.
pub const OUTPUT_PATTERN: &str = "page-%03d.jpg";

/// Value of `-dNumRenderingThreads`.
pub const RENDERING_THREADS: u32 = 4;

/// Resolves the Ghostscript executable for each invocation.
///
/// Implementations must be `Send + Sync`: one locator is shared by every
/// request the server handles.
pub trait RasterizerLocator: Send + Sync {
    fn locate(&self) -> Result<GhostscriptBinary, Pdf2JpgError>;
}

/// Production locator: `GS_BIN` override, then the platform default.
#[derive(Debug, Clone)]
pub struct SystemLocator {
    pub override_bin: Option<PathBuf>,
    pub bin_dir: PathBuf,
}

impl SystemLocator {
    pub fn new(override_bin: Option<PathBuf>, bin_dir: PathBuf) -> Self {
        Self {
            override_bin,
            bin_dir,
        }
    }

    /// Build from the `GS_BIN` / `GS_BIN_DIR` environment variables.
    pub fn from_env() -> Self {
        Self::new(gs_locate::env_override(), gs_locate::env_bin_dir())
    }
}

impl RasterizerLocator for SystemLocator {
    fn locate(&self) -> Result<GhostscriptBinary, Pdf2JpgError> {
        Ok(gs_locate::locate(self.override_bin.as_deref(), &self.bin_dir)?)
    }
}

/// Always returns the same executable.
#[derive(Debug, Clone)]
pub struct FixedLocator(pub GhostscriptBinary);

impl RasterizerLocator for FixedLocator {
    fn locate(&self) -> Result<GhostscriptBinary, Pdf2JpgError> {
        Ok(self.0.clone())
    }
}

/// Build the Ghostscript argument list for one conversion.
///
/// The memory budget is applied three ways (`BufferSpace`,
/// `BandBufferSpace`, and the PostScript `setvmthreshold`), each expressed
/// in bytes as `memory_mb * 1_000_000`.
pub fn build_args(
    source: &Path,
    output_dir: &Path,
    params: &ConversionParameters,
) -> Vec<OsString> {
    let mem = params.memory_bytes().to_string();

    let mut output_file = OsString::from("-sOutputFile=");
    output_file.push(output_dir.join(OUTPUT_PATTERN));

    vec![
        "-dSAFER".into(),
        "-dBATCH".into(),
        "-dNOPAUSE".into(),
        "-sDEVICE=jpeg".into(),
        output_file,
        format!("-r{}", params.dpi).into(),
        format!("-dFirstPage={}", params.first_page).into(),
        format!("-dLastPage={}", params.last_page).into(),
        format!("-dJPEGQ={}", params.quality).into(),
        "-dGraphicsAlphaBits=2".into(),
        "-dTextAlphaBits=2".into(),
        format!("-dNumRenderingThreads={RENDERING_THREADS}").into(),
        format!("-dBufferSpace={mem}").into(),
        format!("-dBandBufferSpace={mem}").into(),
        "-c".into(),
        mem.clone().into(),
        "setvmthreshold".into(),
        "-f".into(),
        source.as_os_str().to_os_string(),
        "-c".into(),
        "quit".into(),
    ]
}

/// Rasterise `source` into `output_dir` as `page-NNN.jpg` files.
///
/// Returns once Ghostscript has exited with status 0. Whether any pages were
/// actually written is the caller's business (see [`crate::pipeline::collect`]).
///
/// The child is spawned with `kill_on_drop`, so dropping this future (client
/// went away, `timeout` elapsed) terminates Ghostscript too.
///
/// # Errors
/// - [`Pdf2JpgError::ToolNotFound`] — the locator found no executable
/// - [`Pdf2JpgError::SpawnError`] — the process could not be started
/// - [`Pdf2JpgError::RasterFailed`] — nonzero exit; carries the full stderr
/// - [`Pdf2JpgError::RasterTimeout`] — `timeout` elapsed first
pub async fn invoke(
    locator: &dyn RasterizerLocator,
    source: &Path,
    output_dir: &Path,
    params: &ConversionParameters,
    timeout: Option<Duration>,
) -> Result<(), Pdf2JpgError> {
    let gs = locator.locate()?;
    let args = build_args(source, output_dir, params);
    debug!("Running {} {:?}", gs.program.display(), args);

    let mut cmd = Command::new(&gs.program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref dir) = gs.working_dir {
        cmd.current_dir(dir);
    }

    let start = Instant::now();
    let child = cmd.spawn().map_err(|source| Pdf2JpgError::SpawnError {
        program: gs.program.clone(),
        source,
    })?;

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!("Ghostscript exceeded {}s, killing it", limit.as_secs());
                Pdf2JpgError::RasterTimeout {
                    secs: limit.as_secs(),
                }
            })??,
        None => child.wait_with_output().await?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(
            "Ghostscript exited with {:?} after {}ms",
            output.status.code(),
            start.elapsed().as_millis()
        );
        return Err(Pdf2JpgError::RasterFailed {
            code: output.status.code(),
            stderr,
        });
    }

    info!(
        "Ghostscript finished in {}ms (dpi={}, pages {}-{})",
        start.elapsed().as_millis(),
        params.dpi,
        params.first_page,
        params.last_page
    );
    Ok(())
}
